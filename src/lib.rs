// UI Toolkit library entry
// The binary calls startup::boot(); everything it needs is public here.

pub mod config;
pub mod data_governance;
pub mod database;
pub mod logging;
pub mod startup;

pub use config::{EnvSnapshot, ResolvedConfig};
pub use startup::{boot, BootOptions, BootReport, StartupError};
