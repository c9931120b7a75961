//! READY banner.

use crate::config::{DeploymentMode, ResolvedConfig};

/// (name, mount path) of each bundled tool
pub const TOOLS: &[(&str, &str)] = &[
    ("Wi-Fi Stalker", "/stalker/"),
    ("Threat Watch", "/threats/"),
    ("Network Pulse", "/pulse/"),
];

/// Crate version with the build's git hash
pub fn version_string() -> String {
    format!(
        "{} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown")
    )
}

pub fn banner_lines(config: &ResolvedConfig, version: &str) -> Vec<String> {
    let rule = "=".repeat(70);
    let port = config.settings.app_port;

    let mut lines = vec![
        rule.clone(),
        "Starting UI Toolkit...".to_string(),
        rule.clone(),
        String::new(),
        format!("Version: {}", version),
        format!("Log Level: {}", config.settings.log_level),
        format!("Database: {}", config.settings.database_url),
        String::new(),
    ];

    match config.deployment {
        DeploymentMode::Production => {
            lines.push("Deployment: PRODUCTION (authentication enabled)".to_string());
            if let Some(domain) = config.settings.domain.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("Domain: {}", domain));
            }
        }
        DeploymentMode::Local => {
            lines.push("Deployment: LOCAL (authentication disabled)".to_string());
        }
    }
    lines.push(String::new());

    lines.push("Available tools:".to_string());
    for (name, _) in TOOLS {
        lines.push(format!("  - {}", name));
    }
    lines.push(String::new());

    match config.deployment {
        DeploymentMode::Production => {
            lines.push("Access via your configured domain with HTTPS".to_string());
        }
        DeploymentMode::Local => {
            lines.push(format!("Access the dashboard at: http://localhost:{}", port));
            for (name, mount) in TOOLS {
                lines.push(format!("{} at: http://localhost:{}{}", name, port, mount));
            }
        }
    }
    lines.push(String::new());
    lines.push(rule);
    lines
}
