use std::process::ExitCode;

use ui_toolkit_lib::config::EnvSnapshot;
use ui_toolkit_lib::logging::{init_logging, LogHandle};
use ui_toolkit_lib::startup::{self, banner, BootOptions};

fn main() -> ExitCode {
    let env = EnvSnapshot::from_process();
    let logging = init_logging(env.get("LOG_LEVEL"));

    match run(env, logging.as_ref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<startup::StartupError>() {
                Some(startup_error) => {
                    tracing::error!(error = %startup_error, "Startup aborted");
                    eprintln!("{}", startup_error.remediation());
                }
                None => eprintln!("ERROR: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(env: EnvSnapshot, logging: Option<&LogHandle>) -> anyhow::Result<()> {
    let report = startup::boot(env, &BootOptions::default())?;

    // LOG_LEVEL may have come from .env
    if let Some(handle) = logging {
        handle.set_level(&report.config.settings.log_level);
    }

    for line in banner::banner_lines(&report.config, &banner::version_string()) {
        println!("{}", line);
    }
    if !report.reconcile.is_fully_successful() {
        tracing::warn!(
            warnings = report.reconcile.warnings().len(),
            "Started with schema warnings, some features may not work correctly"
        );
    }
    Ok(())
}
