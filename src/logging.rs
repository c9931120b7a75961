//! tracing subscriber setup.
//!
//! The level can only be known for certain after `.env` has been merged, which
//! happens inside `boot`. The filter is therefore installed behind a reload
//! layer so `main` can apply the resolved `LOG_LEVEL` afterwards.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle for changing the level of the installed subscriber
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Replace the level directive; `RUST_LOG` still applies underneath.
    pub fn set_level(&self, level: &str) -> bool {
        self.filter.reload(build_filter(parse_level(level))).is_ok()
    }
}

/// `LOG_LEVEL` value to a filter, `info` when unparsable
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse::<LevelFilter>().unwrap_or(LevelFilter::INFO)
}

fn build_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Install the global fmt subscriber.
///
/// `default_level` (e.g. `LOG_LEVEL`) is added on top of `RUST_LOG`. Returns
/// `None` when a global subscriber was already installed.
pub fn init_logging(default_level: Option<&str>) -> Option<LogHandle> {
    let level = default_level.map_or(LevelFilter::INFO, parse_level);
    let (filter, handle) = reload::Layer::new(build_filter(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .ok()
        .map(|()| LogHandle { filter: handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN "), LevelFilter::WARN);
        assert_eq!(parse_level("not-a-level"), LevelFilter::INFO);
    }

    #[test]
    fn test_init_once_then_reload() {
        let first = init_logging(Some("warn"));
        assert!(init_logging(None).is_none());

        if let Some(handle) = first {
            assert!(handle.set_level("debug"));
        }
    }
}
