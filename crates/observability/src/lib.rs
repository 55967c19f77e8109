//! Logging for pubsub-shadow.
//!
//! Every node writes one line per event to stdout:
//!
//! ```text
//! 2026/10/18 12:00:00.000123 GossipSub: Delivered (id: <cid>, from: <peer>)
//! ```
//!
//! Lines carry a UTC timestamp and no level, target or colour, so offline tooling can parse
//! the stream without knowing which subscriber produced it. [`LOG_TIME_FORMAT`] is shared with
//! that tooling.

mod args;

pub use args::LogArgs;

use time::{format_description::BorrowedFormatItem, macros::format_description};
use tracing_subscriber::{EnvFilter, fmt::time::UtcTime};

/// Timestamp prefix of every log line, e.g. `2026/10/18 12:00:00.000123`.
pub const LOG_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// Errors from logging setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Builds the level filter.
///
/// Precedence:
/// 1. `--quiet` shows errors only.
/// 2. Otherwise `RUST_LOG` if set, or a level from the verbosity count.
/// 3. Directives from `--log.filter` are added on top.
pub fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom) = &args.filter {
        for directive in custom.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
    }

    filter
}

/// Installs the global subscriber. Call once at process start.
pub fn init_logging(args: &LogArgs) -> Result<(), LoggingError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(args))
        .with_writer(std::io::stdout)
        .with_timer(UtcTime::new(LOG_TIME_FORMAT))
        .with_level(false)
        .with_target(false)
        .with_ansi(false);

    let res = if args.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    res.map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamp_format() {
        let ts = datetime!(2026-10-18 09:05:03.000123 UTC);
        assert_eq!(ts.format(LOG_TIME_FORMAT).unwrap(), "2026/10/18 09:05:03.000123");
    }

    #[test]
    fn quiet_shows_errors_only() {
        let args = LogArgs {
            quiet: true,
            filter: Some("libp2p_gossipsub=trace".into()),
            ..Default::default()
        };
        assert_eq!(build_filter(&args).to_string(), "error");
    }

    #[test]
    fn custom_directives_are_added() {
        let args = LogArgs {
            filter: Some("libp2p_gossipsub=debug, ,not a directive=".into()),
            ..Default::default()
        };
        let filter = build_filter(&args).to_string();
        assert!(filter.contains("libp2p_gossipsub=debug"));
    }
}
