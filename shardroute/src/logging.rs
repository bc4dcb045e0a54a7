//! Command line flags for log output.

use tracing_subscriber::{EnvFilter, filter::ParseError};

/// Filter used when neither `--log-filter` nor `-v` is given.
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),

    #[error("cannot install log subscriber: {0}")]
    Install(String),
}

#[derive(Debug, Clone, clap::Parser)]
pub(crate) struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `debug,sharding_rule=info` specifies debug logging for all modules
    /// except `sharding_rule`.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", global = true)]
    pub(crate) log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        verbatim_doc_comment
    )]
    pub(crate) log_verbose_count: u8,
}

impl LoggingConfig {
    pub(crate) fn env_filter(&self) -> Result<EnvFilter, Error> {
        let directive = match self.log_verbose_count {
            0 => self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER),
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Ok(EnvFilter::try_new(directive)?)
    }
}

/// Installs the global subscriber. Logs go to stderr so that stdout only
/// carries command output.
pub(crate) fn init_logs(config: &LoggingConfig) -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Install(e.to_string()))
}
