//! Node configuration

use std::{env, path::PathBuf};

/// Default listen address
pub(crate) const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";

/// Node configuration, read from the environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Config {
    /// HTTP listen address (`EMLOG_LISTEN_ADDR`)
    pub(crate) listen_addr: String,
    /// RocksDB directory (`EMLOG_DB_PATH`); unset keeps everything in memory
    pub(crate) db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self { listen_addr: DEFAULT_LISTEN_ADDR.to_string(), db_path: None }
    }
}

impl Config {
    /// Load from environment variables
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: lookup("EMLOG_LISTEN_ADDR")
                .filter(|addr| !addr.trim().is_empty())
                .unwrap_or(defaults.listen_addr),
            db_path: lookup("EMLOG_DB_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
                .or(defaults.db_path),
        }
    }
}
