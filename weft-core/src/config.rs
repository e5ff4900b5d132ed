//! Engine configuration.
//!
//! The engine is single-threaded, so configuration is held per thread.
//! Only the plain settings are serialisable; the handler hooks are installed
//! programmatically.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorContext, Result};

/// Receives errors raised by user computations.
pub type ErrorHandler = Rc<dyn Fn(&Error, &ErrorContext)>;

/// Receives runtime warnings.
pub type WarnHandler = Rc<dyn Fn(&str)>;

/// How many times one computation may re-run within a single flush before
/// the scheduler assumes an infinite update loop.
pub const DEFAULT_MAX_UPDATE_COUNT: u32 = 100;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Suppress all warnings.
    pub silent: bool,

    /// Defer flushes to the next tick. When false, the first enqueue of a
    /// batch flushes immediately.
    pub async_flush: bool,

    /// Circular-update threshold per computation per flush.
    pub max_update_count: u32,

    #[serde(skip)]
    pub error_handler: Option<ErrorHandler>,

    #[serde(skip)]
    pub warn_handler: Option<WarnHandler>,
}

impl Config {
    /// Parse the serialisable settings from JSON. Missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            silent: false,
            async_flush: true,
            max_update_count: DEFAULT_MAX_UPDATE_COUNT,
            error_handler: None,
            warn_handler: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("silent", &self.silent)
            .field("async_flush", &self.async_flush)
            .field("max_update_count", &self.max_update_count)
            .field("error_handler", &self.error_handler.is_some())
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Read a field of the current configuration.
pub(crate) fn with<R>(f: impl FnOnce(&Config) -> R) -> R {
    CONFIG.with(|config| f(&config.borrow()))
}

/// A copy of the current thread's configuration.
pub fn current() -> Config {
    with(Config::clone)
}

/// Mutate the current thread's configuration.
pub fn configure(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|config| f(&mut config.borrow_mut()));
}

/// Replace the current thread's configuration wholesale.
pub fn install(config: Config) {
    CONFIG.with(|current| *current.borrow_mut() = config);
}

/// Restore defaults.
pub fn reset() {
    install(Config::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.silent);
        assert!(config.async_flush);
        assert_eq!(config.max_update_count, DEFAULT_MAX_UPDATE_COUNT);
    }

    #[test]
    fn loads_partial_json() {
        let config = Config::from_json_str(r#"{ "async_flush": false }"#).unwrap();
        assert!(!config.async_flush);
        assert_eq!(config.max_update_count, DEFAULT_MAX_UPDATE_COUNT);
        assert!(config.error_handler.is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Config::from_json_str("{ silent: ").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn configure_is_thread_scoped() {
        configure(|c| c.max_update_count = 3);
        assert_eq!(current().max_update_count, 3);

        let other = std::thread::spawn(|| current().max_update_count)
            .join()
            .unwrap();
        assert_eq!(other, DEFAULT_MAX_UPDATE_COUNT);
        reset();
    }
}
