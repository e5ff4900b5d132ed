//! Error types and the error/warning reporting collaborators.
//!
//! Failures raised by user-supplied evaluation functions and reaction
//! callbacks are routed through [`report_error`] when the computation is
//! flagged `user`; everything else propagates as an [`Error`].

use tracing::{error, warn as log_warn};

use crate::config;
use crate::reactive::ComputationId;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure raised by caller-supplied code.
    #[error("{0}")]
    Message(String),

    /// Failure raised by caller-supplied code, wrapping its own error type.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + 'static>),

    #[error("failed watching path \"{0}\": only simple dot-delimited paths are accepted")]
    InvalidPath(String),

    #[error("computation \"{0}\" demanded its own value while evaluating")]
    CyclicEvaluation(String),

    #[error("cannot add or delete property \"{0}\" on a root state object at runtime; declare it up front")]
    RootMutation(String),

    #[error("invalid array index: {0}")]
    InvalidArrayIndex(String),

    #[error("cannot set or delete a reactive property on a primitive value: {0}")]
    NonObjectTarget(String),

    #[error("cannot snapshot a cyclic structure")]
    CyclicSnapshot,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),
}

impl Error {
    /// Build a [`Error::Message`] from anything string-like.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap a caller error type.
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::Custom(Box::new(err))
    }
}

/// Where a reported error came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// The computation whose user code failed, if any.
    pub computation: Option<ComputationId>,
    /// The computation's expression label.
    pub expression: String,
    /// Which phase failed, e.g. `"getter"` or `"callback"`.
    pub info: &'static str,
}

/// Hand an error to the configured error handler, or log it.
pub fn report_error(err: &Error, context: &ErrorContext) {
    let handler = config::with(|c| c.error_handler.clone());
    match handler {
        Some(handler) => handler(err, context),
        None => error!(
            computation = ?context.computation,
            expression = %context.expression,
            info = context.info,
            "error in {}: {}",
            context.info,
            err
        ),
    }
}

/// Emit a runtime warning unless the engine is configured silent.
pub fn warn(message: &str) {
    let (silent, handler) = config::with(|c| (c.silent, c.warn_handler.clone()));
    if silent {
        return;
    }
    match handler {
        Some(handler) => handler(message),
        None => log_warn!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn report_error_uses_configured_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        config::configure(|c| {
            c.error_handler = Some(Rc::new(move |err, ctx| {
                sink.borrow_mut().push(format!("{}: {}", ctx.info, err));
            }));
        });

        let context = ErrorContext {
            computation: None,
            expression: "a.b".into(),
            info: "callback",
        };
        report_error(&Error::msg("boom"), &context);

        assert_eq!(*seen.borrow(), vec!["callback: boom".to_string()]);
        config::reset();
    }

    #[test]
    fn silent_config_suppresses_warnings() {
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        config::configure(|c| {
            c.silent = true;
            c.warn_handler = Some(Rc::new(move |_| *sink.borrow_mut() += 1));
        });

        warn("ignored");
        assert_eq!(*count.borrow(), 0);

        config::configure(|c| c.silent = false);
        warn("delivered");
        assert_eq!(*count.borrow(), 1);
        config::reset();
    }

    #[test]
    fn custom_errors_display_transparently() {
        let err = Error::custom(std::fmt::Error);
        assert_eq!(err.to_string(), std::fmt::Error.to_string());
    }
}
