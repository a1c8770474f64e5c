//! Error types for iterable-emitter operations.

use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while configuring or draining an [`IterableEmitter`].
///
/// Only [`StreamError::Configuration`] is ever returned synchronously. The
/// other variants are recorded once in the stream state and surfaced lazily
/// to iteration handles and error subscribers.
///
/// [`IterableEmitter`]: crate::IterableEmitter
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum StreamError {
    /// The options could not be validated.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The upstream source emitted one of its rejection events.
    #[error("`{event}` event received: {reason}")]
    Rejected {
        /// Name of the rejection event.
        event: String,
        /// Rendered payload of the rejection event.
        reason: String,
        /// The raw arguments, when the adapter could keep a copy of them.
        #[serde(skip)]
        payload: Option<RejectionPayload>,
    },

    /// No data event arrived within the inactivity window.
    #[error("no data received within {timeout:?}")]
    Stalled {
        /// The configured inactivity window.
        timeout: Duration,
    },

    /// A data event arrived after the stream completed.
    #[error("`{event}` event received after resolution or rejection")]
    DataAfterCompletion {
        /// Name of the data event.
        event: String,
    },
}

impl StreamError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` if this error was raised while validating options.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` if this error ends the stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !self.is_configuration()
    }

    /// The arguments of the rejection event that ended the stream.
    ///
    /// `None` unless the stream was rejected with retained arguments of
    /// type `A`.
    pub fn rejection_args<A: 'static>(&self) -> Option<&[A]> {
        match self {
            Self::Rejected {
                payload: Some(payload),
                ..
            } => payload.args(),
            _ => None,
        }
    }
}

/// Arguments of a rejection event, shared by every clone of the error.
///
/// Two payloads are equal only if they come from the same event.
#[derive(Clone)]
pub struct RejectionPayload(Arc<dyn Any + Send + Sync>);

impl RejectionPayload {
    pub(crate) fn new<A: Send + Sync + 'static>(args: Vec<A>) -> Self {
        Self(Arc::new(args))
    }

    /// Downcasts to the argument slice, if it was emitted as `A`.
    pub fn args<A: 'static>(&self) -> Option<&[A]> {
        self.0.downcast_ref::<Vec<A>>().map(Vec::as_slice)
    }
}

impl PartialEq for RejectionPayload {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RejectionPayload {}

impl fmt::Debug for RejectionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RejectionPayload(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let config = StreamError::config("bad");
        assert!(config.is_configuration());
        assert!(!config.is_terminal());

        let stalled = StreamError::Stalled {
            timeout: Duration::from_millis(10),
        };
        assert!(stalled.is_terminal());
    }

    #[test]
    fn display_includes_event_name() {
        let err = StreamError::Rejected {
            event: "error".into(),
            reason: "\"boom\"".into(),
            payload: None,
        };
        assert_eq!(err.to_string(), "`error` event received: \"boom\"");
    }

    #[test]
    fn rejection_args_downcast_to_source_type() {
        let err = StreamError::Rejected {
            event: "error".into(),
            reason: "7".into(),
            payload: Some(RejectionPayload::new(vec![7u64])),
        };
        assert_eq!(err.rejection_args::<u64>(), Some(&[7u64][..]));
        assert!(err.rejection_args::<String>().is_none());

        let copy = err.clone();
        assert_eq!(copy, err);

        let other = StreamError::Rejected {
            event: "error".into(),
            reason: "7".into(),
            payload: Some(RejectionPayload::new(vec![7u64])),
        };
        assert_ne!(other, err);

        let stalled = StreamError::Stalled {
            timeout: Duration::from_millis(1),
        };
        assert!(stalled.rejection_args::<u64>().is_none());
    }
}
