use std::error::Error as StdError;

use botbridge_common::EventKind;

/// Crate-wide result type for handler and platform operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No handler is registered for the envelope's type tag.
    #[error("no handler for event type: {event_type}")]
    NoHandler { event_type: String },

    /// The envelope payload does not have the shape its type requires.
    #[error("malformed {event_type} payload: {source}")]
    Decode {
        event_type: EventKind,
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but cannot be turned into a platform request.
    #[error("invalid {event_type} payload: {message}")]
    InvalidPayload {
        event_type: EventKind,
        message: String,
    },

    /// The platform rejected or failed a request.
    #[error("platform {operation} failed: {source}")]
    SideEffect {
        operation: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Wrapped source error from an adapter dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_payload(event_type: EventKind, message: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            event_type,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn side_effect(
        operation: &'static str,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::SideEffect {
            operation,
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
