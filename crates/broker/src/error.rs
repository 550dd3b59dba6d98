use std::error::Error as StdError;

/// Broker client errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying transport failed to send, connect or receive.
    #[error("broker transport failed: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// An envelope could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] botbridge_common::Error),
}

impl Error {
    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
