use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bytes or a JSON value could not be decoded into the expected shape.
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[must_use]
    pub fn decode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { what, source }
    }

    #[must_use]
    pub fn encode(what: &'static str, source: serde_json::Error) -> Self {
        Self::Encode { what, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
