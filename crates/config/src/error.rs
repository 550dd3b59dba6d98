/// Startup configuration errors. Always fatal: the process exits before any
/// router starts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required setting {key}")]
    Missing { key: &'static str },

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    #[must_use]
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
