#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("operation cancelled by shutdown")]
    Cancelled,

    #[error("lane {lane} is closed")]
    LaneClosed { lane: usize },

    #[error(transparent)]
    Broker(#[from] botbridge_broker::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
