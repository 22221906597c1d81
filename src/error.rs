use thiserror::Error;

use crate::flood_wait::FloodWait;

/// Errors surfaced by the rate limiter.
#[derive(Debug, Error)]
pub enum Error {
    /// The policy is unusable (non-positive rate or period, empty prefix).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The call was denied; the caller should wait before retrying.
    #[error(transparent)]
    FloodWait(FloodWait),

    /// The shared store could not serve the request.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Error {
    pub fn is_flood_wait(&self) -> bool {
        matches!(self, Error::FloodWait(_))
    }

    /// The denial details, if this error is a [`FloodWait`].
    pub fn flood_wait(&self) -> Option<&FloodWait> {
        match self {
            Error::FloodWait(wait) => Some(wait),
            _ => None,
        }
    }
}

impl From<FloodWait> for Error {
    fn from(wait: FloodWait) -> Self {
        Error::FloodWait(wait)
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errs: validator::ValidationErrors) -> Self {
        Error::Configuration(errs.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
