use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Sampling unavailable: {0}")]
    SamplingUnavailable(String),

    #[error("Sink write failed: {0}")]
    SinkWriteFailure(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Errors the reporter loop may skip under the `skip` failure policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::SamplingUnavailable(_) | Error::SinkWriteFailure(_))
    }
}
