pub type WaveResult<T> = Result<T, WaveError>;

/// Every failure a job can end with.
///
/// All variants are fatal to the job that produced them; nothing is retried internally.
#[derive(thiserror::Error, Debug)]
pub enum WaveError {
    /// Missing, empty or malformed audio input.
    #[error("input error: {0}")]
    Input(String),

    /// Invalid render or encode configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The encoder backend cannot provide a required encoder on this host.
    #[error("capability error: {0}")]
    Capability(String),

    /// An encoder rejected or failed on a unit.
    #[error("encode error: {0}")]
    Encode(String),

    /// The container could not be assembled.
    #[error("mux error: {0}")]
    Mux(String),

    /// The job observed its cancellation token at a checkpoint.
    #[error("job cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error category surfaced to observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorCategory {
    Input,
    Config,
    Capability,
    Encode,
    Mux,
    Cancelled,
    Internal,
}

impl WaveError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Input(_) => ErrorCategory::Input,
            Self::Config(_) => ErrorCategory::Config,
            Self::Capability(_) => ErrorCategory::Capability,
            Self::Encode(_) => ErrorCategory::Encode,
            Self::Mux(_) => ErrorCategory::Mux,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Other(_) => ErrorCategory::Internal,
        }
    }
}
