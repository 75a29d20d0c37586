/// Result alias that carries the custom [`JourneyError`] type.
pub type Result<T> = std::result::Result<T, JourneyError>;

/// Common error type for the core crate.
///
/// Cancellation is deliberately absent: a cancelled run or ramp reports
/// [`Completion::Cancelled`](crate::Completion) instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum JourneyError {
    /// Free-form failure reported by a collaborator such as an audio backend.
    #[error("{0}")]
    Message(String),
    /// The stage has to be installed before a journey or lighting ramp can run.
    #[error("stage has not been installed")]
    StageNotInstalled,
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl JourneyError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for JourneyError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for JourneyError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
