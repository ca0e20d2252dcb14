use std::time::Duration;
use thiserror::Error;

/// Failure of a single resource client call.
///
/// Every variant carries owned text so results can travel through the
/// message queue and be cloned into the UI state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The call did not finish within its deadline class.
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The engine could not be reached or the client process failed to run.
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine answered but refused the operation.
    #[error("{0}")]
    Rejected(String),

    /// The engine answered with a payload that could not be parsed or formatted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The operation does not exist for this resource kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::ClientError;
    use std::time::Duration;

    #[test]
    fn timeout_renders_whole_seconds() {
        let error = ClientError::TimedOut(Duration::from_secs(30));
        assert_eq!(error.to_string(), "timed out after 30s");
        assert!(error.is_timeout());
    }

    #[test]
    fn rejected_renders_engine_text_verbatim() {
        let error = ClientError::Rejected("No such container: web".to_string());
        assert_eq!(error.to_string(), "No such container: web");
        assert!(!error.is_timeout());
    }
}
