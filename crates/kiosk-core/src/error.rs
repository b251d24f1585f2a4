use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // State errors
    #[error("Invalid feedback state: {0} (expected 0-2)")]
    InvalidFeedbackState(u8),

    // Hardware errors
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    // Channel errors
    #[error("Status channel wait timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    // Runtime errors
    #[error("Runtime error: {0}")]
    Runtime(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::InvalidFeedbackState(7).to_string(),
            "Invalid feedback state: 7 (expected 0-2)"
        );
        assert_eq!(
            Error::Timeout { duration_ms: 250 }.to_string(),
            "Status channel wait timed out after 250ms"
        );
        assert_eq!(
            Error::ResourceUnavailable("line 17".into()).to_string(),
            "Resource unavailable: line 17"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = io.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
