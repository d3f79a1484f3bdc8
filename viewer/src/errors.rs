use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Remote unavailable: HTTP {0}")]
    RemoteUnavailable(reqwest::StatusCode),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timestamp format error: {0}")]
    Format(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short label used in logs and the failure counter.
    pub fn reason(&self) -> &'static str {
        match self {
            // Connection refused and request timeouts land here too
            Error::RemoteUnavailable(_) | Error::Http(_) => "remote_unavailable",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Format(_) => "format_error",
            Error::InvalidValue(_) => "invalid_value",
            Error::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        assert_eq!(
            Error::RemoteUnavailable(reqwest::StatusCode::SERVICE_UNAVAILABLE).reason(),
            "remote_unavailable"
        );
        assert_eq!(
            Error::MalformedResponse("contextResponses".to_string()).reason(),
            "malformed_response"
        );
        assert_eq!(Error::Format("bad".to_string()).reason(), "format_error");
    }
}
