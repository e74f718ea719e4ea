use thiserror::Error;

/// Failure reported by one of the remote collaborators
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// Network unreachable, timeout, connection reset
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    /// The metadata provider answered with a failure indicator
    #[error("{reason}")]
    Provider { reason: String },
    #[error("not found")]
    NotFound,
    #[error("not signed in")]
    Unauthorized,
    #[error("not permitted: {0}")]
    Forbidden(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider { reason: reason.into() }
    }

    /// Map a non-success HTTP status onto the error taxonomy
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden(message),
            404 => Self::NotFound,
            _ => Self::Status { status, message },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(GatewayError::from_status(401, String::new()), GatewayError::Unauthorized);
        assert_eq!(GatewayError::from_status(404, String::new()), GatewayError::NotFound);
        assert_eq!(
            GatewayError::from_status(403, "rls".to_string()),
            GatewayError::Forbidden("rls".to_string())
        );
        assert_eq!(
            GatewayError::from_status(500, "boom".to_string()),
            GatewayError::Status { status: 500, message: "boom".to_string() }
        );
    }

    #[test]
    fn test_provider_message_is_the_reason() {
        assert_eq!(GatewayError::provider("Movie not found!").to_string(), "Movie not found!");
    }
}
