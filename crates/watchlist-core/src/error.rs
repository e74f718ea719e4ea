use thiserror::Error;
use watchlist_sources::GatewayError;

/// Input rejected before any network call is made
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("comment cannot be empty")]
    EmptyComment,
    #[error("{title} ({external_id}) is already in your watched list")]
    Duplicate { external_id: String, title: String },
    #[error("a comment is already being posted")]
    PostInFlight,
    #[error("no movie is selected")]
    NoSelection,
    #[error("rate the movie before adding it")]
    NoRating,
    #[error("rating must be between 1 and 10, got {0}")]
    RatingOutOfRange(u8),
}

/// Error surfaced by the controllers to the presentation layer
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Transport(String),
    /// The metadata provider reported a failure, e.g. "Movie not found!"
    #[error("{reason}")]
    Provider { reason: String },
    #[error("not permitted: {0}")]
    Authorization(String),
    #[error("you are signed out")]
    SignedOut,
}

impl SyncError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(message) => SyncError::Transport(message),
            GatewayError::Status { status, message } => {
                SyncError::Transport(format!("status {}: {}", status, message))
            }
            GatewayError::Provider { reason } => SyncError::Provider { reason },
            GatewayError::NotFound => SyncError::Transport("resource not found".to_string()),
            GatewayError::Unauthorized => SyncError::SignedOut,
            GatewayError::Forbidden(message) => SyncError::Authorization(message),
            GatewayError::Decode(message) => {
                SyncError::Transport(format!("unexpected response: {}", message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_map_onto_sync_errors() {
        assert_eq!(
            SyncError::from(GatewayError::provider("Movie not found!")),
            SyncError::Provider { reason: "Movie not found!".to_string() }
        );
        assert_eq!(SyncError::from(GatewayError::Unauthorized), SyncError::SignedOut);
        assert!(matches!(
            SyncError::from(GatewayError::Forbidden("rls".to_string())),
            SyncError::Authorization(_)
        ));
        assert!(matches!(
            SyncError::from(GatewayError::Status { status: 500, message: "boom".to_string() }),
            SyncError::Transport(m) if m.contains("500")
        ));
    }

    #[test]
    fn test_validation_message_names_the_movie() {
        let err = SyncError::from(ValidationError::Duplicate {
            external_id: "tt0110912".to_string(),
            title: "Pulp Fiction".to_string(),
        });
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Pulp Fiction (tt0110912) is already in your watched list");
    }
}
