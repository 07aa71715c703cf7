use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TriggerError>;

/// Errors surfaced to the host from trigger operations.
///
/// `Config` failures happen before any network call and are shown to the
/// user as-is. `Api` carries the PagerDuty status so callers can tell a
/// vanished subscription (404) apart from a real failure.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("request to PagerDuty failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PagerDuty API error: {status} - {body}")]
    Api { status: StatusCode, body: String },

    #[error("PagerDuty webhook subscription response did not contain the expected data")]
    UnexpectedResponse,
}

impl TriggerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True when the remote resource no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_only_matches_404() {
        let missing = TriggerError::Api {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert!(missing.is_not_found());

        let server = TriggerError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".into(),
        };
        assert!(!server.is_not_found());
        assert!(!TriggerError::UnexpectedResponse.is_not_found());
    }

    #[test]
    fn config_error_message_is_user_facing() {
        let error = TriggerError::config("the delivery URL cannot point at localhost");
        assert_eq!(
            error.to_string(),
            "configuration error: the delivery URL cannot point at localhost"
        );
    }
}
