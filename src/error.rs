use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced by the VitaTwin access layer.
///
/// Classification happens exactly once, at the access boundary. Callers match on
/// [`ApiError::kind`] (or the variants directly) and must not reclassify an
/// `Unauthorized` or `ConsentRequired` into something else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The session is invalid or expired. The token store has already been
    /// cleared and the session-invalidated event emitted.
    #[error("Unauthorized")]
    Unauthorized,

    /// The session is valid but the user has not granted the scopes the
    /// server requires. Recoverable: retry once after a successful grant.
    #[error("{message}")]
    ConsentRequired {
        message: String,
        required_scopes: Vec<String>,
    },

    /// A non-2xx response that a feature client decided to surface.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
    },

    #[error("Network request failed: {reason}")]
    Network {
        reason: String,
    },

    #[error("Failed to decode response: {reason}")]
    Decode {
        reason: String,
    },

    #[error("Invalid configuration value for '{key}': {reason}")]
    Config {
        key: String,
        reason: String,
    },

    #[error("{0}")]
    Validation(String),

    /// A pending retry was invoked after it had already run.
    #[error("Retry callback has already been used")]
    RetryAlreadyUsed,
}

/// Coarse discriminant callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Session invalid; forces full re-authentication
    Unauthorized,
    /// Missing consent; retryable after a grant
    ConsentRequired,
    /// Everything else; handled locally by the caller
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorKind::ConsentRequired => write!(f, "CONSENT_REQUIRED"),
            ErrorKind::Other => write!(f, "OTHER"),
        }
    }
}

/// Status reported for every consent escalation, whatever the transport said.
pub const CONSENT_REQUIRED_STATUS: u16 = 403;

impl ApiError {
    /// Get the classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::ConsentRequired { .. } => ErrorKind::ConsentRequired,
            _ => ErrorKind::Other,
        }
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::ConsentRequired { .. } => Some(CONSENT_REQUIRED_STATUS),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Scopes carried by a consent escalation
    pub fn required_scopes(&self) -> Option<&[String]> {
        match self {
            ApiError::ConsentRequired {
                required_scopes, ..
            } => Some(required_scopes),
            _ => None,
        }
    }

    /// Whether the operation can succeed after the user grants consent
    pub fn is_consent_recoverable(&self) -> bool {
        self.kind() == ErrorKind::ConsentRequired
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        errors::decode(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Constructors for the error variants that carry context
pub mod errors {
    use super::*;

    /// Create a consent escalation error
    pub fn consent_required(
        message: impl Into<String>,
        required_scopes: Vec<String>,
    ) -> ApiError {
        ApiError::ConsentRequired {
            message: message.into(),
            required_scopes,
        }
    }

    /// Create an HTTP failure error
    pub fn http_failure(status: u16, message: impl Into<String>) -> ApiError {
        ApiError::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a network error from a transport failure
    pub fn network(reason: impl fmt::Display) -> ApiError {
        ApiError::Network {
            reason: reason.to_string(),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl fmt::Display) -> ApiError {
        ApiError::Decode {
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config_invalid(key: impl Into<String>, reason: impl Into<String>) -> ApiError {
        ApiError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_discriminates_variants() {
        assert_eq!(ApiError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            errors::consent_required("Consent required", vec![]).kind(),
            ErrorKind::ConsentRequired
        );
        assert_eq!(errors::http_failure(500, "boom").kind(), ErrorKind::Other);
        assert_eq!(errors::network("refused").kind(), ErrorKind::Other);
        assert_eq!(ApiError::RetryAlreadyUsed.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_consent_required_reports_fixed_status() {
        let err = errors::consent_required("Please grant consent", vec!["sleep_data".into()]);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "Please grant consent");
        assert_eq!(err.required_scopes(), Some(&["sleep_data".to_string()][..]));
        assert!(err.is_consent_recoverable());
        assert!(!ApiError::Unauthorized.is_consent_recoverable());
    }
}
