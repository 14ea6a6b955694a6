//! Error types for the Yandex Cloud provider.

use thiserror::Error;

/// Errors that can occur while reconciling resources against the cloud API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Declared configuration is inconsistent or missing required fields.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Authentication material is missing or was rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The remote object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A name lookup matched more than one object.
    #[error("Ambiguous name: {0}")]
    AmbiguousName(String),

    /// The verb deadline expired.
    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    /// A server-side operation finished with an error status.
    #[error("Operation {operation_id} failed with code {code}: {message}")]
    OperationFailed {
        /// Identifier of the failed operation.
        operation_id: String,
        /// Server-reported status code.
        code: i32,
        /// Server-reported message.
        message: String,
    },

    /// A gRPC call failed with a status not covered by the other variants.
    #[error("Transport error ({code:?}): {message}")]
    Transport {
        /// The gRPC status code returned by the server or the channel.
        code: tonic::Code,
        /// The status message.
        message: String,
    },

    /// A channel to the cloud API could not be set up.
    #[error("Connection error: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// Declared values do not match the schema.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The server returned a payload that could not be interpreted.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A state value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// The gRPC status code behind this error, when there is one.
    pub fn code(&self) -> Option<tonic::Code> {
        match self {
            Self::NotFound(_) => Some(tonic::Code::NotFound),
            Self::Timeout(_) => Some(tonic::Code::DeadlineExceeded),
            Self::Transport { code, .. } => Some(*code),
            Self::OperationFailed { code, .. } => Some(tonic::Code::from(*code)),
            _ => None,
        }
    }

    /// Whether the remote object is reported as missing.
    ///
    /// Only a direct `NotFound` counts; a failed operation whose status code
    /// happens to be `NOT_FOUND` is still surfaced as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether retrying the same call cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Configuration(_))
    }
}

impl From<tonic::Status> for ProviderError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            tonic::Code::NotFound => Self::NotFound(message),
            tonic::Code::Unauthenticated | tonic::Code::PermissionDenied => Self::Auth(message),
            tonic::Code::DeadlineExceeded => Self::Timeout(message),
            code => Self::Transport { code, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("service account sa-1".to_string());
        assert_eq!(format!("{}", err), "Resource not found: service account sa-1");

        let err = ProviderError::AmbiguousName("cluster \"db\"".to_string());
        assert_eq!(format!("{}", err), "Ambiguous name: cluster \"db\"");

        let err = ProviderError::Timeout("operation op-1".to_string());
        assert_eq!(format!("{}", err), "Deadline exceeded: operation op-1");

        let err = ProviderError::OperationFailed {
            operation_id: "op-1".to_string(),
            code: 9,
            message: "folder is not active".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Operation op-1 failed with code 9: folder is not active"
        );
    }

    #[test]
    fn test_status_classification() {
        let err: ProviderError = tonic::Status::not_found("gone").into();
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some(tonic::Code::NotFound));

        let err: ProviderError = tonic::Status::unauthenticated("bad token").into();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(err.is_fatal());

        let err: ProviderError = tonic::Status::permission_denied("nope").into();
        assert!(matches!(err, ProviderError::Auth(_)));

        let err: ProviderError = tonic::Status::deadline_exceeded("slow").into();
        assert!(matches!(err, ProviderError::Timeout(_)));

        let err: ProviderError = tonic::Status::unavailable("down").into();
        assert_eq!(err.code(), Some(tonic::Code::Unavailable));
        assert!(!err.is_not_found());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_operation_failure_is_not_recovered_as_not_found() {
        let err = ProviderError::OperationFailed {
            operation_id: "op-2".to_string(),
            code: tonic::Code::NotFound as i32,
            message: "folder missing".to_string(),
        };
        assert_eq!(err.code(), Some(tonic::Code::NotFound));
        assert!(!err.is_not_found());
    }
}
