//! Error taxonomy for model services
//!
//! Request-time failures are [`ApiError`]s: a closed [`ErrorKind`] plus the
//! model context of the service that produced it. Construction-time failures
//! are [`DefinitionError`]s and are expected to abort startup.

use std::fmt;

use actix_web::http::StatusCode;

use crate::envelope::ModelContext;

/// Message returned to callers when a computation fails unexpectedly.
pub const COMPUTATION_FAILED_MESSAGE: &str = "Could not serve model results successfully.";

/// Request-time failure kinds
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("{message}")]
    MalformedPayload { message: String },

    #[error("{message}")]
    SchemaValidationFailed { message: String },

    #[error("request payload is missing the following fields: {}", .fields.join(", "))]
    MissingRequiredFields { fields: Vec<String> },

    #[error("request payload had null values in the following fields: {}", .fields.join(", "))]
    NullValuesPresent { fields: Vec<String> },

    #[error("{message}")]
    UserCheckFailed { message: String },

    #[error("{}", COMPUTATION_FAILED_MESSAGE)]
    ComputationFailed,

    #[error("The requested URL {path} was not found on the server.")]
    NotFound { path: String },

    #[error("The method {method} is not allowed for the requested URL.")]
    MethodNotAllowed { method: String },
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            ErrorKind::SchemaValidationFailed { .. }
            | ErrorKind::MissingRequiredFields { .. }
            | ErrorKind::NullValuesPresent { .. }
            | ErrorKind::UserCheckFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ComputationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::NotFound { .. } => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Name reported under `error.name` in error envelopes.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::MalformedPayload { .. } => "MalformedPayload",
            ErrorKind::SchemaValidationFailed { .. } => "SchemaValidationFailed",
            ErrorKind::MissingRequiredFields { .. } => "MissingRequiredFields",
            ErrorKind::NullValuesPresent { .. } => "NullValuesPresent",
            ErrorKind::UserCheckFailed { .. } => "UserCheckFailed",
            ErrorKind::ComputationFailed => "ComputationFailed",
            ErrorKind::NotFound { .. } => "NotFound",
            ErrorKind::MethodNotAllowed { .. } => "MethodNotAllowed",
        }
    }
}

/// A request-time error, optionally tagged with the service that raised it.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    model_context: Option<ModelContext>,
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            model_context: None,
            source: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPayload {
            message: message.into(),
        })
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaValidationFailed {
            message: message.into(),
        })
    }

    pub fn missing_fields(fields: Vec<String>) -> Self {
        Self::new(ErrorKind::MissingRequiredFields { fields })
    }

    pub fn null_values(fields: Vec<String>) -> Self {
        Self::new(ErrorKind::NullValuesPresent { fields })
    }

    pub fn user_check(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserCheckFailed {
            message: message.into(),
        })
    }

    /// Wrap an unexpected failure. The cause is kept for logging and the
    /// opt-in traceback, never for the caller-facing message.
    pub fn computation(cause: impl Into<anyhow::Error>) -> Self {
        Self {
            kind: ErrorKind::ComputationFailed,
            model_context: None,
            source: Some(cause.into()),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound { path: path.into() })
    }

    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed {
            method: method.into(),
        })
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    pub fn model_context(&self) -> Option<&ModelContext> {
        self.model_context.as_ref()
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    /// Attach the originating service. An existing context is kept.
    pub fn with_model_context(mut self, context: ModelContext) -> Self {
        if self.model_context.is_none() {
            self.model_context = Some(context);
        }
        self
    }

    /// Messages safe to return to the caller.
    pub fn messages(&self) -> Vec<String> {
        vec![self.kind.to_string()]
    }

    /// Full diagnostic chain of the underlying cause, if any.
    pub fn traceback(&self) -> Option<String> {
        self.source.as_ref().map(|e| format!("{:?}", e))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.kind)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| {
            let err: &(dyn std::error::Error + 'static) = e.as_ref();
            err
        })
    }
}

impl From<ErrorKind> for ApiError {
    fn from(kind: ErrorKind) -> Self {
        ApiError::new(kind)
    }
}

/// Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors in a service or schema definition, raised at construction time
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error(
        "The id={id} has already been used. This likely means that you tried to instantiate a service with parameters that were already used."
    )]
    DuplicateIdentifier { id: String },

    #[error("`meta` is invalid: {reason}")]
    InvalidMeta { reason: String },

    #[error("Invalid schema definition: {reason}")]
    InvalidSchema { reason: String },

    #[error("Schema reference '{name}' is never defined")]
    UnresolvedReference { name: String },

    #[error("Schema reference '{name}' is defined more than once with different bodies")]
    ConflictingReference { name: String },
}

/// Result type for service and schema construction
pub type DefinitionResult<T> = Result<T, DefinitionError>;

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::malformed("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::schema("x").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::missing_fields(vec!["a".into()]).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::null_values(vec!["a".into()]).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::user_check("x").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::computation(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::not_found("/x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::method_not_allowed("PUT").status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_missing_fields_message_names_each_field() {
        let error = ApiError::missing_fields(vec!["one".into(), "two".into()]);
        assert_eq!(
            error.messages(),
            vec!["request payload is missing the following fields: one, two".to_string()]
        );
    }

    #[test]
    fn test_computation_failure_hides_cause() {
        let error = ApiError::computation(anyhow::anyhow!("secret internal state"));
        assert_eq!(error.messages(), vec![COMPUTATION_FAILED_MESSAGE.to_string()]);
        assert!(error.source().is_some());
        assert!(error.traceback().unwrap().contains("secret internal state"));
    }

    #[test]
    fn test_model_context_is_attached_once() {
        let first = ModelContext::new("a", "1", Default::default());
        let second = ModelContext::new("b", "2", Default::default());
        let error = ApiError::user_check("nope")
            .with_model_context(first)
            .with_model_context(second);
        assert_eq!(error.model_context().unwrap().model_name, "a");
    }

    #[test]
    fn test_duplicate_identifier_display() {
        let error = DefinitionError::DuplicateIdentifier {
            id: "/m/v1/prediction".to_string(),
        };
        assert!(error.to_string().starts_with("The id=/m/v1/prediction has already been used"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
        assert_send_sync::<DefinitionError>();
    }
}
