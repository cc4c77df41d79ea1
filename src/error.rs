use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Setting or environment variable that caused the error (e.g. "base_url", "SPACETRACK_CA_BUNDLE")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g. the rejected value)
    pub details: Option<String>,
    /// Source of the error (e.g. "builder", "rate_limiter")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the Space-Track client.
///
/// Resolution and validation errors are raised before any request is sent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown request controller '{controller}'")]
    UnknownController { controller: String },

    #[error("Unknown request class '{class}' for controller '{controller}'")]
    UnknownRequestClass { class: String, controller: String },

    #[error("Unknown request class '{class}'")]
    AmbiguousOrUnknownRequestClass { class: String },

    #[error("'{class}' got an unexpected argument '{predicate}'")]
    UnexpectedPredicate { class: String, predicate: String },

    #[error("'{class}' is missing required argument '{predicate}'")]
    MissingPredicate { class: String, predicate: String },

    #[error("Invalid request options: {0}")]
    InvalidOptions(String),

    #[error("Predicate schema for {controller}/{class} is unavailable: {source}")]
    SchemaUnavailable {
        controller: String,
        class: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Space-Track request failed: HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Cannot iterate lines of binary data: {0}")]
    BinaryStream(String),

    #[error("Space-Track authentication failed for '{identity}'")]
    Authentication { identity: String },

    #[error("Could not parse field '{field}' value {value:?}: {message}")]
    TypeParse {
        field: String,
        value: String,
        message: String,
    },

    #[error("Predicate '{predicate}' has unsupported type '{type_name}'")]
    UnsupportedPredicateType { predicate: String, type_name: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub(crate) fn schema_unavailable(controller: &str, class: &str, source: Error) -> Self {
        Error::SchemaUnavailable {
            controller: controller.to_string(),
            class: class.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::SchemaUnavailable { .. } | Error::Transport(_) | Error::Io(_) => true,
            Error::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// True for errors raised before anything was sent to Space-Track.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnknownController { .. }
                | Error::UnknownRequestClass { .. }
                | Error::AmbiguousOrUnknownRequestClass { .. }
                | Error::UnexpectedPredicate { .. }
                | Error::MissingPredicate { .. }
                | Error::InvalidOptions(_)
        )
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_formats_context() {
        let err = Error::configuration_with_context(
            "invalid base URL",
            ErrorContext::new()
                .with_field_path("base_url")
                .with_source("builder"),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: invalid base URL (field: base_url, source: builder)"
        );
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("base_url")
        );
    }

    #[test]
    fn unexpected_predicate_names_key() {
        let err = Error::UnexpectedPredicate {
            class: "gp".into(),
            predicate: "banana".into(),
        };
        assert_eq!(err.to_string(), "'gp' got an unexpected argument 'banana'");
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn schema_unavailable_is_retryable() {
        let err = Error::schema_unavailable(
            "basicspacedata",
            "gp",
            Error::RequestFailed {
                status: 503,
                message: "maintenance".into(),
            },
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("basicspacedata/gp"));
    }
}
