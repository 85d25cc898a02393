//! Error taxonomy shared by every engine component.
//!
//! [`EngineError`] is the closed set of failures the resource engine can
//! produce. Each value carries a human message (its `Display`), a stable
//! machine code via [`ErrorKind::code`], and a remediation hint via
//! [`EngineError::hint`]. Protocol layers map [`ErrorKind`] to their own
//! wire-level status without matching on the variants directly.

use std::fmt;

use serde::Serialize;

/// Protocol-agnostic classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ValidationError,
    PayloadTooLarge,
    CapacityExceeded,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Every failure the engine reports to its callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A resource, item, or operation does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    /// An item with the same ID already exists in the resource.
    #[error("item '{id}' already exists in resource '{resource}'")]
    Conflict { resource: String, id: String },

    /// The request payload or an expression is invalid.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// A resource or operation definition is malformed.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The request payload exceeds the configured limit.
    #[error("payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The resource already holds `max_items` items.
    #[error("resource '{resource}' is at capacity ({max_items} items)")]
    CapacityExceeded { resource: String, max_items: usize },

    /// Unexpected engine failure.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// A custom operation step failed. `rollback` holds the description of
    /// any failure encountered while undoing earlier steps.
    #[error("step {index} ({step_type}) failed: {source}{}", rollback_suffix(.rollback.as_deref()))]
    Step {
        index: usize,
        step_type: &'static str,
        source: Box<EngineError>,
        rollback: Option<String>,
    },
}

fn rollback_suffix(rollback: Option<&str>) -> String {
    rollback.map_or_else(String::new, |r| format!("; rollback failed: {r}"))
}

impl EngineError {
    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for [`EngineError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`EngineError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Shorthand for [`EngineError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classification of this error. Step failures report the kind of the
    /// underlying cause.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation { .. } | Self::InvalidConfig { .. } => ErrorKind::ValidationError,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Step { source, .. } => source.kind(),
        }
    }

    /// Machine-readable code. `InvalidConfig` gets its own code even though
    /// it shares the validation kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Step { source, .. } => source.code(),
            other => other.kind().code(),
        }
    }

    /// Remediation hint shown alongside the message.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "check the resource name and item ID, or list the resource to see what exists",
            Self::Conflict { .. } => "use a different ID or update the existing item instead",
            Self::Validation { .. } => "fix the request payload or expression and retry",
            Self::InvalidConfig { .. } => "correct the resource or operation definition in the configuration",
            Self::PayloadTooLarge { .. } => "send a smaller payload or raise the configured payload limit",
            Self::CapacityExceeded { .. } => "delete items, reset the resource, or raise maxItems",
            Self::Internal { .. } => "retry the request; if it persists, inspect the server logs",
            Self::Step { source, .. } => source.hint(),
        }
    }

    /// The innermost cause, unwrapping any step context.
    #[must_use]
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_codes() {
        assert_eq!(EngineError::not_found("item", "x").kind(), ErrorKind::NotFound);
        assert_eq!(EngineError::invalid_config("bad").kind(), ErrorKind::ValidationError);
        assert_eq!(EngineError::invalid_config("bad").code(), "INVALID_CONFIG");
        assert_eq!(EngineError::validation("bad").code(), "VALIDATION_ERROR");
        assert_eq!(
            EngineError::CapacityExceeded { resource: "r".into(), max_items: 2 }.code(),
            "CAPACITY_EXCEEDED"
        );
    }

    #[test]
    fn step_error_preserves_cause_and_appends_rollback() {
        let err = EngineError::Step {
            index: 1,
            step_type: "update",
            source: Box::new(EngineError::not_found("item in 'accounts'", "acc-9")),
            rollback: Some("resource 'logs' not found".into()),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "step 1 (update) failed: item in 'accounts' 'acc-9' not found; rollback failed: resource 'logs' not found"
        );
        assert!(matches!(err.root_cause(), EngineError::NotFound { .. }));
    }

    #[test]
    fn step_error_without_rollback_has_no_suffix() {
        let err = EngineError::Step {
            index: 0,
            step_type: "read",
            source: Box::new(EngineError::validation("boom")),
            rollback: None,
        };
        assert_eq!(err.to_string(), "step 0 (read) failed: validation failed: boom");
    }
}
