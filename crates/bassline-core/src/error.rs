//! Error types for Bassline.
//!
//! This module provides [`BasslineError`], the error type returned by
//! handlers, the dispatcher and the edit-session layer. Each variant belongs
//! to an [`ErrorCategory`] which fixes its HTTP status code, and every error
//! can be rendered as an [`ErrorEnvelope`] for the response body.
//!
//! Reservation conflicts are normally values, not errors; the
//! [`BasslineError::Conflict`] variant exists so the transport layer can
//! render them with the same envelope.

use bassline_router::RouterError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::UserId;

/// Result type alias using [`BasslineError`].
pub type BasslineResult<T> = Result<T, BasslineError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid input.
    Validation,
    /// Missing or invalid login.
    Authentication,
    /// Logged in, but lacking a capability.
    Authorization,
    /// No such route or resource.
    NotFound,
    /// Another session holds the resource.
    Conflict,
    /// The storage row could not be locked in time.
    Unavailable,
    /// Internal server errors, including routing loops.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard error type for Bassline.
///
/// # Example
///
/// ```
/// use bassline_core::{BasslineError, ErrorCategory};
///
/// fn validate_name(name: &str) -> Result<(), BasslineError> {
///     if name.is_empty() {
///         return Err(BasslineError::validation("name cannot be empty"));
///     }
///     Ok(())
/// }
///
/// let err = validate_name("").unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Validation);
/// ```
#[derive(Error, Debug)]
pub enum BasslineError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-specific validation errors.
        #[source]
        field_errors: Option<FieldErrors>,
    },

    /// The request carried no valid login.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The caller lacks a capability.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
        /// The capability that was required.
        capability: Option<String>,
    },

    /// Route or resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The type of resource that was not found.
        resource_type: Option<String>,
        /// The identifier of the resource.
        resource_id: Option<String>,
    },

    /// Another editing session holds the resource.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message naming the holder.
        message: String,
        /// The current holder, when known.
        holder_id: Option<UserId>,
        /// The holder's display name, or `unknown`.
        holder_name: String,
    },

    /// The storage row could not be locked.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Human-readable error message.
        message: String,
        /// Seconds the client should wait before retrying.
        retry_after_secs: u64,
    },

    /// A handler chain exceeded the delegation cap.
    #[error("Routing loop: exceeded {limit} delegations while routing '{path}'")]
    RoutingLoop {
        /// Full request path being routed.
        path: String,
        /// The delegation cap that was exceeded.
        limit: usize,
    },

    /// A handler indexed a path segment that does not exist.
    #[error(transparent)]
    IndexOutOfRange(#[from] RouterError),

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl BasslineError {
    /// Creates a validation error with a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Creates a validation error with field-specific errors.
    #[must_use]
    pub fn validation_with_fields(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error for a missing capability.
    #[must_use]
    pub fn missing_capability(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        Self::Authorization {
            message: format!("capability '{capability}' is required"),
            capability: Some(capability),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource_type: None,
            resource_id: None,
        }
    }

    /// Creates a not found error with resource context.
    #[must_use]
    pub fn not_found_resource(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        Self::NotFound {
            message: format!("{resource_type} with ID '{resource_id}' not found"),
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
        }
    }

    /// Creates a conflict error naming the current holder.
    #[must_use]
    pub fn conflict(
        message: impl Into<String>,
        holder_id: Option<UserId>,
        holder_name: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            message: message.into(),
            holder_id,
            holder_name: holder_name.into(),
        }
    }

    /// Creates a storage-unavailable error.
    #[must_use]
    pub fn storage_unavailable(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
            retry_after_secs,
        }
    }

    /// Creates a routing loop error.
    #[must_use]
    pub fn routing_loop(path: impl Into<String>, limit: usize) -> Self {
        Self::RoutingLoop {
            path: path.into(),
            limit,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::StorageUnavailable { .. } => ErrorCategory::Unavailable,
            Self::RoutingLoop { .. } | Self::IndexOutOfRange(_) | Self::Internal { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns the `Retry-After` value in seconds, if the client should retry.
    #[must_use]
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::StorageUnavailable {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// The envelope carries the bare message, without the category prefix
    /// of `Display`. Internal errors are rendered with a generic message;
    /// their source chain is for logs only.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let message = match self {
            _ if self.category() == ErrorCategory::Internal => "Internal server error".to_string(),
            Self::Validation { message, .. }
            | Self::Authentication { message }
            | Self::Authorization { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::StorageUnavailable { message, .. } => message.clone(),
            _ => self.to_string(),
        };

        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
                category: self.category(),
                details: self.error_details(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_DENIED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            Self::RoutingLoop { .. } => "ROUTING_LOOP",
            Self::IndexOutOfRange(_) | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation {
                field_errors: Some(errors),
                ..
            } => serde_json::to_value(errors).ok(),
            Self::Authorization {
                capability: Some(capability),
                ..
            } => Some(serde_json::json!({ "capability": capability })),
            Self::NotFound {
                resource_type: Some(rt),
                resource_id: Some(rid),
                ..
            } => Some(serde_json::json!({
                "resource_type": rt,
                "resource_id": rid
            })),
            Self::Conflict {
                holder_id,
                holder_name,
                ..
            } => Some(serde_json::json!({
                "holder_id": holder_id,
                "holder_name": holder_name
            })),
            Self::StorageUnavailable {
                retry_after_secs, ..
            } => Some(serde_json::json!({
                "retry_after_seconds": retry_after_secs
            })),
            _ => None,
        }
    }
}

/// Field-specific validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Error)]
#[error("Field validation errors")]
pub struct FieldErrors {
    /// Map of field name to list of error messages.
    pub fields: HashMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates a new empty `FieldErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if there are no field errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Converts to `Err` when any field failed.
    pub fn into_result(self, message: impl Into<String>) -> BasslineResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BasslineError::validation_with_fields(message, self))
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_with_fields() {
        let mut field_errors = FieldErrors::new();
        field_errors.add("name", "must be alphanumeric");
        field_errors.add("name", "must not be empty");

        let error = BasslineError::validation_with_fields("invalid theme", field_errors);
        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let envelope = error.to_envelope(Some("req-123"));
        let details = envelope.error.details.unwrap();
        assert_eq!(details["fields"]["name"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_capability() {
        let error = BasslineError::missing_capability("edit_themes");
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        let envelope = error.to_envelope(None);
        assert_eq!(envelope.error.details.unwrap()["capability"], "edit_themes");
    }

    #[test]
    fn test_conflict_envelope_names_holder() {
        let error = BasslineError::conflict("theme is being edited by 'alice'", Some(1), "alice");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);

        let json = serde_json::to_value(error.to_envelope(Some("req-1"))).unwrap();
        assert_eq!(json["error"]["code"], "CONFLICT");
        assert_eq!(json["error"]["message"], "theme is being edited by 'alice'");
        assert_eq!(json["error"]["category"], "conflict");
        assert_eq!(json["error"]["details"]["holder_id"], 1);
        assert_eq!(json["error"]["details"]["holder_name"], "alice");
        assert_eq!(json["request_id"], "req-1");
    }

    #[test]
    fn test_storage_unavailable_retry_after() {
        let error = BasslineError::storage_unavailable("theme is locked", 5);
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.retry_after(), Some(5));
        assert_eq!(BasslineError::not_found("x").retry_after(), None);
    }

    #[test]
    fn test_routing_loop_is_internal() {
        let error = BasslineError::routing_loop("/a/b", 10);
        assert_eq!(error.category(), ErrorCategory::Internal);
        assert!(error.to_string().contains("/a/b"));

        let envelope = error.to_envelope(None);
        assert_eq!(envelope.error.code, "ROUTING_LOOP");
        assert_eq!(envelope.error.message, "Internal server error");
    }

    #[test]
    fn test_index_out_of_range_from_router_error() {
        let error: BasslineError = RouterError::IndexOutOfRange { index: 5, count: 2 }.into();
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.to_string().contains("out of range"));
    }

    #[test]
    fn test_internal_with_source_hides_details() {
        let error = BasslineError::internal_with_source("store failed", anyhow::anyhow!("disk full"));
        assert!(std::error::Error::source(&error).is_some());
        let json = serde_json::to_string(&error.to_envelope(None)).unwrap();
        assert!(!json.contains("disk full"));
    }

    #[test]
    fn test_not_found_resource() {
        let error = BasslineError::not_found_resource("theme", "7");
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert!(error.to_string().contains("'7'"));
    }

    #[test]
    fn test_field_errors_into_result() {
        assert!(FieldErrors::new().into_result("bad").is_ok());

        let mut errors = FieldErrors::new();
        errors.add("username", "too long");
        assert_eq!(errors.len(), 1);
        assert!(errors.into_result("bad").is_err());
    }

    #[test]
    fn test_all_error_categories_have_error_status_codes() {
        let categories = [
            ErrorCategory::Validation,
            ErrorCategory::Authentication,
            ErrorCategory::Authorization,
            ErrorCategory::NotFound,
            ErrorCategory::Conflict,
            ErrorCategory::Unavailable,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "Category {:?} should map to error status code, got {}",
                category,
                status
            );
        }
    }
}
