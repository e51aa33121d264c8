//! Error types for the billing core.

use serde_json::Value as Json;
use thiserror::Error;

/// Result type alias for billing-core operations.
pub type BillingResult<T> = Result<T, BillingError>;

/// Unified, closed error taxonomy for the billing core (spec §7).
///
/// Every variant carries a machine-readable `code`, a user-safe `hint`, and a bag of
/// reportable `details` — the sum-typed replacement for the teacher's fluent
/// `WithError(e).WithHint(...).Mark(kind)` builder (spec §9 REDESIGN FLAGS).
#[derive(Error, Debug, Clone)]
pub enum BillingError {
    #[error("validation failed: {hint}")]
    Validation {
        code: String,
        hint: String,
        details: Json,
    },

    #[error("not found: {hint}")]
    NotFound {
        code: String,
        hint: String,
        details: Json,
    },

    #[error("already exists: {hint}")]
    AlreadyExists {
        code: String,
        hint: String,
        details: Json,
    },

    /// A business-rule-forbidden state transition (e.g. re-terminating a terminated line
    /// item, voiding a finalized refund).
    #[error("operation not allowed: {hint}")]
    InvalidOperation {
        code: String,
        hint: String,
        details: Json,
    },

    #[error("unauthorized: {hint}")]
    Unauthorized {
        code: String,
        hint: String,
        details: Json,
    },

    #[error("database error: {hint}")]
    Database {
        code: String,
        hint: String,
        details: Json,
    },

    #[error("provider unavailable: {hint}")]
    ProviderUnavailable {
        code: String,
        hint: String,
        details: Json,
    },

    #[error("internal error: {hint}")]
    Internal {
        code: String,
        hint: String,
        details: Json,
    },
}

impl BillingError {
    pub fn validation(code: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Validation {
            code: code.into(),
            hint: hint.into(),
            details: Json::Null,
        }
    }

    pub fn not_found(code: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            hint: hint.into(),
            details: Json::Null,
        }
    }

    pub fn already_exists(code: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::AlreadyExists {
            code: code.into(),
            hint: hint.into(),
            details: Json::Null,
        }
    }

    pub fn invalid_operation(code: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidOperation {
            code: code.into(),
            hint: hint.into(),
            details: Json::Null,
        }
    }

    pub fn database(hint: impl Into<String>) -> Self {
        Self::Database {
            code: "database_error".to_string(),
            hint: hint.into(),
            details: Json::Null,
        }
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error".to_string(),
            hint: hint.into(),
            details: Json::Null,
        }
    }

    /// Attach a details bag, replacing any previous one.
    pub fn with_details(mut self, details: Json) -> Self {
        match &mut self {
            Self::Validation { details: d, .. }
            | Self::NotFound { details: d, .. }
            | Self::AlreadyExists { details: d, .. }
            | Self::InvalidOperation { details: d, .. }
            | Self::Unauthorized { details: d, .. }
            | Self::Database { details: d, .. }
            | Self::ProviderUnavailable { details: d, .. }
            | Self::Internal { details: d, .. } => *d = details,
        }
        self
    }

    /// The machine-readable code, regardless of variant.
    pub fn code(&self) -> &str {
        match self {
            Self::Validation { code, .. }
            | Self::NotFound { code, .. }
            | Self::AlreadyExists { code, .. }
            | Self::InvalidOperation { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::Database { code, .. }
            | Self::ProviderUnavailable { code, .. }
            | Self::Internal { code, .. } => code,
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                BillingError::not_found("row_not_found", "requested row does not exist")
            }
            other => BillingError::database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_accessor() {
        let err = BillingError::validation("bad_amount", "amount must be positive");
        assert_eq!(err.code(), "bad_amount");
    }

    #[test]
    fn test_with_details() {
        let err = BillingError::not_found("coupon_not_found", "no such coupon")
            .with_details(serde_json::json!({ "coupon_id": "abc" }));
        match err {
            BillingError::NotFound { details, .. } => {
                assert_eq!(details["coupon_id"], "abc");
            }
            _ => panic!("wrong variant"),
        }
    }
}
