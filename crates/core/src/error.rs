//! Domain error model.

use core::fmt::Display;

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failures raised by aggregates and read-side queries.
///
/// Authorization is decided before a command reaches an aggregate, and storage
/// failures belong to the infra crate, so neither appears here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input: empty names, negative amounts, bad dates.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request is well formed but the current state forbids it, e.g. posting
    /// into a closed year or issuing more ghee than the store holds.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Duplicate code or number, or an overlapping registration.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stock shortfall for one product.
    pub fn insufficient_stock(
        product: impl Display,
        available: impl Display,
        requested: impl Display,
    ) -> Self {
        Self::InvariantViolation(format!(
            "insufficient stock for product {product}: available {available}, requested {requested}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_message_names_both_quantities() {
        let err = DomainError::insufficient_stock("GHEE", "1.5", "2");
        assert_eq!(
            err.to_string(),
            "invariant violated: insufficient stock for product GHEE: available 1.5, requested 2"
        );
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
