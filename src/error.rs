//! Errors raised while building loan terms and payment calendars.
//!
//! The amortization math itself never fails; these only come from the
//! checked constructors sitting in front of it.
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MortgageError {
    #[error("invalid input: {field} ({reason})")]
    InvalidInput { field: String, reason: String },
    #[error("{0} does not return a new payment date")]
    DateOutOfRange(String),
}

impl MortgageError {
    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        MortgageError::InvalidInput {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
