//! Fixed-rate mortgage calculations: the monthly payment, the month-by-month
//! amortization schedule, chart data, and an optional language-model advisor.
pub mod charts;
pub mod error;
pub mod loan;

#[cfg(feature = "advisor")]
pub mod advisor;

pub use error::MortgageError;
pub use loan::{monthly_payment, schedule, AmortizationResult, LoanTerms, Period};
