use chrono::{Months, NaiveDate};
use log::{debug, trace};
use std::fmt;

use crate::error::MortgageError;

/// Months in a year; every rate and term in this module is converted to monthly periods.
pub const PERIODS_PER_YEAR: u32 = 12;

/// Upper bound on the periods reserved up front; longer schedules grow on demand.
const PREALLOC_PERIODS: u32 = 600;

/// The inputs of one fixed-rate loan, checked once and immutable afterwards.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoanTerms {
    principal: f64,
    annual_rate_percent: f64,
    term_years: u32,
}

impl LoanTerms {
    /// Builds loan terms, rejecting a principal that is not positive, a negative
    /// rate, or a term of zero years or too many months to count.
    pub fn new(
        principal: f64,
        annual_rate_percent: f64,
        term_years: u32,
    ) -> Result<Self, MortgageError> {
        if !principal.is_finite() || principal <= 0. {
            return Err(MortgageError::invalid(
                "principal",
                "loan amount must be greater than zero",
            ));
        }
        if !annual_rate_percent.is_finite() || annual_rate_percent < 0. {
            return Err(MortgageError::invalid(
                "annual_rate_percent",
                "interest rate cannot be negative",
            ));
        }
        if term_years == 0 {
            return Err(MortgageError::invalid(
                "term_years",
                "loan term must be at least one year",
            ));
        }
        if term_years.checked_mul(PERIODS_PER_YEAR).is_none() {
            return Err(MortgageError::invalid(
                "term_years",
                "loan term has too many monthly periods",
            ));
        }
        Ok(Self {
            principal,
            annual_rate_percent,
            term_years,
        })
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }

    pub fn annual_rate_percent(&self) -> f64 {
        self.annual_rate_percent
    }

    pub fn term_years(&self) -> u32 {
        self.term_years
    }

    pub fn monthly_rate(&self) -> f64 {
        monthly_rate(self.annual_rate_percent)
    }

    pub fn total_periods(&self) -> u32 {
        self.term_years * PERIODS_PER_YEAR
    }

    /// Schedule at the payment that retires the loan exactly at term end.
    pub fn amortize(&self) -> AmortizationResult {
        let payment = monthly_payment(self.principal, self.annual_rate_percent, self.term_years);
        debug!(
            "principal {}, rate {}%, {} years -> payment {:.2}",
            self.principal, self.annual_rate_percent, self.term_years, payment
        );
        self.build(payment)
    }

    /// Schedule at a caller-chosen payment, e.g. to see the effect of paying extra.
    pub fn amortize_with(&self, payment: f64) -> Result<AmortizationResult, MortgageError> {
        if !payment.is_finite() || payment <= 0. {
            return Err(MortgageError::invalid(
                "payment",
                "payment must be greater than zero",
            ));
        }
        Ok(self.build(payment))
    }

    fn build(&self, payment: f64) -> AmortizationResult {
        AmortizationResult {
            principal: self.principal,
            payment,
            periods: schedule(
                self.principal,
                self.annual_rate_percent,
                self.term_years,
                payment,
            ),
        }
    }
}

/// One month of the schedule. `remaining_balance` is the balance after this
/// month's payment and may dip slightly below zero on the final period.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Period {
    pub index: u32,
    pub remaining_balance: f64,
    pub principal_portion: f64,
    pub interest_portion: f64,
}

impl Period {
    pub fn new(
        index: u32,
        remaining_balance: f64,
        principal_portion: f64,
        interest_portion: f64,
    ) -> Self {
        Self {
            index,
            remaining_balance,
            principal_portion,
            interest_portion,
        }
    }

    pub fn payment(&self) -> f64 {
        self.principal_portion + self.interest_portion
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pmt number {}, payment ${:.2}, principal paid ${:.2}, interest paid ${:.2}, ending balance ${:.2}",
            self.index,
            self.payment(),
            self.principal_portion,
            self.interest_portion,
            self.remaining_balance
        )
    }
}

/// A computed schedule together with the payment that produced it.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AmortizationResult {
    principal: f64,
    payment: f64,
    periods: Vec<Period>,
}

impl AmortizationResult {
    pub fn payment(&self) -> f64 {
        self.payment
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn total_interest(&self) -> f64 {
        self.periods.iter().map(|p| p.interest_portion).sum()
    }

    pub fn total_principal(&self) -> f64 {
        self.periods.iter().map(|p| p.principal_portion).sum()
    }

    pub fn total_paid(&self) -> f64 {
        self.total_interest() + self.total_principal()
    }

    /// Balance after the last emitted period, unclamped.
    pub fn final_balance(&self) -> f64 {
        self.periods
            .last()
            .map_or(self.principal, |p| p.remaining_balance)
    }

    pub fn is_paid_off(&self) -> bool {
        self.final_balance() <= 0.
    }

    /// True when the payment never got ahead of the interest.
    pub fn is_negatively_amortizing(&self) -> bool {
        !self.periods.is_empty() && self.final_balance() >= self.principal
    }
}

pub fn monthly_rate(annual_rate_percent: f64) -> f64 {
    annual_rate_percent / PERIODS_PER_YEAR as f64 / 100.
}

/// Fixed monthly payment that retires `principal` over `years` at `annual_rate_percent`.
///
/// Preconditions (not checked): `principal > 0`, `annual_rate_percent >= 0`,
/// `years > 0`. Use [`LoanTerms::new`] for checked inputs.
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, years: u32) -> f64 {
    let rate = monthly_rate(annual_rate_percent);
    let total_pmts = years.saturating_mul(PERIODS_PER_YEAR) as f64;

    // the annuity formula divides by zero at 0%, so repay in equal slices
    if rate == 0. {
        return principal / total_pmts;
    }

    // discount form of the annuity: tends to principal * rate where (1 + r)^n overflows
    principal * rate / (1. - (1. + rate).powf(-total_pmts))
}

/// Month-by-month split of `payment` into interest and principal.
///
/// Runs for at most `years * 12` periods and stops after the first period whose
/// ending balance is zero or below. A payment that does not cover the interest is
/// not an error: the balance grows and the schedule runs the full term.
pub fn schedule(
    principal: f64,
    annual_rate_percent: f64,
    years: u32,
    payment: f64,
) -> Vec<Period> {
    let rate = monthly_rate(annual_rate_percent);
    let total_pmts = years.saturating_mul(PERIODS_PER_YEAR);

    let mut periods = Vec::with_capacity(total_pmts.min(PREALLOC_PERIODS) as usize);
    let mut balance = principal;

    for index in 1..=total_pmts {
        let interest = balance * rate;
        let principal_portion = payment - interest;
        balance -= principal_portion;
        trace!(
            "pmt # {}, interest {}, principal {}, end bal {}",
            index,
            interest,
            principal_portion,
            balance
        );

        periods.push(Period::new(index, balance, principal_portion, interest));
        if balance <= 0. {
            break;
        }
    }
    periods
}

/// Monthly due dates starting at `first_payment`. Each date is offset from the
/// first one, so a loan due on the 31st falls back to month end and returns to
/// the 31st when the month allows it.
pub fn payment_dates(
    first_payment: NaiveDate,
    count: usize,
) -> Result<Vec<NaiveDate>, MortgageError> {
    (0..count)
        .map(|offset| {
            u32::try_from(offset)
                .ok()
                .and_then(|months| first_payment.checked_add_months(Months::new(months)))
                .ok_or_else(|| MortgageError::DateOutOfRange(first_payment.to_string()))
        })
        .collect()
}

pub fn round(amt: f64, places: i32) -> f64 {
    if amt == 0. {
        0.
    } else {
        (amt * 10_f64.powi(places)).round() / 10_f64.powi(places)
    }
}

#[cfg(test)]
mod tests {
    use super::{monthly_payment, payment_dates, round, schedule, LoanTerms, Period};
    use crate::error::MortgageError;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use chrono::NaiveDate;
    use test_log::test;

    #[test]
    fn zero_rate_payment_is_linear() {
        assert_eq!(monthly_payment(120000., 0., 10), 1000.);
        assert_relative_eq!(monthly_payment(250000., 0., 30), 250000. / 360.);
    }

    #[test]
    fn zero_rate_schedule_pays_off_at_term_end() {
        let periods = schedule(120000., 0., 10, 1000.);

        assert_eq!(periods.len(), 120);
        assert!(periods.iter().all(|p| p.interest_portion == 0.));
        assert_eq!(periods.last().unwrap().remaining_balance, 0.);
    }

    #[test]
    fn standard_thirty_year_loan() {
        let payment = monthly_payment(400000., 6.5, 30);
        assert_eq!(round(payment, 2), 2528.27);

        let periods = schedule(400000., 6.5, 30, payment);
        assert_eq!(periods.len(), 360);

        let interest: f64 = periods.iter().map(|p| p.interest_portion).sum();
        let principal: f64 = periods.iter().map(|p| p.principal_portion).sum();
        assert_relative_eq!(interest + principal, 360. * payment, max_relative = 1e-9);
        assert_abs_diff_eq!(principal, 400000., epsilon = 1e-4);

        let first = periods[0];
        assert_eq!(first.index, 1);
        assert_abs_diff_eq!(first.interest_portion, 400000. * 6.5 / 1200., epsilon = 1e-9);
    }

    #[test]
    fn computed_payment_fully_amortizes() {
        for &principal in &[1000., 85000., 400000., 2500000.] {
            for &rate in &[0.25, 3., 6.5, 12., 24.] {
                for &years in &[1, 15, 20, 30, 40] {
                    let payment = monthly_payment(principal, rate, years);
                    let periods = schedule(principal, rate, years, payment);

                    assert_eq!(periods.len(), (years * 12) as usize);
                    let last = periods.last().unwrap().remaining_balance;
                    assert!(
                        (last / principal).abs() < 1e-6,
                        "{principal} at {rate}% for {years}y left {last}"
                    );
                }
            }
        }
    }

    #[test]
    fn every_period_splits_the_payment() {
        let payment = monthly_payment(325000., 7.25, 20);
        let mut previous = 325000.;

        for period in schedule(325000., 7.25, 20, payment) {
            assert_relative_eq!(period.payment(), payment, max_relative = 1e-12);
            assert_relative_eq!(
                period.interest_portion,
                previous * 7.25 / 1200.,
                max_relative = 1e-12
            );
            previous = period.remaining_balance;
        }
    }

    #[test]
    fn balance_strictly_decreases_when_payment_covers_interest() {
        let payment = monthly_payment(180000., 4.75, 15);
        let periods = schedule(180000., 4.75, 15, payment);

        for pair in periods.windows(2) {
            assert!(pair[1].remaining_balance < pair[0].remaining_balance);
        }
    }

    #[test]
    fn underpayment_runs_full_term_without_payoff() {
        // 6% on 100000 accrues 500 a month
        let periods = schedule(100000., 6., 1, 400.);

        assert_eq!(periods.len(), 12);
        assert!(periods.last().unwrap().remaining_balance >= 100000.);
        for pair in periods.windows(2) {
            assert!(pair[1].remaining_balance > pair[0].remaining_balance);
        }
    }

    #[test]
    fn overpayment_stops_early() {
        let periods = schedule(10000., 5., 30, 500.);

        assert!(periods.len() < 360);
        assert!(periods.last().unwrap().remaining_balance <= 0.);
        assert!(periods[..periods.len() - 1]
            .iter()
            .all(|p| p.remaining_balance > 0.));
    }

    #[test]
    fn extreme_rates_and_terms_keep_a_finite_payment() {
        for (principal, rate, years) in [
            (400000., 8000., 30),
            (400000., 5., 20000),
            (1000., 5., u32::MAX),
        ] {
            let payment = monthly_payment(principal, rate, years);
            assert!(
                payment.is_finite() && payment > 0.,
                "{rate}% over {years}y gave {payment}"
            );
            assert_relative_eq!(payment, principal * rate / 1200., max_relative = 1e-9);
        }

        let periods = schedule(400000., 8000., 30, monthly_payment(400000., 8000., 30));
        assert_eq!(periods.len(), 360);
        assert!(periods.iter().all(|p| p.remaining_balance.is_finite()));
    }

    #[test]
    fn huge_terms_do_not_overflow_or_preallocate() {
        assert!(matches!(
            LoanTerms::new(1000., 5., 400_000_000),
            Err(MortgageError::InvalidInput { field, .. }) if field == "term_years"
        ));

        let longest = u32::MAX / 12;
        let terms = LoanTerms::new(1000., 5., longest).unwrap();
        assert_eq!(terms.total_periods(), longest * 12);

        let periods = schedule(1000., 5., u32::MAX, 500.);
        assert_eq!(periods.len(), 3);
        assert!(periods.capacity() <= 600);
        assert!(periods.last().unwrap().remaining_balance <= 0.);
    }

    #[test]
    fn loan_terms_reject_bad_input() {
        assert_eq!(
            LoanTerms::new(0., 6.5, 30),
            Err(MortgageError::InvalidInput {
                field: "principal".to_string(),
                reason: "loan amount must be greater than zero".to_string(),
            })
        );
        assert!(LoanTerms::new(-5., 6.5, 30).is_err());
        assert!(LoanTerms::new(f64::NAN, 6.5, 30).is_err());
        assert!(LoanTerms::new(400000., -0.5, 30).is_err());
        assert!(LoanTerms::new(400000., 6.5, 0).is_err());
        assert!(LoanTerms::new(400000., 0., 30).is_ok());
    }

    #[test]
    fn amortized_result_totals() {
        let terms = LoanTerms::new(400000., 6.5, 30).unwrap();
        assert_eq!(terms.total_periods(), 360);

        let result = terms.amortize();
        assert_eq!(result.len(), 360);
        assert_eq!(round(result.payment(), 2), 2528.27);
        assert_abs_diff_eq!(result.total_principal(), 400000., epsilon = 1e-4);
        assert_relative_eq!(result.total_paid(), 360. * result.payment(), max_relative = 1e-9);
        assert_abs_diff_eq!(result.final_balance(), 0., epsilon = 1e-4);
        assert!(!result.is_negatively_amortizing());
    }

    #[test]
    fn amortize_with_extra_payment() {
        let terms = LoanTerms::new(10000., 5., 30).unwrap();

        let result = terms.amortize_with(500.).unwrap();
        assert!(result.len() < 360);
        assert!(result.is_paid_off());

        let stuck = LoanTerms::new(100000., 6., 1)
            .unwrap()
            .amortize_with(400.)
            .unwrap();
        assert!(!stuck.is_paid_off());
        assert!(stuck.is_negatively_amortizing());

        assert!(terms.amortize_with(0.).is_err());
        assert!(terms.amortize_with(f64::INFINITY).is_err());
    }

    #[test]
    fn period_display() {
        let period = Period::new(1, 199369.0102, 630.9898, 1166.6667);
        assert_eq!(
            period.to_string(),
            "pmt number 1, payment $1797.66, principal paid $630.99, interest paid $1166.67, ending balance $199369.01"
        );
    }

    #[test]
    fn monthly_payment_dates() {
        let first = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let dates = payment_dates(first, 14).unwrap();

        assert_eq!(dates.len(), 14);
        assert_eq!(dates[0], first);
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(dates[13], NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());

        assert!(payment_dates(NaiveDate::MAX, 2).is_err());
        assert!(payment_dates(first, 0).unwrap().is_empty());
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round(2528.2706, 2), 2528.27);
        assert_eq!(round(0.125, 1), 0.1);
        assert_eq!(round(0., 4), 0.);
    }
}
