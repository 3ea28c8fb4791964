//! Score calculator: turns a customer's loan history into one scalar.
//!
//! The score is a fixed weighted sum, hard-capped to zero for customers
//! whose total principal already exceeds their approved limit. It has no
//! upper bound and is only used to pick an underwriting tier.

use chrono::Datelike;
use serde::Serialize;

use crate::{
    clock::Clock,
    error::LoanResult,
    loan::Loan,
    store::RecordStore,
    types::{Amount, CustomerId},
};

pub const PAID_ON_TIME_WEIGHT: f64 = 0.4;
pub const LOAN_COUNT_WEIGHT: f64 = 0.3;
pub const CURRENT_YEAR_WEIGHT: f64 = 0.2;
pub const VOLUME_WEIGHT: f64 = 0.1;

/// The aggregates the score is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreInputs {
    pub paid_on_time: u64,
    pub loan_count: u64,
    pub current_year_activity: u64,
    /// Sum of principals. Serves as both approved volume and current exposure.
    pub total_volume: Amount,
}

impl ScoreInputs {
    pub fn from_loans(loans: &[Loan], current_year: i32) -> Self {
        Self {
            paid_on_time: loans.iter().map(|l| l.emis_paid_on_time as u64).sum(),
            loan_count: loans.len() as u64,
            current_year_activity: loans
                .iter()
                .filter(|l| l.date_of_approval.year() == current_year)
                .count() as u64,
            total_volume: loans.iter().map(|l| l.loan_amount).sum(),
        }
    }

    /// Credit score against `approved_limit`.
    pub fn score(&self, approved_limit: Amount) -> f64 {
        if self.total_volume > approved_limit {
            return 0.0;
        }
        PAID_ON_TIME_WEIGHT * self.paid_on_time as f64
            + LOAN_COUNT_WEIGHT * self.loan_count as f64
            + CURRENT_YEAR_WEIGHT * self.current_year_activity as f64
            + VOLUME_WEIGHT * self.total_volume
    }
}

/// Pure score over already-fetched data.
pub fn credit_score(approved_limit: Amount, loans: &[Loan], current_year: i32) -> f64 {
    ScoreInputs::from_loans(loans, current_year).score(approved_limit)
}

/// Scores customers by reading their records from a store.
pub struct ScoreCalculator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: RecordStore + ?Sized> ScoreCalculator<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Score for `customer_id`. NotFound when the customer is unknown.
    pub fn score(&self, customer_id: CustomerId) -> LoanResult<f64> {
        let customer = self.store.find_customer(customer_id)?;
        self.score_for_limit(customer_id, customer.approved_limit)
    }

    /// Score for a customer already fetched by the caller.
    pub(crate) fn score_for_limit(
        &self,
        customer_id: CustomerId,
        approved_limit: Amount,
    ) -> LoanResult<f64> {
        let loans = self.store.list_loans(customer_id)?;
        let inputs = ScoreInputs::from_loans(&loans, self.clock.current_year());
        let score = inputs.score(approved_limit);
        log::debug!(
            "scoring: customer {customer_id} score={score:.2} \
             (paid_on_time={}, loans={}, this_year={}, volume={:.2}, limit={:.2})",
            inputs.paid_on_time,
            inputs.loan_count,
            inputs.current_year_activity,
            inputs.total_volume,
            approved_limit
        );
        Ok(score)
    }
}
