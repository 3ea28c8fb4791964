//! Loan underwriter: approval tier, corrected rate, installment.
//!
//! Evaluation order (fixed):
//!   1. Validate the requested terms.
//!   2. Resolve the customer (NotFound otherwise).
//!   3. Score the customer from their loan history.
//!   4. Pick the tier; apply its rate floor.
//!   5. Compute the EMI at the corrected rate.
//!   6. Affordability override: an EMI above the salary share declines.
//!
//! Nothing here writes to the store. Issuance reuses `evaluate` as-is.

use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    config::DeskConfig,
    customer::Customer,
    error::{LoanError, LoanResult},
    installment::monthly_installment,
    scoring::ScoreCalculator,
    store::RecordStore,
    types::{round_cents, Amount, CustomerId},
};

/// Longest tenure accepted, in years.
pub const MAX_TENURE_YEARS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateTier {
    /// score > 50
    Prime,
    /// 30 < score <= 50
    Standard,
    /// 10 < score <= 30
    Subprime,
    /// score <= 10
    Declined,
}

impl RateTier {
    pub fn for_score(score: f64) -> Self {
        if score > 50.0 {
            Self::Prime
        } else if score > 30.0 {
            Self::Standard
        } else if score > 10.0 {
            Self::Subprime
        } else {
            Self::Declined
        }
    }

    pub fn approves(&self) -> bool {
        !matches!(self, Self::Declined)
    }

    /// Minimum annual rate (percent) the tier will lend at.
    pub fn rate_floor(&self) -> Option<f64> {
        match self {
            Self::Prime => None,
            Self::Standard => Some(12.0),
            Self::Subprime | Self::Declined => Some(16.0),
        }
    }

    pub fn corrected_rate(&self, requested: f64) -> f64 {
        match self.rate_floor() {
            Some(floor) => requested.max(floor),
            None => requested,
        }
    }
}

/// Requested terms for one loan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub customer_id: CustomerId,
    pub loan_amount: Amount,
    /// Nominal annual rate, percent.
    pub interest_rate: f64,
    /// Years.
    pub tenure: u32,
}

impl LoanRequest {
    pub fn new(customer_id: CustomerId, loan_amount: Amount, interest_rate: f64, tenure: u32) -> Self {
        Self {
            customer_id,
            loan_amount,
            interest_rate,
            tenure,
        }
    }

    pub fn validate(&self) -> LoanResult<()> {
        if !self.loan_amount.is_finite() || self.loan_amount <= 0.0 {
            return Err(LoanError::invalid(format!(
                "loan_amount must be a positive number, got {}",
                self.loan_amount
            )));
        }
        if !self.interest_rate.is_finite() || self.interest_rate < 0.0 {
            return Err(LoanError::invalid(format!(
                "interest_rate must be a non-negative number, got {}",
                self.interest_rate
            )));
        }
        if self.tenure == 0 || self.tenure > MAX_TENURE_YEARS {
            return Err(LoanError::invalid(format!(
                "tenure must be between 1 and {MAX_TENURE_YEARS} years, got {}",
                self.tenure
            )));
        }
        Ok(())
    }
}

/// Outcome of underwriting one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub customer_id: CustomerId,
    #[serde(rename = "approval")]
    pub approved: bool,
    #[serde(rename = "interest_rate")]
    pub requested_rate: f64,
    #[serde(rename = "corrected_interest_rate")]
    pub corrected_rate: f64,
    pub tenure: u32,
    /// EMI rounded to cents when approved, 0 otherwise.
    pub monthly_installment: Amount,
    pub credit_score: f64,
    pub tier: RateTier,
}

/// The policy, with no store access. `score` and `monthly_salary` are
/// whatever the caller fetched; `request` must already be validated.
pub fn underwrite(
    request: &LoanRequest,
    score: f64,
    monthly_salary: Amount,
    affordability_ratio: f64,
) -> EvaluationResult {
    let tier = RateTier::for_score(score);
    let corrected_rate = tier.corrected_rate(request.interest_rate);
    let emi = monthly_installment(request.loan_amount, corrected_rate, request.tenure);

    let affordable = emi <= affordability_ratio * monthly_salary;
    let approved = tier.approves() && affordable;

    EvaluationResult {
        customer_id: request.customer_id,
        approved,
        requested_rate: request.interest_rate,
        corrected_rate,
        tenure: request.tenure,
        monthly_installment: if approved { round_cents(emi) } else { 0.0 },
        credit_score: score,
        tier,
    }
}

pub struct Underwriter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
    affordability_ratio: f64,
}

impl<'a, S: RecordStore + ?Sized> Underwriter<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock, config: &DeskConfig) -> Self {
        Self {
            store,
            clock,
            affordability_ratio: config.affordability_ratio,
        }
    }

    /// Credit score for an existing customer.
    pub fn score(&self, customer_id: CustomerId) -> LoanResult<f64> {
        ScoreCalculator::new(self.store, self.clock).score(customer_id)
    }

    /// Decide on `request` without writing anything.
    pub fn evaluate(&self, request: &LoanRequest) -> LoanResult<EvaluationResult> {
        request.validate()?;
        let customer = self.store.find_customer(request.customer_id)?;
        self.evaluate_for(&customer, request)
    }

    /// Evaluate for a customer the caller already resolved.
    pub(crate) fn evaluate_for(
        &self,
        customer: &Customer,
        request: &LoanRequest,
    ) -> LoanResult<EvaluationResult> {
        let score = ScoreCalculator::new(self.store, self.clock)
            .score_for_limit(customer.customer_id, customer.approved_limit)?;
        let result = underwrite(request, score, customer.monthly_salary, self.affordability_ratio);

        if result.tier.approves() && !result.approved {
            log::debug!(
                "underwriting: customer {} declined on affordability (rate {:.2}%, salary {:.2})",
                customer.customer_id,
                result.corrected_rate,
                customer.monthly_salary
            );
        }
        log::debug!(
            "underwriting: customer {} score={:.2} tier={:?} approved={} rate {:.2}% -> {:.2}%",
            customer.customer_id,
            score,
            result.tier,
            result.approved,
            result.requested_rate,
            result.corrected_rate
        );
        Ok(result)
    }
}
