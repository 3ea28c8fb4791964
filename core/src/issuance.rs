//! Issuance: evaluate, then commit a loan only when approved.
//!
//! STATES (one pass, never revisited):
//!   Requested → Evaluated → Issued    (approved; exactly one record committed)
//!                         → Rejected  (declined; the store is not touched)
//!
//! Bad input and unknown customers fail before Evaluated is reached.

use serde::Serialize;

use crate::{
    allocator::LoanIdAllocator,
    clock::Clock,
    error::LoanResult,
    loan::{loan_end_date, Loan},
    store::RecordStore,
    types::{Amount, CustomerId, LoanId},
    underwriting::{EvaluationResult, LoanRequest, Underwriter},
};

pub const APPROVED_MESSAGE: &str = "Loan approved and created successfully";
pub const REJECTED_MESSAGE: &str = "Loan not approved due to eligibility criteria";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceState {
    Requested,
    Evaluated,
    Issued,
    Rejected,
}

impl IssuanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Issued | Self::Rejected)
    }

    pub fn can_advance_to(&self, next: IssuanceState) -> bool {
        matches!(
            (*self, next),
            (Self::Requested, Self::Evaluated)
                | (Self::Evaluated, Self::Issued)
                | (Self::Evaluated, Self::Rejected)
        )
    }

    fn advance(&mut self, next: IssuanceState) {
        debug_assert!(
            self.can_advance_to(next),
            "illegal issuance transition {self:?} -> {next:?}"
        );
        *self = next;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuanceResult {
    pub loan_id: Option<LoanId>,
    pub customer_id: CustomerId,
    #[serde(rename = "loan_approved")]
    pub approved: bool,
    pub message: String,
    pub monthly_installment: Amount,
    pub state: IssuanceState,
    /// The decision the outcome was based on.
    #[serde(skip)]
    pub evaluation: EvaluationResult,
}

pub struct LoanIssuer<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
    underwriter: Underwriter<'a, S>,
    allocator: &'a LoanIdAllocator,
}

impl<'a, S: RecordStore + ?Sized> LoanIssuer<'a, S> {
    pub fn new(
        store: &'a S,
        clock: &'a dyn Clock,
        underwriter: Underwriter<'a, S>,
        allocator: &'a LoanIdAllocator,
    ) -> Self {
        Self {
            store,
            clock,
            underwriter,
            allocator,
        }
    }

    pub fn issue(&self, request: &LoanRequest) -> LoanResult<IssuanceResult> {
        let mut state = IssuanceState::Requested;

        request.validate()?;
        let customer = self.store.find_customer(request.customer_id)?;
        let evaluation = self.underwriter.evaluate_for(&customer, request)?;
        state.advance(IssuanceState::Evaluated);

        if !evaluation.approved {
            state.advance(IssuanceState::Rejected);
            log::info!(
                "issuance: customer {} declined (score {:.2}, tier {:?})",
                request.customer_id,
                evaluation.credit_score,
                evaluation.tier
            );
            return Ok(IssuanceResult {
                loan_id: None,
                customer_id: request.customer_id,
                approved: false,
                message: REJECTED_MESSAGE.to_string(),
                monthly_installment: 0.0,
                state,
                evaluation,
            });
        }

        let today = self.clock.today();
        let template = Loan {
            loan_id: 0,
            customer_id: request.customer_id,
            loan_amount: request.loan_amount,
            tenure: request.tenure,
            interest_rate: evaluation.corrected_rate,
            monthly_payment: evaluation.monthly_installment,
            emis_paid_on_time: 0,
            date_of_approval: today,
            end_date: loan_end_date(today, request.tenure),
        };
        let loan = self.allocator.commit(self.store, &template)?;
        state.advance(IssuanceState::Issued);

        log::info!(
            "issuance: loan {} issued to customer {} ({:.2} over {}y at {:.2}%, EMI {:.2})",
            loan.loan_id,
            loan.customer_id,
            loan.loan_amount,
            loan.tenure,
            loan.interest_rate,
            loan.monthly_payment
        );

        Ok(IssuanceResult {
            loan_id: Some(loan.loan_id),
            customer_id: request.customer_id,
            approved: true,
            message: APPROVED_MESSAGE.to_string(),
            monthly_installment: evaluation.monthly_installment,
            state,
            evaluation,
        })
    }
}
