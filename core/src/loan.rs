//! Loan records and the read-side views built from them.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    error::{LoanError, LoanResult},
    store::RecordStore,
    types::{Amount, CustomerId, LoanId},
    underwriting::MAX_TENURE_YEARS,
};

/// Days counted per tenure year. Leap days are not adjusted for.
pub const DAYS_PER_TENURE_YEAR: i64 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub customer_id: CustomerId,
    pub loan_amount: Amount,
    /// Tenure in years.
    pub tenure: u32,
    pub interest_rate: f64,
    pub monthly_payment: Amount,
    pub emis_paid_on_time: u32,
    pub date_of_approval: NaiveDate,
    pub end_date: NaiveDate,
}

impl Loan {
    /// Field checks applied to records coming from outside the desk.
    pub fn validate(&self) -> LoanResult<()> {
        if self.loan_id <= 0 {
            return Err(LoanError::invalid(format!(
                "loan_id must be positive, got {}",
                self.loan_id
            )));
        }
        if !self.loan_amount.is_finite() || self.loan_amount <= 0.0 {
            return Err(LoanError::invalid(format!(
                "loan {}: loan_amount must be a positive number, got {}",
                self.loan_id, self.loan_amount
            )));
        }
        if !self.interest_rate.is_finite() || self.interest_rate < 0.0 {
            return Err(LoanError::invalid(format!(
                "loan {}: interest_rate must be a non-negative number, got {}",
                self.loan_id, self.interest_rate
            )));
        }
        if !self.monthly_payment.is_finite() || self.monthly_payment < 0.0 {
            return Err(LoanError::invalid(format!(
                "loan {}: monthly_payment must be a non-negative number, got {}",
                self.loan_id, self.monthly_payment
            )));
        }
        if self.tenure == 0 || self.tenure > MAX_TENURE_YEARS {
            return Err(LoanError::invalid(format!(
                "loan {}: tenure must be between 1 and {MAX_TENURE_YEARS} years, got {}",
                self.loan_id, self.tenure
            )));
        }
        if self.end_date < self.date_of_approval {
            return Err(LoanError::invalid(format!(
                "loan {}: end_date {} precedes date_of_approval {}",
                self.loan_id, self.end_date, self.date_of_approval
            )));
        }
        Ok(())
    }

    pub fn tenure_months(&self) -> u32 {
        self.tenure * 12
    }

    /// Installments still due on `today`, counting whole calendar months
    /// since approval. Never negative.
    pub fn repayments_left(&self, today: NaiveDate) -> u32 {
        let months_elapsed = (today.year() - self.date_of_approval.year()) as i64 * 12
            + (today.month() as i64 - self.date_of_approval.month() as i64);
        (self.tenure_months() as i64 - months_elapsed).max(0) as u32
    }
}

/// approval + 365 days per tenure year.
pub fn loan_end_date(approval: NaiveDate, tenure_years: u32) -> NaiveDate {
    approval + Duration::days(DAYS_PER_TENURE_YEAR * tenure_years as i64)
}

/// Full detail of one loan, as returned by a lookup on loan ID.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanDetails {
    pub loan_id: LoanId,
    pub customer_id: CustomerId,
    pub loan_amount: Amount,
    pub interest_rate: f64,
    pub monthly_payment: Amount,
    pub tenure: u32,
    pub date_of_approval: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<&Loan> for LoanDetails {
    fn from(loan: &Loan) -> Self {
        Self {
            loan_id: loan.loan_id,
            customer_id: loan.customer_id,
            loan_amount: loan.loan_amount,
            interest_rate: loan.interest_rate,
            monthly_payment: loan.monthly_payment,
            tenure: loan.tenure,
            date_of_approval: loan.date_of_approval,
            end_date: loan.end_date,
        }
    }
}

/// One row of a customer's loan book.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanSummary {
    pub loan_id: LoanId,
    pub loan_amount: Amount,
    pub interest_rate: f64,
    pub monthly_installment: Amount,
    pub repayments_left: u32,
}

impl LoanSummary {
    pub fn of(loan: &Loan, today: NaiveDate) -> Self {
        Self {
            loan_id: loan.loan_id,
            loan_amount: loan.loan_amount,
            interest_rate: loan.interest_rate,
            monthly_installment: loan.monthly_payment,
            repayments_left: loan.repayments_left(today),
        }
    }
}

pub fn loan_details<S: RecordStore + ?Sized>(store: &S, loan_id: LoanId) -> LoanResult<LoanDetails> {
    let loan = store.find_loan(loan_id)?;
    Ok(LoanDetails::from(&loan))
}

/// Every loan held by `customer_id`, including imported loans whose
/// customer row does not exist. NotFound only when there are no loans
/// and no customer; a known customer with no loans yields an empty book.
pub fn customer_loans<S: RecordStore + ?Sized>(
    store: &S,
    customer_id: CustomerId,
    today: NaiveDate,
) -> LoanResult<Vec<LoanSummary>> {
    let loans = store.list_loans(customer_id)?;
    if loans.is_empty() {
        store.find_customer(customer_id)?;
    }
    Ok(loans.iter().map(|l| LoanSummary::of(l, today)).collect())
}

/// Outcome of a loan history import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<LoanId>,
    /// IDs already on file. The stored record is left as it was.
    pub skipped: Vec<LoanId>,
}

/// Record existing loans under their own IDs. A loan whose ID is taken is
/// skipped, not overwritten. Every record is validated before the first
/// write, so one bad record imports nothing.
pub fn import_loans<S: RecordStore + ?Sized>(
    store: &S,
    loans: &[Loan],
) -> LoanResult<ImportReport> {
    for loan in loans {
        loan.validate()?;
    }

    let mut report = ImportReport::default();
    for loan in loans {
        match store.create_loan(loan) {
            Ok(_) => report.imported.push(loan.loan_id),
            Err(LoanError::ConstraintViolation { field: "loan_id", .. }) => {
                log::debug!("import: loan {} already on file, skipped", loan.loan_id);
                report.skipped.push(loan.loan_id);
            }
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "import: {} loans imported, {} skipped",
        report.imported.len(),
        report.skipped.len()
    );
    Ok(report)
}
