use super::{is_unique_violation, SqliteStore};
use crate::{
    error::{LoanError, LoanResult},
    loan::Loan,
    types::{CustomerId, LoanId},
};
use rusqlite::{params, OptionalExtension, Row};

const LOAN_COLUMNS: &str = "loan_id, customer_id, loan_amount, tenure, interest_rate,
                            monthly_payment, emis_paid_on_time, date_of_approval, end_date";

fn loan_from_row(r: &Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        loan_id: r.get(0)?,
        customer_id: r.get(1)?,
        loan_amount: r.get(2)?,
        tenure: r.get(3)?,
        interest_rate: r.get(4)?,
        monthly_payment: r.get(5)?,
        emis_paid_on_time: r.get(6)?,
        date_of_approval: r.get(7)?,
        end_date: r.get(8)?,
    })
}

impl SqliteStore {
    // ── Loan ──────────────────────────────────────────────────────

    pub(super) fn insert_loan(&self, loan: &Loan) -> LoanResult<()> {
        self.conn()?
            .execute(
                "INSERT INTO loan (
                     loan_id, customer_id, loan_amount, tenure, interest_rate,
                     monthly_payment, emis_paid_on_time, date_of_approval, end_date
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    loan.loan_id,
                    loan.customer_id,
                    loan.loan_amount,
                    loan.tenure,
                    loan.interest_rate,
                    loan.monthly_payment,
                    loan.emis_paid_on_time,
                    loan.date_of_approval,
                    loan.end_date,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LoanError::ConstraintViolation {
                        field: "loan_id",
                        value: loan.loan_id.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    pub(super) fn select_loan(&self, loan_id: LoanId) -> LoanResult<Option<Loan>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {LOAN_COLUMNS} FROM loan WHERE loan_id = ?1"),
                params![loan_id],
                loan_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub(super) fn loans_for_customer(&self, customer_id: CustomerId) -> LoanResult<Vec<Loan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOAN_COLUMNS} FROM loan WHERE customer_id = ?1 ORDER BY loan_id ASC"
        ))?;
        let loans = stmt
            .query_map(params![customer_id], loan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(loans)
    }

    pub(super) fn loan_row_exists(&self, loan_id: LoanId) -> LoanResult<bool> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM loan WHERE loan_id = ?1",
            params![loan_id],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Count loan rows (test helper).
    pub fn loan_count(&self) -> LoanResult<i64> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM loan", [], |r| r.get(0))?;
        Ok(n)
    }
}
