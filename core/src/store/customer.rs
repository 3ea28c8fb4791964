use super::{is_unique_violation, SqliteStore};
use crate::{
    customer::{Customer, CustomerFields},
    error::{LoanError, LoanResult},
    types::CustomerId,
};
use rusqlite::{params, OptionalExtension, Row};

const CUSTOMER_COLUMNS: &str = "customer_id, first_name, last_name, age, phone_number,
                                monthly_salary, approved_limit";

fn customer_from_row(r: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        customer_id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        age: r.get(3)?,
        phone_number: r.get(4)?,
        monthly_salary: r.get(5)?,
        approved_limit: r.get(6)?,
    })
}

impl SqliteStore {
    // ── Customer ──────────────────────────────────────────────────

    pub(super) fn select_customer(&self, customer_id: CustomerId) -> LoanResult<Option<Customer>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE customer_id = ?1"),
                params![customer_id],
                customer_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub(super) fn select_customer_by_phone(&self, phone_number: &str) -> LoanResult<Option<Customer>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE phone_number = ?1"),
                params![phone_number],
                customer_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub(super) fn insert_customer(
        &self,
        phone_number: &str,
        f: &CustomerFields,
    ) -> LoanResult<Customer> {
        let conn = self.conn()?;
        let approved_limit = f.resolved_limit();
        conn.execute(
            "INSERT INTO customer (
                 first_name, last_name, age, phone_number, monthly_salary, approved_limit
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                f.first_name,
                f.last_name,
                f.age,
                phone_number,
                f.monthly_salary,
                approved_limit
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                LoanError::ConstraintViolation {
                    field: "phone_number",
                    value: phone_number.to_string(),
                }
            } else {
                e.into()
            }
        })?;

        Ok(Customer {
            customer_id: conn.last_insert_rowid(),
            first_name: f.first_name.clone(),
            last_name: f.last_name.clone(),
            age: f.age,
            phone_number: phone_number.to_string(),
            monthly_salary: f.monthly_salary,
            approved_limit,
        })
    }

    pub(super) fn upsert_customer_row(
        &self,
        phone_number: &str,
        f: &CustomerFields,
    ) -> LoanResult<Customer> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO customer (
                 first_name, last_name, age, phone_number, monthly_salary, approved_limit
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (phone_number) DO UPDATE SET
                 first_name     = excluded.first_name,
                 last_name      = excluded.last_name,
                 age            = excluded.age,
                 monthly_salary = excluded.monthly_salary,
                 approved_limit = excluded.approved_limit",
            params![
                f.first_name,
                f.last_name,
                f.age,
                phone_number,
                f.monthly_salary,
                f.resolved_limit()
            ],
        )?;
        let customer = conn.query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE phone_number = ?1"),
            params![phone_number],
            customer_from_row,
        )?;
        Ok(customer)
    }

    /// Count customer rows (test helper).
    pub fn customer_count(&self) -> LoanResult<i64> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM customer", [], |r| r.get(0))?;
        Ok(n)
    }
}
