//! Record store: the only collaborator the engine talks to for data.
//!
//! RULE: Only the store modules talk to the database.
//! Scoring, underwriting and issuance call RecordStore methods; they
//! never execute SQL and never keep records between calls.
//!
//! Uniqueness (customer phone, loan ID) is enforced by the store itself
//! and reported as LoanError::ConstraintViolation. Callers must treat a
//! successful create_loan as the only proof an identifier was free.

use crate::{
    customer::{Customer, CustomerFields},
    error::{LoanError, LoanResult},
    loan::Loan,
    types::{CustomerId, LoanId},
};
use rusqlite::{Connection, ErrorCode};
use std::sync::{Arc, Mutex, MutexGuard};

mod customer;
mod loan;
mod memory;

pub use memory::MemoryStore;

/// The contract every backing store must fulfill.
pub trait RecordStore: Send + Sync {
    /// NotFound when no customer has this ID.
    fn find_customer(&self, customer_id: CustomerId) -> LoanResult<Customer>;

    fn find_customer_by_phone(&self, phone_number: &str) -> LoanResult<Option<Customer>>;

    /// ConstraintViolation when the phone number is already registered.
    fn create_customer(&self, phone_number: &str, fields: &CustomerFields)
        -> LoanResult<Customer>;

    /// Insert, or overwrite the mutable fields of the customer owning
    /// `phone_number`. The customer ID is kept on update.
    fn upsert_customer(&self, phone_number: &str, fields: &CustomerFields)
        -> LoanResult<Customer>;

    /// All loans owned by `customer_id`, ordered by loan ID.
    fn list_loans(&self, customer_id: CustomerId) -> LoanResult<Vec<Loan>>;

    /// NotFound when no loan has this ID.
    fn find_loan(&self, loan_id: LoanId) -> LoanResult<Loan>;

    /// Advisory only: a later create_loan may still collide.
    fn loan_id_exists(&self, loan_id: LoanId) -> LoanResult<bool>;

    /// Atomically commit `loan`. ConstraintViolation when its loan_id is
    /// already taken.
    fn create_loan(&self, loan: &Loan) -> LoanResult<Loan>;
}

/// Lets several engines share one store across threads.
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn find_customer(&self, customer_id: CustomerId) -> LoanResult<Customer> {
        (**self).find_customer(customer_id)
    }

    fn find_customer_by_phone(&self, phone_number: &str) -> LoanResult<Option<Customer>> {
        (**self).find_customer_by_phone(phone_number)
    }

    fn create_customer(
        &self,
        phone_number: &str,
        fields: &CustomerFields,
    ) -> LoanResult<Customer> {
        (**self).create_customer(phone_number, fields)
    }

    fn upsert_customer(
        &self,
        phone_number: &str,
        fields: &CustomerFields,
    ) -> LoanResult<Customer> {
        (**self).upsert_customer(phone_number, fields)
    }

    fn list_loans(&self, customer_id: CustomerId) -> LoanResult<Vec<Loan>> {
        (**self).list_loans(customer_id)
    }

    fn find_loan(&self, loan_id: LoanId) -> LoanResult<Loan> {
        (**self).find_loan(loan_id)
    }

    fn loan_id_exists(&self, loan_id: LoanId) -> LoanResult<bool> {
        (**self).loan_id_exists(loan_id)
    }

    fn create_loan(&self, loan: &Loan) -> LoanResult<Loan> {
        (**self).create_loan(loan)
    }
}

/// SQLite-backed store. One connection, serialized behind a mutex so the
/// store can be shared across threads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteStore {
    pub fn open(path: &str) -> LoanResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LoanResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LoanResult<()> {
        self.conn()?
            .execute_batch(include_str!("../../../migrations/001_loan_desk.sql"))?;
        Ok(())
    }

    fn conn(&self) -> LoanResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LoanError::StoreUnavailable("connection mutex poisoned".into()))
    }
}

impl RecordStore for SqliteStore {
    fn find_customer(&self, customer_id: CustomerId) -> LoanResult<Customer> {
        self.select_customer(customer_id)?
            .ok_or_else(|| LoanError::customer_not_found(customer_id))
    }

    fn find_customer_by_phone(&self, phone_number: &str) -> LoanResult<Option<Customer>> {
        self.select_customer_by_phone(phone_number)
    }

    fn create_customer(
        &self,
        phone_number: &str,
        fields: &CustomerFields,
    ) -> LoanResult<Customer> {
        self.insert_customer(phone_number, fields)
    }

    fn upsert_customer(
        &self,
        phone_number: &str,
        fields: &CustomerFields,
    ) -> LoanResult<Customer> {
        self.upsert_customer_row(phone_number, fields)
    }

    fn list_loans(&self, customer_id: CustomerId) -> LoanResult<Vec<Loan>> {
        self.loans_for_customer(customer_id)
    }

    fn find_loan(&self, loan_id: LoanId) -> LoanResult<Loan> {
        self.select_loan(loan_id)?
            .ok_or_else(|| LoanError::loan_not_found(loan_id))
    }

    fn loan_id_exists(&self, loan_id: LoanId) -> LoanResult<bool> {
        self.loan_row_exists(loan_id)
    }

    fn create_loan(&self, loan: &Loan) -> LoanResult<Loan> {
        self.insert_loan(loan)?;
        Ok(loan.clone())
    }
}

/// True when SQLite rejected a write on a UNIQUE or PRIMARY KEY constraint.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
