//! In-memory RecordStore for tests and dry runs.
//!
//! Uniqueness is checked and the row inserted under one lock, which gives
//! the same guarantee the SQLite primary key does.

use super::RecordStore;
use crate::{
    customer::{Customer, CustomerFields},
    error::{LoanError, LoanResult},
    loan::Loan,
    types::{CustomerId, LoanId},
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    loans: BTreeMap<LoanId, Loan>,
    last_customer_id: CustomerId,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    mutations: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed writes so far (customer inserts/updates and loan inserts).
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn loan_count(&self) -> LoanResult<usize> {
        Ok(self.tables()?.loans.len())
    }

    pub fn all_loan_ids(&self) -> LoanResult<Vec<LoanId>> {
        Ok(self.tables()?.loans.keys().copied().collect())
    }

    fn tables(&self) -> LoanResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| LoanError::StoreUnavailable("memory store mutex poisoned".into()))
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn build_customer(id: CustomerId, phone_number: &str, f: &CustomerFields) -> Customer {
    Customer {
        customer_id: id,
        first_name: f.first_name.clone(),
        last_name: f.last_name.clone(),
        age: f.age,
        phone_number: phone_number.to_string(),
        monthly_salary: f.monthly_salary,
        approved_limit: f.resolved_limit(),
    }
}

impl RecordStore for MemoryStore {
    fn find_customer(&self, customer_id: CustomerId) -> LoanResult<Customer> {
        self.tables()?
            .customers
            .get(&customer_id)
            .cloned()
            .ok_or_else(|| LoanError::customer_not_found(customer_id))
    }

    fn find_customer_by_phone(&self, phone_number: &str) -> LoanResult<Option<Customer>> {
        Ok(self
            .tables()?
            .customers
            .values()
            .find(|c| c.phone_number == phone_number)
            .cloned())
    }

    fn create_customer(
        &self,
        phone_number: &str,
        fields: &CustomerFields,
    ) -> LoanResult<Customer> {
        let mut tables = self.tables()?;
        if tables.customers.values().any(|c| c.phone_number == phone_number) {
            return Err(LoanError::ConstraintViolation {
                field: "phone_number",
                value: phone_number.to_string(),
            });
        }
        tables.last_customer_id += 1;
        let customer = build_customer(tables.last_customer_id, phone_number, fields);
        tables.customers.insert(customer.customer_id, customer.clone());
        self.record_mutation();
        Ok(customer)
    }

    fn upsert_customer(
        &self,
        phone_number: &str,
        fields: &CustomerFields,
    ) -> LoanResult<Customer> {
        let mut tables = self.tables()?;
        let existing = tables
            .customers
            .values()
            .find(|c| c.phone_number == phone_number)
            .map(|c| c.customer_id);
        let id = match existing {
            Some(id) => id,
            None => {
                tables.last_customer_id += 1;
                tables.last_customer_id
            }
        };
        let customer = build_customer(id, phone_number, fields);
        tables.customers.insert(id, customer.clone());
        self.record_mutation();
        Ok(customer)
    }

    fn list_loans(&self, customer_id: CustomerId) -> LoanResult<Vec<Loan>> {
        Ok(self
            .tables()?
            .loans
            .values()
            .filter(|l| l.customer_id == customer_id)
            .cloned()
            .collect())
    }

    fn find_loan(&self, loan_id: LoanId) -> LoanResult<Loan> {
        self.tables()?
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| LoanError::loan_not_found(loan_id))
    }

    fn loan_id_exists(&self, loan_id: LoanId) -> LoanResult<bool> {
        Ok(self.tables()?.loans.contains_key(&loan_id))
    }

    fn create_loan(&self, loan: &Loan) -> LoanResult<Loan> {
        let mut tables = self.tables()?;
        if tables.loans.contains_key(&loan.loan_id) {
            return Err(LoanError::ConstraintViolation {
                field: "loan_id",
                value: loan.loan_id.to_string(),
            });
        }
        tables.loans.insert(loan.loan_id, loan.clone());
        self.record_mutation();
        Ok(loan.clone())
    }
}
