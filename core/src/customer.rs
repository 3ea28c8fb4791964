//! Customer records and onboarding.
//!
//! Phone number is the external key: registration refuses a phone that
//! is already on file, upsert updates the record that owns it.

use serde::{Deserialize, Serialize};

use crate::{
    error::{LoanError, LoanResult},
    store::RecordStore,
    types::{Amount, CustomerId},
};

/// Approved limits are quoted in whole multiples of this amount.
pub const LIMIT_STEP: Amount = 100_000.0;

/// Approved limit as a multiple of monthly income.
pub const LIMIT_INCOME_MULTIPLE: f64 = 36.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub phone_number: String,
    pub monthly_salary: Amount,
    pub approved_limit: Amount,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The mutable part of a customer, as supplied by registration or import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub monthly_salary: Amount,
    /// Explicit limit. None = derived from monthly salary.
    #[serde(default)]
    pub approved_limit: Option<Amount>,
}

impl CustomerFields {
    pub fn validate(&self) -> LoanResult<()> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push("first_name");
        }
        if self.last_name.trim().is_empty() {
            missing.push("last_name");
        }
        if self.age == 0 {
            missing.push("age");
        }
        if !missing.is_empty() {
            return Err(LoanError::invalid(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        if !self.monthly_salary.is_finite() || self.monthly_salary <= 0.0 {
            return Err(LoanError::invalid(format!(
                "monthly_income must be a positive number, got {}",
                self.monthly_salary
            )));
        }
        if let Some(limit) = self.approved_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(LoanError::invalid(format!(
                    "approved_limit must be a non-negative number, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// The limit to persist: the explicit one, or the income-derived one.
    pub fn resolved_limit(&self) -> Amount {
        self.approved_limit
            .unwrap_or_else(|| derive_approved_limit(self.monthly_salary))
    }
}

/// 36x monthly income, rounded to the nearest 100,000.
/// Exact halves go to the even multiple.
pub fn derive_approved_limit(monthly_income: Amount) -> Amount {
    (LIMIT_INCOME_MULTIPLE * monthly_income / LIMIT_STEP).round_ties_even() * LIMIT_STEP
}

pub fn validate_phone(phone_number: &str) -> LoanResult<()> {
    let phone = phone_number.trim();
    if phone.is_empty() {
        return Err(LoanError::invalid("Missing required fields: phone_number"));
    }
    if phone.len() > 15 {
        return Err(LoanError::invalid(format!(
            "phone_number must be at most 15 characters, got {}",
            phone.len()
        )));
    }
    Ok(())
}

/// Register a new customer. Fails with ConstraintViolation when the
/// phone number already belongs to someone.
pub fn register_customer<S: RecordStore + ?Sized>(
    store: &S,
    phone_number: &str,
    fields: CustomerFields,
) -> LoanResult<Customer> {
    validate_phone(phone_number)?;
    fields.validate()?;
    let fields = CustomerFields {
        approved_limit: Some(fields.resolved_limit()),
        ..fields
    };
    let customer = store.create_customer(phone_number.trim(), &fields)?;
    log::info!(
        "onboarding: registered customer {} ({}) with limit {:.2}",
        customer.customer_id,
        customer.full_name(),
        customer.approved_limit
    );
    Ok(customer)
}

/// Insert or update the customer owning `phone_number`.
pub fn upsert_customer<S: RecordStore + ?Sized>(
    store: &S,
    phone_number: &str,
    fields: CustomerFields,
) -> LoanResult<Customer> {
    validate_phone(phone_number)?;
    fields.validate()?;
    let fields = CustomerFields {
        approved_limit: Some(fields.resolved_limit()),
        ..fields
    };
    let customer = store.upsert_customer(phone_number.trim(), &fields)?;
    log::debug!(
        "onboarding: upserted customer {} for phone {}",
        customer.customer_id,
        customer.phone_number
    );
    Ok(customer)
}
