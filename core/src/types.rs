//! Shared primitive types used across the desk.

/// Store-assigned customer identifier.
pub type CustomerId = i64;

/// Loan identifier, unique across every loan in the store.
pub type LoanId = i64;

/// Currency amounts. Single currency, two-decimal presentation.
pub type Amount = f64;

/// Round a currency amount to cents, half away from zero.
pub fn round_cents(value: Amount) -> Amount {
    (value * 100.0).round() / 100.0
}
