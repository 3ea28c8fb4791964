//! Equated monthly installment (EMI) math.

use crate::types::Amount;

pub const MONTHS_PER_YEAR: u32 = 12;

/// Annual percentage rate → monthly fraction (12 → 0.01).
pub fn monthly_rate(annual_rate_percent: f64) -> f64 {
    annual_rate_percent / 100.0 / MONTHS_PER_YEAR as f64
}

/// Standard amortized installment for `principal` over `tenure_years`.
///
/// A zero rate amortizes linearly (principal / months) instead of
/// dividing by zero. Callers reject negative rates and zero tenure
/// before getting here.
pub fn monthly_installment(principal: Amount, annual_rate_percent: f64, tenure_years: u32) -> Amount {
    let months = tenure_years * MONTHS_PER_YEAR;
    let r = monthly_rate(annual_rate_percent);
    if r == 0.0 {
        return principal / months as f64;
    }
    principal * r / (1.0 - (1.0 + r).powi(-(months as i32)))
}
