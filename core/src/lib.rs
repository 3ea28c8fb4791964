//! Loan desk core: credit scoring, underwriting and loan issuance.

pub mod allocator;
pub mod clock;
pub mod config;
pub mod customer;
pub mod engine;
pub mod error;
pub mod installment;
pub mod issuance;
pub mod loan;
pub mod scoring;
pub mod store;
pub mod types;
pub mod underwriting;
