//! The loan engine. One object wiring store, clock, config and the
//! loan ID allocator behind the desk's public operations.
//!
//! OPERATIONS:
//!   register_customer / upsert_customer   onboarding
//!   score                                 credit score for a customer
//!   evaluate                              decision only, never writes
//!   issue                                 evaluate, then commit if approved
//!   import_loans                          record existing loan history
//!   loan_details / customer_loans         read side
//!
//! Every operation reads fresh from the store; the engine holds no
//! record state of its own. It is Sync when the store is, so one engine
//! can serve concurrent callers.

use crate::{
    allocator::LoanIdAllocator,
    clock::{Clock, FixedClock, SystemClock},
    config::DeskConfig,
    customer::{self, Customer, CustomerFields},
    error::{LoanError, LoanResult},
    issuance::{IssuanceResult, LoanIssuer},
    loan::{self, ImportReport, Loan, LoanDetails, LoanSummary},
    store::{MemoryStore, RecordStore},
    types::{CustomerId, LoanId},
    underwriting::{EvaluationResult, LoanRequest, Underwriter},
};

pub struct LoanEngine<S: RecordStore> {
    pub store: S,
    config: DeskConfig,
    clock: Box<dyn Clock>,
    allocator: LoanIdAllocator,
}

impl<S: RecordStore> LoanEngine<S> {
    pub fn new(store: S, config: DeskConfig) -> LoanResult<Self> {
        Self::with_clock(store, config, Box::new(SystemClock))
    }

    /// InvalidInput when `config` fails validation.
    pub fn with_clock(store: S, config: DeskConfig, clock: Box<dyn Clock>) -> LoanResult<Self> {
        config
            .validate()
            .map_err(|e| LoanError::invalid(format!("config: {e}")))?;
        let allocator = LoanIdAllocator::from_config(&config);
        Ok(Self {
            store,
            config,
            clock,
            allocator,
        })
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn underwriter(&self) -> Underwriter<'_, S> {
        Underwriter::new(&self.store, self.clock.as_ref(), &self.config)
    }

    // ── Onboarding ────────────────────────────────────────────────

    pub fn register_customer(
        &self,
        phone_number: &str,
        fields: CustomerFields,
    ) -> LoanResult<Customer> {
        customer::register_customer(&self.store, phone_number, fields)
    }

    pub fn upsert_customer(
        &self,
        phone_number: &str,
        fields: CustomerFields,
    ) -> LoanResult<Customer> {
        customer::upsert_customer(&self.store, phone_number, fields)
    }

    /// Loans already on file are skipped and reported, not overwritten.
    pub fn import_loans(&self, loans: &[Loan]) -> LoanResult<ImportReport> {
        loan::import_loans(&self.store, loans)
    }

    // ── Underwriting ──────────────────────────────────────────────

    pub fn score(&self, customer_id: CustomerId) -> LoanResult<f64> {
        self.underwriter().score(customer_id)
    }

    pub fn evaluate(&self, request: &LoanRequest) -> LoanResult<EvaluationResult> {
        self.underwriter().evaluate(request)
    }

    pub fn issue(&self, request: &LoanRequest) -> LoanResult<IssuanceResult> {
        LoanIssuer::new(
            &self.store,
            self.clock.as_ref(),
            self.underwriter(),
            &self.allocator,
        )
        .issue(request)
    }

    // ── Read side ─────────────────────────────────────────────────

    pub fn loan_details(&self, loan_id: LoanId) -> LoanResult<LoanDetails> {
        loan::loan_details(&self.store, loan_id)
    }

    pub fn customer_loans(&self, customer_id: CustomerId) -> LoanResult<Vec<LoanSummary>> {
        loan::customer_loans(&self.store, customer_id, self.clock.today())
    }
}

impl LoanEngine<MemoryStore> {
    /// In-memory engine with a seeded allocator and a pinned date.
    pub fn build_test(today: chrono::NaiveDate) -> LoanResult<Self> {
        Self::with_clock(
            MemoryStore::new(),
            DeskConfig::default_test(),
            Box::new(FixedClock(today)),
        )
    }
}
