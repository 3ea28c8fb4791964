//! Issuance integration tests.
//!
//! Verifies:
//!   - A declined request never touches the store
//!   - An approved request commits exactly one loan with the agreed terms
//!   - Concurrent issuance never commits two loans under one ID
//!   - Store failures surface unchanged and are not retried
//!   - A saturated ID range reports exhaustion instead of looping

use chrono::NaiveDate;
use loan_desk_core::{
    clock::FixedClock,
    config::{DeskConfig, LoanIdRange},
    customer::{Customer, CustomerFields},
    engine::LoanEngine,
    error::{LoanError, LoanResult},
    issuance::{IssuanceState, APPROVED_MESSAGE, REJECTED_MESSAGE},
    loan::{loan_end_date, Loan},
    store::{MemoryStore, RecordStore, SqliteStore},
    types::{CustomerId, LoanId},
    underwriting::LoanRequest,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn fields(salary: f64, limit: f64) -> CustomerFields {
    CustomerFields {
        first_name: "Kabir".into(),
        last_name: "Singh".into(),
        age: 41,
        monthly_salary: salary,
        approved_limit: Some(limit),
    }
}

/// A well-paid customer with a history scoring above 50 and a limit
/// large enough that new loans never push exposure over it.
fn prime_customer<S: RecordStore + ?Sized>(store: &S, phone: &str) -> Customer {
    let c = store
        .create_customer(phone, &fields(10_000_000.0, 1_000_000_000.0))
        .unwrap();
    let approved = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    store
        .create_loan(&Loan {
            loan_id: 1,
            customer_id: c.customer_id,
            loan_amount: 1_000.0,
            tenure: 1,
            interest_rate: 12.0,
            monthly_payment: 88.85,
            emis_paid_on_time: 12,
            date_of_approval: approved,
            end_date: loan_end_date(approved, 1),
        })
        .unwrap();
    c
}

fn config(range: LoanIdRange, seed: u64) -> DeskConfig {
    DeskConfig {
        loan_id_range: range,
        max_random_attempts: 4,
        id_seed: Some(seed),
        ..DeskConfig::default()
    }
}

#[test]
fn declined_issue_creates_nothing() {
    let engine = LoanEngine::build_test(today()).unwrap();
    let c = engine
        .register_customer("9100000001", fields(50_000.0, 1_000_000.0))
        .unwrap();
    let before = engine.store.mutation_count();

    let result = engine
        .issue(&LoanRequest::new(c.customer_id, 200_000.0, 10.0, 2))
        .unwrap();

    assert_eq!(result.loan_id, None);
    assert!(!result.approved);
    assert_eq!(result.message, REJECTED_MESSAGE);
    assert_eq!(result.monthly_installment, 0.0);
    assert_eq!(result.state, IssuanceState::Rejected);
    assert_eq!(result.evaluation.corrected_rate, 16.0);
    assert_eq!(engine.store.mutation_count(), before);
    assert_eq!(engine.store.loan_count().unwrap(), 0);
}

#[test]
fn approved_issue_commits_loan_with_agreed_terms() {
    let engine = LoanEngine::build_test(today()).unwrap();
    let c = prime_customer(&engine.store, "9100000002");

    let result = engine
        .issue(&LoanRequest::new(c.customer_id, 200_000.0, 10.0, 2))
        .unwrap();

    assert!(result.approved);
    assert_eq!(result.state, IssuanceState::Issued);
    assert_eq!(result.message, APPROVED_MESSAGE);
    let loan_id = result.loan_id.expect("approved issue returns a loan ID");
    assert!(LoanIdRange::default().contains(loan_id));

    let loan = engine.store.find_loan(loan_id).unwrap();
    assert_eq!(loan.customer_id, c.customer_id);
    assert_eq!(loan.loan_amount, 200_000.0);
    assert_eq!(loan.tenure, 2);
    assert_eq!(loan.interest_rate, 10.0);
    assert_eq!(loan.monthly_payment, 9_228.99);
    assert_eq!(loan.monthly_payment, result.monthly_installment);
    assert_eq!(loan.emis_paid_on_time, 0);
    assert_eq!(loan.date_of_approval, today());
    assert_eq!(loan.end_date, NaiveDate::from_ymd_opt(2028, 10, 18).unwrap());
}

#[test]
fn issued_loan_counts_toward_next_score() {
    let engine = LoanEngine::build_test(today()).unwrap();
    let c = prime_customer(&engine.store, "9100000003");
    let before = engine.score(c.customer_id).unwrap();

    engine
        .issue(&LoanRequest::new(c.customer_id, 5_000.0, 12.0, 1))
        .unwrap();

    // +0.3 for the loan, +0.2 for this year's activity, +500 volume.
    let after = engine.score(c.customer_id).unwrap();
    assert!((after - before - 500.5).abs() < 1e-6, "{before} -> {after}");
}

#[test]
fn issue_rejects_bad_input_and_unknown_customer_without_writing() {
    let engine = LoanEngine::build_test(today()).unwrap();
    let before = engine.store.mutation_count();

    assert!(matches!(
        engine.issue(&LoanRequest::new(77, 1_000.0, 10.0, 1)),
        Err(LoanError::NotFound { entity: "Customer", id: 77 })
    ));
    assert!(matches!(
        engine.issue(&LoanRequest::new(77, 1_000.0, -3.0, 1)),
        Err(LoanError::InvalidInput(_))
    ));
    assert_eq!(engine.store.mutation_count(), before);
}

#[test]
fn imported_history_lets_a_new_customer_qualify() {
    let engine = LoanEngine::build_test(today()).unwrap();
    let c = engine
        .register_customer("9100000009", fields(50_000.0, 1_000_000.0))
        .unwrap();
    let request = LoanRequest::new(c.customer_id, 200_000.0, 10.0, 2);
    assert!(!engine.issue(&request).unwrap().approved);

    // 0.4*23 + 0.3*2 + 0.2*1 + 0.1*500 = 60
    let this_year = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let last_year = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
    let history = vec![
        Loan {
            loan_id: 7_001,
            loan_amount: 300.0,
            emis_paid_on_time: 13,
            date_of_approval: this_year,
            end_date: loan_end_date(this_year, 1),
            ..history_template(c.customer_id)
        },
        Loan {
            loan_id: 7_002,
            loan_amount: 200.0,
            emis_paid_on_time: 10,
            date_of_approval: last_year,
            end_date: loan_end_date(last_year, 1),
            ..history_template(c.customer_id)
        },
    ];
    let report = engine.import_loans(&history).unwrap();
    assert_eq!(report.imported, vec![7_001, 7_002]);
    assert!(report.skipped.is_empty());
    assert!((engine.score(c.customer_id).unwrap() - 60.0).abs() < 1e-9);

    let result = engine.issue(&request).unwrap();
    assert!(result.approved);
    assert_eq!(result.state, IssuanceState::Issued);
    assert_eq!(result.monthly_installment, 9_228.99);
    assert!(LoanIdRange::default().contains(result.loan_id.unwrap()));
}

fn history_template(customer_id: CustomerId) -> Loan {
    let approved = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    Loan {
        loan_id: 0,
        customer_id,
        loan_amount: 1_000.0,
        tenure: 1,
        interest_rate: 12.0,
        monthly_payment: 88.85,
        emis_paid_on_time: 0,
        date_of_approval: approved,
        end_date: loan_end_date(approved, 1),
    }
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let inverted = config(LoanIdRange::new(500, 100), 1);
    assert!(matches!(
        LoanEngine::with_clock(MemoryStore::new(), inverted, Box::new(FixedClock(today()))),
        Err(LoanError::InvalidInput(_))
    ));

    let nan_ratio = DeskConfig {
        affordability_ratio: f64::NAN,
        ..DeskConfig::default_test()
    };
    assert!(matches!(
        LoanEngine::new(MemoryStore::new(), nan_ratio),
        Err(LoanError::InvalidInput(_))
    ));

    let zero_attempts = DeskConfig {
        max_random_attempts: 0,
        ..DeskConfig::default_test()
    };
    assert!(LoanEngine::new(MemoryStore::new(), zero_attempts).is_err());
}

#[test]
fn concurrent_issue_on_one_engine_yields_unique_ids() {
    let store = MemoryStore::new();
    let c = prime_customer(&store, "9100000004");
    let customer_id = c.customer_id;
    let engine = Arc::new(LoanEngine::with_clock(
        store,
        config(LoanIdRange::new(1_000, 1_099), 5),
        Box::new(FixedClock(today())),
    )
    .unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..10)
                    .map(|_| {
                        engine
                            .issue(&LoanRequest::new(customer_id, 1_000.0, 10.0, 1))
                            .unwrap()
                            .loan_id
                            .unwrap()
                    })
                    .collect::<Vec<LoanId>>()
            })
        })
        .collect();

    let issued: Vec<LoanId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<LoanId> = issued.iter().copied().collect();

    assert_eq!(issued.len(), 80);
    assert_eq!(unique.len(), 80, "duplicate loan IDs issued");
    // 80 new loans plus the history loan.
    assert_eq!(engine.store.loan_count().unwrap(), 81);
}

#[test]
fn engines_with_identical_seeds_still_never_share_an_id() {
    // Every engine draws the same candidate sequence, so they collide on
    // purpose; only the store's uniqueness check keeps them apart.
    let store = Arc::new(MemoryStore::new());
    let c = prime_customer(store.as_ref(), "9100000005");
    let customer_id = c.customer_id;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let engine = LoanEngine::with_clock(
                    store,
                    config(LoanIdRange::new(2_000, 2_059), 99),
                    Box::new(FixedClock(today())),
                )
                .unwrap();
                (0..10)
                    .map(|_| {
                        engine
                            .issue(&LoanRequest::new(customer_id, 1_000.0, 10.0, 1))
                            .unwrap()
                            .loan_id
                            .unwrap()
                    })
                    .collect::<Vec<LoanId>>()
            })
        })
        .collect();

    let issued: Vec<LoanId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<LoanId> = issued.iter().copied().collect();

    // 60 requests, 60 IDs in range: every slot filled exactly once.
    assert_eq!(unique.len(), 60);
    assert_eq!(issued.len(), 60);
    assert!(unique.iter().all(|id| (2_000..=2_059).contains(id)));
}

#[test]
fn concurrent_issue_against_sqlite_yields_unique_ids() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.migrate().unwrap();
    let c = prime_customer(store.as_ref(), "9100000006");
    let customer_id = c.customer_id;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let engine = LoanEngine::with_clock(
                    store,
                    config(LoanIdRange::new(3_000, 3_049), 7),
                    Box::new(FixedClock(today())),
                )
                .unwrap();
                (0..10)
                    .map(|_| {
                        engine
                            .issue(&LoanRequest::new(customer_id, 1_000.0, 10.0, 1))
                            .unwrap()
                            .loan_id
                            .unwrap()
                    })
                    .collect::<Vec<LoanId>>()
            })
        })
        .collect();

    let issued: Vec<LoanId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<LoanId> = issued.iter().copied().collect();

    assert_eq!(unique.len(), 40);
    assert_eq!(store.loan_count().unwrap(), 41);
}

#[test]
fn saturated_range_reports_exhaustion_under_contention() {
    let store = Arc::new(MemoryStore::new());
    let c = prime_customer(store.as_ref(), "9100000007");
    let customer_id = c.customer_id;

    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let engine = LoanEngine::with_clock(
                    store,
                    config(LoanIdRange::new(500, 519), seed),
                    Box::new(FixedClock(today())),
                )
                .unwrap();
                (0..10)
                    .map(|_| engine.issue(&LoanRequest::new(customer_id, 1_000.0, 10.0, 1)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let issued = outcomes.iter().filter(|r| r.is_ok()).count();
    let exhausted = outcomes
        .iter()
        .filter(|r| matches!(r, Err(LoanError::IdSpaceExhausted { .. })))
        .count();

    assert_eq!(issued, 20);
    assert_eq!(exhausted, 20);
    assert_eq!(store.loan_count().unwrap(), 21);
}

/// Delegates to a MemoryStore but fails every loan insert with a
/// database error, counting the attempts.
struct FailingStore {
    inner: MemoryStore,
    create_calls: AtomicUsize,
}

impl RecordStore for FailingStore {
    fn find_customer(&self, customer_id: CustomerId) -> LoanResult<Customer> {
        self.inner.find_customer(customer_id)
    }
    fn find_customer_by_phone(&self, phone_number: &str) -> LoanResult<Option<Customer>> {
        self.inner.find_customer_by_phone(phone_number)
    }
    fn create_customer(&self, phone_number: &str, f: &CustomerFields) -> LoanResult<Customer> {
        self.inner.create_customer(phone_number, f)
    }
    fn upsert_customer(&self, phone_number: &str, f: &CustomerFields) -> LoanResult<Customer> {
        self.inner.upsert_customer(phone_number, f)
    }
    fn list_loans(&self, customer_id: CustomerId) -> LoanResult<Vec<Loan>> {
        self.inner.list_loans(customer_id)
    }
    fn find_loan(&self, loan_id: LoanId) -> LoanResult<Loan> {
        self.inner.find_loan(loan_id)
    }
    fn loan_id_exists(&self, loan_id: LoanId) -> LoanResult<bool> {
        self.inner.loan_id_exists(loan_id)
    }
    fn create_loan(&self, _loan: &Loan) -> LoanResult<Loan> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Err(LoanError::Store(rusqlite::Error::InvalidQuery))
    }
}

#[test]
fn store_failure_surfaces_without_retry() {
    let store = FailingStore {
        inner: MemoryStore::new(),
        create_calls: AtomicUsize::new(0),
    };
    let customer = store
        .create_customer("9100000008", &fields(10_000_000.0, 1_000_000_000.0))
        .unwrap();
    // Prime history written straight to the inner store: 0.3 + 0.1 * 1_000.
    let approved = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    store
        .inner
        .create_loan(&Loan {
            loan_id: 1,
            customer_id: customer.customer_id,
            loan_amount: 1_000.0,
            tenure: 1,
            interest_rate: 12.0,
            monthly_payment: 88.85,
            emis_paid_on_time: 0,
            date_of_approval: approved,
            end_date: loan_end_date(approved, 1),
        })
        .unwrap();

    let engine =
        LoanEngine::with_clock(store, DeskConfig::default_test(), Box::new(FixedClock(today())))
            .unwrap();
    let err = engine
        .issue(&LoanRequest::new(customer.customer_id, 1_000.0, 10.0, 1))
        .unwrap_err();

    assert!(err.is_store_failure(), "unexpected: {err}");
    assert_eq!(engine.store.create_calls.load(Ordering::SeqCst), 1);
}
