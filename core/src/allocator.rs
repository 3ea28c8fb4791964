//! Loan ID allocation.
//!
//! RULE: An identifier is only "free" once the store has accepted a
//! record under it. `loan_id_exists` is used as a cheap pre-filter; the
//! store's uniqueness constraint is the authority, and a constraint
//! violation on commit just means another writer got there first.
//!
//! Allocation draws random candidates from the configured range, up to
//! `max_random_attempts`. If all of those collide, it walks the whole
//! range once from a random start. Only a full walk with no free slot
//! reports IdSpaceExhausted.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Mutex;

use crate::{
    config::{DeskConfig, LoanIdRange},
    error::{LoanError, LoanResult},
    loan::Loan,
    store::RecordStore,
    types::LoanId,
};

pub struct LoanIdAllocator {
    range: LoanIdRange,
    max_random_attempts: u32,
    rng: Mutex<Pcg64Mcg>,
}

impl LoanIdAllocator {
    /// `seed` None draws the seed from the thread RNG.
    pub fn new(range: LoanIdRange, max_random_attempts: u32, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        Self {
            range,
            max_random_attempts: max_random_attempts.max(1),
            rng: Mutex::new(Pcg64Mcg::seed_from_u64(seed)),
        }
    }

    pub fn from_config(config: &DeskConfig) -> Self {
        Self::new(config.loan_id_range, config.max_random_attempts, config.id_seed)
    }

    pub fn range(&self) -> LoanIdRange {
        self.range
    }

    fn next_candidate(&self) -> LoanResult<LoanId> {
        if self.range.min > self.range.max {
            return Err(LoanError::invalid(format!(
                "loan ID range {}..={} is empty",
                self.range.min, self.range.max
            )));
        }
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("allocator rng mutex poisoned"))?;
        Ok(rng.gen_range(self.range.min..=self.range.max))
    }

    /// Commit `template` under a freshly allocated loan ID and return the
    /// stored record. The template's own `loan_id` is ignored.
    pub fn commit<S: RecordStore + ?Sized>(&self, store: &S, template: &Loan) -> LoanResult<Loan> {
        let mut attempts: u64 = 0;

        for _ in 0..self.max_random_attempts {
            let candidate = self.next_candidate()?;
            attempts += 1;
            if let Some(loan) = self.try_commit(store, template, candidate)? {
                return Ok(loan);
            }
        }

        log::warn!(
            "allocator: {} random draws collided in {}..={}, probing the range",
            self.max_random_attempts,
            self.range.min,
            self.range.max
        );

        let size = self.range.size();
        let start = (self.next_candidate()? - self.range.min) as u64;
        for offset in 0..size {
            let candidate = self.range.min + ((start + offset) % size) as LoanId;
            attempts += 1;
            if let Some(loan) = self.try_commit(store, template, candidate)? {
                return Ok(loan);
            }
        }

        Err(LoanError::IdSpaceExhausted {
            min: self.range.min,
            max: self.range.max,
            attempts,
        })
    }

    /// Ok(None) when `candidate` is taken; store failures propagate.
    fn try_commit<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        template: &Loan,
        candidate: LoanId,
    ) -> LoanResult<Option<Loan>> {
        if store.loan_id_exists(candidate)? {
            log::debug!("allocator: loan ID {candidate} already taken");
            return Ok(None);
        }
        let loan = Loan {
            loan_id: candidate,
            ..template.clone()
        };
        match store.create_loan(&loan) {
            Ok(stored) => Ok(Some(stored)),
            Err(LoanError::ConstraintViolation { field: "loan_id", .. }) => {
                log::warn!("allocator: lost race for loan ID {candidate}, retrying");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
