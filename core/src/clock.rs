//! Desk clock: the single source of "today".
//!
//! RULE: Nothing in the engine calls the system date directly.
//! Scoring (current-year activity) and issuance (approval and end
//! dates) both read the date through a Clock so tests can pin it.

use chrono::{Datelike, NaiveDate};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    fn current_year(&self) -> i32 {
        self.today().year()
    }
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock frozen on one date (tests and replays).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
