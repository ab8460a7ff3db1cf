//! Wall-clock seam for rotation decisions.
//!
//! Rotation keys are derived from local calendar fields, so the file sink
//! reads time through this trait instead of calling `Local::now()` inline.
//! Production code uses [`SystemClock`]; tests drive rotation boundaries
//! with a hand-rolled clock.

use chrono::{DateTime, Local};

/// Source of "now" for rotation checks and header timestamps.
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
