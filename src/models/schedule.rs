use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::{MinuteOfDay, TimeInterval};

/// A master's working hours on one calendar date.
///
/// Providers hand these over unvalidated; the engine rejects `end <= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }

    pub fn as_interval(&self) -> TimeInterval {
        TimeInterval::new(MinuteOfDay::from(self.start), MinuteOfDay::from(self.end))
    }
}
