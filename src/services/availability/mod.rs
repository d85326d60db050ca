pub mod engine;
pub mod search;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Booking, MasterId, WorkWindow};

pub use engine::AvailabilityEngine;
pub use search::{DayAvailability, SearchOutcome};

/// Looks up a master's working hours for a date. `None` means the master is off.
#[async_trait]
pub trait WorkHoursProvider: Send + Sync {
    async fn work_window(
        &self,
        date: NaiveDate,
        master_id: MasterId,
    ) -> anyhow::Result<Option<WorkWindow>>;
}

/// Returns bookings starting on `date` (local time) for any of `master_ids`, in no particular order.
#[async_trait]
pub trait BookingsProvider: Send + Sync {
    async fn bookings(
        &self,
        date: NaiveDate,
        master_ids: &[MasterId],
    ) -> anyhow::Result<Vec<Booking>>;
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("schedule provider failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("malformed schedule data: {0}")]
    MalformedSchedule(String),
}
