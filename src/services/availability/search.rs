use chrono::{Days, NaiveDate};
use serde::Serialize;
use tokio::time::Instant;

use super::{AvailabilityEngine, AvailabilityError};
use crate::models::{FreeInterval, MasterId};

pub const DEFAULT_HORIZON_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub intervals: Vec<FreeInterval>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(DayAvailability),
    /// Every date in the horizon was checked and none had a long enough interval.
    NotFound,
    /// The deadline passed before the horizon was exhausted.
    TimedOut { last_checked: Option<NaiveDate> },
}

impl AvailabilityEngine<'_> {
    /// Returns the first date from `start_date` through `start_date + max_days_ahead`
    /// with at least one fitting interval, or `None` once the horizon is exhausted.
    pub async fn find_availability(
        &self,
        start_date: NaiveDate,
        duration_minutes: i32,
        master_ids: &[MasterId],
        max_days_ahead: u32,
    ) -> Result<Option<DayAvailability>, AvailabilityError> {
        match self
            .scan(start_date, duration_minutes, master_ids, max_days_ahead, None)
            .await?
        {
            SearchOutcome::Found(day) => Ok(Some(day)),
            // Without a deadline the scan never times out.
            SearchOutcome::NotFound | SearchOutcome::TimedOut { .. } => Ok(None),
        }
    }

    /// Same walk as [`find_availability`](Self::find_availability), abandoned once `deadline` passes.
    pub async fn find_availability_within(
        &self,
        start_date: NaiveDate,
        duration_minutes: i32,
        master_ids: &[MasterId],
        max_days_ahead: u32,
        deadline: Instant,
    ) -> Result<SearchOutcome, AvailabilityError> {
        self.scan(
            start_date,
            duration_minutes,
            master_ids,
            max_days_ahead,
            Some(deadline),
        )
        .await
    }

    async fn scan(
        &self,
        start_date: NaiveDate,
        duration_minutes: i32,
        master_ids: &[MasterId],
        max_days_ahead: u32,
        deadline: Option<Instant>,
    ) -> Result<SearchOutcome, AvailabilityError> {
        if master_ids.is_empty() {
            return Err(AvailabilityError::InvalidInput(
                "at least one master is required".to_string(),
            ));
        }
        if duration_minutes <= 0 {
            return Err(AvailabilityError::InvalidInput(format!(
                "duration must be positive, got {duration_minutes}"
            )));
        }

        let mut last_checked = None;
        for offset in 0..=max_days_ahead {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::warn!(%start_date, ?last_checked, "availability search deadline passed");
                return Ok(SearchOutcome::TimedOut { last_checked });
            }

            let date = start_date
                .checked_add_days(Days::new(u64::from(offset)))
                .ok_or_else(|| {
                    AvailabilityError::InvalidInput(format!(
                        "{start_date} + {offset} days is out of range"
                    ))
                })?;

            let day = self.compute_free_intervals(date, duration_minutes, master_ids);
            let intervals = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, day).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(%start_date, ?last_checked, "availability search timed out");
                        return Ok(SearchOutcome::TimedOut { last_checked });
                    }
                },
                None => day.await?,
            };
            last_checked = Some(date);

            if !intervals.is_empty() {
                tracing::info!(
                    %start_date,
                    %date,
                    intervals = intervals.len(),
                    "found availability"
                );
                return Ok(SearchOutcome::Found(DayAvailability { date, intervals }));
            }
        }

        tracing::info!(%start_date, max_days_ahead, "no availability within horizon");
        Ok(SearchOutcome::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::MinuteOfDay;
    use crate::services::availability::fake::{booking, d, FakeSchedule};

    fn iv(start: &str, end: &str) -> FreeInterval {
        FreeInterval::new(
            MinuteOfDay::parse(start).unwrap(),
            MinuteOfDay::parse(end).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_returns_start_date_when_free() {
        let schedule = FakeSchedule::new().works(1, "2025-06-16", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);
        let found = engine
            .find_availability(d("2025-06-16"), 60, &[1], DEFAULT_HORIZON_DAYS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.date, d("2025-06-16"));
        assert_eq!(found.intervals, vec![iv("09:00", "18:00")]);
    }

    #[tokio::test]
    async fn test_walks_forward_to_first_free_day() {
        let schedule = FakeSchedule::new()
            .works(1, "2025-06-16", "09:00", "18:00")
            .booked(booking(1, "2025-06-16 09:00", "2025-06-16 18:00"))
            .works(1, "2025-06-17", "09:00", "10:00")
            .works(1, "2025-06-19", "12:00", "15:00")
            .works(1, "2025-06-20", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);

        let found = engine
            .find_availability(d("2025-06-16"), 90, &[1], 7)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.date, d("2025-06-19"));
        assert_eq!(found.intervals, vec![iv("12:00", "15:00")]);
    }

    #[tokio::test]
    async fn test_horizon_exhausted_is_none() {
        let schedule = FakeSchedule::new().works(1, "2025-06-30", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);

        let found = engine
            .find_availability(d("2025-06-16"), 60, &[1], 7)
            .await
            .unwrap();
        assert!(found.is_none());
        // One work-hours and one bookings lookup per day, original date plus seven more.
        assert_eq!(schedule.calls(), 16);
    }

    #[tokio::test]
    async fn test_zero_horizon_checks_only_start_date() {
        let schedule = FakeSchedule::new().works(1, "2025-06-17", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);

        let found = engine
            .find_availability(d("2025-06-16"), 60, &[1], 0)
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(schedule.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_masters_rejected() {
        let schedule = FakeSchedule::new();
        let engine = AvailabilityEngine::new(&schedule, &schedule);
        let err = engine
            .find_availability(d("2025-06-16"), 60, &[], 7)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::InvalidInput(_)));
        assert_eq!(schedule.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_skipped() {
        let schedule = FakeSchedule::new()
            .failing_on("2025-06-17")
            .works(1, "2025-06-18", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);

        let err = engine
            .find_availability(d("2025-06-16"), 60, &[1], 7)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::Provider(_)));
    }

    #[tokio::test]
    async fn test_within_deadline_finds_result() {
        let schedule = FakeSchedule::new().works(1, "2025-06-18", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);
        let deadline = Instant::now() + Duration::from_secs(5);

        let outcome = engine
            .find_availability_within(d("2025-06-16"), 60, &[1], 7, deadline)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::Found(DayAvailability {
                date: d("2025-06-18"),
                intervals: vec![iv("09:00", "18:00")],
            })
        );
    }

    #[tokio::test]
    async fn test_within_deadline_not_found_is_distinct_from_timeout() {
        let schedule = FakeSchedule::new();
        let engine = AvailabilityEngine::new(&schedule, &schedule);
        let deadline = Instant::now() + Duration::from_secs(5);

        let outcome = engine
            .find_availability_within(d("2025-06-16"), 60, &[1], 3, deadline)
            .await
            .unwrap();
        assert_eq!(outcome, SearchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let schedule = FakeSchedule::new().works(1, "2025-06-16", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);
        let deadline = Instant::now();

        let outcome = engine
            .find_availability_within(d("2025-06-16"), 60, &[1], 7, deadline)
            .await
            .unwrap();
        assert_eq!(outcome, SearchOutcome::TimedOut { last_checked: None });
        assert_eq!(schedule.calls(), 0);
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out_after_checked_day() {
        let schedule = FakeSchedule::new()
            .works(1, "2025-06-16", "09:00", "09:30")
            .stalling_on("2025-06-17")
            .works(1, "2025-06-17", "09:00", "18:00");
        let engine = AvailabilityEngine::new(&schedule, &schedule);
        let deadline = Instant::now() + Duration::from_millis(200);

        let outcome = engine
            .find_availability_within(d("2025-06-16"), 60, &[1], 7, deadline)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::TimedOut {
                last_checked: Some(d("2025-06-16"))
            }
        );
        assert!(Instant::now() < deadline + Duration::from_secs(5));
    }
}
