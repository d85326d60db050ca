use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::models::{Booking, MasterId, WorkWindow};
use crate::services::availability::{BookingsProvider, WorkHoursProvider};

/// Schedule provider reading `master_schedules` and `appointments`.
#[derive(Clone)]
pub struct SqliteSchedule {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSchedule {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkHoursProvider for SqliteSchedule {
    async fn work_window(
        &self,
        date: NaiveDate,
        master_id: MasterId,
    ) -> anyhow::Result<Option<WorkWindow>> {
        let row = {
            let conn = db::lock(&self.db)?;
            queries::get_master_schedule(&conn, master_id, date)?
        };

        let Some((start, end)) = row else {
            return Ok(None);
        };

        // An unreadable row means the master is not working that day.
        match (
            queries::parse_schedule_time(&start),
            queries::parse_schedule_time(&end),
        ) {
            (Ok(start), Ok(end)) => Ok(Some(WorkWindow::new(start, end))),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(master_id, %date, error = %e, "ignoring unreadable schedule row");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl BookingsProvider for SqliteSchedule {
    async fn bookings(
        &self,
        date: NaiveDate,
        master_ids: &[MasterId],
    ) -> anyhow::Result<Vec<Booking>> {
        let conn = db::lock(&self.db)?;
        queries::get_appointments_for_masters_on_date(&conn, master_ids, date)
    }
}
