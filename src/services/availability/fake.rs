use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{BookingsProvider, WorkHoursProvider};
use crate::models::{Booking, MasterId, WorkWindow};

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn tm(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

pub fn booking(master_id: MasterId, start: &str, end: &str) -> Booking {
    Booking {
        id: format!("b-{master_id}-{start}"),
        master_id,
        service_id: None,
        client_name: None,
        start: dt(start),
        end: dt(end),
    }
}

/// In-memory schedule that counts provider calls and can fail or stall on chosen dates.
#[derive(Default)]
pub struct FakeSchedule {
    windows: HashMap<(NaiveDate, MasterId), WorkWindow>,
    bookings: Vec<Booking>,
    failing: HashSet<NaiveDate>,
    stalling: HashSet<NaiveDate>,
    calls: AtomicUsize,
}

impl FakeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn works(mut self, master_id: MasterId, date: &str, start: &str, end: &str) -> Self {
        self.windows
            .insert((d(date), master_id), WorkWindow::new(tm(start), tm(end)));
        self
    }

    pub fn booked(mut self, booking: Booking) -> Self {
        self.bookings.push(booking);
        self
    }

    pub fn failing_on(mut self, date: &str) -> Self {
        self.failing.insert(d(date));
        self
    }

    /// Work-hours lookups for `date` hang for a minute before answering.
    pub fn stalling_on(mut self, date: &str) -> Self {
        self.stalling.insert(d(date));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkHoursProvider for FakeSchedule {
    async fn work_window(
        &self,
        date: NaiveDate,
        master_id: MasterId,
    ) -> anyhow::Result<Option<WorkWindow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&date) {
            anyhow::bail!("schedule lookup failed for {date}");
        }
        if self.stalling.contains(&date) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(self.windows.get(&(date, master_id)).copied())
    }
}

#[async_trait]
impl BookingsProvider for FakeSchedule {
    async fn bookings(
        &self,
        date: NaiveDate,
        master_ids: &[MasterId],
    ) -> anyhow::Result<Vec<Booking>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&date) {
            anyhow::bail!("bookings lookup failed for {date}");
        }
        // Hand back everything for the masters, other dates included; the engine filters.
        Ok(self
            .bookings
            .iter()
            .filter(|b| master_ids.contains(&b.master_id))
            .cloned()
            .collect())
    }
}
