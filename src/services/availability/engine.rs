use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};

use super::{AvailabilityError, BookingsProvider, WorkHoursProvider};
use crate::models::{FreeInterval, MasterId, MinuteOfDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    WorkStart,
    WorkEnd,
    BookingStart,
    BookingEnd,
}

impl EventKind {
    /// Change in the number of masters available for booking.
    pub fn delta(self) -> i32 {
        match self {
            EventKind::WorkStart | EventKind::BookingEnd => 1,
            EventKind::WorkEnd | EventKind::BookingStart => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEvent {
    pub at: i32,
    pub kind: EventKind,
}

impl TimelineEvent {
    fn new(at: i32, kind: EventKind) -> Self {
        Self { at, kind }
    }
}

/// Computes free intervals for a set of masters on one date from the
/// work hours and bookings its providers return.
pub struct AvailabilityEngine<'a> {
    work_hours: &'a dyn WorkHoursProvider,
    bookings: &'a dyn BookingsProvider,
}

impl<'a> AvailabilityEngine<'a> {
    pub fn new(work_hours: &'a dyn WorkHoursProvider, bookings: &'a dyn BookingsProvider) -> Self {
        Self {
            work_hours,
            bookings,
        }
    }

    pub async fn compute_free_intervals(
        &self,
        date: NaiveDate,
        duration_minutes: i32,
        master_ids: &[MasterId],
    ) -> Result<Vec<FreeInterval>, AvailabilityError> {
        if duration_minutes <= 0 {
            return Err(AvailabilityError::InvalidInput(format!(
                "duration must be positive, got {duration_minutes}"
            )));
        }
        if master_ids.is_empty() {
            return Ok(Vec::new());
        }

        let masters: Vec<MasterId> = master_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut events = Vec::with_capacity(masters.len() * 2);
        for &master_id in &masters {
            let window = self
                .work_hours
                .work_window(date, master_id)
                .await
                .map_err(AvailabilityError::Provider)?;

            let Some(window) = window else {
                continue;
            };
            if !window.is_well_formed() {
                return Err(AvailabilityError::MalformedSchedule(format!(
                    "work window {}-{} for master {master_id} on {date} does not end after it starts",
                    window.start.format("%H:%M"),
                    window.end.format("%H:%M"),
                )));
            }

            let interval = window.as_interval();
            events.push(TimelineEvent::new(interval.start.minutes(), EventKind::WorkStart));
            events.push(TimelineEvent::new(interval.end.minutes(), EventKind::WorkEnd));
        }

        let bookings = self
            .bookings
            .bookings(date, &masters)
            .await
            .map_err(AvailabilityError::Provider)?;

        let midnight = date.and_time(chrono::NaiveTime::MIN);
        let mut relevant = 0usize;
        for booking in &bookings {
            if booking.start.date() != date || masters.binary_search(&booking.master_id).is_err() {
                continue;
            }
            if booking.start >= booking.end {
                return Err(AvailabilityError::MalformedSchedule(format!(
                    "booking {} for master {} starts at {} but ends at {}",
                    booking.id, booking.master_id, booking.start, booking.end
                )));
            }
            relevant += 1;
            events.push(TimelineEvent::new(
                minutes_since(&midnight, &booking.start),
                EventKind::BookingStart,
            ));
            events.push(TimelineEvent::new(
                minutes_since(&midnight, &booking.end),
                EventKind::BookingEnd,
            ));
        }

        let free = sweep(events)?;
        let total = free.len();
        let fitting: Vec<FreeInterval> = free
            .into_iter()
            .filter(|interval| interval.len_minutes() >= duration_minutes)
            .collect();

        tracing::debug!(
            %date,
            masters = masters.len(),
            bookings = relevant,
            free = total,
            fitting = fitting.len(),
            "computed free intervals"
        );

        Ok(fitting)
    }
}

fn minutes_since(midnight: &NaiveDateTime, at: &NaiveDateTime) -> i32 {
    (*at - *midnight).num_minutes() as i32
}

/// Scans the timeline and emits the ranges during which at least one master is available.
///
/// Events sharing a timestamp are applied as one group, so their order is irrelevant.
pub fn sweep(events: Vec<TimelineEvent>) -> Result<Vec<FreeInterval>, AvailabilityError> {
    let mut deltas: BTreeMap<i32, i32> = BTreeMap::new();
    for event in events {
        *deltas.entry(event.at).or_default() += event.kind.delta();
    }

    let mut free = Vec::new();
    let mut available = 0;
    let mut open: Option<i32> = None;

    for (at, delta) in deltas {
        let was_free = available > 0;
        available += delta;
        let is_free = available > 0;

        match (was_free, is_free) {
            (false, true) => open = Some(at),
            (true, false) => {
                if let Some(start) = open.take() {
                    free.push(FreeInterval::new(MinuteOfDay::new(start), MinuteOfDay::new(at)));
                }
            }
            _ => {}
        }
    }

    if let Some(start) = open {
        return Err(AvailabilityError::MalformedSchedule(format!(
            "availability opened at {} never closes ({available} masters still free at end of timeline)",
            MinuteOfDay::new(start)
        )));
    }

    Ok(free)
}
