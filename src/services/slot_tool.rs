use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tokio::time::Instant;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Booking, FreeInterval, Master, MasterId, MinuteOfDay, Service, TimeInterval, MINUTES_PER_DAY,
};
use crate::services::availability::{
    AvailabilityEngine, AvailabilityError, BookingsProvider, SearchOutcome,
};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotReply {
    Available {
        service: String,
        date: NaiveDate,
        intervals: Vec<FreeInterval>,
        summary: String,
    },
    NoMasters {
        service: String,
    },
    NoAvailability {
        service: String,
    },
    TimedOut {
        service: String,
    },
}

impl SlotReply {
    /// Text handed back to the language model as the tool result.
    pub fn to_message(&self) -> String {
        match self {
            SlotReply::Available { date, summary, .. } => format!("{date}: {summary}"),
            SlotReply::NoMasters { service } => {
                format!("No masters currently perform '{service}'.")
            }
            SlotReply::NoAvailability { service } => {
                format!("No free time for '{service}' in the coming days.")
            }
            SlotReply::TimedOut { service } => {
                format!("Could not check availability for '{service}' in time, please retry.")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub master_id: MasterId,
    pub service_name: String,
    pub date: NaiveDate,
    pub time: MinuteOfDay,
    pub client_name: Option<String>,
}

/// Renders intervals the way they are shown in chat: `10:15-13:45, 15:00-17:30`.
pub fn format_intervals(intervals: &[FreeInterval]) -> String {
    intervals
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Earliest bookable minute today: `now + lead`, rounded up to the next half hour.
pub fn lead_time_cutoff(now: NaiveDateTime, lead_minutes: i32) -> Option<MinuteOfDay> {
    let earliest = (now.hour() * 60 + now.minute()) as i32 + lead_minutes.max(0);
    let rounded = (earliest + 29) / 30 * 30;
    (rounded < MINUTES_PER_DAY).then(|| MinuteOfDay::new(rounded))
}

fn trim_before(
    intervals: Vec<FreeInterval>,
    cutoff: Option<MinuteOfDay>,
    duration_minutes: i32,
) -> Vec<FreeInterval> {
    let Some(cutoff) = cutoff else {
        return Vec::new();
    };
    intervals
        .into_iter()
        .map(|i| TimeInterval::new(i.start.max(cutoff), i.end))
        .filter(|i| i.len_minutes() >= duration_minutes)
        .collect()
}

pub async fn free_slots_for_service(
    state: &AppState,
    service_name: &str,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<SlotReply, AppError> {
    let today = now.date();
    if date < today {
        return Err(AppError::BadRequest(format!("{date} is in the past")));
    }

    let (service, masters) = {
        let conn = db::lock(&state.db)?;
        let service = queries::find_service_by_name(&conn, service_name)?
            .ok_or_else(|| AppError::NotFound(format!("service '{service_name}'")))?;
        let masters = queries::masters_for_service(&conn, service.id)?;
        (service, masters)
    };

    if masters.is_empty() {
        tracing::info!(service = %service.name, "no masters perform service");
        return Ok(SlotReply::NoMasters {
            service: service.name,
        });
    }
    let master_ids: Vec<MasterId> = masters.iter().map(|m| m.id).collect();

    let horizon = state.config.search_horizon_days;
    let last = date
        .checked_add_days(Days::new(u64::from(horizon)))
        .ok_or_else(|| AvailabilityError::InvalidInput(format!("{date} is out of range")))?;
    let deadline = Instant::now() + Duration::from_millis(state.config.search_deadline_ms);
    let engine = state.engine();

    let mut from = date;
    loop {
        let remaining = (last - from).num_days() as u32;
        let outcome = engine
            .find_availability_within(from, service.duration_minutes, &master_ids, remaining, deadline)
            .await?;

        let day = match outcome {
            SearchOutcome::Found(day) => day,
            SearchOutcome::NotFound => {
                return Ok(SlotReply::NoAvailability {
                    service: service.name,
                })
            }
            SearchOutcome::TimedOut { last_checked } => {
                tracing::warn!(service = %service.name, ?last_checked, "slot search timed out");
                return Ok(SlotReply::TimedOut {
                    service: service.name,
                });
            }
        };

        let intervals = if day.date == today {
            trim_before(
                day.intervals,
                lead_time_cutoff(now, state.config.same_day_lead_minutes),
                service.duration_minutes,
            )
        } else {
            day.intervals
        };

        if !intervals.is_empty() {
            return Ok(SlotReply::Available {
                summary: format_intervals(&intervals),
                service: service.name,
                date: day.date,
                intervals,
            });
        }
        if day.date >= last {
            return Ok(SlotReply::NoAvailability {
                service: service.name,
            });
        }
        from = day.date.succ_opt().ok_or_else(|| {
            AvailabilityError::InvalidInput(format!("{} is out of range", day.date))
        })?;
    }
}

/// Hides one appointment from the wrapped provider, so a booking can be
/// checked against the timeline as if it had already been moved.
struct ExcludingBookings<'a> {
    inner: &'a dyn BookingsProvider,
    exclude_id: &'a str,
}

#[async_trait]
impl BookingsProvider for ExcludingBookings<'_> {
    async fn bookings(
        &self,
        date: NaiveDate,
        master_ids: &[MasterId],
    ) -> anyhow::Result<Vec<Booking>> {
        let mut bookings = self.inner.bookings(date, master_ids).await?;
        bookings.retain(|b| b.id != self.exclude_id);
        Ok(bookings)
    }
}

/// Start and end of a `duration_minutes` appointment at `time` on `date`, rejecting the past.
fn appointment_bounds(
    date: NaiveDate,
    time: MinuteOfDay,
    duration_minutes: i32,
    now: NaiveDateTime,
) -> Result<(NaiveDateTime, NaiveDateTime), AppError> {
    let start_time = time
        .to_naive_time()
        .ok_or_else(|| AppError::BadRequest(format!("invalid time {time}")))?;
    let start = date.and_time(start_time);
    if start < now {
        return Err(AppError::BadRequest(format!("{start} is in the past")));
    }
    Ok((start, start + chrono::Duration::minutes(i64::from(duration_minutes))))
}

async fn ensure_free(
    engine: &AvailabilityEngine<'_>,
    master_id: MasterId,
    date: NaiveDate,
    time: MinuteOfDay,
    duration_minutes: i32,
) -> Result<(), AppError> {
    let requested = TimeInterval::new(time, time.plus(duration_minutes));
    let free = engine
        .compute_free_intervals(date, duration_minutes, &[master_id])
        .await?;
    if !free.iter().any(|interval| interval.contains(&requested)) {
        return Err(AppError::Conflict(format!(
            "{requested} on {date} is not free for master {master_id}"
        )));
    }
    Ok(())
}

pub async fn book_slot(
    state: &AppState,
    request: BookingRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let service = {
        let conn = db::lock(&state.db)?;
        let service = queries::find_service_by_name(&conn, &request.service_name)?
            .ok_or_else(|| AppError::NotFound(format!("service '{}'", request.service_name)))?;
        let qualified = queries::masters_for_service(&conn, service.id)?
            .iter()
            .any(|m| m.id == request.master_id);
        if !qualified {
            return Err(AppError::BadRequest(format!(
                "master {} does not perform '{}'",
                request.master_id, service.name
            )));
        }
        service
    };

    let (start, end) = appointment_bounds(request.date, request.time, service.duration_minutes, now)?;
    ensure_free(
        &state.engine(),
        request.master_id,
        request.date,
        request.time,
        service.duration_minutes,
    )
    .await?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        master_id: request.master_id,
        service_id: Some(service.id),
        client_name: request.client_name,
        start,
        end,
    };

    {
        let conn = db::lock(&state.db)?;
        if let Some(existing) =
            queries::find_overlapping_appointment(&conn, booking.master_id, &start, &end, None)?
        {
            return Err(AppError::Conflict(format!(
                "overlaps appointment {} for master {}",
                existing.id, existing.master_id
            )));
        }
        queries::create_appointment(&conn, &booking)?;
    }

    tracing::info!(
        booking_id = %booking.id,
        master_id = booking.master_id,
        service = %service.name,
        start = %booking.start,
        "appointment booked"
    );
    Ok(booking)
}

pub fn list_services(state: &AppState) -> Result<Vec<Service>, AppError> {
    let conn = db::lock(&state.db)?;
    Ok(queries::list_services(&conn)?)
}

/// The service named `service_name` and the masters who perform it.
pub fn masters_for_service(
    state: &AppState,
    service_name: &str,
) -> Result<(Service, Vec<Master>), AppError> {
    let conn = db::lock(&state.db)?;
    let service = queries::find_service_by_name(&conn, service_name)?
        .ok_or_else(|| AppError::NotFound(format!("service '{service_name}'")))?;
    let masters = queries::masters_for_service(&conn, service.id)?;
    Ok((service, masters))
}

pub fn upcoming_appointments(
    state: &AppState,
    client_name: &str,
    now: NaiveDateTime,
) -> Result<Vec<Booking>, AppError> {
    if client_name.trim().is_empty() {
        return Err(AppError::BadRequest("client name is required".to_string()));
    }
    let conn = db::lock(&state.db)?;
    Ok(queries::get_upcoming_appointments_for_client(&conn, client_name, &now)?)
}

pub fn cancel_appointment(state: &AppState, appointment_id: &str) -> Result<Booking, AppError> {
    let conn = db::lock(&state.db)?;
    let booking = queries::get_appointment_by_id(&conn, appointment_id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment '{appointment_id}'")))?;
    queries::delete_appointment(&conn, appointment_id)?;

    tracing::info!(
        booking_id = %booking.id,
        master_id = booking.master_id,
        start = %booking.start,
        "appointment cancelled"
    );
    Ok(booking)
}

/// Moves an appointment to `date` at `time`, keeping its master and length.
pub async fn reschedule_appointment(
    state: &AppState,
    appointment_id: &str,
    date: NaiveDate,
    time: MinuteOfDay,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let (current, duration_minutes) = {
        let conn = db::lock(&state.db)?;
        let current = queries::get_appointment_by_id(&conn, appointment_id)?
            .ok_or_else(|| AppError::NotFound(format!("appointment '{appointment_id}'")))?;
        let service = match current.service_id {
            Some(id) => queries::get_service_by_id(&conn, id)?,
            None => None,
        };
        let duration = match service {
            Some(service) => service.duration_minutes,
            None => (current.end - current.start).num_minutes() as i32,
        };
        (current, duration)
    };

    let (start, end) = appointment_bounds(date, time, duration_minutes, now)?;
    let bookings = ExcludingBookings {
        inner: state.bookings.as_ref(),
        exclude_id: &current.id,
    };
    let engine = AvailabilityEngine::new(state.work_hours.as_ref(), &bookings);
    ensure_free(&engine, current.master_id, date, time, duration_minutes).await?;

    {
        let conn = db::lock(&state.db)?;
        if let Some(existing) = queries::find_overlapping_appointment(
            &conn,
            current.master_id,
            &start,
            &end,
            Some(&current.id),
        )? {
            return Err(AppError::Conflict(format!(
                "overlaps appointment {} for master {}",
                existing.id, existing.master_id
            )));
        }
        if !queries::update_appointment_time(&conn, &current.id, &start, &end)? {
            return Err(AppError::NotFound(format!("appointment '{appointment_id}'")));
        }
    }

    tracing::info!(
        booking_id = %current.id,
        master_id = current.master_id,
        from = %current.start,
        to = %start,
        "appointment rescheduled"
    );
    Ok(Booking {
        start,
        end,
        ..current
    })
}
