use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, MasterId, MinuteOfDay};
use crate::services::availability::AvailabilityError;
use crate::services::slot_tool::{self, BookingRequest};
use crate::state::AppState;

use super::availability::parse_date;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn parse_time(s: &str) -> Result<MinuteOfDay, AppError> {
    MinuteOfDay::parse(s.trim())
        .map_err(|e| AvailabilityError::InvalidInput(e.to_string()).into())
}

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    master_id: MasterId,
    service_id: Option<i64>,
    client_name: Option<String>,
    start: String,
    end: String,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            master_id: booking.master_id,
            service_id: booking.service_id,
            client_name: booking.client_name,
            start: booking.start.format("%Y-%m-%d %H:%M:%S").to_string(),
            end: booking.end.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBooking {
    pub master_id: MasterId,
    pub service_name: String,
    pub date: String,
    pub time: String,
    pub client_name: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateBooking>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(payload) = payload?;

    let request = BookingRequest {
        master_id: payload.master_id,
        service_name: payload.service_name,
        date: parse_date(&payload.date)?,
        time: parse_time(&payload.time)?,
        client_name: payload.client_name.filter(|n| !n.trim().is_empty()),
    };
    let booking = slot_tool::book_slot(&state, request, Local::now().naive_local()).await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

// GET /api/bookings?client=Name
#[derive(Deserialize)]
pub struct ClientQuery {
    pub client: String,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<ClientQuery>, QueryRejection>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Query(query) = query?;

    let bookings =
        slot_tool::upcoming_appointments(&state, &query.client, Local::now().naive_local())?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

// DELETE /api/bookings/:id
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Path(id) = id?;

    let booking = slot_tool::cancel_appointment(&state, &id)?;
    Ok(Json(booking.into()))
}

// PUT /api/bookings/:id
#[derive(Deserialize)]
pub struct RescheduleBooking {
    pub date: String,
    pub time: String,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<RescheduleBooking>, JsonRejection>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Path(id) = id?;
    let Json(payload) = payload?;

    let booking = slot_tool::reschedule_appointment(
        &state,
        &id,
        parse_date(&payload.date)?,
        parse_time(&payload.time)?,
        Local::now().naive_local(),
    )
    .await?;
    Ok(Json(booking.into()))
}
