use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::errors::AppError;
use crate::models::{FreeInterval, Master, MasterId, Service};
use crate::services::availability::{AvailabilityError, SearchOutcome};
use crate::services::slot_tool::{self, SlotReply};
use crate::state::AppState;

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        AvailabilityError::InvalidInput(format!("malformed date '{s}', expected YYYY-MM-DD")).into()
    })
}

fn parse_master_ids(s: &str) -> Result<Vec<MasterId>, AppError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<MasterId>().map_err(|_| {
                AvailabilityError::InvalidInput(format!("malformed master id '{part}'")).into()
            })
        })
        .collect()
}

// GET /api/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub duration: i32,
    #[serde(default)]
    pub masters: String,
    pub days: Option<u32>,
}

/// `{"found":true,"date":..,"intervals":[..]}` or just `{"found":false}`.
#[derive(Serialize)]
pub struct AvailabilityResponse {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intervals: Option<Vec<FreeInterval>>,
}

impl AvailabilityResponse {
    fn found(date: NaiveDate, intervals: Vec<FreeInterval>) -> Self {
        Self {
            found: true,
            date: Some(date),
            intervals: Some(intervals),
        }
    }

    fn not_found() -> Self {
        Self {
            found: false,
            date: None,
            intervals: None,
        }
    }
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let Query(query) = query?;
    let date = parse_date(&query.date)?;
    let master_ids = parse_master_ids(&query.masters)?;
    let engine = state.engine();

    let Some(days) = query.days else {
        let intervals = engine
            .compute_free_intervals(date, query.duration, &master_ids)
            .await?;
        if intervals.is_empty() {
            return Ok(Json(AvailabilityResponse::not_found()));
        }
        return Ok(Json(AvailabilityResponse::found(date, intervals)));
    };

    let deadline = Instant::now() + Duration::from_millis(state.config.search_deadline_ms);
    match engine
        .find_availability_within(date, query.duration, &master_ids, days, deadline)
        .await?
    {
        SearchOutcome::Found(day) => Ok(Json(AvailabilityResponse::found(day.date, day.intervals))),
        SearchOutcome::NotFound => Ok(Json(AvailabilityResponse::not_found())),
        SearchOutcome::TimedOut { .. } => Err(AppError::Timeout),
    }
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Service>>, AppError> {
    Ok(Json(slot_tool::list_services(&state)?))
}

// GET /api/services/:name/masters
#[derive(Serialize)]
pub struct ServiceMastersResponse {
    service: Service,
    masters: Vec<Master>,
}

pub async fn get_service_masters(
    State(state): State<Arc<AppState>>,
    service_name: Result<Path<String>, PathRejection>,
) -> Result<Json<ServiceMastersResponse>, AppError> {
    let Path(service_name) = service_name?;
    let (service, masters) = slot_tool::masters_for_service(&state, &service_name)?;
    Ok(Json(ServiceMastersResponse { service, masters }))
}

// GET /api/services/:name/slots
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    #[serde(flatten)]
    reply: SlotReply,
    message: String,
}

pub async fn get_service_slots(
    State(state): State<Arc<AppState>>,
    service_name: Result<Path<String>, PathRejection>,
    query: Result<Query<SlotsQuery>, QueryRejection>,
) -> Result<Json<SlotsResponse>, AppError> {
    let Path(service_name) = service_name?;
    let Query(query) = query?;
    let now = Local::now().naive_local();
    let date = match query.date.as_deref() {
        Some(s) => parse_date(s)?,
        None => now.date(),
    };

    let reply = slot_tool::free_slots_for_service(&state, &service_name, date, now).await?;
    Ok(Json(SlotsResponse {
        message: reply.to_message(),
        reply,
    }))
}
