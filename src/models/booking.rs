use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::MasterId;

/// A committed appointment occupying one master from `start` to `end`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub master_id: MasterId,
    pub service_id: Option<i64>,
    pub client_name: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}
