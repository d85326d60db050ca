use serde::{Deserialize, Serialize};

use super::MasterId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Master {
    pub id: MasterId,
    pub name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub duration_minutes: i32,
}
