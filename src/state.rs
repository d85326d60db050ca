use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::availability::{AvailabilityEngine, BookingsProvider, WorkHoursProvider};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub work_hours: Box<dyn WorkHoursProvider>,
    pub bookings: Box<dyn BookingsProvider>,
}

impl AppState {
    pub fn engine(&self) -> AvailabilityEngine<'_> {
        AvailabilityEngine::new(self.work_hours.as_ref(), self.bookings.as_ref())
    }
}
