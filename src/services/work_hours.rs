use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::AppConfig;
use crate::models::{MasterId, WorkWindow};
use crate::services::availability::WorkHoursProvider;

/// Fixed weekly schedule: the same window every day except one rest day.
///
/// Individual masters can be given a different window, or a day off, per weekday.
#[derive(Debug, Clone)]
pub struct WeeklyWorkHours {
    window: WorkWindow,
    rest_day: Weekday,
    overrides: HashMap<(MasterId, Weekday), Option<WorkWindow>>,
}

impl WeeklyWorkHours {
    pub fn new(window: WorkWindow, rest_day: Weekday) -> Self {
        Self {
            window,
            rest_day,
            overrides: HashMap::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        config.weekly_overrides.iter().fold(
            Self::new(
                WorkWindow::new(config.work_day_start, config.work_day_end),
                config.rest_day,
            ),
            |hours, o| {
                let window = o.hours.map(|(start, end)| WorkWindow::new(start, end));
                hours.with_override(o.master_id, o.weekday, window)
            },
        )
    }

    pub fn with_override(
        mut self,
        master_id: MasterId,
        weekday: Weekday,
        window: Option<WorkWindow>,
    ) -> Self {
        self.overrides.insert((master_id, weekday), window);
        self
    }

    pub fn window_for(&self, date: NaiveDate, master_id: MasterId) -> Option<WorkWindow> {
        let weekday = date.weekday();
        if let Some(window) = self.overrides.get(&(master_id, weekday)) {
            return *window;
        }
        if weekday == self.rest_day {
            return None;
        }
        Some(self.window)
    }
}

#[async_trait]
impl WorkHoursProvider for WeeklyWorkHours {
    async fn work_window(
        &self,
        date: NaiveDate,
        master_id: MasterId,
    ) -> anyhow::Result<Option<WorkWindow>> {
        Ok(self.window_for(date, master_id))
    }
}
