use std::env;

use chrono::{NaiveTime, Weekday};

use crate::models::MasterId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkHoursSource {
    Database,
    Weekly,
}

/// One master's hours on one weekday under the weekly policy. `hours: None` is a day off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeeklyOverride {
    pub master_id: MasterId,
    pub weekday: Weekday,
    pub hours: Option<(NaiveTime, NaiveTime)>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub search_horizon_days: u32,
    pub search_deadline_ms: u64,
    pub same_day_lead_minutes: i32,
    pub work_hours_source: WorkHoursSource,
    pub work_day_start: NaiveTime,
    pub work_day_end: NaiveTime,
    pub rest_day: Weekday,
    pub weekly_overrides: Vec<WeeklyOverride>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT").unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "salonbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            search_horizon_days: parsed("SEARCH_HORIZON_DAYS").unwrap_or(7),
            search_deadline_ms: parsed("SEARCH_DEADLINE_MS").unwrap_or(2000),
            same_day_lead_minutes: parsed("SAME_DAY_LEAD_MINUTES").unwrap_or(60),
            work_hours_source: match env::var("WORK_HOURS_SOURCE").as_deref() {
                Ok("weekly") => WorkHoursSource::Weekly,
                _ => WorkHoursSource::Database,
            },
            work_day_start: time_var("WORK_DAY_START").unwrap_or(default_time(10)),
            work_day_end: time_var("WORK_DAY_END").unwrap_or(default_time(20)),
            rest_day: parsed("REST_DAY").unwrap_or(Weekday::Sun),
            weekly_overrides: env::var("WEEKLY_OVERRIDES")
                .map(|v| parse_weekly_overrides(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            admin_token: "changeme".to_string(),
            search_horizon_days: 7,
            search_deadline_ms: 2000,
            same_day_lead_minutes: 60,
            work_hours_source: WorkHoursSource::Database,
            work_day_start: default_time(10),
            work_day_end: default_time(20),
            rest_day: Weekday::Sun,
            weekly_overrides: Vec::new(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn time_var(key: &str) -> Option<NaiveTime> {
    env::var(key)
        .ok()
        .and_then(|v| NaiveTime::parse_from_str(v.trim(), "%H:%M").ok())
}

fn default_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Parses `2:mon=12:00-20:00,3:tue=off`. Malformed entries are logged and skipped.
pub fn parse_weekly_overrides(s: &str) -> Vec<WeeklyOverride> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parsed = parse_override(entry);
            if parsed.is_none() {
                tracing::warn!(entry, "ignoring malformed WEEKLY_OVERRIDES entry");
            }
            parsed
        })
        .collect()
}

fn parse_override(entry: &str) -> Option<WeeklyOverride> {
    let (key, value) = entry.split_once('=')?;
    let (master_id, weekday) = key.split_once(':')?;
    let master_id = master_id.trim().parse().ok()?;
    let weekday = weekday.trim().parse().ok()?;

    let value = value.trim();
    let hours = if value.eq_ignore_ascii_case("off") {
        None
    } else {
        let (start, end) = value.split_once('-')?;
        Some((
            NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?,
            NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?,
        ))
    };

    Some(WeeklyOverride {
        master_id,
        weekday,
        hours,
    })
}
