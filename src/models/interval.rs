use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// A point on the local day's minute axis, rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteOfDay(i32);

impl MinuteOfDay {
    pub const fn new(minutes: i32) -> Self {
        Self(minutes)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self((hour * 60 + minute) as i32)
    }

    pub fn minutes(self) -> i32 {
        self.0
    }

    pub fn plus(self, minutes: i32) -> Self {
        Self(self.0 + minutes)
    }

    /// `None` once the value runs past the end of the day.
    pub fn to_naive_time(self) -> Option<NaiveTime> {
        if !(0..MINUTES_PER_DAY).contains(&self.0) {
            return None;
        }
        NaiveTime::from_hms_opt((self.0 / 60) as u32, (self.0 % 60) as u32, 0)
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid time format: {s}"))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
        if hour > 23 || minute > 59 {
            return Err(anyhow::anyhow!("time out of range: {s}"));
        }
        Ok(Self::from_hm(hour, minute))
    }
}

impl From<NaiveTime> for MinuteOfDay {
    fn from(t: NaiveTime) -> Self {
        Self::from_hm(t.hour(), t.minute())
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.div_euclid(60), self.0.rem_euclid(60))
    }
}

impl Serialize for MinuteOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MinuteOfDay::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Half-open `[start, end)` range of one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
}

/// An interval in which at least one candidate master is working and unbooked.
pub type FreeInterval = TimeInterval;

impl TimeInterval {
    pub fn new(start: MinuteOfDay, end: MinuteOfDay) -> Self {
        Self { start, end }
    }

    pub fn len_minutes(&self) -> i32 {
        self.end.minutes() - self.start.minutes()
    }

    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
