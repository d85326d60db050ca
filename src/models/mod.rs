pub mod booking;
pub mod interval;
pub mod schedule;
pub mod service;

pub use booking::Booking;
pub use interval::{FreeInterval, MinuteOfDay, TimeInterval, MINUTES_PER_DAY};
pub use schedule::WorkWindow;
pub use service::{Master, Service};

pub type MasterId = i64;
