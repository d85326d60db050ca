pub mod availability;
pub mod slot_tool;
pub mod work_hours;
