pub mod ml;
pub mod results;
pub mod uploads;
