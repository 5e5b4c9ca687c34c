pub mod aggregation;
pub mod calendar;
pub mod models;
