pub mod audit;
pub mod bulk;
pub mod calibration;
pub mod checkpoints;
pub mod elements;
pub mod projects;
pub mod uploads;
