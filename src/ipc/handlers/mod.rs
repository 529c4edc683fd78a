pub mod analytics;
pub mod attendance;
pub mod core;
pub mod marks;
pub mod notices;
pub mod students;
pub mod views;
