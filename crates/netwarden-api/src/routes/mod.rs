pub mod artifacts;
pub mod auth;
pub mod scans;
pub mod schedules;
pub mod settings;
pub mod users;
