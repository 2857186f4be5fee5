pub mod attendance;
pub mod auth;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod lookup;
pub mod objects;
pub mod points;
pub mod reports;
pub mod schedule;
pub mod settings;
pub mod students;
pub mod subjects;
pub mod users;
