//! HTTP route handlers.

pub mod aptitude;
pub mod discussion;
pub mod generation;
pub mod groups;
pub mod health;
pub mod leaderboard;
pub mod messages;
pub mod profile;
