//! API handlers.

pub mod health;
pub mod photos;
pub mod tasks;
pub mod timeline;
pub mod users;
