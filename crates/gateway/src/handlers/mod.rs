//! API handlers module

pub mod auth;
pub mod health;
pub mod notifications;
pub mod papers;
pub mod reviews;
