//! RPMS Common Library
//!
//! Shared code for the RPMS gateway:
//! - Publication workflow (roles, statuses, publication ids, fan-out)
//! - Database models, the storage trait and its two implementations
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities and the user directory
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod workflow;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, InMemoryStore, Repository, WorkflowStore};
pub use errors::{AppError, Result};
pub use workflow::{Actor, Operation, PaperStatus, Role, WorkflowService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
