//! Publication workflow core
//!
//! - `role`: roles, operations and the capability table
//! - `status`: paper statuses and the transition graph
//! - `publication_id`: identifier format and counter seeding
//! - `fanout`: detached notification delivery
//! - `service`: the operations that tie them together

pub mod fanout;
pub mod publication_id;
pub mod role;
pub mod service;
pub mod status;


pub use fanout::{Audience, FanoutPlan, FanoutReport, Notifier};
pub use role::{authorize, Actor, Operation, Role};
pub use service::{CreateNotification, CreatePaper, CreateReview, UpdatePaper, WorkflowService};
pub use status::PaperStatus;
