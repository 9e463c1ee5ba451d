//! Roles and the capability table
//!
//! Every protected operation names itself with an [`Operation`] and calls
//! [`authorize`] before it touches the store. The table below is the only
//! place that decides who may do what.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Editor,
    Coordinator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Author, Role::Editor, Role::Coordinator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Editor => "editor",
            Role::Coordinator => "coordinator",
            Role::Admin => "admin",
        }
    }

    /// Capitalised form used in notification text ("by Editor")
    pub fn title(&self) -> &'static str {
        match self {
            Role::Author => "Author",
            Role::Editor => "Editor",
            Role::Coordinator => "Coordinator",
            Role::Admin => "Admin",
        }
    }

    /// Lowercase form with its article ("by an editor")
    pub fn with_article(&self) -> &'static str {
        match self {
            Role::Author => "an author",
            Role::Editor => "an editor",
            Role::Coordinator => "a coordinator",
            Role::Admin => "an admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "author" => Ok(Role::Author),
            "editor" => Ok(Role::Editor),
            "coordinator" => Ok(Role::Coordinator),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::InvalidFormat {
                message: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Protected operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreatePaper,
    UpdatePaper,
    DeletePaper,
    ListPapers,
    RecommendPaper,
    UpdatePublicationDetails,
    CreateReview,
    ListReviews,
    ListNotifications,
    MarkNotificationRead,
    CreateNotification,
    ViewProfile,
    /// Staff accounts; self-registration only ever creates authors
    CreateUser,
}

const ANY_ROLE: &[Role] = &Role::ALL;
const AUTHOR_OR_ADMIN: &[Role] = &[Role::Author, Role::Admin];
const EDITOR_OR_ADMIN: &[Role] = &[Role::Editor, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const EDITOR_COORDINATOR_OR_ADMIN: &[Role] = &[Role::Editor, Role::Coordinator, Role::Admin];

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::CreatePaper,
        Operation::UpdatePaper,
        Operation::DeletePaper,
        Operation::ListPapers,
        Operation::RecommendPaper,
        Operation::UpdatePublicationDetails,
        Operation::CreateReview,
        Operation::ListReviews,
        Operation::ListNotifications,
        Operation::MarkNotificationRead,
        Operation::CreateNotification,
        Operation::ViewProfile,
        Operation::CreateUser,
    ];

    /// Roles allowed to perform this operation
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::CreatePaper | Operation::UpdatePaper | Operation::DeletePaper => {
                AUTHOR_OR_ADMIN
            }
            Operation::RecommendPaper | Operation::CreateReview => EDITOR_OR_ADMIN,
            Operation::UpdatePublicationDetails => EDITOR_COORDINATOR_OR_ADMIN,
            Operation::ListPapers
            | Operation::ListReviews
            | Operation::ListNotifications
            | Operation::MarkNotificationRead
            | Operation::CreateNotification
            | Operation::ViewProfile => ANY_ROLE,
            Operation::CreateUser => ADMIN_ONLY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreatePaper => "create_paper",
            Operation::UpdatePaper => "update_paper",
            Operation::DeletePaper => "delete_paper",
            Operation::ListPapers => "list_papers",
            Operation::RecommendPaper => "recommend_paper",
            Operation::UpdatePublicationDetails => "update_publication_details",
            Operation::CreateReview => "create_review",
            Operation::ListReviews => "list_reviews",
            Operation::ListNotifications => "list_notifications",
            Operation::MarkNotificationRead => "mark_notification_read",
            Operation::CreateNotification => "create_notification",
            Operation::ViewProfile => "view_profile",
            Operation::CreateUser => "create_user",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check `role` against the capability table
pub fn authorize(role: Role, operation: Operation) -> Result<()> {
    if operation.allowed_roles().contains(&role) {
        Ok(())
    } else {
        Err(AppError::InsufficientRole {
            role: role.to_string(),
            operation: operation.to_string(),
        })
    }
}

/// The authenticated caller of a workflow operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn authorize(&self, operation: Operation) -> Result<()> {
        authorize(self.role, operation)
    }
}
