//! Paper statuses and the transition graph

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    RecommendedForPublication,
    Published,
}

impl PaperStatus {
    pub const ALL: [PaperStatus; 7] = [
        PaperStatus::Draft,
        PaperStatus::Submitted,
        PaperStatus::UnderReview,
        PaperStatus::Approved,
        PaperStatus::Rejected,
        PaperStatus::RecommendedForPublication,
        PaperStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Draft => "draft",
            PaperStatus::Submitted => "submitted",
            PaperStatus::UnderReview => "under_review",
            PaperStatus::Approved => "approved",
            PaperStatus::Rejected => "rejected",
            PaperStatus::RecommendedForPublication => "recommended_for_publication",
            PaperStatus::Published => "published",
        }
    }

    /// Statuses directly reachable from `self`, excluding `self`
    pub fn successors(&self) -> &'static [PaperStatus] {
        use PaperStatus::*;
        match self {
            Draft => &[Submitted],
            Submitted => &[UnderReview, RecommendedForPublication],
            UnderReview => &[Approved, Rejected, RecommendedForPublication],
            Approved => &[RecommendedForPublication],
            RecommendedForPublication => &[Published, Rejected, Approved],
            Published | Rejected => &[],
        }
    }

    /// Whether moving from `self` to `next` is an edge of the graph.
    /// Staying in place is always allowed.
    pub fn can_transition_to(&self, next: PaperStatus) -> bool {
        *self == next || self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Statuses whose arrival triggers the admin-decision fan-out
    pub fn is_decision(&self) -> bool {
        matches!(
            self,
            PaperStatus::Published | PaperStatus::Rejected | PaperStatus::Approved
        )
    }

    pub fn ensure_transition(&self, next: PaperStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        PaperStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::InvalidFormat {
                message: format!("unknown paper status '{}'", s),
            })
    }
}
