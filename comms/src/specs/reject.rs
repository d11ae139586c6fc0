use std::fmt;

use serde::{Deserialize, Serialize};

/// The failure category of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    BadRequest,
    ProjectNotFound,
    Unauthorized,
    ShapeMismatch,
    DuplicateContribution,
    NotFound,
    Storage,
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectKind::BadRequest => "bad_request",
            RejectKind::ProjectNotFound => "project_not_found",
            RejectKind::Unauthorized => "unauthorized",
            RejectKind::ShapeMismatch => "shape_mismatch",
            RejectKind::DuplicateContribution => "duplicate_contribution",
            RejectKind::NotFound => "not_found",
            RejectKind::Storage => "storage",
        };

        f.write_str(s)
    }
}

/// Structured rejection sent in `Msg::Err` frames.
///
/// Every failure carries a machine-readable kind plus a human-readable
/// detail line; no failure collapses into a generic success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectKind,
    pub detail: String,
}

impl Rejection {
    pub fn new(kind: RejectKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}
