use std::{error::Error, fmt, io};

use comms::specs::{RejectKind, Rejection};
use model::ModelErr;

use crate::store::StoreErr;

/// The coordinator's result type.
pub type Result<T> = std::result::Result<T, CoordErr>;

/// Submission pipeline failures.
///
/// Each variant maps onto one wire-level rejection kind, so nothing the
/// pipeline can produce is ever swallowed into a generic response.
#[derive(Debug)]
pub enum CoordErr {
    BadRequest(String),
    ProjectNotFound(String),
    Unauthorized { project: String },
    ShapeMismatch(ModelErr),
    DuplicateContribution { id: String },
    NotFound { id: String },
    Storage(io::Error),
}

impl CoordErr {
    /// Builds the structured rejection sent back to the client.
    pub fn rejection(&self) -> Rejection {
        Rejection::new(self.kind(), self.to_string())
    }

    fn kind(&self) -> RejectKind {
        match self {
            CoordErr::BadRequest(_) => RejectKind::BadRequest,
            CoordErr::ProjectNotFound(_) => RejectKind::ProjectNotFound,
            CoordErr::Unauthorized { .. } => RejectKind::Unauthorized,
            CoordErr::ShapeMismatch(_) => RejectKind::ShapeMismatch,
            CoordErr::DuplicateContribution { .. } => RejectKind::DuplicateContribution,
            CoordErr::NotFound { .. } => RejectKind::NotFound,
            CoordErr::Storage(_) => RejectKind::Storage,
        }
    }
}

impl fmt::Display for CoordErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordErr::BadRequest(msg) => write!(f, "bad request: {msg}"),
            CoordErr::ProjectNotFound(project) => write!(f, "unknown project {project}"),
            CoordErr::Unauthorized { project } => {
                write!(f, "token is not accepted for project {project}")
            }
            CoordErr::ShapeMismatch(e) => write!(f, "incompatible contribution: {e}"),
            CoordErr::DuplicateContribution { id } => {
                write!(f, "contribution {id} already exists with different content")
            }
            CoordErr::NotFound { id } => write!(f, "contribution {id} not found"),
            CoordErr::Storage(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl Error for CoordErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CoordErr::ShapeMismatch(e) => Some(e),
            CoordErr::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreErr> for CoordErr {
    fn from(value: StoreErr) -> Self {
        match value {
            StoreErr::NotFound { key, .. } => CoordErr::NotFound { id: key },
            StoreErr::DuplicateContribution { id } => CoordErr::DuplicateContribution { id },
            StoreErr::Corrupt { .. } => {
                CoordErr::Storage(io::Error::new(io::ErrorKind::InvalidData, value.to_string()))
            }
            StoreErr::Io(e) => CoordErr::Storage(e),
        }
    }
}
