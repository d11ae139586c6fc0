use std::{error::Error, fmt, io};

use comms::specs::Rejection;
use model::ModelErr;

use crate::trainer::TrainerErr;

/// The client module's result type.
pub type Result<T> = std::result::Result<T, ClientErr>;

/// Client runner failures.
///
/// Network failures are surfaced to the caller rather than retried; the
/// locally cached artifact stays behind for a manual retry.
#[derive(Debug)]
pub enum ClientErr {
    Io(io::Error),
    /// The coordinator rejected the request with a structured kind.
    Rejected(Rejection),
    /// The opaque training capability failed; propagated as-is.
    Trainer(TrainerErr),
    Model(ModelErr),
    UnexpectedMessage { got: &'static str },
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErr::Io(e) => write!(f, "io error: {e}"),
            ClientErr::Rejected(rejection) => write!(f, "rejected by coordinator: {rejection}"),
            ClientErr::Trainer(e) => write!(f, "{e}"),
            ClientErr::Model(e) => write!(f, "model error: {e}"),
            ClientErr::UnexpectedMessage { got } => {
                write!(f, "unexpected message from coordinator: got {got}")
            }
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientErr::Io(e) => Some(e),
            ClientErr::Trainer(e) => Some(e),
            ClientErr::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<TrainerErr> for ClientErr {
    fn from(value: TrainerErr) -> Self {
        Self::Trainer(value)
    }
}

impl From<ModelErr> for ClientErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ClientErr> for io::Error {
    fn from(value: ClientErr) -> Self {
        match value {
            ClientErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
