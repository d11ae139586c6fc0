use std::{error::Error, fmt};

/// The model module's result type.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// Failures around model definitions, parameter sets and their encodings.
#[derive(Debug)]
pub enum ModelErr {
    /// A definition is semantically invalid before any parameters exist.
    InvalidDefinition(&'static str),
    /// Two parameter sequences disagree on their layer count.
    LayerCountMismatch { got: usize, expected: usize },
    /// One layer's tensor shape disagrees with its counterpart.
    ShapeMismatch {
        layer: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    /// An encoded parameter set cannot be decoded.
    Malformed(&'static str),
    /// A structured-text form failed to parse.
    Json(serde_json::Error),
}

impl fmt::Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::InvalidDefinition(msg) => write!(f, "invalid model definition: {msg}"),
            ModelErr::LayerCountMismatch { got, expected } => {
                write!(f, "layer count mismatch: got {got}, expected {expected}")
            }
            ModelErr::ShapeMismatch {
                layer,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch at layer {layer}: got {got:?}, expected {expected:?}"
            ),
            ModelErr::Malformed(msg) => write!(f, "malformed parameter encoding: {msg}"),
            ModelErr::Json(e) => write!(f, "definition parse error: {e}"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ModelErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
