mod dataset;
mod sgd;

pub use dataset::Dataset;
pub use sgd::SgdTrainer;

use std::{error::Error, fmt, path::Path};

use model::{ModelDefinition, ParameterSet};

/// Opaque failure from the training capability, propagated as-is.
#[derive(Debug)]
pub struct TrainerErr {
    detail: String,
}

impl TrainerErr {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trainer failure: {}", self.detail)
    }
}

impl Error for TrainerErr {}

/// The injected training capability.
///
/// The submission pipeline treats training as opaque: given a model
/// definition, optional starting parameters, a labeled dataset directory
/// and an epoch count, an implementor produces a parameter set conforming
/// to the definition's shapes. Everything else about the optimization is
/// the implementor's business, which is what lets the pipeline be tested
/// with a deterministic stub.
pub trait Trainer {
    fn train(
        &mut self,
        def: &ModelDefinition,
        initial: Option<&ParameterSet>,
        dataset_dir: &Path,
        epochs: usize,
    ) -> Result<ParameterSet, TrainerErr>;
}
