mod definition;
mod error;
mod ident;
mod params;

pub use definition::{ActFnSpec, LayerSpec, ModelDefinition};
pub use error::ModelErr;
pub use ident::ContributionId;
pub use params::ParameterSet;
