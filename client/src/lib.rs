pub mod cache;
pub mod error;
pub mod net;
pub mod runner;
pub mod trainer;

pub use cache::ContributionCache;
pub use error::ClientErr;
pub use net::CoordClient;
pub use runner::{ClientRunner, RunSpec};
pub use trainer::{SgdTrainer, Trainer, TrainerErr};
