use std::path::PathBuf;

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};

use comms::specs::SubmitSpec;
use model::ContributionId;

use crate::{
    cache::ContributionCache,
    error::Result,
    net::CoordClient,
    trainer::Trainer,
};

/// One training-and-submission cycle's inputs.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub token: String,
    pub project: String,
    pub dataset_dir: PathBuf,
    pub epochs: usize,
}

/// Drives local training and submits the result to the coordinator.
///
/// The cycle is: obtain the model definition (cached after first contact),
/// train through the injected capability, encode, compute the content id,
/// persist the artifact locally, then upload. The artifact is cached
/// *before* the upload so a network failure leaves a resubmittable file
/// behind; failures are reported, never silently retried.
pub struct ClientRunner<T: Trainer> {
    trainer: T,
    cache: ContributionCache,
}

impl<T: Trainer> ClientRunner<T> {
    pub fn new(trainer: T, cache: ContributionCache) -> Self {
        Self { trainer, cache }
    }

    pub fn cache(&self) -> &ContributionCache {
        &self.cache
    }

    /// Runs one cycle against a connected coordinator.
    ///
    /// # Returns
    /// The accepted contribution identifier, or the first error of the
    /// pipeline.
    pub async fn run<R, W>(
        &mut self,
        client: &mut CoordClient<R, W>,
        spec: &RunSpec,
    ) -> Result<ContributionId>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let def = match self.cache.definition(&spec.project)? {
            Some(def) => {
                debug!(project = spec.project.as_str(); "using cached definition");
                def
            }
            None => {
                debug!(project = spec.project.as_str(); "fetching definition");
                let def = client.fetch_definition(&spec.token, &spec.project).await?;
                self.cache.store_definition(&spec.project, &def)?;
                def
            }
        };

        info!("training {} for {} epochs", spec.project, spec.epochs);
        let params = self
            .trainer
            .train(&def, None, &spec.dataset_dir, spec.epochs)?;

        let payload = params.encode();
        let id = ContributionId::digest(&payload);
        self.cache.store(&spec.project, &id, &payload)?;
        info!("contribution {id} cached, submitting");

        let submit = SubmitSpec {
            token: spec.token.clone(),
            project: spec.project.clone(),
            id: id.to_string(),
        };
        let accepted = client.submit(submit, &payload).await?;

        info!("coordinator accepted contribution {accepted}");
        Ok(accepted)
    }
}
