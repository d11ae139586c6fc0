use std::{borrow::Cow, io, sync::Arc};

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use comms::{
    WireReceiver, WireSender,
    msg::{Command, Msg},
    specs::{FetchSpec, SubmitSpec},
};
use model::{ContributionId, ParameterSet};

use crate::{
    aggregate,
    error::{CoordErr, Result},
    registry::ProjectRegistry,
    store::Provenance,
};

/// Server-side boundary accepting contributions end to end.
///
/// One instance serves the whole process; each connection runs the
/// [`SubmissionService::serve`] loop in its own task. A submission moves
/// through received, validated, stored and merged, or is rejected at any
/// validation step with no state written.
#[derive(Clone)]
pub struct SubmissionService {
    registry: Arc<ProjectRegistry>,
}

impl SubmissionService {
    pub fn new(registry: Arc<ProjectRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    /// Serves one connection until the peer disconnects.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    ///
    /// # Returns
    /// `Ok(())` on graceful shutdown, `io::Error` when the transport fails.
    pub async fn serve<R, W>(
        &self,
        mut rx: WireReceiver<R>,
        mut tx: WireSender<W>,
    ) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let msg: Msg = match rx.recv().await {
                Ok(msg) => msg,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            };

            match msg {
                Msg::Control(Command::Ping) => {
                    tx.send(&Msg::Control(Command::Pong)).await?;
                }
                Msg::Control(Command::Disconnect) => {
                    debug!("peer disconnected");
                    return Ok(());
                }
                Msg::Control(Command::FetchDefinition(spec)) => {
                    match self.fetch_definition(&spec) {
                        Ok(json) => tx.send(&Msg::Definition(Cow::Owned(json))).await?,
                        Err(e) => {
                            warn!(project = spec.project.as_str(); "definition fetch rejected: {e}");
                            tx.send(&Msg::Err(e.rejection())).await?;
                        }
                    }
                }
                Msg::Control(Command::Submit(spec)) => {
                    let outcome = {
                        let payload: Msg = rx.recv().await?;
                        match payload {
                            Msg::Contribution(bytes) => self.handle_submission(&spec, bytes).await,
                            other => Err(CoordErr::BadRequest(format!(
                                "expected a contribution payload, got {other:?}"
                            ))),
                        }
                    };

                    match outcome {
                        Ok(id) => {
                            tx.send(&Msg::Control(Command::Accepted { id: id.to_string() }))
                                .await?;
                        }
                        Err(e) => {
                            warn!(project = spec.project.as_str(); "submission rejected: {e}");
                            tx.send(&Msg::Err(e.rejection())).await?;
                        }
                    }
                }
                other => {
                    warn!("unexpected message: {other:?}");
                    let e = CoordErr::BadRequest("unexpected message".to_string());
                    tx.send(&Msg::Err(e.rejection())).await?;
                }
            }
        }
    }

    fn fetch_definition(&self, spec: &FetchSpec) -> Result<String> {
        check_token(&spec.token)?;
        check_project_id(&spec.project)?;

        let store = self.registry.store();
        if !store.project_exists(&spec.project) {
            return Err(CoordErr::ProjectNotFound(spec.project.clone()));
        }

        self.authorize(&spec.project, &spec.token)?;

        let def = store.load_definition(&spec.project)?;
        Ok(def.to_json())
    }

    /// Validates and merges one announced contribution.
    ///
    /// Validation order: required fields, project existence, payload shape
    /// conformance, authorization. Only then is anything persisted.
    async fn handle_submission(
        &self,
        spec: &SubmitSpec,
        payload: &[u8],
    ) -> Result<ContributionId> {
        debug!(project = spec.project.as_str(); "submission received");

        check_token(&spec.token)?;
        check_project_id(&spec.project)?;
        if payload.is_empty() {
            return Err(CoordErr::BadRequest("empty payload".to_string()));
        }
        let claimed: ContributionId = spec
            .id
            .parse()
            .map_err(|_| CoordErr::BadRequest(format!("malformed contribution id {}", spec.id)))?;

        let store = self.registry.store();
        if !store.project_exists(&spec.project) {
            return Err(CoordErr::ProjectNotFound(spec.project.clone()));
        }
        let def = store.load_definition(&spec.project)?;

        let params = ParameterSet::decode(payload).map_err(CoordErr::ShapeMismatch)?;
        params.matches(&def).map_err(CoordErr::ShapeMismatch)?;

        self.authorize(&spec.project, &spec.token)?;

        // The id is recomputed over what actually arrived; trusting the
        // claimed one would let a corrupted transfer poison the pool.
        let id = ContributionId::digest(payload);
        if id != claimed {
            return Err(CoordErr::BadRequest(format!(
                "content id mismatch: claimed {claimed}, payload hashes to {id}"
            )));
        }
        debug!(project = spec.project.as_str(); "submission {id} validated");

        store.put_pending(&spec.project, &id, payload, &Provenance::now(&spec.token))?;
        debug!(project = spec.project.as_str(); "contribution {id} stored");

        // Load-merge-save stays serialized per project; other projects
        // proceed in parallel.
        let lock = self.registry.merge_lock(&spec.project);
        let _guard = lock.lock().await;

        let canonical = store.load_canonical(&spec.project)?;
        let merged = aggregate::merge(canonical, params).map_err(CoordErr::ShapeMismatch)?;
        store.save_canonical(&spec.project, &merged)?;

        info!(project = spec.project.as_str(); "contribution {id} merged");
        Ok(id)
    }

    fn authorize(&self, project: &str, token: &str) -> Result<()> {
        let meta = self.registry.store().load_meta(project)?;

        if !meta.tokens.iter().any(|t| t == token) {
            return Err(CoordErr::Unauthorized {
                project: project.to_string(),
            });
        }

        Ok(())
    }
}

fn check_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(CoordErr::BadRequest("missing auth token".to_string()));
    }

    Ok(())
}

/// Project ids become directory names, so anything path-like is refused
/// before it reaches the filesystem.
fn check_project_id(project: &str) -> Result<()> {
    let ok = !project.is_empty()
        && project
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !ok {
        return Err(CoordErr::BadRequest(format!(
            "invalid project identifier {project:?}"
        )));
    }

    Ok(())
}
