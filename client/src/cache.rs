use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::warn;

use model::{ContributionId, ModelDefinition};

const DEFINITION_FILE: &str = "definition.json";
const PENDING_DIR: &str = "pending";

/// Content-addressed local artifact cache.
///
/// Mirrors the coordinator's per-project layout (`definition.json` plus a
/// `pending/` pool keyed by content id) so a trained contribution survives
/// a failed upload and can be resubmitted without retraining.
#[derive(Debug)]
pub struct ContributionCache {
    root: PathBuf,
}

impl ContributionCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join(project)
    }

    /// Returns the cached definition, if a valid one is present.
    pub fn definition(&self, project: &str) -> io::Result<Option<ModelDefinition>> {
        let path = self.project_dir(project).join(DEFINITION_FILE);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        match ModelDefinition::from_json(&text) {
            Ok(def) => Ok(Some(def)),
            Err(e) => {
                // A bad cache entry is refetched, not fatal.
                warn!("discarding corrupt cached definition {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    pub fn store_definition(&self, project: &str, def: &ModelDefinition) -> io::Result<()> {
        let dir = self.project_dir(project);
        fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(DEFINITION_FILE), def.to_json().as_bytes())
    }

    /// Stores one encoded contribution under its content id.
    ///
    /// # Returns
    /// The path of the cached artifact.
    pub fn store(&self, project: &str, id: &ContributionId, bytes: &[u8]) -> io::Result<PathBuf> {
        let dir = self.project_dir(project).join(PENDING_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{id}.params"));
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    pub fn load(&self, project: &str, id: &ContributionId) -> io::Result<Vec<u8>> {
        let path = self
            .project_dir(project)
            .join(PENDING_DIR)
            .join(format!("{id}.params"));

        fs::read(path)
    }

    pub fn contains(&self, project: &str, id: &ContributionId) -> bool {
        self.project_dir(project)
            .join(PENDING_DIR)
            .join(format!("{id}.params"))
            .is_file()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{ActFnSpec, LayerSpec};

    fn demo_def() -> ModelDefinition {
        ModelDefinition {
            name: "demo".into(),
            input_shape: vec![4],
            layers: vec![LayerSpec::Dense {
                units: 2,
                act_fn: ActFnSpec::Sigmoid,
            }],
        }
    }

    #[test]
    fn artifacts_are_stored_under_their_content_id() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContributionCache::new(dir.path());

        let bytes = b"encoded parameter set".to_vec();
        let id = ContributionId::digest(&bytes);

        assert!(!cache.contains("demo", &id));

        let path = cache.store("demo", &id, &bytes).unwrap();
        assert!(path.ends_with(format!("{id}.params")));
        assert!(cache.contains("demo", &id));
        assert_eq!(cache.load("demo", &id).unwrap(), bytes);
    }

    #[test]
    fn definition_roundtrips_and_corruption_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContributionCache::new(dir.path());

        assert!(cache.definition("demo").unwrap().is_none());

        cache.store_definition("demo", &demo_def()).unwrap();
        assert_eq!(cache.definition("demo").unwrap(), Some(demo_def()));

        fs::write(dir.path().join("demo/definition.json"), b"{broken").unwrap();
        assert!(cache.definition("demo").unwrap().is_none());
    }
}
