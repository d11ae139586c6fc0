use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::debug;
use serde::{Deserialize, Serialize};

use model::{ContributionId, ModelDefinition, ModelErr, ParameterSet};

const DEFINITION_FILE: &str = "definition.json";
const META_FILE: &str = "meta.json";
const CANONICAL_FILE: &str = "canonical.params";
const PENDING_DIR: &str = "pending";

/// The store module's result type.
pub type Result<T> = std::result::Result<T, StoreErr>;

/// Persistence failures of the contribution store.
#[derive(Debug)]
pub enum StoreErr {
    NotFound { what: &'static str, key: String },
    DuplicateContribution { id: String },
    Corrupt { path: PathBuf, source: ModelErr },
    Io(io::Error),
}

impl std::fmt::Display for StoreErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreErr::NotFound { what, key } => write!(f, "{what} {key} not found"),
            StoreErr::DuplicateContribution { id } => {
                write!(f, "contribution {id} already exists with different content")
            }
            StoreErr::Corrupt { path, source } => {
                write!(f, "corrupt file {}: {source}", path.display())
            }
            StoreErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for StoreErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreErr::Corrupt { source, .. } => Some(source),
            StoreErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<StoreErr> for io::Error {
    fn from(value: StoreErr) -> Self {
        match value {
            StoreErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Durable per-project configuration next to the definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// Bearer tokens accepted for this project.
    pub tokens: Vec<String>,
}

/// Who submitted a pending contribution, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub client: String,
    /// Unix seconds at acceptance time.
    pub submitted_at: u64,
}

impl Provenance {
    pub fn now(client: &str) -> Self {
        let submitted_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            client: client.to_string(),
            submitted_at,
        }
    }
}

/// Durable, race-safe persistence of the canonical parameter set and the
/// pending-contribution pool, one namespace per project.
///
/// Layout under the root:
///
/// ```text
/// <project>/definition.json
/// <project>/meta.json
/// <project>/canonical.params            (absent before the first merge)
/// <project>/pending/<hex id>.params
/// <project>/pending/<hex id>.meta.json
/// ```
///
/// All writes go through temp-file + rename so a reader never observes a
/// partially written file, and every write is flushed before the call
/// returns. The store itself holds no locks; serializing the
/// read-merge-write of the canonical file is the registry's job.
#[derive(Debug)]
pub struct ContributionStore {
    root: PathBuf,
}

impl ContributionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join(project)
    }

    fn pending_path(&self, project: &str, id: &ContributionId) -> PathBuf {
        self.project_dir(project)
            .join(PENDING_DIR)
            .join(format!("{id}.params"))
    }

    /// Initializes a project's directory tree.
    ///
    /// The canonical model starts absent; the first merged contribution
    /// bootstraps it.
    pub fn create_project(
        &self,
        project: &str,
        def: &ModelDefinition,
        meta: &ProjectMeta,
    ) -> Result<()> {
        let dir = self.project_dir(project);
        fs::create_dir_all(dir.join(PENDING_DIR))?;

        write_atomic(&dir.join(DEFINITION_FILE), def.to_json().as_bytes())?;
        write_atomic(&dir.join(META_FILE), &to_json_bytes(meta))?;

        Ok(())
    }

    pub fn project_exists(&self, project: &str) -> bool {
        self.project_dir(project).join(DEFINITION_FILE).is_file()
    }

    /// Lists the projects present under the store root.
    pub fn projects(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if entry.path().join(DEFINITION_FILE).is_file() {
                projects.push(name.to_string());
            }
        }

        projects.sort();
        Ok(projects)
    }

    pub fn load_definition(&self, project: &str) -> Result<ModelDefinition> {
        let path = self.project_dir(project).join(DEFINITION_FILE);
        let text = read_keyed(&path, "project", project)?;

        ModelDefinition::from_json(&text).map_err(|source| StoreErr::Corrupt { path, source })
    }

    pub fn load_meta(&self, project: &str) -> Result<ProjectMeta> {
        let path = self.project_dir(project).join(META_FILE);
        let text = read_keyed(&path, "project", project)?;

        serde_json::from_str(&text).map_err(|e| StoreErr::Corrupt {
            path,
            source: ModelErr::Json(e),
        })
    }

    /// Writes a contribution under its content identifier.
    ///
    /// Byte-identical resubmission is a no-op; the same identifier carrying
    /// different bytes is a content collision anomaly and fails.
    pub fn put_pending(
        &self,
        project: &str,
        id: &ContributionId,
        payload: &[u8],
        provenance: &Provenance,
    ) -> Result<()> {
        let path = self.pending_path(project, id);

        match fs::read(&path) {
            Ok(existing) if existing == payload => {
                debug!("contribution {id} already stored, skipping write");
                return Ok(());
            }
            Ok(_) => return Err(StoreErr::DuplicateContribution { id: id.to_string() }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        write_atomic(&path, payload)?;
        write_atomic(&path.with_extension("meta.json"), &to_json_bytes(provenance))?;

        Ok(())
    }

    pub fn get_pending(&self, project: &str, id: &ContributionId) -> Result<Vec<u8>> {
        let path = self.pending_path(project, id);

        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreErr::NotFound {
                what: "contribution",
                key: id.to_string(),
            },
            _ => e.into(),
        })
    }

    /// Loads the canonical parameter set, or `None` before the first merge.
    pub fn load_canonical(&self, project: &str) -> Result<Option<ParameterSet>> {
        let path = self.project_dir(project).join(CANONICAL_FILE);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let params = ParameterSet::decode(&bytes)
            .map_err(|source| StoreErr::Corrupt { path, source })?;

        Ok(Some(params))
    }

    /// Atomically replaces the canonical parameter set.
    pub fn save_canonical(&self, project: &str, params: &ParameterSet) -> Result<()> {
        let path = self.project_dir(project).join(CANONICAL_FILE);
        write_atomic(&path, &params.encode())?;
        Ok(())
    }
}

fn to_json_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // SAFETY: all serialized store records are derived structs with string
    //         keys only.
    serde_json::to_vec_pretty(value).unwrap()
}

fn read_keyed(path: &Path, what: &'static str, key: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StoreErr::NotFound {
            what,
            key: key.to_string(),
        },
        _ => e.into(),
    })
}

/// Writes `bytes` to `path` through a temp file in the same directory.
///
/// The data is flushed before the rename and the parent directory is
/// flushed after it, so the replace is atomic and survives a crash.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp, path)?;

    if let Some(parent) = path.parent() {
        fs::File::open(parent)?.sync_all()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use model::{ActFnSpec, LayerSpec};

    fn test_def() -> ModelDefinition {
        ModelDefinition {
            name: "tiny".into(),
            input_shape: vec![2],
            layers: vec![LayerSpec::Dense {
                units: 1,
                act_fn: ActFnSpec::Sigmoid,
            }],
        }
    }

    fn test_store() -> (tempfile::TempDir, ContributionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContributionStore::new(dir.path());
        store
            .create_project("demo", &test_def(), &ProjectMeta { tokens: vec!["t".into()] })
            .unwrap();

        (dir, store)
    }

    fn params(v: f32) -> ParameterSet {
        ParameterSet::new(vec![
            array![[v], [v]].into_dyn(),
            array![v].into_dyn(),
        ])
    }

    #[test]
    fn created_project_is_discoverable() {
        let (_dir, store) = test_store();

        assert!(store.project_exists("demo"));
        assert!(!store.project_exists("other"));
        assert_eq!(store.projects().unwrap(), vec!["demo".to_string()]);
        assert_eq!(store.load_definition("demo").unwrap(), test_def());
        assert_eq!(store.load_meta("demo").unwrap().tokens, vec!["t"]);
    }

    #[test]
    fn put_pending_is_idempotent_for_identical_bytes() {
        let (_dir, store) = test_store();
        let bytes = params(1.0).encode();
        let id = ContributionId::digest(&bytes);
        let by = Provenance::now("t");

        store.put_pending("demo", &id, &bytes, &by).unwrap();
        store.put_pending("demo", &id, &bytes, &by).unwrap();

        assert_eq!(store.get_pending("demo", &id).unwrap(), bytes);
    }

    #[test]
    fn put_pending_rejects_same_id_with_different_bytes() {
        let (_dir, store) = test_store();
        let bytes = params(1.0).encode();
        let id = ContributionId::digest(&bytes);
        let by = Provenance::now("t");

        store.put_pending("demo", &id, &bytes, &by).unwrap();

        let other = params(2.0).encode();
        assert!(matches!(
            store.put_pending("demo", &id, &other, &by),
            Err(StoreErr::DuplicateContribution { .. })
        ));
    }

    #[test]
    fn missing_contribution_is_not_found() {
        let (_dir, store) = test_store();
        let id = ContributionId::digest(b"nope");

        assert!(matches!(
            store.get_pending("demo", &id),
            Err(StoreErr::NotFound { what: "contribution", .. })
        ));
    }

    #[test]
    fn canonical_starts_absent_then_roundtrips() {
        let (_dir, store) = test_store();

        assert!(store.load_canonical("demo").unwrap().is_none());

        let set = params(0.5);
        store.save_canonical("demo", &set).unwrap();
        assert_eq!(store.load_canonical("demo").unwrap(), Some(set));
    }

    #[test]
    fn canonical_replace_leaves_no_temp_file() {
        let (dir, store) = test_store();

        store.save_canonical("demo", &params(0.5)).unwrap();
        store.save_canonical("demo", &params(1.5)).unwrap();

        assert!(!dir.path().join("demo/canonical.tmp").exists());
        assert_eq!(store.load_canonical("demo").unwrap(), Some(params(1.5)));
    }
}
