//! One-shot project initialization: writes the definition and token list
//! under the store root so the coordinator can serve the project.

use std::{env, fs, io};

use log::info;

use coordinator::store::{ContributionStore, ProjectMeta};
use model::ModelDefinition;

fn main() -> io::Result<()> {
    env_logger::init();

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "projects".to_string());
    let project = env::var("PROJECT").map_err(io::Error::other)?;
    let definition_path = env::var("DEFINITION").map_err(io::Error::other)?;
    let tokens: Vec<String> = env::var("TOKENS")
        .map_err(io::Error::other)?
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        return Err(io::Error::other("TOKENS must list at least one token"));
    }

    let text = fs::read_to_string(&definition_path)?;
    let def = ModelDefinition::from_json(&text)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let store = ContributionStore::new(&data_dir);
    store.create_project(&project, &def, &ProjectMeta { tokens })?;

    info!("initialized project {project} under {data_dir}");
    Ok(())
}
