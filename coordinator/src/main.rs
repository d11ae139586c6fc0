use std::{env, fs, io, sync::Arc};

use log::{info, warn};
use tokio::{net::TcpListener, signal};

use coordinator::{
    registry::ProjectRegistry, service::SubmissionService, store::ContributionStore,
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_DATA_DIR: &str = "projects";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").map_err(io::Error::other)?,
    );
    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());

    fs::create_dir_all(&data_dir)?;
    let store = ContributionStore::new(&data_dir);
    for project in store.projects()? {
        info!("serving project {project}");
    }

    let registry = Arc::new(ProjectRegistry::new(store));
    let service = SubmissionService::new(registry);

    let list = TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    loop {
        tokio::select! {
            conn = list.accept() => {
                let (stream, peer) = conn?;
                info!("client connected from {peer}");

                let service = service.clone();
                tokio::spawn(async move {
                    let (rx, tx) = stream.into_split();
                    let (rx, tx) = comms::channel(rx, tx);

                    if let Err(e) = service.serve(rx, tx).await {
                        warn!("connection from {peer} failed: {e}");
                    }
                });
            }
            _ = signal::ctrl_c() => {
                info!("received SIGTERM, shutting down");
                break;
            }
        }
    }

    Ok(())
}
