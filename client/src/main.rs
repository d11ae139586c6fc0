use std::{env, io};

use log::info;
use tokio::net::TcpStream;

use client::{
    cache::ContributionCache,
    net::CoordClient,
    runner::{ClientRunner, RunSpec},
    trainer::SgdTrainer,
};

const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_LEARNING_RATE: f32 = 0.5;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let server = env::var("SERVER").map_err(io::Error::other)?;
    let spec = RunSpec {
        token: env::var("TOKEN").map_err(io::Error::other)?,
        project: env::var("PROJECT").map_err(io::Error::other)?,
        dataset_dir: env::var("DATASET_DIR").map_err(io::Error::other)?.into(),
        epochs: env::var("EPOCHS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1),
    };
    let cache_dir = env::var("CACHE_DIR").unwrap_or_else(|_| DEFAULT_CACHE_DIR.to_string());
    let seed = env::var("SEED").ok().and_then(|s| s.parse().ok());

    let stream = TcpStream::connect(&server).await?;
    info!("connected to {server}");

    let (rx, tx) = stream.into_split();
    let (rx, tx) = comms::channel(rx, tx);
    let mut coord = CoordClient::new(rx, tx);

    let trainer = SgdTrainer {
        learning_rate: DEFAULT_LEARNING_RATE,
        seed,
    };
    let mut runner = ClientRunner::new(trainer, ContributionCache::new(cache_dir));

    let id = runner.run(&mut coord, &spec).await.map_err(io::Error::from)?;
    coord.disconnect().await.map_err(io::Error::from)?;

    println!("{id}");
    Ok(())
}
