use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use spdlog::{info, warn};

use quill::logger::configure_logger;
use quill::server::server_run;
use quill::storage::{StorageConfig, StorageService};

use crate::config::open_config;

mod config;

const CFG_FILE_NAME: &str = "quill.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config path
    #[arg(short, long)]
    config_path: Option<String>,
}

#[ntex::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config_path.map(PathBuf::from);

    let config = match open_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("Please run quill --help");
            return Ok(());
        }
    };

    if let Err(err) = configure_logger(&config) {
        warn!("Error creating logger sinks. Using console instead. Desc={}", err);
    }

    let storage = StorageService::init(StorageConfig::from_env());
    match storage.public_base_url() {
        Some(base_url) => info!("Images resolve to remote storage at {}", base_url),
        None => info!("Images resolve to local paths"),
    }

    info!("Starting Quill =-=-=-=-=-=-=-=-=-=-=-=-=-=-=-");
    info!("Listening on {}:{}", config.server.address, config.server.port);

    server_run(config, storage).await?;
    Ok(())
}
