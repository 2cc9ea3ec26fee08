use std::io::Write;

use anyhow::Result;
use chrono::Utc;

use quill::config::read_config;
use quill::content::image_resolver::ImageResolver;
use quill::content_index::ContentIndex;
use quill::feed::RssChannel;
use quill::storage::{StorageConfig, StorageService};
use quill::vault_sync::VaultSync;

use crate::{ConfigArgs, SyncVaultArgs};

pub fn copy_assets_cmd(args: ConfigArgs) -> Result<()> {
    let config = read_config(&args.config_path)?;
    let resolver = ImageResolver::new(StorageService::disabled(), config.paths.assets_dir, config.paths.public_dir);

    let copied = resolver.publish_all_assets()?;
    for name in copied.iter() {
        println!("Copied: {}", name);
    }
    println!("{} assets copied to {}", copied.len(), resolver.public_assets_dir().display());
    Ok(())
}

pub fn sync_vault_cmd(args: SyncVaultArgs) -> Result<()> {
    let config = read_config(&args.config_path)?;
    let sync = VaultSync::new(args.vault, &args.folder, config.paths.content_dir, &config.paths.public_dir);

    println!("Syncing content from {}...", sync.source_dir().display());
    let report = sync.run()?;
    println!("Processed {} posts", report.posts);
    println!("Copied {} images", report.images);
    if report.missing_images > 0 {
        println!("{} embedded images were not found", report.missing_images);
    }
    Ok(())
}

pub fn feed_cmd(args: ConfigArgs) -> Result<()> {
    let config = read_config(&args.config_path)?;
    let index = ContentIndex::from_config(&config, StorageService::init(StorageConfig::from_env()));

    let xml = RssChannel::from_site(&config.site).render(index.load().list_all(), Utc::now())?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&xml)?;
    writeln!(stdout)?;
    Ok(())
}
