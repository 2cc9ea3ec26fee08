use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::assets::{copy_assets_cmd, feed_cmd, sync_vault_cmd};
use crate::post::post_cmd;

mod assets;
mod post;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
    /// Creating post
    Post(PostArgs),
    /// Copy every file of the assets directory into public/assets
    CopyAssets(ConfigArgs),
    /// Import posts and embedded images from a notes vault
    SyncVault(SyncVaultArgs),
    /// Print the RSS feed to stdout
    Feed(ConfigArgs),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct PostArgs {
    /// Name of the author. If empty, OS user real name is being used
    #[arg(short, long)]
    name: Option<String>,

    /// Title of the post
    #[arg(short, long)]
    title: Option<String>,

    /// Post generation options
    #[arg(short, long, default_value_t = PostOutput::Stdout)]
    output: PostOutput,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct ConfigArgs {
    /// Config path
    #[arg(short, long, default_value = "quill.toml")]
    config_path: PathBuf,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct SyncVaultArgs {
    /// Root directory of the vault
    #[arg(short, long)]
    vault: PathBuf,

    /// Folder inside the vault holding the posts
    #[arg(short, long, default_value = quill::vault_sync::DEFAULT_BLOG_FOLDER)]
    folder: String,

    /// Config path
    #[arg(short, long, default_value = "quill.toml")]
    config_path: PathBuf,
}

#[derive(Clone, Debug, ValueEnum)]
enum PostOutput {
    /// Writes the new post content to the stdout
    Stdout,
    /// Writes the new post content to a file (posts without images)
    File,
    /// Writes the new post content to a directory (posts with images)
    Dir,
}

impl Display for PostOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PostOutput::Stdout => "stdout",
            PostOutput::File => "file",
            PostOutput::Dir => "dir",
        };
        write!(f, "{}", name)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args {
        Args::Post(args) => post_cmd(args),
        Args::CopyAssets(args) => copy_assets_cmd(args),
        Args::SyncVault(args) => sync_vault_cmd(args),
        Args::Feed(args) => feed_cmd(args),
    }
}
