//! Import of posts written in a notes vault.
//!
//! Every `.md` file of the vault's blog folder is copied into the content
//! directory with its `![[image|alt]]` embeds rewritten to `/images/...`, and
//! the embedded images are copied into `public/images`.

use std::cell::Cell;
use std::fs;
use std::path::{Component, Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use spdlog::{error, info, warn};

use crate::content::image_resolver::{basename, image_markdown, is_absolute_url, rewrite_image_refs, Embed, ImageRewriter};

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const DEFAULT_BLOG_FOLDER: &str = "Blog";
const VAULT_ASSETS_FOLDER: &str = "Assets";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub posts: usize,
    pub images: usize,
    pub missing_images: usize,
}

pub struct VaultSync {
    vault_root: PathBuf,
    blog_folder: String,
    content_dir: PathBuf,
    images_dir: PathBuf,
}

struct VaultRewriter<'a> {
    vault_root: &'a Path,
    images_dir: &'a Path,
    copied: Cell<usize>,
    missing: Cell<usize>,
}

impl VaultRewriter<'_> {
    fn locate(&self, target: &str) -> Option<PathBuf> {
        let relative = Path::new(target);
        if relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return None;
        }

        [self.vault_root.join(relative), self.vault_root.join(VAULT_ASSETS_FOLDER).join(basename(target))]
            .into_iter()
            .find(|candidate| candidate.is_file())
    }
}

impl ImageRewriter for VaultRewriter<'_> {
    fn rewrite_image(&self, _url: &str) -> Option<String> {
        None
    }

    fn rewrite_embed(&self, embed: &Embed) -> Option<String> {
        if is_absolute_url(embed.target) {
            return Some(image_markdown(&embed.alt_text(), embed.target, None));
        }

        let name = embed.basename();
        let Some(source) = self.locate(embed.target) else {
            warn!("Image not found in vault: {}", embed.target);
            self.missing.set(self.missing.get() + 1);
            return None;
        };

        if let Err(e) = fs::copy(&source, self.images_dir.join(name)) {
            error!("Error copying image {}: {}", name, e);
            return None;
        }
        self.copied.set(self.copied.get() + 1);

        let url = format!("/images/{}", utf8_percent_encode(name, URI_COMPONENT));
        Some(image_markdown(&embed.alt_text(), &url, None))
    }
}

impl VaultSync {
    pub fn new(vault_root: PathBuf, blog_folder: &str, content_dir: PathBuf, public_dir: &Path) -> VaultSync {
        VaultSync {
            vault_root,
            blog_folder: blog_folder.to_string(),
            content_dir,
            images_dir: public_dir.join("images"),
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.vault_root.join(&self.blog_folder)
    }

    /// Existing posts with other names are kept; same-named ones are
    /// overwritten.
    pub fn run(&self) -> anyhow::Result<SyncReport> {
        let source_dir = self.source_dir();
        fs::create_dir_all(&self.content_dir)?;
        fs::create_dir_all(&self.images_dir)?;

        let rewriter = VaultRewriter {
            vault_root: &self.vault_root,
            images_dir: &self.images_dir,
            copied: Cell::new(0),
            missing: Cell::new(0),
        };

        let mut files: Vec<PathBuf> = fs::read_dir(&source_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        let mut posts = 0;
        for path in files {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let text = fs::read_to_string(&path)?;
            let rewritten = rewrite_image_refs(&text, &rewriter)?;
            fs::write(self.content_dir.join(file_name), rewritten)?;
            posts += 1;
        }

        let report = SyncReport {
            posts,
            images: rewriter.copied.get(),
            missing_images: rewriter.missing.get(),
        };
        info!("Synced {} posts and {} images from {}", report.posts, report.images, source_dir.display());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_sync() {
        let vault = TempDir::new().unwrap();
        let site = TempDir::new().unwrap();
        let blog = vault.path().join("Blog");
        fs::create_dir_all(&blog).unwrap();
        fs::create_dir_all(vault.path().join("Assets")).unwrap();
        fs::create_dir_all(vault.path().join("Pics")).unwrap();

        fs::write(vault.path().join("Assets/my photo.png"), b"1").unwrap();
        fs::write(vault.path().join("Pics/chart.png"), b"2").unwrap();
        fs::write(blog.join("first.md"), "---\ntitle: First\n---\n![[my photo.png]]\n\n![[Pics/chart.png|Chart]]\n").unwrap();
        fs::write(blog.join("second.md"), "![[gone.png|lost]]\n\n`![[photo.png]]`\n").unwrap();
        fs::write(blog.join("notes.txt"), "ignored").unwrap();

        let content_dir = site.path().join("content/posts");
        let sync = VaultSync::new(vault.path().to_path_buf(), DEFAULT_BLOG_FOLDER, content_dir.clone(), &site.path().join("public"));
        let report = sync.run().unwrap();

        assert_eq!(report, SyncReport { posts: 2, images: 2, missing_images: 1 });

        let first = fs::read_to_string(content_dir.join("first.md")).unwrap();
        assert_eq!(first, "---\ntitle: First\n---\n![my photo](/images/my%20photo.png)\n\n![Chart](/images/chart.png)\n");
        let second = fs::read_to_string(content_dir.join("second.md")).unwrap();
        assert_eq!(second, "![[gone.png|lost]]\n\n`![[photo.png]]`\n");

        assert!(site.path().join("public/images/my photo.png").is_file());
        assert!(site.path().join("public/images/chart.png").is_file());
        assert!(!content_dir.join("notes.txt").exists());
    }

    #[test]
    fn test_missing_vault_folder() {
        let vault = TempDir::new().unwrap();
        let site = TempDir::new().unwrap();
        let sync = VaultSync::new(vault.path().to_path_buf(), "Nope", site.path().join("posts"), site.path());
        assert!(sync.run().is_err());
    }
}
