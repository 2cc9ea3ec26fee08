use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

use spdlog::{debug, warn};

const MARKDOWN_EXT: &str = "md";

#[derive(Debug, Clone, PartialEq)]
pub struct PostSource {
    pub slug: String,
    pub path: PathBuf,
}

/// Finds post sources under the content root.
///
/// A post is either `slug.md` or a directory `slug/` holding
/// `{index_base_name}.md` next to its files.
pub struct ContentScanner {
    root_dir: PathBuf,
    index_base_name: String,
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && !is_hidden(slug) && !slug.contains(['/', '\\'])
}

impl ContentScanner {
    pub fn new(root_dir: PathBuf, index_base_name: &str) -> ContentScanner {
        ContentScanner {
            root_dir,
            index_base_name: index_base_name.to_string(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root_dir)
    }

    fn index_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", self.index_base_name, MARKDOWN_EXT))
    }

    fn source_from_entry(&self, entry: &fs::DirEntry) -> io::Result<Option<PostSource>> {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            return Ok(None);
        };
        if is_hidden(file_name) {
            return Ok(None);
        }

        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_file() {
            let is_markdown = path.extension().is_some_and(|ext| ext == MARKDOWN_EXT);
            let slug = file_name.strip_suffix(".md").unwrap_or(file_name);
            if is_markdown && is_valid_slug(slug) {
                return Ok(Some(PostSource { slug: slug.to_string(), path }));
            }
        } else if file_type.is_dir() {
            let index = self.index_file(&path);
            if index.is_file() {
                return Ok(Some(PostSource { slug: file_name.to_string(), path: index }));
            }
        }

        Ok(None)
    }

    /// All sources ordered by path. A missing root is an empty result; when two
    /// sources share a slug the later one wins.
    pub fn scan(&self) -> io::Result<Vec<PostSource>> {
        let entries = match fs::read_dir(&self.root_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Content directory {} does not exist", self.root_dir.display());
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };

        let mut found = vec![];
        for entry in entries {
            if let Some(source) = self.source_from_entry(&entry?)? {
                found.push(source);
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));

        let mut sources: Vec<PostSource> = Vec::with_capacity(found.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for source in found {
            match positions.get(&source.slug) {
                Some(&idx) => {
                    warn!("Duplicate slug {}: {} replaces {}", source.slug, source.path.display(), sources[idx].path.display());
                    sources[idx] = source;
                }
                None => {
                    positions.insert(source.slug.clone(), sources.len());
                    sources.push(source);
                }
            }
        }

        Ok(sources)
    }

    pub fn slugs(&self) -> io::Result<Vec<String>> {
        Ok(self.scan()?.into_iter().map(|s| s.slug).collect())
    }

    /// Source for one slug without listing the directory. Follows the same
    /// precedence as [`scan`](Self::scan): `slug.md` wins over `slug/`.
    pub fn find(&self, slug: &str) -> Option<PostSource> {
        if !is_valid_slug(slug) {
            return None;
        }

        let file = self.root_dir.join(format!("{}.{}", slug, MARKDOWN_EXT));
        if file.is_file() {
            return Some(PostSource { slug: slug.to_string(), path: file });
        }

        let index = self.index_file(&self.root_dir.join(slug));
        if index.is_file() {
            return Some(PostSource { slug: slug.to_string(), path: index });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let scanner = ContentScanner::new(dir.path().join("nothing-here"), "index");
        assert_eq!(scanner.scan().unwrap(), vec![]);
        assert!(scanner.find("any").is_none());

        scanner.ensure_root().unwrap();
        scanner.ensure_root().unwrap();
        assert!(dir.path().join("nothing-here").is_dir());
    }

    #[test]
    fn test_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("b-post.md"));
        touch(&root.join("a-post.md"));
        touch(&root.join("notes.txt"));
        touch(&root.join(".hidden.md"));
        touch(&root.join("with-images/index.md"));
        touch(&root.join("with-images/cat.png"));
        touch(&root.join("no-index/other.md"));

        let scanner = ContentScanner::new(root.to_path_buf(), "index");
        assert_eq!(scanner.slugs().unwrap(), vec!["a-post", "b-post", "with-images"]);

        let source = scanner.find("with-images").unwrap();
        assert_eq!(source.path, root.join("with-images/index.md"));
        assert!(scanner.find("no-index").is_none());
        assert!(scanner.find("../etc").is_none());
    }

    #[test]
    fn test_duplicate_slug_last_wins() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("dup/index.md"));
        touch(&root.join("dup.md"));

        let scanner = ContentScanner::new(root.to_path_buf(), "index");
        let sources = scanner.scan().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, root.join("dup.md"));
        assert_eq!(scanner.find("dup").unwrap().path, root.join("dup.md"));
    }
}
