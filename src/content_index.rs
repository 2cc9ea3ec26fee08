//! Loading and querying the published post set.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use spdlog::{debug, error, info, warn};

use crate::config::Config;
use crate::content::assembler::PostAssembler;
use crate::content::image_resolver::ImageResolver;
use crate::content::Post;
use crate::error::PostError;
use crate::paginator::Paginator;
use crate::render::Pipeline;
use crate::scanner::{ContentScanner, PostSource};
use crate::storage::StorageService;

/// Optional filters, combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub tag: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Page<'a> {
    pub items: Vec<&'a Post>,
    pub total: usize,
}

/// Newest first. Posts with an unrecognizable date go last; the sort is
/// stable so equal keys keep scan order.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| match (a.sort_key(), b.sort_key()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn matches_search(post: &Post, lower_query: &str) -> bool {
    let fm = &post.frontmatter;
    fm.title.to_lowercase().contains(lower_query)
        || fm.description.to_lowercase().contains(lower_query)
        || post.content.to_lowercase().contains(lower_query)
        || fm.tags.iter().any(|t| t.to_lowercase().contains(lower_query))
}

/// Snapshot of the published (non-draft) posts, sorted newest first.
#[derive(Debug, Default)]
pub struct PostSet {
    posts: Vec<Post>,
}

impl PostSet {
    pub fn new(mut posts: Vec<Post>) -> PostSet {
        posts.retain(|p| !p.is_draft());
        sort_newest_first(&mut posts);
        PostSet { posts }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn list_all(&self) -> &[Post] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }

    pub fn get(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.slug == slug)
    }

    /// Exact, case-sensitive tag match.
    pub fn by_tag(&self, tag: &str) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.has_tag(tag)).collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.has_category(category)).collect()
    }

    /// Case-insensitive substring match on title, description, body and tags.
    pub fn search(&self, query: &str) -> Vec<&Post> {
        let lower_query = query.to_lowercase();
        self.posts.iter().filter(|p| matches_search(p, &lower_query)).collect()
    }

    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for post in self.posts.iter() {
            for tag in post.frontmatter.tags.iter() {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for post in self.posts.iter() {
            for category in post.frontmatter.categories.iter() {
                *counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Sorted, without duplicates.
    pub fn all_tags(&self) -> Vec<String> {
        let tags: BTreeSet<&String> = self.posts.iter().flat_map(|p| p.frontmatter.tags.iter()).collect();
        tags.into_iter().cloned().collect()
    }

    pub fn all_categories(&self) -> Vec<String> {
        let categories: BTreeSet<&String> = self.posts.iter().flat_map(|p| p.frontmatter.categories.iter()).collect();
        categories.into_iter().cloned().collect()
    }

    /// Applies `filter`, then slices out `page` when a `limit` is given.
    /// `total` counts the filtered posts before slicing.
    pub fn filtered_and_paged(&self, filter: &PostFilter, page: usize, limit: Option<usize>) -> Page<'_> {
        let lower_query = filter.search.as_ref().map(|q| q.to_lowercase());
        let filtered: Vec<&Post> = self.posts.iter()
            .filter(|p| filter.tag.as_ref().map_or(true, |tag| p.has_tag(tag)))
            .filter(|p| filter.category.as_ref().map_or(true, |c| p.has_category(c)))
            .filter(|p| lower_query.as_ref().map_or(true, |q| matches_search(p, q)))
            .collect();

        let total = filtered.len();
        let items = match limit {
            None => filtered,
            Some(limit) => Paginator::from(&filtered, limit)
                .get_page(page.max(1))
                .map(|items| items.to_vec())
                .unwrap_or_default(),
        };

        Page { items, total }
    }
}

/// Entry point to the content: every call reads the sources again.
pub struct ContentIndex {
    scanner: ContentScanner,
    assembler: PostAssembler,
}

impl ContentIndex {
    pub fn new(scanner: ContentScanner, assembler: PostAssembler) -> ContentIndex {
        ContentIndex { scanner, assembler }
    }

    pub fn from_config(config: &Config, storage: StorageService) -> ContentIndex {
        let scanner = ContentScanner::new(config.paths.content_dir.clone(), &config.defaults.index_base_name);
        let resolver = ImageResolver::new(storage, config.paths.assets_dir.clone(), config.paths.public_dir.clone());
        ContentIndex::new(scanner, PostAssembler::new(resolver, Pipeline::default()))
    }

    /// Creates the content root and the publish directories when missing.
    pub fn prepare(&self) -> std::io::Result<()> {
        self.scanner.ensure_root()?;
        self.assembler.resolver().ensure_public_dirs()
    }

    fn assemble_source(&self, source: &PostSource) -> Option<Post> {
        match self.assembler.assemble_file(&source.slug, &source.path) {
            Ok(post) => Some(post),
            Err(PostError::MissingRequiredField(field)) => {
                warn!("Skipping post {}: missing required field {}", source.slug, field);
                None
            }
            Err(e) => {
                error!("Skipping post {}: {}", source.slug, e);
                None
            }
        }
    }

    /// Every post that assembles, drafts included, in scan order.
    pub fn load_sources(&self) -> Vec<Post> {
        let sources = match self.scanner.scan() {
            Ok(sources) => sources,
            Err(e) => {
                error!("Unable to list {}: {}", self.scanner.root_dir().display(), e);
                return vec![];
            }
        };

        let posts: Vec<Post> = sources.iter()
            .filter_map(|source| self.assemble_source(source))
            .collect();
        debug!("Assembled {} of {} post sources", posts.len(), sources.len());
        posts
    }

    pub fn load(&self) -> PostSet {
        let set = PostSet::new(self.load_sources());
        info!("Loaded {} published posts", set.len());
        set
    }

    /// Drafts are returned too: only listings hide them.
    pub fn get_by_slug(&self, slug: &str) -> Option<Post> {
        let source = self.scanner.find(slug)?;
        self.assemble_source(&source)
    }

    pub fn list_all(&self) -> Vec<Post> {
        self.load().into_posts()
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<Post> {
        self.load().by_tag(tag).into_iter().cloned().collect()
    }

    pub fn search(&self, query: &str) -> Vec<Post> {
        self.load().search(query).into_iter().cloned().collect()
    }

    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        self.load().tag_counts()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use crate::test_data::write_post;

    use super::*;

    fn index(root: &Path) -> ContentIndex {
        let scanner = ContentScanner::new(root.join("posts"), "index");
        let resolver = ImageResolver::new(StorageService::disabled(), root.join("assets"), root.join("public"));
        ContentIndex::new(scanner, PostAssembler::new(resolver, Pipeline::default()))
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let posts = dir.path().join("posts");
        write_post(&posts, "old-react", "title: Old React\ndate: 2022-05-01\ntags: [react]", "Class components.");
        write_post(&posts, "new-react", "title: New React\ndate: 2024-02-01\ntags: [react, typescript]\ncategories: [web]", "Hooks everywhere.");
        write_post(&posts, "rust-notes", "title: Rust notes\ndate: 2023-07-10 08:00\ntags: [rust]\ndescription: Learning TypeScript alternatives", "Ownership.");
        write_post(&posts, "secret", "title: Secret\ndate: 2025-01-01\ntags: [react]\ndraft: true", "Not yet.");
        write_post(&posts, "no-date", "title: No date", "Invalid.");
        write_post(&posts, "weird-date", "title: Someday\ndate: whenever\ntags: [misc]", "Undated.");
        dir
    }

    fn slugs(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|p| p.slug.clone()).collect()
    }

    #[test]
    fn test_list_all_sorted_without_drafts() {
        let dir = fixture();
        let set = index(dir.path()).load();
        let all: Vec<&Post> = set.list_all().iter().collect();

        assert_eq!(slugs(&all), vec!["new-react", "rust-notes", "old-react", "weird-date"]);
        assert!(all.iter().all(|p| !p.frontmatter.draft));
        for pair in all.windows(2) {
            if let (Some(a), Some(b)) = (pair[0].sort_key(), pair[1].sort_key()) {
                assert!(a >= b);
            }
        }
    }

    #[test]
    fn test_get_by_slug() {
        let dir = fixture();
        let index = index(dir.path());

        assert_eq!(index.get_by_slug("rust-notes").unwrap().frontmatter.title, "Rust notes");
        assert!(index.get_by_slug("secret").unwrap().frontmatter.draft);
        assert!(index.get_by_slug("no-date").is_none());
        assert!(index.get_by_slug("does-not-exist").is_none());
    }

    #[test]
    fn test_tags_and_search() {
        let dir = fixture();
        let set = index(dir.path()).load();

        assert_eq!(slugs(&set.by_tag("react")), vec!["new-react", "old-react"]);
        assert!(set.by_tag("React").is_empty());
        assert_eq!(slugs(&set.search("TYPESCRIPT")), vec!["new-react", "rust-notes"]);
        assert_eq!(slugs(&set.search("hooks")), vec!["new-react"]);

        let counts = set.tag_counts();
        assert_eq!(counts.get("react"), Some(&2));
        assert_eq!(counts.get("typescript"), Some(&1));
        assert_eq!(set.all_tags(), vec!["misc", "react", "rust", "typescript"]);
        assert_eq!(set.all_categories(), vec!["web"]);
        assert_eq!(set.category_counts().get("web"), Some(&1));
    }

    #[test]
    fn test_filtered_and_paged() {
        let dir = fixture();
        let set = index(dir.path()).load();

        let react = PostFilter { tag: Some("react".to_string()), ..Default::default() };
        let page = set.filtered_and_paged(&react, 1, Some(1));
        assert_eq!(page.total, 2);
        assert_eq!(slugs(&page.items), vec!["new-react"]);

        let page = set.filtered_and_paged(&react, 2, Some(1));
        assert_eq!(slugs(&page.items), vec!["old-react"]);

        let page = set.filtered_and_paged(&react, 2, Some(10));
        assert_eq!(page.total, 2);
        assert!(page.items.is_empty());

        let both = PostFilter {
            tag: Some("react".to_string()),
            search: Some("hooks".to_string()),
            category: Some("web".to_string()),
        };
        assert_eq!(slugs(&set.filtered_and_paged(&both, 1, None).items), vec!["new-react"]);

        let everything = set.filtered_and_paged(&PostFilter::default(), 1, None);
        assert_eq!(everything.total, 4);
        assert_eq!(everything.items.len(), 4);
    }

    #[test]
    fn test_missing_content_dir() {
        let dir = TempDir::new().unwrap();
        let index = index(dir.path());
        assert!(index.load().is_empty());

        index.prepare().unwrap();
        assert!(dir.path().join("posts").is_dir());
        assert!(dir.path().join("public/images").is_dir());
        assert!(dir.path().join("public/assets").is_dir());
    }
}
