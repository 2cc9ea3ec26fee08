use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::content::image_resolver::ImageResolver;
use crate::content::{frontmatter, FileTimes, Post};
use crate::error::PostError;
use crate::render::Pipeline;

pub const EXCERPT_LENGTH: usize = 150;
pub const EXCERPT_ELLIPSIS: &str = "...";
/// Characters per minute, tuned for CJK-dense text.
pub const READING_RATE: usize = 200;

/// Plain-text preview of a Markdown body, cut at [`EXCERPT_LENGTH`] characters.
pub fn excerpt(body: &str) -> String {
    lazy_static! {
        static ref MARKERS: Regex = Regex::new(r"[#*`]").unwrap();
    }

    let plain = MARKERS.replace_all(body, "").replace('\n', " ");
    if plain.chars().count() <= EXCERPT_LENGTH {
        return plain;
    }

    let mut cut: String = plain.chars().take(EXCERPT_LENGTH).collect();
    cut.push_str(EXCERPT_ELLIPSIS);
    cut
}

/// Whole minutes, never less than one.
pub fn reading_time(body: &str) -> u32 {
    let chars = body.chars().count();
    chars.div_ceil(READING_RATE).max(1) as u32
}

pub struct PostAssembler {
    resolver: ImageResolver,
    pipeline: Pipeline,
}

impl PostAssembler {
    pub fn new(resolver: ImageResolver, pipeline: Pipeline) -> PostAssembler {
        PostAssembler { resolver, pipeline }
    }

    pub fn resolver(&self) -> &ImageResolver {
        &self.resolver
    }

    /// Builds a post from the raw file text, or the reason it was rejected.
    pub fn assemble(&self, slug: &str, raw: &str, times: FileTimes) -> Result<Post, PostError> {
        let document = frontmatter::parse(raw);
        let frontmatter = document.metadata.validate()?;

        let content = self.resolver.resolve(document.body)?;
        let html_content = self.pipeline.render(&content)?;

        Ok(Post::new(
            slug,
            frontmatter,
            content,
            html_content,
            excerpt(document.body),
            reading_time(document.body),
            times,
        ))
    }

    pub fn assemble_file(&self, slug: &str, path: &Path) -> Result<Post, PostError> {
        let raw = fs::read_to_string(path)?;
        let times = FileTimes::from_metadata(&fs::metadata(path)?);
        self.assemble(slug, &raw, times)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    use crate::storage::StorageService;
    use crate::test_data::{POST_BODY, POST_WITH_FRONTMATTER};

    use super::*;

    fn assembler(dir: &TempDir) -> PostAssembler {
        let resolver = ImageResolver::new(StorageService::disabled(), dir.path().join("assets"), dir.path().join("public"));
        PostAssembler::new(resolver, Pipeline::default())
    }

    fn times() -> FileTimes {
        let t = Local.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        FileTimes::new(&t, &t)
    }

    #[test]
    fn test_excerpt() {
        let long = "a".repeat(500);
        let out = excerpt(&long);
        assert_eq!(out.chars().count(), 150 + EXCERPT_ELLIPSIS.len());
        assert!(out.ends_with("..."));

        let short = "b".repeat(100);
        assert_eq!(excerpt(&short), short);

        assert_eq!(excerpt("# Title\n**bold** and `code`"), " Title bold and code");
        assert_eq!(excerpt(&"中".repeat(151)), format!("{}...", "中".repeat(150)));
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"x".repeat(200)), 1);
        assert_eq!(reading_time(&"x".repeat(201)), 2);
        assert_eq!(reading_time(&"x".repeat(401)), 3);
        assert_eq!(reading_time(&"字".repeat(400)), 2);
    }

    #[test]
    fn test_assemble() {
        let dir = TempDir::new().unwrap();
        let post = assembler(&dir).assemble("learning-ts", POST_WITH_FRONTMATTER, times()).unwrap();

        assert_eq!(post.slug, "learning-ts");
        assert_eq!(post.id, "learning-ts");
        assert_eq!(post.frontmatter.title, "Learning TypeScript the hard way");
        assert_eq!(post.excerpt, excerpt(POST_BODY));
        assert_eq!(post.reading_time, reading_time(POST_BODY));
        assert_eq!(post.created_time, "2024-01-15 09:00:00");
        assert!(post.content.contains("![cover](/images/cover.png)"));
        assert!(post.html_content.contains("<h2>Why</h2>"));
        assert!(post.html_content.contains("class=\"markdown-image\""));
        assert!(post.html_content.contains("<div class=\"mermaid\""));
    }

    #[test]
    fn test_missing_required_fields() {
        let dir = TempDir::new().unwrap();
        let assembler = assembler(&dir);

        let no_date = "---\ntitle: Only a title\n---\nbody\n";
        assert!(matches!(assembler.assemble("x", no_date, times()), Err(PostError::MissingRequiredField("date"))));

        let no_title = "---\ndate: 2024-01-01\n---\nbody\n";
        assert!(matches!(assembler.assemble("x", no_title, times()), Err(PostError::MissingRequiredField("title"))));

        let truncated = "---\ntitle: T\ndate: 2024-01-01\nbody\n";
        assert!(matches!(assembler.assemble("x", truncated, times()), Err(PostError::MissingRequiredField(_))));
    }

    #[test]
    fn test_assemble_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.md");
        fs::write(&path, POST_WITH_FRONTMATTER).unwrap();

        let post = assembler(&dir).assemble_file("hello", &path).unwrap();
        assert_eq!(post.slug, "hello");
        assert_eq!(post.created_time.len(), "2024-01-15 09:00:00".len());

        let missing = assembler(&dir).assemble_file("nope", &dir.path().join("nope.md"));
        assert!(matches!(missing, Err(PostError::Io(_))));
    }
}
