use std::fs::Metadata;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;

use crate::text_utils::{format_timestamp, parse_post_date};

pub mod assembler;
pub mod frontmatter;
pub mod image_resolver;

/// Validated per-file metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostFrontmatter {
    pub title: String,
    pub date: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub description: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub draft: bool,
}

/// Formatted filesystem timestamps of a post source.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTimes {
    pub created: String,
    pub updated: String,
}

impl FileTimes {
    pub fn new(created: &DateTime<Local>, updated: &DateTime<Local>) -> FileTimes {
        FileTimes {
            created: format_timestamp(created),
            updated: format_timestamp(updated),
        }
    }

    /// Birth time falls back to the modification time on filesystems that
    /// do not record it.
    pub fn from_metadata(metadata: &Metadata) -> FileTimes {
        let updated = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        let created = metadata.created().unwrap_or(updated);
        FileTimes::new(&DateTime::<Local>::from(created), &DateTime::<Local>::from(updated))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub frontmatter: PostFrontmatter,
    /// Markdown body with image references already resolved
    pub content: String,
    pub html_content: String,
    pub excerpt: String,
    pub reading_time: u32,
    pub created_time: String,
    pub updated_time: String,
    #[serde(skip)]
    sort_key: Option<NaiveDateTime>,
}

impl Post {
    pub fn new(slug: &str,
               frontmatter: PostFrontmatter,
               content: String,
               html_content: String,
               excerpt: String,
               reading_time: u32,
               times: FileTimes) -> Post {
        let sort_key = parse_post_date(&frontmatter.date).ok();
        Post {
            id: slug.to_string(),
            slug: slug.to_string(),
            frontmatter,
            content,
            html_content,
            excerpt,
            reading_time,
            created_time: times.created,
            updated_time: times.updated,
            sort_key,
        }
    }

    /// Parsed `frontmatter.date`, `None` when it is not a recognizable date.
    pub fn sort_key(&self) -> Option<NaiveDateTime> {
        self.sort_key
    }

    pub fn is_draft(&self) -> bool {
        self.frontmatter.draft
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.frontmatter.tags.iter().any(|t| t == tag)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.frontmatter.categories.iter().any(|c| c == category)
    }
}
