//! YAML front-matter between `---` delimiter lines.
//!
//! Parsing never fails: a missing, unterminated or invalid block yields empty
//! metadata and the whole file as body. Required fields are checked by
//! [`RawFrontmatter::validate`].

use serde::{Deserialize, Deserializer};
use spdlog::debug;

use crate::content::PostFrontmatter;
use crate::error::PostError;

const DELIMITER: &str = "---";

/// Metadata as written, every field optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawFrontmatter {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub categories: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub cover: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub draft: bool,
}

#[derive(Debug, PartialEq)]
pub struct Document<'a> {
    pub metadata: RawFrontmatter,
    pub body: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Option<Scalar>>),
    One(Scalar),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.map(Scalar::into_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => vec![],
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values.into_iter().flatten().collect(),
    };

    Ok(values.into_iter()
        .map(|v| v.into_string().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Int(i)) => i != 0,
        Some(Scalar::Str(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        Some(Scalar::Float(_)) | None => false,
    };
    Ok(value)
}

impl RawFrontmatter {
    pub fn validate(self) -> Result<PostFrontmatter, PostError> {
        let title = self.title.ok_or(PostError::MissingRequiredField("title"))?;
        let date = self.date.ok_or(PostError::MissingRequiredField("date"))?;

        Ok(PostFrontmatter {
            title,
            date,
            tags: self.tags,
            categories: self.categories,
            description: self.description.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            cover: self.cover,
            draft: self.draft,
        })
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Returns the YAML block and the body, or `None` when the text does not
/// start with a complete block.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let (first, mut rest) = text.split_once('\n')?;
    if !is_delimiter(first) {
        return None;
    }

    let yaml_start = text.len() - rest.len();
    loop {
        let line_start = text.len() - rest.len();
        let (line, next) = match rest.split_once('\n') {
            Some((line, next)) => (line, next),
            None => (rest, ""),
        };
        if is_delimiter(line) {
            return Some((&text[yaml_start..line_start], next));
        }
        if next.is_empty() {
            return None;
        }
        rest = next;
    }
}

pub fn parse(text: &str) -> Document<'_> {
    let Some((yaml, body)) = split(text) else {
        return Document { metadata: RawFrontmatter::default(), body: text };
    };

    if yaml.trim().is_empty() {
        return Document { metadata: RawFrontmatter::default(), body };
    }

    match serde_yaml::from_str::<RawFrontmatter>(yaml) {
        Ok(metadata) => Document { metadata, body },
        Err(e) => {
            debug!("Ignoring invalid front-matter: {}", e);
            Document { metadata: RawFrontmatter::default(), body: text }
        }
    }
}
