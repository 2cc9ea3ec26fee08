//! Rewrites image references in a Markdown body to publishable URLs.
//!
//! Standard `![alt](path)` images and bracketed `![[path|alt]]` embeds are
//! located on the parsed document, so references inside code are never
//! touched. The rewrites are applied as byte-range edits on the source
//! text; everything else is kept verbatim.

use std::collections::HashSet;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::{fs, io};

use lazy_static::lazy_static;
use markdown::mdast::{Definition, Node};
use regex::Regex;
use spdlog::{error, warn};

use crate::render::mdast_to_html::normalize_id;
use crate::render::{parse_markdown, TransformError};
use crate::storage::StorageService;

lazy_static! {
    static ref EMBED_REGEX: Regex = Regex::new(r"!\[\[([^\]|]+)(?:\|([^\]]*))?\]\]").unwrap();
    static ref URL_SCHEME_REGEX: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap();
}

pub const IMAGES_NAMESPACE: &str = "images";
pub const ASSETS_NAMESPACE: &str = "assets";

/// A bracketed `![[target|alt]]` embed.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed<'a> {
    pub target: &'a str,
    pub alt: Option<&'a str>,
}

impl Embed<'_> {
    pub fn basename(&self) -> &str {
        basename(self.target)
    }

    /// The given alt text, or the file name without its extension.
    pub fn alt_text(&self) -> String {
        match self.alt.map(str::trim) {
            Some(alt) if !alt.is_empty() => alt.to_string(),
            _ => {
                let name = self.basename();
                match name.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                    _ => name.to_string(),
                }
            }
        }
    }
}

/// Policy applied to every image reference found in a document.
pub trait ImageRewriter {
    /// New URL for a standard image, `None` keeps it.
    fn rewrite_image(&self, url: &str) -> Option<String>;

    /// Replacement Markdown for an embed, `None` keeps it.
    fn rewrite_embed(&self, embed: &Embed) -> Option<String>;
}

pub fn is_absolute_url(url: &str) -> bool {
    URL_SCHEME_REGEX.is_match(url) || url.starts_with("//") || url.starts_with("data:")
}

pub fn basename(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
}

fn escape_alt(alt: &str) -> String {
    alt.replace('\\', "\\\\").replace('[', "\\[").replace(']', "\\]")
}

fn link_destination(url: &str) -> String {
    if url.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

/// Standard image syntax for the given parts.
pub fn image_markdown(alt: &str, url: &str, title: Option<&str>) -> String {
    let url = link_destination(url);
    match title {
        Some(title) => format!("![{}]({} \"{}\")", escape_alt(alt), url, title.replace('"', "\\\"")),
        None => format!("![{}]({})", escape_alt(alt), url),
    }
}

fn definition_markdown(def: &Definition, url: &str) -> String {
    let label = def.label.as_deref().unwrap_or(&def.identifier);
    let url = link_destination(url);
    match def.title {
        Some(ref title) => format!("[{}]: {} \"{}\"", label, url, title.replace('"', "\\\"")),
        None => format!("[{}]: {}", label, url),
    }
}

type Edit = (Range<usize>, String);

fn scan_embeds<R: ImageRewriter + ?Sized>(source: &str, range: Range<usize>, rewriter: &R, edits: &mut Vec<Edit>) {
    let slice = &source[range.clone()];
    for caps in EMBED_REGEX.captures_iter(slice) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let start = range.start + whole.start();
        if source[..start].ends_with('\\') {
            continue;
        }
        let Some(target) = caps.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };

        let embed = Embed { target, alt: caps.get(2).map(|m| m.as_str()) };
        if let Some(replacement) = rewriter.rewrite_embed(&embed) {
            edits.push((start..start + whole.len(), replacement));
        }
    }
}

/// Inline content the embed scan steps over.
fn opaque_ranges(node: &Node, ranges: &mut Vec<Range<usize>>) {
    match node {
        Node::InlineCode(_) | Node::InlineMath(_) | Node::Html(_) | Node::Image(_) | Node::ImageReference(_) => {
            if let Some(pos) = node.position() {
                ranges.push(pos.start.offset..pos.end.offset);
            }
        }
        _ => {
            for child in node.children().into_iter().flatten() {
                opaque_ranges(child, ranges);
            }
        }
    }
}

/// Scans the whole source of a paragraph, heading or table cell. The parser
/// turns parts of an embed into links or emphasis, so its text nodes alone
/// do not hold it.
fn scan_inline_container<R: ImageRewriter + ?Sized>(node: &Node, source: &str, rewriter: &R, edits: &mut Vec<Edit>) {
    let Some(pos) = node.position() else {
        return;
    };

    let mut skipped = vec![];
    for child in node.children().into_iter().flatten() {
        opaque_ranges(child, &mut skipped);
    }
    skipped.sort_by_key(|range| range.start);

    let mut cursor = pos.start.offset;
    for range in skipped {
        if range.start > cursor {
            scan_embeds(source, cursor..range.start, rewriter, edits);
        }
        cursor = cursor.max(range.end);
    }
    if cursor < pos.end.offset {
        scan_embeds(source, cursor..pos.end.offset, rewriter, edits);
    }
}

fn image_reference_ids(node: &Node, ids: &mut HashSet<String>) {
    if let Node::ImageReference(reference) = node {
        ids.insert(normalize_id(&reference.identifier));
    }
    for child in node.children().into_iter().flatten() {
        image_reference_ids(child, ids);
    }
}

fn collect_edits<R: ImageRewriter + ?Sized>(
    node: &Node,
    source: &str,
    rewriter: &R,
    image_ids: &HashSet<String>,
    edits: &mut Vec<Edit>,
) {
    match node {
        Node::Image(image) => {
            if let (Some(url), Some(pos)) = (rewriter.rewrite_image(&image.url), node.position()) {
                edits.push((pos.start.offset..pos.end.offset, image_markdown(&image.alt, &url, image.title.as_deref())));
            }
            return;
        }
        // Reference-style images point at their definition, so that is what
        // gets rewritten. Definitions only used by links stay as they are.
        Node::Definition(def) => {
            if !image_ids.contains(&normalize_id(&def.identifier)) {
                return;
            }
            if let (Some(url), Some(pos)) = (rewriter.rewrite_image(&def.url), node.position()) {
                edits.push((pos.start.offset..pos.end.offset, definition_markdown(def, &url)));
            }
            return;
        }
        Node::Paragraph(_) | Node::Heading(_) | Node::TableCell(_) => {
            scan_inline_container(node, source, rewriter, edits);
        }
        _ => {}
    }

    for child in node.children().into_iter().flatten() {
        collect_edits(child, source, rewriter, image_ids, edits);
    }
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|(range, _)| range.start);

    let mut buf = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        buf.push_str(&source[cursor..range.start]);
        buf.push_str(&replacement);
        cursor = range.end;
    }
    buf.push_str(&source[cursor..]);
    buf
}

/// Runs `rewriter` over every image reference of `markdown` in one pass.
pub fn rewrite_image_refs<R: ImageRewriter + ?Sized>(markdown: &str, rewriter: &R) -> Result<String, TransformError> {
    let root = parse_markdown(markdown)?;
    let mut image_ids = HashSet::new();
    image_reference_ids(&root, &mut image_ids);

    let mut edits = vec![];
    collect_edits(&root, markdown, rewriter, &image_ids, &mut edits);

    if edits.is_empty() {
        return Ok(markdown.to_string());
    }
    Ok(apply_edits(markdown, edits))
}

/// Publish-time image policy.
///
/// Relative images point to `/images/{basename}` and embeds are copied from
/// the assets directory into `public/assets`. With a configured storage
/// service both use `{base}/images/{basename}` instead.
#[derive(Clone, Debug)]
pub struct ImageResolver {
    storage: StorageService,
    assets_dir: PathBuf,
    public_dir: PathBuf,
}

impl ImageResolver {
    pub fn new(storage: StorageService, assets_dir: PathBuf, public_dir: PathBuf) -> ImageResolver {
        ImageResolver { storage, assets_dir, public_dir }
    }

    pub fn public_images_dir(&self) -> PathBuf {
        self.public_dir.join(IMAGES_NAMESPACE)
    }

    pub fn public_assets_dir(&self) -> PathBuf {
        self.public_dir.join(ASSETS_NAMESPACE)
    }

    pub fn ensure_public_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.public_images_dir())?;
        fs::create_dir_all(self.public_assets_dir())
    }

    pub fn resolve(&self, markdown: &str) -> Result<String, TransformError> {
        rewrite_image_refs(markdown, self)
    }

    fn public_url(&self, namespace: &str, basename: &str) -> String {
        match self.storage.public_base_url() {
            Some(base) => format!("{}/{}/{}", base, IMAGES_NAMESPACE, basename),
            None => format!("/{}/{}", namespace, basename),
        }
    }

    fn locate_asset(&self, target: &str) -> Option<PathBuf> {
        let relative = Path::new(target);
        let escapes = relative.components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return None;
        }

        [self.assets_dir.join(relative), self.assets_dir.join(basename(target))]
            .into_iter()
            .find(|candidate| candidate.is_file())
    }

    fn publish_asset(&self, source: &Path, name: &str) -> io::Result<PathBuf> {
        let target_dir = self.public_assets_dir();
        fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(name);
        fs::copy(source, &target)?;
        Ok(target)
    }

    /// Copies every regular file of the assets directory into `public/assets`
    /// and returns the copied file names. A missing assets directory copies
    /// nothing.
    pub fn publish_all_assets(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.assets_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("No assets directory found at {}", self.assets_dir.display());
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };

        let mut copied = vec![];
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(|s| s.to_string()) else {
                continue;
            };
            self.publish_asset(&entry.path(), &name)?;
            copied.push(name);
        }
        copied.sort();
        Ok(copied)
    }
}

impl ImageRewriter for ImageResolver {
    fn rewrite_image(&self, url: &str) -> Option<String> {
        if url.is_empty() || is_absolute_url(url) || url.starts_with('/') {
            return None;
        }
        Some(self.public_url(IMAGES_NAMESPACE, basename(url)))
    }

    fn rewrite_embed(&self, embed: &Embed) -> Option<String> {
        let alt = embed.alt_text();
        if is_absolute_url(embed.target) {
            return Some(image_markdown(&alt, embed.target, None));
        }

        let name = embed.basename();
        let Some(source) = self.locate_asset(embed.target) else {
            warn!("Image asset {} not found in {}", embed.target, self.assets_dir.display());
            return None;
        };

        if let Err(e) = self.publish_asset(&source, name) {
            error!("Failed to copy {} to {}: {}", source.display(), self.public_assets_dir().display(), e);
            return None;
        }

        Some(image_markdown(&alt, &self.public_url(ASSETS_NAMESPACE, name), None))
    }
}
