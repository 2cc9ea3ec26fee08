//! Markdown to HTML.
//!
//! The body is parsed into a syntax tree, converted to an [`HtmlTree`] and
//! then handed through an ordered list of stages before serialization.

use markdown::mdast::Node;
use markdown::ParseOptions;
use spdlog::trace;
use thiserror::Error;

pub use crate::render::html_tree::{Element, HtmlNode, HtmlTree};

pub mod html_tree;
pub mod mdast_to_html;
pub mod stages;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("markdown parse error: {0}")]
    Parse(String),
}

pub type Stage = fn(HtmlTree) -> HtmlTree;

pub struct Pipeline {
    stages: Vec<(&'static str, Stage)>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::empty()
            .with_stage("annotate-images", stages::annotate_images)
            .with_stage("highlight-code", stages::highlight_code)
            .with_stage("extract-diagrams", stages::extract_diagrams)
    }
}

impl Pipeline {
    /// Plain conversion, no stages.
    pub fn empty() -> Pipeline {
        Pipeline { stages: vec![] }
    }

    pub fn with_stage(mut self, name: &'static str, stage: Stage) -> Pipeline {
        self.stages.push((name, stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    pub fn render(&self, markdown: &str) -> Result<String, TransformError> {
        let root = parse_markdown(markdown)?;
        let tree = mdast_to_html::to_html_tree(&root);
        let tree = self.stages.iter().fold(tree, |tree, (name, stage)| {
            trace!("Running render stage {}", name);
            stage(tree)
        });
        Ok(tree.to_html())
    }
}

pub fn parse_markdown(markdown: &str) -> Result<Node, TransformError> {
    markdown::to_mdast(markdown, &ParseOptions::gfm())
        .map_err(|e| TransformError::Parse(e.reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stage_order() {
        let pipeline = Pipeline::default();
        assert_eq!(pipeline.stage_names(), vec!["annotate-images", "highlight-code", "extract-diagrams"]);
    }

    #[test]
    fn test_empty_pipeline_is_plain_html() {
        let html = Pipeline::empty().render("![a](/images/a.png)\n").unwrap();
        assert_eq!(html, "<p><img src=\"/images/a.png\" alt=\"a\" /></p>\n");
    }

    #[test]
    fn test_full_pipeline() {
        let md = "# Hi\n\n![a](/images/a.png)\n\n```mermaid\ngraph TD\n  A-->B\n```\n\n```rust\nlet x = 1;\n```\n";
        let html = Pipeline::default().render(md).unwrap();
        assert!(html.contains("<h1>Hi</h1>"));
        assert!(html.contains("class=\"markdown-image\""));
        assert!(html.contains("<div class=\"mermaid\""));
        assert!(html.contains("<code class=\"language-rust\"><span class="));
        assert!(!html.contains("language-mermaid"));
    }
}
