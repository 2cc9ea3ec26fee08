use lazy_static::lazy_static;
use spdlog::debug;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::render::html_tree::{visit_elements_mut, Element, HtmlNode, HtmlTree};

pub const IMAGE_WIDTH: &str = "800";
pub const IMAGE_HEIGHT: &str = "600";
pub const IMAGE_CLASS: &str = "markdown-image";

/// Code fence languages rendered client-side instead of highlighted.
pub const DIAGRAM_LANGUAGES: [&str; 1] = ["mermaid"];

/// Fence tokens no grammar lists as an extension or name.
const LANGUAGE_ALIASES: [(&str, &str); 5] = [
    ("ts", "typescript"),
    ("tsx", "typescriptreact"),
    ("jsx", "javascript"),
    ("sh", "bash"),
    ("yml", "yaml"),
];

lazy_static! {
    // syntect's own defaults lack TypeScript and TSX
    static ref SYNTAX_SET: SyntaxSet = two_face::syntax::extra_newlines();
}

/// Default dimensions, lazy loading and a stable class on every image.
pub fn annotate_images(mut tree: HtmlTree) -> HtmlTree {
    visit_elements_mut(&mut tree.children, &mut |el: &mut Element| {
        if el.tag != "img" {
            return;
        }
        if el.attr("width").is_none() {
            el.set_attr("width", IMAGE_WIDTH);
        }
        if el.attr("height").is_none() {
            el.set_attr("height", IMAGE_HEIGHT);
        }
        el.set_attr("class", IMAGE_CLASS);
        if el.attr("loading").is_none() {
            el.set_attr("loading", "lazy");
        }
    });
    tree
}

fn is_diagram_language(lang: &str) -> bool {
    DIAGRAM_LANGUAGES.iter().any(|d| d.eq_ignore_ascii_case(lang))
}

fn code_language(code: &Element) -> Option<String> {
    code.classes()
        .find_map(|c| c.strip_prefix("language-"))
        .map(|l| l.to_string())
}

/// The `code` element of a `pre > code` block.
fn block_code(pre: &mut Element) -> Option<&mut Element> {
    if pre.tag != "pre" {
        return None;
    }
    match pre.children.as_mut_slice() {
        [HtmlNode::Element(code)] if code.tag == "code" => Some(code),
        _ => None,
    }
}

fn find_syntax(lang: &str) -> Option<&'static SyntaxReference> {
    let set: &'static SyntaxSet = &SYNTAX_SET;
    let lang = lang.to_ascii_lowercase();
    set.find_syntax_by_token(&lang).or_else(|| {
        LANGUAGE_ALIASES.iter()
            .find(|(alias, _)| *alias == lang)
            .and_then(|(_, name)| set.find_syntax_by_token(name))
    })
}

fn highlight_source(source: &str, syntax: &SyntaxReference) -> Result<String, syntect::Error> {
    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);
    for line in LinesWithEndings::from(source) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

fn highlight_block(code: &mut Element) {
    let lang = code_language(code);
    if lang.as_deref().is_some_and(is_diagram_language) {
        return;
    }

    let source = code.text_content();
    let syntax = match lang {
        Some(ref lang) => find_syntax(lang),
        None => source.lines().next().and_then(|first| SYNTAX_SET.find_syntax_by_first_line(first)),
    };
    let Some(syntax) = syntax else {
        return;
    };

    match highlight_source(&source, syntax) {
        Ok(html) => {
            code.children = vec![HtmlNode::Raw(html)];
            if lang.is_none() {
                let token = syntax.file_extensions.first().cloned()
                    .unwrap_or_else(|| syntax.name.to_lowercase().replace(' ', "-"));
                code.add_class(&format!("language-{}", token));
            }
        }
        Err(e) => debug!("Could not highlight {} block: {}", syntax.name, e),
    }
}

/// Syntax highlighting of fenced code. Tokens are wrapped in spans carrying
/// the grammar's scope names as classes (`<span class="keyword control">`),
/// which is what stylesheets target. Unknown languages and diagram blocks are
/// left as they are.
pub fn highlight_code(mut tree: HtmlTree) -> HtmlTree {
    visit_elements_mut(&mut tree.children, &mut |el: &mut Element| {
        if let Some(code) = block_code(el) {
            highlight_block(code);
        }
    });
    tree
}

fn diagram_source(el: &mut Element) -> Option<(String, String)> {
    let code = block_code(el)?;
    let lang = code_language(code).filter(|l| is_diagram_language(l))?;
    Some((lang.to_ascii_lowercase(), code.text_content()))
}

fn diagram_placeholder(lang: &str, source: String) -> HtmlNode {
    let mut div = Element::new("div");
    div.set_attr("class", lang);
    div.set_attr(&format!("data-{}", lang), source.clone());
    div.children.push(HtmlNode::Text(source));
    div.into()
}

fn replace_diagrams(nodes: &mut [HtmlNode]) {
    for node in nodes.iter_mut() {
        let diagram = match node {
            HtmlNode::Element(el) => diagram_source(el),
            _ => None,
        };

        if let Some((lang, source)) = diagram {
            *node = diagram_placeholder(&lang, source);
        } else if let HtmlNode::Element(el) = node {
            replace_diagrams(&mut el.children);
        }
    }
}

/// Replaces diagram code blocks with a placeholder carrying the raw source.
pub fn extract_diagrams(mut tree: HtmlTree) -> HtmlTree {
    replace_diagrams(&mut tree.children);
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_block(lang: Option<&str>, source: &str) -> HtmlTree {
        let mut code = Element::with_children("code", vec![HtmlNode::Text(source.to_string())]);
        if let Some(lang) = lang {
            code.set_attr("class", format!("language-{}", lang));
        }
        HtmlTree::new(vec![Element::with_children("pre", vec![code.into()]).into()])
    }

    #[test]
    fn test_annotate_images() {
        let mut img = Element::new("img");
        img.set_attr("src", "/images/a.png");
        img.set_attr("width", "320");
        img.set_attr("class", "whatever");
        let mut plain = Element::new("img");
        plain.set_attr("src", "/images/b.png");
        let tree = HtmlTree::new(vec![Element::with_children("p", vec![img.into(), plain.into()]).into()]);

        let html = annotate_images(tree).to_html();
        assert_eq!(html, "<p>\
<img src=\"/images/a.png\" width=\"320\" class=\"markdown-image\" height=\"600\" loading=\"lazy\" />\
<img src=\"/images/b.png\" width=\"800\" height=\"600\" class=\"markdown-image\" loading=\"lazy\" /></p>");
    }

    #[test]
    fn test_highlight_known_language() {
        let html = highlight_code(code_block(Some("rust"), "fn main() {}\n")).to_html();
        assert!(html.starts_with("<pre><code class=\"language-rust\">"));
        assert!(html.contains("<span class="));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_highlight_typescript_family() {
        for lang in ["ts", "typescript", "tsx", "jsx", "TS"] {
            let html = highlight_code(code_block(Some(lang), "const answer: number = 42;\n")).to_html();
            assert!(html.starts_with(&format!("<pre><code class=\"language-{}\">", lang)), "{}", html);
            assert!(html.contains("<span class="), "{} was not highlighted", lang);
        }
    }

    #[test]
    fn test_highlight_unknown_language_untouched() {
        let tree = code_block(Some("nosuchlang"), "a < b\n");
        let html = highlight_code(tree.clone()).to_html();
        assert_eq!(html, tree.to_html());
        assert_eq!(html, "<pre><code class=\"language-nosuchlang\">a &lt; b\n</code></pre>");
    }

    #[test]
    fn test_highlight_detects_from_first_line() {
        let html = highlight_code(code_block(None, "#!/bin/bash\necho hi\n")).to_html();
        assert!(html.contains("<span class="));
        assert!(html.contains("language-"));
    }

    #[test]
    fn test_highlight_skips_diagrams() {
        let tree = code_block(Some("mermaid"), "graph TD\n");
        assert_eq!(highlight_code(tree.clone()), tree);
    }

    #[test]
    fn test_extract_diagrams() {
        let tree = HtmlTree::new(vec![
            Element::with_children("section", code_block(Some("mermaid"), "graph TD\n  A-->B\n").children).into(),
        ]);
        let html = extract_diagrams(tree).to_html();
        assert_eq!(html, "<section><div class=\"mermaid\" data-mermaid=\"graph TD\n  A--&gt;B\n\">graph TD\n  A--&gt;B\n</div></section>");
    }

    #[test]
    fn test_extract_keeps_other_code() {
        let tree = code_block(Some("rust"), "let a = 1;\n");
        assert_eq!(extract_diagrams(tree.clone()), tree);
    }
}
