use std::fmt::Write;

const VOID_ELEMENTS: [&str; 6] = ["br", "hr", "img", "input", "meta", "link"];

#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Element(Element),
    Text(String),
    /// Markup emitted verbatim: embedded HTML from the post or generated
    /// highlighter output.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<HtmlNode>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HtmlTree {
    pub children: Vec<HtmlNode>,
}

impl Element {
    pub fn new(tag: &str) -> Element {
        Element {
            tag: tag.to_string(),
            attrs: vec![],
            children: vec![],
        }
    }

    pub fn with_children(tag: &str, children: Vec<HtmlNode>) -> Element {
        Element {
            tag: tag.to_string(),
            attrs: vec![],
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn classes(&self) -> impl Iterator<Item=&str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    /// Concatenated text of all descendants. Raw markup is skipped.
    pub fn text_content(&self) -> String {
        let mut buf = String::new();
        collect_text(&self.children, &mut buf);
        buf
    }
}

impl From<Element> for HtmlNode {
    fn from(value: Element) -> Self {
        HtmlNode::Element(value)
    }
}

fn collect_text(nodes: &[HtmlNode], buf: &mut String) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => buf.push_str(text),
            HtmlNode::Element(el) => collect_text(&el.children, buf),
            HtmlNode::Raw(_) => {}
        }
    }
}

/// Applies `f` to every element, parents before children.
pub fn visit_elements_mut<F>(nodes: &mut [HtmlNode], f: &mut F)
where
    F: FnMut(&mut Element),
{
    for node in nodes.iter_mut() {
        if let HtmlNode::Element(el) = node {
            f(el);
            visit_elements_mut(&mut el.children, f);
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut buf = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            _ => buf.push(c),
        }
    }
    buf
}

pub fn escape_attr(value: &str) -> String {
    let mut buf = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '"' => buf.push_str("&quot;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            _ => buf.push(c),
        }
    }
    buf
}

impl HtmlTree {
    pub fn new(children: Vec<HtmlNode>) -> HtmlTree {
        HtmlTree { children }
    }

    pub fn to_html(&self) -> String {
        let mut buf = String::new();
        write_nodes(&self.children, &mut buf);
        buf
    }
}

fn write_nodes(nodes: &[HtmlNode], buf: &mut String) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => buf.push_str(&escape_text(text)),
            HtmlNode::Raw(raw) => buf.push_str(raw),
            HtmlNode::Element(el) => write_element(el, buf),
        }
    }
}

fn write_element(el: &Element, buf: &mut String) {
    buf.push('<');
    buf.push_str(&el.tag);
    for (name, value) in el.attrs.iter() {
        let _ = write!(buf, " {}=\"{}\"", name, escape_attr(value));
    }

    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        buf.push_str(" />");
        return;
    }

    buf.push('>');
    write_nodes(&el.children, buf);
    let _ = write!(buf, "</{}>", el.tag);
}
