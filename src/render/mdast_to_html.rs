//! Markdown syntax tree to HTML tree.
//!
//! Embedded HTML is kept as [`HtmlNode::Raw`]; posts are written by the blog
//! owner, so nothing is filtered here.

use std::collections::HashMap;

use markdown::mdast::{self, AlignKind, Node};

use crate::render::html_tree::{Element, HtmlNode, HtmlTree};

pub fn to_html_tree(root: &Node) -> HtmlTree {
    let mut converter = Converter::default();
    converter.collect_definitions(root);

    let mut nodes = vec![];
    converter.convert_node(root, &mut nodes, false);
    converter.append_footnotes(&mut nodes);

    // One line per top-level block keeps the output diffable
    let mut children = Vec::with_capacity(nodes.len() * 2);
    for node in nodes {
        children.push(node);
        children.push(HtmlNode::Text("\n".to_string()));
    }
    HtmlTree::new(children)
}

#[derive(Default)]
struct Converter<'a> {
    definitions: HashMap<String, &'a mdast::Definition>,
    footnote_defs: HashMap<String, &'a mdast::FootnoteDefinition>,
    /// Footnote identifiers in the order they are first referenced
    footnote_order: Vec<String>,
}

pub fn normalize_id(identifier: &str) -> String {
    identifier.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn text(value: &str) -> HtmlNode {
    HtmlNode::Text(value.to_string())
}

impl<'a> Converter<'a> {
    fn collect_definitions(&mut self, node: &'a Node) {
        match node {
            Node::Definition(def) => {
                // First definition wins, as in CommonMark
                self.definitions.entry(normalize_id(&def.identifier)).or_insert(def);
            }
            Node::FootnoteDefinition(def) => {
                self.footnote_defs.entry(normalize_id(&def.identifier)).or_insert(def);
            }
            _ => {}
        }
        if let Some(children) = node.children() {
            for child in children {
                self.collect_definitions(child);
            }
        }
    }

    fn convert_children(&mut self, children: &'a [Node], tight: bool) -> Vec<HtmlNode> {
        let mut out = vec![];
        for child in children {
            self.convert_node(child, &mut out, tight);
        }
        out
    }

    fn element(&mut self, tag: &str, children: &'a [Node]) -> HtmlNode {
        let children = self.convert_children(children, false);
        Element::with_children(tag, children).into()
    }

    fn convert_node(&mut self, node: &'a Node, out: &mut Vec<HtmlNode>, tight: bool) {
        match node {
            Node::Root(root) => {
                let children = self.convert_children(&root.children, false);
                out.extend(children);
            }
            Node::Paragraph(paragraph) => {
                let children = self.convert_children(&paragraph.children, false);
                if tight {
                    out.extend(children);
                } else {
                    out.push(Element::with_children("p", children).into());
                }
            }
            Node::Heading(heading) => {
                let tag = format!("h{}", heading.depth.clamp(1, 6));
                out.push(self.element(&tag, &heading.children));
            }
            Node::Blockquote(quote) => out.push(self.element("blockquote", &quote.children)),
            Node::List(list) => out.push(self.list(list)),
            Node::ListItem(item) => out.push(self.list_item(item, false)),
            Node::ThematicBreak(_) => out.push(Element::new("hr").into()),
            Node::Break(_) => out.push(Element::new("br").into()),
            Node::Code(code) => out.push(code_block(code)),
            Node::InlineCode(code) => {
                out.push(Element::with_children("code", vec![text(&code.value)]).into());
            }
            Node::Math(math) => {
                let mut code = Element::with_children("code", vec![text(&math.value)]);
                code.set_attr("class", "language-math math-display");
                out.push(Element::with_children("pre", vec![code.into()]).into());
            }
            Node::InlineMath(math) => {
                let mut code = Element::with_children("code", vec![text(&math.value)]);
                code.set_attr("class", "language-math math-inline");
                out.push(code.into());
            }
            Node::Emphasis(em) => out.push(self.element("em", &em.children)),
            Node::Strong(strong) => out.push(self.element("strong", &strong.children)),
            Node::Delete(del) => out.push(self.element("del", &del.children)),
            Node::Link(link) => {
                let children = self.convert_children(&link.children, false);
                out.push(anchor(&link.url, link.title.as_deref(), children));
            }
            Node::Image(image) => out.push(image_element(&image.url, &image.alt, image.title.as_deref())),
            Node::LinkReference(reference) => self.link_reference(reference, out),
            Node::ImageReference(reference) => {
                match self.definitions.get(&normalize_id(&reference.identifier)) {
                    Some(def) => out.push(image_element(&def.url, &reference.alt, def.title.as_deref())),
                    None => out.push(HtmlNode::Text(format!("![{}]", reference.alt))),
                }
            }
            Node::FootnoteReference(reference) => self.footnote_reference(reference, out),
            Node::Html(html) => out.push(HtmlNode::Raw(html.value.clone())),
            Node::Text(t) => out.push(text(&t.value)),
            Node::Table(table) => out.push(self.table(table)),
            Node::Definition(_) | Node::FootnoteDefinition(_) => {}
            other => {
                if let Some(children) = other.children() {
                    let children = self.convert_children(children, tight);
                    out.extend(children);
                }
            }
        }
    }

    fn list(&mut self, list: &'a mdast::List) -> HtmlNode {
        let loose = list.spread || list.children.iter()
            .any(|child| matches!(child, Node::ListItem(item) if item.spread));

        let mut el = Element::new(if list.ordered { "ol" } else { "ul" });
        if list.ordered {
            if let Some(start) = list.start {
                if start != 1 {
                    el.set_attr("start", start.to_string());
                }
            }
        }

        let mut has_tasks = false;
        for child in list.children.iter() {
            match child {
                Node::ListItem(item) => {
                    has_tasks |= item.checked.is_some();
                    el.children.push(self.list_item(item, !loose));
                }
                other => self.convert_node(other, &mut el.children, false),
            }
        }

        if has_tasks {
            el.add_class("contains-task-list");
        }
        el.into()
    }

    fn list_item(&mut self, item: &'a mdast::ListItem, tight: bool) -> HtmlNode {
        let mut li = Element::with_children("li", self.convert_children(&item.children, tight));

        if let Some(checked) = item.checked {
            li.add_class("task-list-item");
            let mut checkbox = Element::new("input");
            checkbox.set_attr("type", "checkbox");
            checkbox.set_attr("disabled", "");
            if checked {
                checkbox.set_attr("checked", "");
            }
            let marker = vec![checkbox.into(), text(" ")];

            // In loose lists the box goes inside the first paragraph
            match li.children.first_mut() {
                Some(HtmlNode::Element(p)) if p.tag == "p" => {
                    p.children.splice(0..0, marker);
                }
                _ => {
                    li.children.splice(0..0, marker);
                }
            }
        }

        li.into()
    }

    fn link_reference(&mut self, reference: &'a mdast::LinkReference, out: &mut Vec<HtmlNode>) {
        let children = self.convert_children(&reference.children, false);
        match self.definitions.get(&normalize_id(&reference.identifier)) {
            Some(def) => out.push(anchor(&def.url, def.title.as_deref(), children)),
            None => {
                out.push(text("["));
                out.extend(children);
                out.push(text("]"));
            }
        }
    }

    fn footnote_reference(&mut self, reference: &'a mdast::FootnoteReference, out: &mut Vec<HtmlNode>) {
        let id = normalize_id(&reference.identifier);
        if !self.footnote_defs.contains_key(&id) {
            out.push(HtmlNode::Text(format!("[^{}]", reference.identifier)));
            return;
        }

        let number = match self.footnote_order.iter().position(|known| *known == id) {
            Some(idx) => idx + 1,
            None => {
                self.footnote_order.push(id.clone());
                self.footnote_order.len()
            }
        };

        let mut a = Element::with_children("a", vec![HtmlNode::Text(number.to_string())]);
        a.set_attr("href", format!("#user-content-fn-{}", id));
        a.set_attr("id", format!("user-content-fnref-{}", id));
        a.set_attr("data-footnote-ref", "");
        a.set_attr("aria-describedby", "footnote-label");
        out.push(Element::with_children("sup", vec![a.into()]).into());
    }

    fn append_footnotes(&mut self, out: &mut Vec<HtmlNode>) {
        if self.footnote_order.is_empty() {
            return;
        }

        let mut items = vec![];
        // Definitions may reference further footnotes, which extends the order
        let mut idx = 0;
        while idx < self.footnote_order.len() {
            let id = self.footnote_order[idx].clone();
            idx += 1;
            let Some(def) = self.footnote_defs.get(&id).copied() else {
                continue;
            };

            let mut children = self.convert_children(&def.children, false);
            let mut backref = Element::with_children("a", vec![text("↩")]);
            backref.set_attr("href", format!("#user-content-fnref-{}", id));
            backref.set_attr("data-footnote-backref", "");
            backref.set_attr("class", "data-footnote-backref");
            backref.set_attr("aria-label", "Back to content");

            match children.last_mut() {
                Some(HtmlNode::Element(p)) if p.tag == "p" => {
                    p.children.push(text(" "));
                    p.children.push(backref.into());
                }
                _ => children.push(backref.into()),
            }

            let mut li = Element::with_children("li", children);
            li.set_attr("id", format!("user-content-fn-{}", id));
            items.push(li.into());
        }

        let mut heading = Element::with_children("h2", vec![text("Footnotes")]);
        heading.set_attr("class", "sr-only");
        heading.set_attr("id", "footnote-label");

        let mut section = Element::with_children("section", vec![
            heading.into(),
            Element::with_children("ol", items).into(),
        ]);
        section.set_attr("data-footnotes", "");
        section.set_attr("class", "footnotes");
        out.push(section.into());
    }

    fn table(&mut self, table: &'a mdast::Table) -> HtmlNode {
        let mut rows = table.children.iter();
        let mut children = vec![];

        if let Some(head) = rows.next() {
            let row = self.table_row(head, &table.align, "th");
            children.push(Element::with_children("thead", vec![row]).into());
        }

        let body: Vec<HtmlNode> = rows.map(|row| self.table_row(row, &table.align, "td")).collect();
        if !body.is_empty() {
            children.push(Element::with_children("tbody", body).into());
        }

        Element::with_children("table", children).into()
    }

    fn table_row(&mut self, row: &'a Node, align: &[AlignKind], cell_tag: &str) -> HtmlNode {
        let mut tr = Element::new("tr");
        let cells = row.children().map(|c| c.as_slice()).unwrap_or(&[]);
        for (idx, cell) in cells.iter().enumerate() {
            let content = cell.children().map(|c| c.as_slice()).unwrap_or(&[]);
            let mut td = Element::with_children(cell_tag, self.convert_children(content, false));
            match align.get(idx) {
                Some(AlignKind::Left) => td.set_attr("align", "left"),
                Some(AlignKind::Right) => td.set_attr("align", "right"),
                Some(AlignKind::Center) => td.set_attr("align", "center"),
                _ => {}
            }
            tr.children.push(td.into());
        }
        tr.into()
    }
}

fn code_block(code: &mdast::Code) -> HtmlNode {
    let value = if code.value.is_empty() {
        String::new()
    } else {
        format!("{}\n", code.value)
    };

    let mut code_el = Element::with_children("code", vec![HtmlNode::Text(value)]);
    if let Some(ref lang) = code.lang {
        code_el.set_attr("class", format!("language-{}", lang));
    }
    Element::with_children("pre", vec![code_el.into()]).into()
}

fn anchor(url: &str, title: Option<&str>, children: Vec<HtmlNode>) -> HtmlNode {
    let mut a = Element::with_children("a", children);
    a.set_attr("href", url);
    if let Some(title) = title {
        a.set_attr("title", title);
    }
    a.into()
}

fn image_element(url: &str, alt: &str, title: Option<&str>) -> HtmlNode {
    let mut img = Element::new("img");
    img.set_attr("src", url);
    img.set_attr("alt", alt);
    if let Some(title) = title {
        img.set_attr("title", title);
    }
    img.into()
}
