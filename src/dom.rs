//! Live document model – an arena DOM the pipeline can inspect and mutate.
//!
//! Nodes are addressed by [`NodeId`]. Ids are never reused: a discarded node
//! leaves a tombstone so a stale id can be detected instead of aliasing a new
//! node.
//!
//! The parser accepts a controlled subset of HTML:
//! - Elements with quoted, unquoted or bare attributes
//! - Text with the common named entities
//! - Comments, doctype and processing instructions (skipped)
//! - Void elements (`img`, `br`, `hr`, `meta`, `link`, `input`)
//!
//! `<canvas>` elements may carry a `data-surface` attribute holding a base64
//! PNG/JPEG data URI; it is decoded into the element's raster surface, the
//! stand-in for pixels a script drew onto the canvas.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::fonts::FontManager;
use crate::raster::RasterImage;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// Stable handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Div,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Span,
    Img,
    Canvas,
    /// Any other tag; laid out like a div.
    Other(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "img" => Tag::Img,
            "canvas" => Tag::Canvas,
            other => Tag::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Body => "body",
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::Img => "img",
            Tag::Canvas => "canvas",
            Tag::Other(name) => name,
        }
    }

    pub fn is_void(&self) -> bool {
        match self {
            Tag::Img => true,
            Tag::Other(name) => matches!(name.as_str(), "br" | "hr" | "meta" | "link" | "input"),
            _ => false,
        }
    }
}

/// Tag plus attributes of an element node.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: Tag,
    pub attributes: BTreeMap<String, String>,
}

impl ElementData {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    surface: Option<RasterImage>,
}

/// Structural mutations that the arena refuses to perform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0} does not exist")]
    Missing(NodeId),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {0} is still attached to a parent")]
    Attached(NodeId),

    #[error("node {0} cannot contain children")]
    NotAContainer(NodeId),

    #[error("node {child} is {parent} or one of its ancestors")]
    Cycle { parent: NodeId, child: NodeId },
}

/// A mutable document tree plus the page fonts used to measure it.
#[derive(Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    fonts: FontManager,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.live_count())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document containing only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                surface: None,
            })],
            fonts: FontManager::default(),
        }
    }

    /// Parse an HTML string into a new document.
    pub fn parse(html: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root();
        Parser::new(html, &mut doc).parse_children(root);
        doc
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontManager {
        &mut self.fonts
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(DomError::Missing(id))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Some(Node {
            kind,
            parent: None,
            children: Vec::new(),
            surface: None,
        }));
        NodeId(self.nodes.len() - 1)
    }

    fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).and_then(|n| n.as_mut()) {
            Some(Node {
                kind: NodeKind::Element(e),
                ..
            }) => Some(e),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Element children only, in document order.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_element(c))
    }

    /// True when `id` is reachable from the document node.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// All descendants of `id` in document (pre-)order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).next()
    }

    /// The `<body>` element, falling back to the document element.
    pub fn body(&self) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&n| matches!(self.element(n), Some(e) if e.tag == Tag::Body))
            .or_else(|| self.document_element())
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn surface(&self, id: NodeId) -> Option<&RasterImage> {
        self.node(id).and_then(|n| n.surface.as_ref())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        self.push(NodeKind::Element(ElementData::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> Result<(), DomError> {
        let element = self.element_mut(id).ok_or(DomError::Missing(id))?;
        element.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn set_surface(&mut self, id: NodeId, image: RasterImage) -> Result<(), DomError> {
        self.node_mut(id)?.surface = Some(image);
        Ok(())
    }

    fn check_detached_container(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        match self.node(parent) {
            None => return Err(DomError::Missing(parent)),
            Some(n) if matches!(n.kind, NodeKind::Text(_)) => {
                return Err(DomError::NotAContainer(parent))
            }
            Some(_) => {}
        }
        match self.node(child) {
            None => Err(DomError::Missing(child)),
            Some(n) if n.parent.is_some() => Err(DomError::Attached(child)),
            Some(_) if child == self.root() => Err(DomError::Attached(child)),
            Some(_) if self.is_inclusive_ancestor(child, parent) => {
                Err(DomError::Cycle { parent, child })
            }
            Some(_) => Ok(()),
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_detached_container(parent, child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Insert `child` before `reference` under `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        self.check_detached_container(parent, child)?;
        let index = self.child_index(parent, reference)?;
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Swap `old` for `new` at the same position under `parent` in a single
    /// step; there is no state in which neither node is attached.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), DomError> {
        self.check_detached_container(parent, new)?;
        let index = self.child_index(parent, old)?;
        self.node_mut(parent)?.children[index] = new;
        self.node_mut(new)?.parent = Some(parent);
        self.node_mut(old)?.parent = None;
        Ok(())
    }

    /// Detach `id` from its parent. Detaching a detached node is a no-op.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(id).ok_or(DomError::Missing(id))?.parent else {
            return Ok(());
        };
        let index = self.child_index(parent, id)?;
        self.node_mut(parent)?.children.remove(index);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Detach `id` and drop it together with its subtree.
    pub fn discard(&mut self, id: NodeId) -> Result<(), DomError> {
        if id == self.root() {
            return Err(DomError::Attached(id));
        }
        self.detach(id)?;
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node in doomed {
            self.nodes[node.0] = None;
        }
        Ok(())
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize, DomError> {
        self.children(parent)
            .iter()
            .position(|&c| c == child)
            .ok_or(DomError::NotAChild { parent, child })
    }

    // -----------------------------------------------------------------------
    // Serialisation
    // -----------------------------------------------------------------------

    /// Serialise `id` and its subtree back to HTML.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            None => {}
            Some(NodeKind::Document) => {
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
            }
            Some(NodeKind::Text(t)) => out.push_str(&encode_entities(t, false)),
            Some(NodeKind::Element(e)) => {
                out.push('<');
                out.push_str(e.tag.name());
                for (key, value) in &e.attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&encode_entities(value, true));
                    out.push('"');
                }
                out.push('>');
                if e.tag.is_void() {
                    return;
                }
                for &child in self.children(id) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(e.tag.name());
                out.push('>');
            }
        }
    }

    /// Structural fingerprint of the subtree under `id`: every node id with
    /// its parent, in document order.
    pub fn snapshot(&self, id: NodeId) -> Vec<(NodeId, Option<NodeId>)> {
        std::iter::once(id)
            .chain(self.descendants(id))
            .map(|n| (n, self.parent(n)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the controlled HTML subset
// ---------------------------------------------------------------------------

struct Parser<'a, 'd> {
    input: &'a str,
    pos: usize,
    doc: &'d mut Document,
}

impl<'a, 'd> Parser<'a, 'd> {
    fn new(input: &'a str, doc: &'d mut Document) -> Self {
        Self { input, pos: 0, doc }
    }

    fn parse_children(&mut self, parent: NodeId) {
        loop {
            self.skip_blank_between_tags();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node() {
                // `parent` is a freshly created container, so this cannot fail.
                let _ = self.doc.append_child(parent, node);
            }
        }
    }

    fn parse_node(&mut self) -> Option<NodeId> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        if self.starts_with("<") {
            Some(self.parse_element())
        } else {
            let start = self.pos;
            while !self.eof() && !self.starts_with("<") {
                self.bump();
            }
            let text = decode_entities(&self.input[start..self.pos]);
            Some(self.doc.create_text(text))
        }
    }

    fn parse_element(&mut self) -> NodeId {
        self.bump(); // '<'
        let name = self.parse_name();
        let mut data = ElementData::new(Tag::from_name(&name));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let key = self.parse_name();
            if key.is_empty() {
                // Stray character inside the tag; drop it.
                self.bump();
                continue;
            }
            self.skip_whitespace();
            let value = if self.starts_with("=") {
                self.bump();
                self.skip_whitespace();
                self.parse_attr_value()
            } else {
                String::new()
            };
            data.attributes.insert(key.to_ascii_lowercase(), value);
        }

        let surface = match data.tag {
            Tag::Canvas => data.attr("data-surface").and_then(|uri| {
                RasterImage::from_data_uri(uri)
                    .map_err(|e| log::warn!("Ignoring canvas surface: {e}"))
                    .ok()
            }),
            _ => None,
        };
        let void = data.tag.is_void();
        let id = self.doc.push(NodeKind::Element(data));
        if let Some(surface) = surface {
            let _ = self.doc.set_surface(id, surface);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return id;
        }
        if self.starts_with(">") {
            self.bump();
        }
        if void {
            return id;
        }

        self.parse_children(id);

        if self.starts_with("</") {
            self.advance(2);
            self.parse_name();
            self.skip_past(">");
        }
        id
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.bump();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attr_value(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        break;
                    }
                    self.bump();
                }
                let value = decode_entities(&self.input[start..self.pos]);
                self.bump();
                value
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' || c == '/' {
                        break;
                    }
                    self.bump();
                }
                self.input[start..self.pos].to_string()
            }
        }
    }

    /// Skip whitespace only when it separates two tags.
    fn skip_blank_between_tags(&mut self) {
        let saved = self.pos;
        self.skip_whitespace();
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn skip_past(&mut self, terminator: &str) {
        match self.input[self.pos..].find(terminator) {
            Some(offset) => self.pos += offset + terminator.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

fn encode_entities(s: &str, in_attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(doc: &Document) -> NodeId {
        doc.document_element().expect("document element")
    }

    #[test]
    fn parse_nested_elements() {
        let doc = Document::parse(r#"<div class="card p-4"><p>Hello <span>world</span>!</p></div>"#);
        let div = first_element(&doc);
        let data = doc.element(div).unwrap();
        assert_eq!(data.tag, Tag::Div);
        assert_eq!(data.classes().collect::<Vec<_>>(), vec!["card", "p-4"]);

        let p = doc.children(div)[0];
        assert_eq!(doc.element(p).unwrap().tag, Tag::P);
        assert_eq!(doc.children(p).len(), 3);
        assert_eq!(doc.text_content(p), "Hello world!");
    }

    #[test]
    fn parse_void_and_self_closing() {
        let doc = Document::parse(r#"<div><img src="a.png"><br/><canvas width="10"></canvas></div>"#);
        let div = first_element(&doc);
        let tags: Vec<_> = doc
            .element_children(div)
            .map(|c| doc.element(c).unwrap().tag.name().to_string())
            .collect();
        assert_eq!(tags, vec!["img", "br", "canvas"]);
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let doc = Document::parse("<!DOCTYPE html><!-- note --><html><body><p>x</p></body></html>");
        let body = doc.body().unwrap();
        assert_eq!(doc.element(body).unwrap().tag, Tag::Body);
        assert_eq!(doc.element_children(body).count(), 1);
    }

    #[test]
    fn replace_child_keeps_position() {
        let mut doc = Document::parse("<div><p>a</p><p>b</p><p>c</p></div>");
        let div = first_element(&doc);
        let old = doc.children(div)[1];
        let placeholder = doc.create_element(Tag::Div);

        doc.replace_child(div, placeholder, old).unwrap();
        assert_eq!(doc.children(div)[1], placeholder);
        assert_eq!(doc.parent(old), None);
        assert!(!doc.is_connected(old));
        assert!(doc.is_connected(placeholder));

        doc.replace_child(div, old, placeholder).unwrap();
        assert_eq!(doc.children(div)[1], old);
    }

    #[test]
    fn replace_child_rejects_attached_node() {
        let mut doc = Document::parse("<div><p>a</p><p>b</p></div>");
        let div = first_element(&doc);
        let (a, b) = (doc.children(div)[0], doc.children(div)[1]);
        assert_eq!(doc.replace_child(div, a, b), Err(DomError::Attached(a)));
    }

    #[test]
    fn discard_removes_subtree() {
        let mut doc = Document::parse("<div><p>a</p></div>");
        let div = first_element(&doc);
        let p = doc.children(div)[0];
        let text = doc.children(p)[0];
        doc.discard(p).unwrap();
        assert!(!doc.contains(p));
        assert!(!doc.contains(text));
        assert!(doc.children(div).is_empty());
    }

    #[test]
    fn outer_html_round_trips_structure() {
        let html = r#"<div id="r"><p class="a">x &amp; y</p><img src="i.png"></div>"#;
        let doc = Document::parse(html);
        assert_eq!(doc.outer_html(doc.root()), html);
    }

    #[test]
    fn refuses_to_insert_a_node_into_its_own_subtree() {
        let mut doc = Document::new();
        let a = doc.create_element(Tag::Div);
        let b = doc.create_element(Tag::Div);
        doc.append_child(a, b).unwrap();

        assert_eq!(doc.append_child(b, a), Err(DomError::Cycle { parent: b, child: a }));
        assert_eq!(doc.append_child(a, a), Err(DomError::Cycle { parent: a, child: a }));
        let c = doc.create_element(Tag::Div);
        doc.append_child(b, c).unwrap();
        assert_eq!(doc.replace_child(c, a, c), Err(DomError::Cycle { parent: c, child: a }));

        // The tree is untouched and still finite.
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.descendants(a), vec![b, c]);
    }
}
