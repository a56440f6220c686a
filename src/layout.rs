//! Layout engine – measures a subtree of the live [`Document`] with Taffy and
//! returns positioned boxes keyed by [`NodeId`].
//!
//! All coordinates are CSS px relative to the top-left of the measured root's
//! border box. The root's own margins are ignored: it is the origin.

use std::collections::HashMap;

use taffy::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId as LayoutId, Size, Style,
    TaffyResult, TaffyTree,
};

use crate::dom::{Document, NodeId, NodeKind, Tag};
use crate::error::{Error, Result};
use crate::fonts::wrap_text;
use crate::raster::RasterImage;
use crate::style::{self, resolve_in_context, resolve_style, ComputedStyle, Dimension, Display};

/// Viewport width used when the caller does not specify one.
pub const DEFAULT_VIEWPORT_PX: f32 = 800.0;

/// HTML's default canvas size.
const CANVAS_DEFAULT: (f32, f32) = (300.0, 150.0);

/// Axis-aligned rectangle in px.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A box after layout.
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub node: NodeId,
    pub rect: Rect,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxContent {
    None,
    /// Pre-wrapped lines of text.
    Text { lines: Vec<String> },
    /// `<img>` with its `src`.
    Image { src: String },
    /// An element carrying a raster surface (a drawn canvas).
    Surface,
    /// List item; the marker is drawn left of the box.
    ListItem { marker: String },
}

/// Result of measuring a subtree.
#[derive(Debug, Clone)]
pub struct LayoutTree {
    root: PositionedBox,
    index: HashMap<NodeId, Rect>,
}

impl LayoutTree {
    pub fn root(&self) -> &PositionedBox {
        &self.root
    }

    /// Box of `node` relative to the measured root.
    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.index.get(&node).copied()
    }

    pub fn find(&self, node: NodeId) -> Option<&PositionedBox> {
        fn walk(b: &PositionedBox, node: NodeId) -> Option<&PositionedBox> {
            if b.node == node {
                return Some(b);
            }
            b.children.iter().find_map(|c| walk(c, node))
        }
        walk(&self.root, node)
    }
}

/// Measure the subtree rooted at the element `root`.
pub fn measure(doc: &Document, root: NodeId, viewport_width: f32) -> Result<LayoutTree> {
    if !doc.is_element(root) {
        return Err(Error::InvalidRoot(root));
    }
    let mut root_style = resolve_in_context(doc, root);
    root_style.margin = style::Edges::default();
    if root_style.display == Display::None {
        root_style.display = Display::Block;
    }

    let mut builder = LayoutBuilder::new(doc);
    let width = root_style
        .width
        .resolve(viewport_width)
        .unwrap_or(viewport_width);
    root_style.width = Dimension::Px(width);

    let layout_root = builder
        .build_element(root, root_style, width)
        .map_err(|e| Error::Layout(e.to_string()))?;
    builder
        .taffy
        .compute_layout(
            layout_root,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(|e| Error::Layout(e.to_string()))?;

    let root_box = builder
        .extract(layout_root, 0.0, 0.0)
        .map_err(|e| Error::Layout(e.to_string()))?;
    let mut index = HashMap::new();
    index_boxes(&root_box, &mut index);
    Ok(LayoutTree {
        root: root_box,
        index,
    })
}

fn index_boxes(b: &PositionedBox, index: &mut HashMap<NodeId, Rect>) {
    index.entry(b.node).or_insert(b.rect);
    for child in &b.children {
        index_boxes(child, index);
    }
}

// ---------------------------------------------------------------------------
// Taffy tree construction
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    doc: &'a Document,
    taffy: TaffyTree<()>,
    nodes: HashMap<LayoutId, NodeId>,
    styles: HashMap<LayoutId, ComputedStyle>,
    content: HashMap<LayoutId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            taffy: TaffyTree::new(),
            nodes: HashMap::new(),
            styles: HashMap::new(),
            content: HashMap::new(),
        }
    }

    fn register(&mut self, id: LayoutId, node: NodeId, style: ComputedStyle, content: BoxContent) {
        self.nodes.insert(id, node);
        self.styles.insert(id, style);
        self.content.insert(id, content);
    }

    /// True when every child is text or an inline element with inline
    /// children.
    fn all_inline(&self, node: NodeId) -> bool {
        self.doc.children(node).iter().all(|&c| match self.doc.kind(c) {
            Some(NodeKind::Text(_)) => true,
            Some(NodeKind::Element(e)) => {
                let s = resolve_style(e, None);
                s.display == Display::Inline && self.all_inline(c)
            }
            _ => true,
        })
    }

    fn build_element(
        &mut self,
        node: NodeId,
        style: ComputedStyle,
        parent_width: f32,
    ) -> TaffyResult<LayoutId> {
        let doc = self.doc;
        let tag = doc
            .element(node)
            .map(|e| e.tag.clone())
            .unwrap_or(Tag::Div);

        if style.display == Display::None {
            let id = self.taffy.new_leaf(Style {
                display: taffy::Display::None,
                ..Style::default()
            })?;
            self.register(id, node, style, BoxContent::None);
            return Ok(id);
        }

        let my_width = style.width.resolve(parent_width).unwrap_or(parent_width);
        let inner_width =
            (my_width - style.padding.horizontal() - 2.0 * style.border_width).max(0.0);

        // Paragraph-like blocks with only inline content become one wrapped
        // text leaf so spans flow together.
        let paragraph = matches!(tag, Tag::P | Tag::H1 | Tag::H2 | Tag::H3);
        if paragraph && !doc.children(node).is_empty() && self.all_inline(node) {
            let text = doc.text_content(node);
            if !text.trim().is_empty() {
                return self.build_text_leaf(node, &text, style, inner_width, true);
            }
        }

        let is_row = style.display == Display::Flex
            && style.flex_direction == style::FlexDirection::Row;
        let element_children = doc.element_children(node).count().max(1);
        let child_width = if is_row {
            let gaps = style.gap * (element_children - 1) as f32;
            ((inner_width - gaps) / element_children as f32).max(1.0)
        } else {
            inner_width
        };

        let mut children = Vec::new();
        let mut list_counter = 0u32;
        for &child in doc.children(node) {
            match doc.kind(child) {
                Some(NodeKind::Text(text)) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    let id = self.build_text_leaf(child, text, style.clone(), child_width, false)?;
                    children.push(id);
                }
                Some(NodeKind::Element(e)) => {
                    let child_style = resolve_style(e, Some(&style));
                    let marker = if e.tag == Tag::Li {
                        list_counter += 1;
                        Some(if tag == Tag::Ol {
                            format!("{list_counter}. ")
                        } else {
                            "\u{2022} ".to_string()
                        })
                    } else {
                        None
                    };
                    let id = self.build_element(child, child_style, child_width)?;
                    if let Some(marker) = marker {
                        if self.content.get(&id) == Some(&BoxContent::None) {
                            self.content.insert(id, BoxContent::ListItem { marker });
                        }
                    }
                    children.push(id);
                }
                _ => {}
            }
        }

        let content = match tag {
            Tag::Img => BoxContent::Image {
                src: doc
                    .element(node)
                    .and_then(|e| e.attr("src"))
                    .unwrap_or_default()
                    .to_string(),
            },
            _ if doc.surface(node).is_some() => BoxContent::Surface,
            _ => BoxContent::None,
        };

        let sized = self.intrinsic_size(node, &tag, &style, parent_width);
        let effective = sized.as_ref().unwrap_or(&style);
        let taffy_style = to_taffy(effective, &tag);
        let id = self.taffy.new_with_children(taffy_style, &children)?;
        self.register(id, node, effective.clone(), content);
        Ok(id)
    }

    fn build_text_leaf(
        &mut self,
        node: NodeId,
        text: &str,
        style: ComputedStyle,
        max_width: f32,
        keep_box_model: bool,
    ) -> TaffyResult<LayoutId> {
        let doc = self.doc;
        let fonts = doc.fonts();
        let bold = style.font_weight == style::FontWeight::Bold;
        let italic = style.font_style == style::FontStyle::Italic;
        let lines = wrap_text(
            text,
            style.font_size,
            bold,
            italic,
            &style.font_family,
            max_width,
            fonts,
        );
        let width = lines
            .iter()
            .map(|l| fonts.measure_text_width(l, style.font_size, bold, italic, &style.font_family))
            .fold(0.0f32, f32::max);
        let height = lines.len() as f32 * fonts.line_height_px(style.font_size, style.line_height);

        let mut taffy_style = Style {
            size: Size {
                width: taffy::Dimension::Length(width),
                height: taffy::Dimension::Length(height),
            },
            ..Style::default()
        };
        if keep_box_model {
            // The leaf stands in for its block: keep spacing and let it
            // stretch to the block width.
            taffy_style.size.width = match style.width {
                Dimension::Px(w) => taffy::Dimension::Length(w),
                Dimension::Percent(p) => taffy::Dimension::Percent(p / 100.0),
                Dimension::Auto => taffy::Dimension::Auto,
            };
            taffy_style.min_size.height = taffy::Dimension::Length(
                height + style.padding.vertical() + 2.0 * style.border_width,
            );
            taffy_style.margin = margin_rect(&style);
            taffy_style.padding = padding_rect(&style);
            taffy_style.border = border_rect(style.border_width);
            taffy_style.flex_grow = style.flex_grow;
            taffy_style.size.height = taffy::Dimension::Auto;
        }
        let id = self.taffy.new_leaf(taffy_style)?;
        self.register(id, node, style, BoxContent::Text { lines });
        Ok(id)
    }

    /// Resolve `auto` sizes of replaced elements (`img`, `canvas`) from their
    /// attributes or pixel data.
    fn intrinsic_size(
        &self,
        node: NodeId,
        tag: &Tag,
        style: &ComputedStyle,
        parent_width: f32,
    ) -> Option<ComputedStyle> {
        let element = self.doc.element(node)?;
        let attr_px = |name: &str| element.attr(name).and_then(|v| style::parse_px(v));
        let natural = match tag {
            Tag::Canvas => {
                let surface = self.doc.surface(node).map(|s| (s.width as f32, s.height as f32));
                let (dw, dh) = surface.unwrap_or(CANVAS_DEFAULT);
                (attr_px("width").unwrap_or(dw), attr_px("height").unwrap_or(dh))
            }
            Tag::Img => {
                let decoded = element
                    .attr("src")
                    .and_then(|src| RasterImage::from_data_uri(src).ok())
                    .map(|img| (img.width as f32, img.height as f32));
                match (attr_px("width"), attr_px("height"), decoded) {
                    (Some(w), Some(h), _) => (w, h),
                    (w, h, Some((nw, nh))) => (w.unwrap_or(nw), h.unwrap_or(nh)),
                    (w, h, None) => (w.unwrap_or(0.0), h.unwrap_or(0.0)),
                }
            }
            _ => return None,
        };
        let (nw, nh) = natural;
        if nw <= 0.0 || nh <= 0.0 {
            return None;
        }
        let aspect = nw / nh;

        let known_w = style.width.resolve(parent_width);
        let known_h = match style.height {
            Dimension::Px(v) => Some(v),
            _ => None,
        };
        let mut s = style.clone();
        match (known_w, known_h) {
            (Some(w), None) => s.height = Dimension::Px((w / aspect).max(1.0)),
            (None, Some(h)) => s.width = Dimension::Px((h * aspect).max(1.0)),
            (None, None) => {
                s.width = Dimension::Px(nw);
                s.height = Dimension::Px(nh);
            }
            (Some(_), Some(_)) => return None,
        }
        Some(s)
    }

    /// Extract positioned boxes, accumulating offsets from the root.
    fn extract(&self, id: LayoutId, offset_x: f32, offset_y: f32) -> TaffyResult<PositionedBox> {
        let layout = self.taffy.layout(id)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let children = self
            .taffy
            .children(id)?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<TaffyResult<Vec<_>>>()?;

        Ok(PositionedBox {
            node: self.nodes[&id],
            rect: Rect {
                x,
                y,
                width: layout.size.width,
                height: layout.size.height,
            },
            style: self.styles.get(&id).cloned().unwrap_or_default(),
            content: self.content.get(&id).cloned().unwrap_or(BoxContent::None),
            children,
        })
    }
}

fn margin_rect(s: &ComputedStyle) -> taffy::Rect<LengthPercentageAuto> {
    taffy::Rect {
        top: LengthPercentageAuto::Length(s.margin.top),
        right: LengthPercentageAuto::Length(s.margin.right),
        bottom: LengthPercentageAuto::Length(s.margin.bottom),
        left: LengthPercentageAuto::Length(s.margin.left),
    }
}

fn padding_rect(s: &ComputedStyle) -> taffy::Rect<LengthPercentage> {
    taffy::Rect {
        top: LengthPercentage::Length(s.padding.top),
        right: LengthPercentage::Length(s.padding.right),
        bottom: LengthPercentage::Length(s.padding.bottom),
        left: LengthPercentage::Length(s.padding.left),
    }
}

fn border_rect(width: f32) -> taffy::Rect<LengthPercentage> {
    taffy::Rect {
        top: LengthPercentage::Length(width),
        right: LengthPercentage::Length(width),
        bottom: LengthPercentage::Length(width),
        left: LengthPercentage::Length(width),
    }
}

fn dim_to_taffy(d: Dimension) -> taffy::Dimension {
    match d {
        Dimension::Auto => taffy::Dimension::Auto,
        Dimension::Px(v) => taffy::Dimension::Length(v),
        Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

/// Map a computed style onto Taffy. Block-level boxes stack as flex
/// columns; table rows lay their cells out as equal flex columns.
fn to_taffy(s: &ComputedStyle, tag: &Tag) -> Style {
    let mut ts = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        ..Style::default()
    };

    match s.display {
        Display::Flex => {
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            if *tag == Tag::Tr {
                ts.align_items = Some(taffy::AlignItems::Stretch);
            }
        }
        Display::Inline => {
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.flex_wrap = taffy::FlexWrap::Wrap;
        }
        Display::Block | Display::InlineBlock => {}
        Display::None => ts.display = taffy::Display::None,
    }

    if matches!(tag, Tag::Td | Tag::Th) {
        ts.flex_basis = taffy::Dimension::Length(0.0);
        ts.min_size.width = taffy::Dimension::Length(0.0);
    }

    ts.size = Size {
        width: dim_to_taffy(s.width),
        height: dim_to_taffy(s.height),
    };
    ts.flex_grow = s.flex_grow;
    ts.flex_shrink = s.flex_shrink;
    ts.margin = margin_rect(s);
    ts.padding = padding_rect(s);
    ts.border = border_rect(s.border_width);
    ts.gap = Size {
        width: LengthPercentage::Length(s.gap),
        height: LengthPercentage::Length(s.gap),
    };
    ts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_id(doc: &Document, id: &str) -> NodeId {
        doc.descendants(doc.root())
            .into_iter()
            .find(|&n| doc.element(n).and_then(|e| e.id()) == Some(id))
            .unwrap()
    }

    #[test]
    fn stacks_blocks_relative_to_root() {
        let doc = Document::parse(
            r#"<div id="root" style="width: 400px">
                <div style="height: 50px"></div>
                <canvas id="c" width="100" height="80" style="margin-left: 30px"></canvas>
            </div>"#,
        );
        let tree = measure(&doc, by_id(&doc, "root"), DEFAULT_VIEWPORT_PX).unwrap();
        let canvas = tree.rect(by_id(&doc, "c")).unwrap();
        assert_eq!(
            canvas,
            Rect {
                x: 30.0,
                y: 50.0,
                width: 100.0,
                height: 80.0
            }
        );
        assert_eq!(tree.root().rect.width, 400.0);
    }

    #[test]
    fn auto_width_root_fills_viewport() {
        let doc = Document::parse(r#"<div id="root"><p>Hello world</p></div>"#);
        let tree = measure(&doc, by_id(&doc, "root"), 640.0).unwrap();
        assert_eq!(tree.root().rect.width, 640.0);
        assert!(tree.root().rect.height > 0.0);
    }

    #[test]
    fn canvas_defaults_to_html_size() {
        let doc = Document::parse(r#"<div id="root"><canvas id="c"></canvas></div>"#);
        let tree = measure(&doc, by_id(&doc, "root"), DEFAULT_VIEWPORT_PX).unwrap();
        let rect = tree.rect(by_id(&doc, "c")).unwrap();
        assert_eq!((rect.width, rect.height), CANVAS_DEFAULT);
    }

    #[test]
    fn paragraph_text_is_wrapped() {
        let doc = Document::parse(
            r#"<div id="root" style="width: 100px"><p id="p">alpha beta gamma delta</p></div>"#,
        );
        let tree = measure(&doc, by_id(&doc, "root"), DEFAULT_VIEWPORT_PX).unwrap();
        let p = tree.find(by_id(&doc, "p")).unwrap();
        match &p.content {
            BoxContent::Text { lines } => assert!(lines.len() > 1, "{lines:?}"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn measuring_a_text_node_is_rejected() {
        let doc = Document::parse("<div>text</div>");
        let div = doc.document_element().unwrap();
        let text = doc.children(div)[0];
        assert!(matches!(measure(&doc, text, 100.0), Err(Error::InvalidRoot(_))));
    }
}
