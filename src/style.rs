//! Style resolver – maps tag defaults, utility classes and inline `style`
//! declarations to a flat [`ComputedStyle`] consumed by the layout engine.

use crate::dom::{Document, ElementData, NodeId, Tag};

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Display / flex
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub gap: f32,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,

    // Spacing (px)
    pub margin: Edges,
    pub padding: Edges,

    // Border
    pub border_width: f32,
    pub border_color: Color,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: String,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,

    pub background_color: Color,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 16.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            text_decoration: TextDecoration::None,
            background_color: Color::TRANSPARENT,
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    InlineBlock,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing size; `None` for `auto`.
    pub fn resolve(self, container: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(v),
            Dimension::Percent(p) => Some(container * p / 100.0),
        }
    }
}

/// Four-sided box spacing in px.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn all(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a named colour.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        if let Some(inner) = value
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<f32> = inner
                .split(',')
                .map(|p| p.trim().parse::<f32>().ok())
                .collect::<Option<_>>()?;
            if let [r, g, b] = parts[..] {
                return Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0));
            }
            return None;
        }
        named_color(value)
    }
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name.to_ascii_lowercase().as_str() {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "transparent" => Color::TRANSPARENT,
        "red" | "red-500" => Color::rgb(0.937, 0.267, 0.267),
        "green" | "green-500" => Color::rgb(0.133, 0.773, 0.369),
        "blue" | "blue-500" => Color::rgb(0.231, 0.510, 0.965),
        "gray" | "grey" | "gray-500" => Color::rgb(0.420, 0.447, 0.502),
        "gray-100" => Color::rgb(0.953, 0.957, 0.965),
        "gray-200" => Color::rgb(0.898, 0.906, 0.922),
        "orange" | "orange-500" => Color::rgb(0.976, 0.451, 0.086),
        _ => return None,
    };
    Some(color)
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style of an element, inheriting text properties from its
/// parent.
pub fn resolve_style(element: &ElementData, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = base_style_for_tag(&element.tag);

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.font_weight = style_bold_or(p.font_weight, &element.tag);
        style.font_style = p.font_style;
        style.font_family = p.font_family.clone();
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
        if let Some(size) = heading_size(&element.tag) {
            style.font_size = size;
        }
    }

    for class in element.classes() {
        apply_class(&mut style, class);
    }
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

/// Resolve the style of `node` with the full ancestor chain applied, so an
/// element measured on its own inherits what it would inherit in the page.
pub fn resolve_in_context(doc: &Document, node: NodeId) -> ComputedStyle {
    let mut chain = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if doc.is_element(n) {
            chain.push(n);
        }
        current = doc.parent(n);
    }

    let mut style: Option<ComputedStyle> = None;
    for n in chain.into_iter().rev() {
        if let Some(element) = doc.element(n) {
            style = Some(resolve_style(element, style.as_ref()));
        }
    }
    style.unwrap_or_default()
}

fn heading_size(tag: &Tag) -> Option<f32> {
    match tag {
        Tag::H1 => Some(32.0),
        Tag::H2 => Some(24.0),
        Tag::H3 => Some(20.0),
        _ => None,
    }
}

fn style_bold_or(inherited: FontWeight, tag: &Tag) -> FontWeight {
    match tag {
        Tag::H1 | Tag::H2 | Tag::H3 | Tag::Th => FontWeight::Bold,
        _ => inherited,
    }
}

/// Default styles based on tag semantics.
fn base_style_for_tag(tag: &Tag) -> ComputedStyle {
    let mut s = ComputedStyle::default();
    if let Some(size) = heading_size(tag) {
        s.font_size = size;
        s.font_weight = FontWeight::Bold;
        s.margin.top = size / 2.0;
        s.margin.bottom = size * 0.4;
    }
    match tag {
        Tag::P => s.margin.bottom = 10.0,
        Tag::Ul | Tag::Ol => {
            s.margin.bottom = 10.0;
            s.padding.left = 24.0;
        }
        Tag::Li => s.margin.bottom = 4.0,
        Tag::Table => s.border_width = 1.0,
        Tag::Tr => {
            s.display = Display::Flex;
            s.flex_direction = FlexDirection::Row;
        }
        Tag::Td | Tag::Th => {
            s.padding = Edges {
                top: 4.0,
                right: 8.0,
                bottom: 4.0,
                left: 8.0,
            };
            s.border_width = 1.0;
            s.flex_grow = 1.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.background_color = Color::rgb(0.93, 0.93, 0.93);
            }
        }
        Tag::Span => s.display = Display::Inline,
        Tag::Img | Tag::Canvas => s.display = Display::InlineBlock,
        Tag::Head => s.display = Display::None,
        Tag::Other(name) if matches!(name.as_str(), "script" | "style" | "title" | "meta" | "link") => {
            s.display = Display::None;
        }
        _ => {}
    }
    s
}

/// Apply a single utility class.
fn apply_class(s: &mut ComputedStyle, class: &str) {
    match class {
        "flex" => s.display = Display::Flex,
        "block" => s.display = Display::Block,
        "inline" => s.display = Display::Inline,
        "inline-block" => s.display = Display::InlineBlock,
        "hidden" => s.display = Display::None,
        "flex-row" => s.flex_direction = FlexDirection::Row,
        "flex-col" => s.flex_direction = FlexDirection::Column,
        "flex-1" => {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
        }
        "font-bold" => s.font_weight = FontWeight::Bold,
        "font-normal" => s.font_weight = FontWeight::Normal,
        "italic" => s.font_style = FontStyle::Italic,
        "underline" => s.text_decoration = TextDecoration::Underline,
        "text-left" => s.text_align = TextAlign::Left,
        "text-center" => s.text_align = TextAlign::Center,
        "text-right" => s.text_align = TextAlign::Right,
        "text-xs" => s.font_size = 12.0,
        "text-sm" => s.font_size = 14.0,
        "text-base" => s.font_size = 16.0,
        "text-lg" => s.font_size = 18.0,
        "text-xl" => s.font_size = 20.0,
        "text-2xl" => s.font_size = 24.0,
        "text-3xl" => s.font_size = 30.0,
        "w-full" => s.width = Dimension::Percent(100.0),
        "w-1/2" => s.width = Dimension::Percent(50.0),
        _ => {
            if let Some(color) = class.strip_prefix("bg-").and_then(named_color) {
                s.background_color = color;
            } else if let Some(color) = class.strip_prefix("text-").and_then(named_color) {
                s.color = color;
            } else if let Some(gap) = class.strip_prefix("gap-").and_then(|v| v.parse::<f32>().ok()) {
                s.gap = gap * 4.0;
            } else {
                apply_spacing_class(s, class);
            }
        }
    }
}

/// `p-{n}`, `mx-{n}`, `mt-{n}` and friends; one unit is 4px.
fn apply_spacing_class(s: &mut ComputedStyle, class: &str) {
    let Some((prefix, value)) = class.rsplit_once('-') else {
        return;
    };
    let Ok(units) = value.parse::<f32>() else {
        return;
    };
    let v = units * 4.0;
    let (edges, sides) = if let Some(sides) = prefix.strip_prefix('p') {
        (&mut s.padding, sides)
    } else if let Some(sides) = prefix.strip_prefix('m') {
        (&mut s.margin, sides)
    } else {
        return;
    };
    match sides {
        "" => *edges = Edges::all(v),
        "x" => {
            edges.left = v;
            edges.right = v;
        }
        "y" => {
            edges.top = v;
            edges.bottom = v;
        }
        "t" => edges.top = v,
        "r" => edges.right = v,
        "b" => edges.bottom = v,
        "l" => edges.left = v,
        _ => {}
    }
}

/// Apply `key: value; …` declarations.
fn apply_inline_style(s: &mut ComputedStyle, inline: &str) {
    for decl in inline.split(';') {
        let Some((key, value)) = decl.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "display" => {
                s.display = match value {
                    "flex" => Display::Flex,
                    "inline" => Display::Inline,
                    "inline-block" => Display::InlineBlock,
                    "none" => Display::None,
                    _ => Display::Block,
                }
            }
            "flex-direction" => {
                s.flex_direction = if value.starts_with("column") {
                    FlexDirection::Column
                } else {
                    FlexDirection::Row
                }
            }
            "flex-grow" => s.flex_grow = value.parse().unwrap_or(s.flex_grow),
            "flex-shrink" => s.flex_shrink = value.parse().unwrap_or(s.flex_shrink),
            "gap" => s.gap = parse_px(value).unwrap_or(s.gap),
            "width" => s.width = parse_dimension(value),
            "height" => s.height = parse_dimension(value),
            "margin" => s.margin = parse_edges(value).unwrap_or(s.margin),
            "margin-top" => s.margin.top = parse_px(value).unwrap_or(s.margin.top),
            "margin-right" => s.margin.right = parse_px(value).unwrap_or(s.margin.right),
            "margin-bottom" => s.margin.bottom = parse_px(value).unwrap_or(s.margin.bottom),
            "margin-left" => s.margin.left = parse_px(value).unwrap_or(s.margin.left),
            "padding" => s.padding = parse_edges(value).unwrap_or(s.padding),
            "padding-top" => s.padding.top = parse_px(value).unwrap_or(s.padding.top),
            "padding-right" => s.padding.right = parse_px(value).unwrap_or(s.padding.right),
            "padding-bottom" => s.padding.bottom = parse_px(value).unwrap_or(s.padding.bottom),
            "padding-left" => s.padding.left = parse_px(value).unwrap_or(s.padding.left),
            "border" => {
                for part in value.split_whitespace() {
                    if let Some(w) = parse_px(part) {
                        s.border_width = w;
                    } else if let Some(c) = Color::parse(part) {
                        s.border_color = c;
                    } else if part == "none" {
                        s.border_width = 0.0;
                    }
                }
            }
            "border-width" => s.border_width = parse_px(value).unwrap_or(s.border_width),
            "border-color" => s.border_color = Color::parse(value).unwrap_or(s.border_color),
            "color" => s.color = Color::parse(value).unwrap_or(s.color),
            "background" | "background-color" => {
                s.background_color = Color::parse(value).unwrap_or(s.background_color)
            }
            "font-size" => s.font_size = parse_px(value).unwrap_or(s.font_size),
            "font-weight" => {
                s.font_weight = match value {
                    "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                    _ => FontWeight::Normal,
                }
            }
            "font-style" => {
                s.font_style = if value == "italic" {
                    FontStyle::Italic
                } else {
                    FontStyle::Normal
                }
            }
            "text-align" => {
                s.text_align = match value {
                    "center" => TextAlign::Center,
                    "right" => TextAlign::Right,
                    _ => TextAlign::Left,
                }
            }
            "line-height" => {
                if let Ok(factor) = value.parse::<f32>() {
                    s.line_height = factor;
                } else if let Some(px) = parse_px(value) {
                    s.line_height = px / s.font_size.max(1.0);
                }
            }
            "text-decoration" => {
                s.text_decoration = if value.contains("underline") {
                    TextDecoration::Underline
                } else {
                    TextDecoration::None
                }
            }
            _ => {}
        }
    }
}

/// Parse `12px`, `12` or `9pt` into px.
pub fn parse_px(value: &str) -> Option<f32> {
    let value = value.trim();
    if let Some(n) = value.strip_suffix("px") {
        n.trim().parse().ok()
    } else if let Some(n) = value.strip_suffix("pt") {
        n.trim().parse::<f32>().ok().map(|pt| pt / 0.75)
    } else {
        value.parse().ok()
    }
}

fn parse_dimension(value: &str) -> Dimension {
    if value == "auto" {
        return Dimension::Auto;
    }
    if let Some(p) = value.strip_suffix('%').and_then(|p| p.trim().parse().ok()) {
        return Dimension::Percent(p);
    }
    parse_px(value).map(Dimension::Px).unwrap_or(Dimension::Auto)
}

/// CSS shorthand with one to four values.
fn parse_edges(value: &str) -> Option<Edges> {
    let parts: Vec<f32> = value
        .split_whitespace()
        .map(parse_px)
        .collect::<Option<_>>()?;
    let edges = match parts[..] {
        [a] => Edges::all(a),
        [v, h] => Edges {
            top: v,
            right: h,
            bottom: v,
            left: h,
        },
        [t, h, b] => Edges {
            top: t,
            right: h,
            bottom: b,
            left: h,
        },
        [t, r, b, l] => Edges {
            top: t,
            right: r,
            bottom: b,
            left: l,
        },
        _ => return None,
    };
    Some(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(html: &str) -> (Document, NodeId) {
        let doc = Document::parse(html);
        let id = doc.document_element().unwrap();
        (doc, id)
    }

    #[test]
    fn inline_style_overrides_classes() {
        let (doc, id) = element(r#"<div class="p-4 text-center" style="padding-left: 2px; width: 120px"></div>"#);
        let s = resolve_style(doc.element(id).unwrap(), None);
        assert_eq!(s.padding.top, 16.0);
        assert_eq!(s.padding.left, 2.0);
        assert_eq!(s.width, Dimension::Px(120.0));
        assert_eq!(s.text_align, TextAlign::Center);
    }

    #[test]
    fn margin_shorthand() {
        let (doc, id) = element(r#"<div style="margin: 4px 8px"></div>"#);
        let s = resolve_style(doc.element(id).unwrap(), None);
        assert_eq!(
            s.margin,
            Edges {
                top: 4.0,
                right: 8.0,
                bottom: 4.0,
                left: 8.0
            }
        );
    }

    #[test]
    fn text_properties_inherit_through_context() {
        let doc = Document::parse(r#"<div style="color: #ff0000; font-size: 20px"><p><span id="s">x</span></p></div>"#);
        let span = doc
            .descendants(doc.root())
            .into_iter()
            .find(|&n| doc.element(n).and_then(|e| e.id()) == Some("s"))
            .unwrap();
        let s = resolve_in_context(&doc, span);
        assert_eq!(s.font_size, 20.0);
        assert_eq!(s.color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(s.display, Display::Inline);
    }

    #[test]
    fn colour_forms() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("rgb(0, 0, 0)"), Some(Color::BLACK));
        assert!(Color::parse("nope").is_none());
    }
}
