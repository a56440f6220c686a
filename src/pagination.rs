//! Pagination – projects a measured [`LayoutTree`] onto pages.
//!
//! The content is treated as one long strip that is sliced into pages of
//! equal content height: the first page's top margin is kept and every
//! further page continues where the previous one left off. Every box is
//! projected with [`LayoutOptions::project`], the same projection the
//! orchestrator uses for captured images, then sliced by
//! [`PageGeometry::locate`], so text and images land on the same pages.

use crate::dom::Document;
use crate::layout::{BoxContent, LayoutTree, PositionedBox, Rect};
use crate::layout_config::{ImageFill, LayoutBox, LayoutConfig, Stroke, TextRun};
use crate::options::LayoutOptions;
use crate::style::{self, ComputedStyle};
use crate::units::{px_to_unit, Unit};

/// Page size and vertical margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub margin_top_pt: f32,
    pub margin_bottom_pt: f32,
    pub auto_paging: bool,
}

impl PageGeometry {
    pub fn from_options(layout: &LayoutOptions) -> Self {
        let (page_width_pt, page_height_pt) = layout.format.size_pt(layout.unit, layout.orientation);
        Self {
            page_width_pt,
            page_height_pt,
            margin_top_pt: px_to_unit(layout.margin.top, Unit::Pt),
            margin_bottom_pt: px_to_unit(layout.margin.bottom, Unit::Pt),
            auto_paging: layout.auto_paging,
        }
    }

    /// A single page that never continues.
    pub fn single(page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            page_width_pt,
            page_height_pt,
            margin_top_pt: 0.0,
            margin_bottom_pt: 0.0,
            auto_paging: false,
        }
    }

    pub fn content_height_pt(&self) -> f32 {
        self.page_height_pt - self.margin_top_pt - self.margin_bottom_pt
    }

    /// Map a y position on the continuous strip to `(page, y on that page)`.
    pub fn locate(&self, y_pt: f32) -> (usize, f32) {
        let content = self.content_height_pt();
        if !self.auto_paging || content <= 0.0 || y_pt < self.margin_top_pt {
            return (0, y_pt);
        }
        let page = ((y_pt - self.margin_top_pt) / content).floor();
        (page as usize, y_pt - page * content)
    }
}

/// Convert a measured tree into a paginated [`LayoutConfig`].
pub fn paginate(doc: &Document, tree: &LayoutTree, layout: &LayoutOptions) -> LayoutConfig {
    let geometry = PageGeometry::from_options(layout);
    let mut paginator = Paginator {
        doc,
        layout,
        geometry,
        config: LayoutConfig::new(&layout.title, geometry.page_width_pt, geometry.page_height_pt),
    };
    paginator.emit(tree.root());
    paginator.config
}

struct Paginator<'a> {
    doc: &'a Document,
    layout: &'a LayoutOptions,
    geometry: PageGeometry,
    config: LayoutConfig,
}

impl Paginator<'_> {
    /// Project `rect` to points, slice it onto its page and add a box.
    fn push(&mut self, rect: Rect, fill: impl FnOnce(&mut LayoutBox)) {
        let p = self.layout.project(rect);
        let unit = self.layout.unit;
        let (page, y) = self.geometry.locate(unit.to_pt(p.y));
        let mut lb = LayoutBox::new(unit.to_pt(p.x), y, unit.to_pt(p.width), unit.to_pt(p.height));
        fill(&mut lb);
        self.config.page_mut(page).boxes.push(lb);
    }

    fn emit(&mut self, b: &PositionedBox) {
        let decorated = self.doc.is_element(b.node);
        let s = &b.style;
        if decorated && (!s.background_color.is_transparent() || s.border_width > 0.0) {
            self.push(b.rect, |lb| {
                if !s.background_color.is_transparent() {
                    lb.fill = Some(s.background_color.to_array());
                }
                if s.border_width > 0.0 {
                    lb.stroke = Some(Stroke {
                        width_pt: px_to_unit(s.border_width, Unit::Pt),
                        color: s.border_color.to_array(),
                    });
                }
            });
        }

        match &b.content {
            BoxContent::Text { lines } => self.emit_lines(b, lines, decorated),
            BoxContent::ListItem { marker } => {
                let width = self.text_width(marker, s);
                let height = self.doc.fonts().line_height_px(s.font_size, s.line_height);
                let rect = Rect {
                    x: b.rect.x - width,
                    y: b.rect.y + half_leading(s),
                    width,
                    height,
                };
                let text = self.text_run(marker, s);
                self.push(rect, |lb| lb.text = Some(text));
            }
            BoxContent::Image { src } if src.starts_with("data:") => {
                let src = src.clone();
                self.push(b.rect, |lb| place_image(lb, src));
            }
            BoxContent::Image { src } => {
                log::debug!("Not embedding non-data image {src:?}");
            }
            BoxContent::Surface => {
                if let Some(surface) = self.doc.surface(b.node) {
                    let src = surface.to_data_uri();
                    self.push(b.rect, |lb| place_image(lb, src));
                }
            }
            BoxContent::None => {}
        }

        for child in &b.children {
            self.emit(child);
        }
    }

    fn emit_lines(&mut self, b: &PositionedBox, lines: &[String], decorated: bool) {
        let s = &b.style;
        let (left, top, horizontal) = if decorated {
            (
                s.padding.left + s.border_width,
                s.padding.top + s.border_width,
                s.padding.horizontal() + 2.0 * s.border_width,
            )
        } else {
            (0.0, 0.0, 0.0)
        };
        let content_width = (b.rect.width - horizontal).max(0.0);
        let line_height = self.doc.fonts().line_height_px(s.font_size, s.line_height);

        for (i, line) in lines.iter().enumerate() {
            let width = self.text_width(line, s);
            let offset = match s.text_align {
                style::TextAlign::Left => 0.0,
                style::TextAlign::Center => ((content_width - width) / 2.0).max(0.0),
                style::TextAlign::Right => (content_width - width).max(0.0),
            };
            let rect = Rect {
                x: b.rect.x + left + offset,
                y: b.rect.y + top + i as f32 * line_height + half_leading(s),
                width,
                height: s.font_size,
            };
            let text = self.text_run(line, s);
            self.push(rect, |lb| lb.text = Some(text));
        }
    }

    fn text_width(&self, text: &str, s: &ComputedStyle) -> f32 {
        self.doc.fonts().measure_text_width(
            text,
            s.font_size,
            s.font_weight == style::FontWeight::Bold,
            s.font_style == style::FontStyle::Italic,
            &s.font_family,
        )
    }

    fn text_run(&self, text: &str, s: &ComputedStyle) -> TextRun {
        TextRun {
            text: text.to_string(),
            size_pt: px_to_unit(s.font_size * self.layout.effective_scale(), Unit::Pt),
            bold: s.font_weight == style::FontWeight::Bold,
            italic: s.font_style == style::FontStyle::Italic,
            color: s.color.to_array(),
            underline: s.text_decoration == style::TextDecoration::Underline,
        }
    }
}

/// Space above the glyphs when the line box is taller than the font.
fn half_leading(s: &ComputedStyle) -> f32 {
    ((s.line_height - 1.0) * s.font_size / 2.0).max(0.0)
}

fn place_image(lb: &mut LayoutBox, data_uri: String) {
    lb.image = Some(ImageFill { data_uri });
}
