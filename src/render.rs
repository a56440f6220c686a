//! PDF writer – serialises a [`LayoutConfig`] with `printpdf` (v0.8 ops API).

use std::collections::HashMap;

use printpdf::*;

use crate::layout_config::{LayoutBox, LayoutConfig, Stroke, TextRun};
use crate::raster::parse_data_uri;

const PT_TO_MM: f32 = 0.352_778;

/// An embedded image and its pixel size.
struct Embedded {
    id: XObjectId,
    px_width: usize,
    px_height: usize,
}

/// Serialise `config` to PDF bytes.
///
/// Images that cannot be decoded are left out with a warning rather than
/// failing the whole document.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, String> {
    if config.page_width_pt <= 0.0 || config.page_height_pt <= 0.0 {
        return Err(format!(
            "invalid page size {}x{}pt",
            config.page_width_pt, config.page_height_pt
        ));
    }
    let (page_w, page_h) = (
        Mm(config.page_width_pt * PT_TO_MM),
        Mm(config.page_height_pt * PT_TO_MM),
    );

    let mut doc = PdfDocument::new(&config.title);
    let embedded = embed_images(&mut doc, config);

    let mut pages = Vec::with_capacity(config.pages.len().max(1));
    for page in &config.pages {
        let mut painter = Painter {
            ops: Vec::new(),
            page_height: config.page_height_pt,
            embedded: &embedded,
        };
        for lbox in &page.boxes {
            painter.paint(lbox);
        }
        pages.push(PdfPage::new(page_w, page_h, painter.ops));
    }
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    let page_count = pages.len();

    doc.with_pages(pages);
    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    log::debug!(
        "Serialised {page_count} page(s) into {} bytes ({} warning(s))",
        bytes.len(),
        warnings.len()
    );
    Ok(bytes)
}

/// Add each distinct image to the document once, keyed by its data URI.
fn embed_images(doc: &mut PdfDocument, config: &LayoutConfig) -> HashMap<String, Embedded> {
    let mut embedded = HashMap::new();
    let mut warnings = Vec::new();
    for fill in config.boxes().filter_map(|b| b.image.as_ref()) {
        if embedded.contains_key(&fill.data_uri) {
            continue;
        }
        let raw = parse_data_uri(&fill.data_uri)
            .and_then(|bytes| RawImage::decode_from_bytes(&bytes, &mut warnings));
        match raw {
            Ok(raw) => {
                let (px_width, px_height) = (raw.width, raw.height);
                let id = doc.add_image(&raw);
                embedded.insert(
                    fill.data_uri.clone(),
                    Embedded {
                        id,
                        px_width,
                        px_height,
                    },
                );
            }
            Err(e) => log::warn!("Leaving out an image: {e}"),
        }
    }
    embedded
}

/// Collects the ops of one page. PDF space has its origin bottom-left, so
/// every y coordinate is flipped against `page_height`.
struct Painter<'a> {
    ops: Vec<Op>,
    page_height: f32,
    embedded: &'a HashMap<String, Embedded>,
}

impl Painter<'_> {
    fn paint(&mut self, lbox: &LayoutBox) {
        if let Some(color) = lbox.fill {
            self.fill_rect(lbox, color);
        }
        if let Some(stroke) = &lbox.stroke {
            self.stroke_rect(lbox, stroke);
        }
        if let Some(run) = &lbox.text {
            self.text(lbox, run);
        }
        if let Some(fill) = &lbox.image {
            match self.embedded.get(&fill.data_uri) {
                Some(image) => self.image(lbox, image),
                None => log::debug!("No embedded image for box at ({}, {})", lbox.x, lbox.y),
            }
        }
    }

    fn corners(&self, lbox: &LayoutBox) -> Vec<LinePoint> {
        let top = self.page_height - lbox.y;
        let bottom = top - lbox.height;
        let (left, right) = (lbox.x, lbox.x + lbox.width);
        vec![
            point(left, top),
            point(right, top),
            point(right, bottom),
            point(left, bottom),
        ]
    }

    fn fill_rect(&mut self, lbox: &LayoutBox, color: [f32; 4]) {
        let points = self.corners(lbox);
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing { points }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn stroke_rect(&mut self, lbox: &LayoutBox, stroke: &Stroke) {
        let points = self.corners(lbox);
        self.ops.push(Op::SetOutlineColor {
            col: rgb(stroke.color),
        });
        self.ops.push(Op::SetOutlineThickness {
            pt: Pt(stroke.width_pt),
        });
        self.ops.push(Op::DrawLine {
            line: Line {
                points,
                is_closed: true,
            },
        });
    }

    fn image(&mut self, lbox: &LayoutBox, image: &Embedded) {
        // At 72 dpi one pixel is one point, so the scale is the box size
        // over the pixel size.
        let scale = |box_pt: f32, px: usize| if px > 0 { box_pt / px as f32 } else { 1.0 };
        self.ops.push(Op::UseXobject {
            id: image.id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(lbox.x)),
                translate_y: Some(Pt(self.page_height - lbox.y - lbox.height)),
                dpi: Some(72.0),
                scale_x: Some(scale(lbox.width, image.px_width)),
                scale_y: Some(scale(lbox.height, image.px_height)),
                rotate: None,
            },
        });
    }

    fn text(&mut self, lbox: &LayoutBox, run: &TextRun) {
        if run.text.trim().is_empty() {
            return;
        }
        let font = match (run.bold, run.italic) {
            (true, true) => BuiltinFont::HelveticaBoldOblique,
            (true, false) => BuiltinFont::HelveticaBold,
            (false, true) => BuiltinFont::HelveticaOblique,
            (false, false) => BuiltinFont::Helvetica,
        };
        // Helvetica's ascender is about 0.8 em.
        let baseline = self.page_height - lbox.y - run.size_pt * 0.8;

        self.ops.extend([
            Op::StartTextSection,
            Op::SetTextCursor {
                pos: Point {
                    x: Pt(lbox.x),
                    y: Pt(baseline),
                },
            },
            Op::SetFontSizeBuiltinFont {
                size: Pt(run.size_pt),
                font,
            },
            Op::SetFillColor { col: rgb(run.color) },
            Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_latin1(&run.text))],
                font,
            },
            Op::EndTextSection,
        ]);

        if run.underline {
            let y = baseline - run.size_pt * 0.1;
            self.ops.extend([
                Op::SetOutlineThickness { pt: Pt(0.5) },
                Op::SetOutlineColor { col: rgb(run.color) },
                Op::DrawLine {
                    line: Line {
                        points: vec![point(lbox.x, y), point(lbox.x + lbox.width, y)],
                        is_closed: false,
                    },
                },
            ]);
        }
    }
}

/// Builtin fonts only cover Latin-1; fold common typographic characters
/// onto it and replace the rest.
fn to_latin1(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2022}' => '\u{00B7}',
            '\u{00A0}' => ' ',
            c if (c as u32) < 256 => c,
            _ => '?',
        })
        .collect()
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterImage;

    fn assert_pdf(bytes: &[u8]) {
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn empty_page() {
        assert_pdf(&render_pdf(&LayoutConfig::new("empty", 595.28, 841.89)).unwrap());
    }

    #[test]
    fn text_and_images_on_two_pages() {
        let png = RasterImage::from_rgba(&::image::RgbaImage::from_pixel(
            4,
            4,
            ::image::Rgba([200, 0, 0, 255]),
        ))
        .unwrap();
        let mut config = LayoutConfig::new("mixed", 300.0, 300.0);
        let mut caption = LayoutBox::new(10.0, 10.0, 100.0, 12.0);
        caption.text = Some(TextRun {
            text: "\u{201C}quoted\u{201D} \u{2013} text".into(),
            size_pt: 12.0,
            bold: true,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            underline: true,
        });
        caption.stroke = Some(Stroke {
            width_pt: 1.0,
            color: [0.5, 0.5, 0.5, 1.0],
        });
        config.page_mut(0).boxes.push(caption);
        config
            .page_mut(1)
            .boxes
            .push(LayoutBox::image(20.0, 20.0, 40.0, 40.0, png.to_data_uri()));
        // Same image again is embedded once; a broken one is left out.
        config
            .page_mut(1)
            .boxes
            .push(LayoutBox::image(80.0, 20.0, 8.0, 8.0, png.to_data_uri()));
        config
            .page_mut(1)
            .boxes
            .push(LayoutBox::image(0.0, 0.0, 8.0, 8.0, "data:image/png;base64,AAAA".into()));

        assert_pdf(&render_pdf(&config).unwrap());
    }

    #[test]
    fn rejects_degenerate_pages() {
        assert!(render_pdf(&LayoutConfig::new("bad", 0.0, 100.0)).is_err());
    }

    #[test]
    fn latin1_mapping() {
        assert_eq!(to_latin1("\u{201C}a\u{201D} \u{2014} \u{4E2D}"), "\"a\" - ?");
    }
}
