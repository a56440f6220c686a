//! Raster images and the built-in software rasterizer.
//!
//! [`SoftRasterizer`] paints the boxes of an element's subtree (backgrounds,
//! borders, `<img>` data and canvas surfaces) into an RGBA bitmap. Glyphs are
//! not drawn.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{imageops, ImageFormat, Rgba, RgbaImage};

use crate::assets::AssetStore;
use crate::dom::{Document, NodeId};
use crate::engine::Rasterizer;
use crate::error::BoxError;
use crate::layout::{self, BoxContent, PositionedBox, DEFAULT_VIEWPORT_PX};
use crate::options::RasterOptions;
use crate::style::Color;

/// An encoded (PNG/JPEG) bitmap with its natural pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RasterImage {
    /// Encode an RGBA buffer as PNG.
    pub fn from_rgba(pixels: &RgbaImage) -> Result<Self, BoxError> {
        let mut bytes = Vec::new();
        pixels.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(Self {
            bytes,
            width: pixels.width(),
            height: pixels.height(),
        })
    }

    /// Wrap already-encoded bytes, reading the dimensions from the header.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, BoxError> {
        let decoded = image::load_from_memory(&bytes)?;
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
        })
    }

    /// Decode a `data:<mime>;base64,<data>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, BoxError> {
        Self::from_encoded(parse_data_uri(uri)?)
    }

    pub fn to_data_uri(&self) -> String {
        let mime = match image::guess_format(&self.bytes) {
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            _ => "image/png",
        };
        format!("data:{mime};base64,{}", BASE64_STD.encode(&self.bytes))
    }

    pub fn decode(&self) -> Result<RgbaImage, BoxError> {
        Ok(image::load_from_memory(&self.bytes)?.to_rgba8())
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(80).collect();
        format!("Image src must be a base64 data URI. Got: {preview:?}")
    })?;
    let (header, data) = rest
        .split_once(',')
        .ok_or("Invalid data URI: missing `,` separator between header and data")?;
    if !header.contains(";base64") {
        return Err("Only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("Base64 decode error: {e}"))
}

// ---------------------------------------------------------------------------
// Software rasterizer
// ---------------------------------------------------------------------------

/// Paints element boxes into a bitmap.
#[derive(Debug, Clone)]
pub struct SoftRasterizer {
    viewport_width: f32,
    background: Color,
    assets: Option<Arc<AssetStore>>,
}

impl Default for SoftRasterizer {
    fn default() -> Self {
        Self {
            viewport_width: DEFAULT_VIEWPORT_PX,
            background: Color::WHITE,
            assets: None,
        }
    }
}

impl SoftRasterizer {
    pub fn new(viewport_width: f32) -> Self {
        Self {
            viewport_width,
            ..Self::default()
        }
    }

    /// Resolve non-data image sources from preloaded assets when
    /// `use_cors` is requested.
    pub fn with_assets(mut self, assets: Arc<AssetStore>) -> Self {
        self.assets = Some(assets);
        self
    }

    fn paint(
        &self,
        canvas: &mut RgbaImage,
        doc: &Document,
        b: &PositionedBox,
        origin: (f32, f32),
        scale: f32,
        options: &RasterOptions,
    ) {
        let x = ((b.rect.x - origin.0) * scale).round() as i64;
        let y = ((b.rect.y - origin.1) * scale).round() as i64;
        let w = (b.rect.width * scale).round().max(0.0) as u32;
        let h = (b.rect.height * scale).round().max(0.0) as u32;

        // Text-node leaves carry their parent's style; only elements paint.
        let decorated = doc.is_element(b.node);
        if decorated && !b.style.background_color.is_transparent() {
            fill(canvas, x, y, w, h, b.style.background_color);
        }
        if decorated && b.style.border_width > 0.0 {
            let t = (b.style.border_width * scale).round().max(1.0) as u32;
            let c = b.style.border_color;
            fill(canvas, x, y, w, t, c);
            fill(canvas, x, y + h as i64 - t as i64, w, t, c);
            fill(canvas, x, y, t, h, c);
            fill(canvas, x + w as i64 - t as i64, y, t, h, c);
        }

        let picture = match &b.content {
            BoxContent::Surface => doc.surface(b.node).cloned(),
            BoxContent::Image { src } => self.resolve_src(src, options),
            _ => None,
        };
        if let Some(picture) = picture {
            match picture.decode() {
                Ok(pixels) if w > 0 && h > 0 => {
                    let resized = imageops::resize(&pixels, w, h, imageops::FilterType::Triangle);
                    imageops::overlay(canvas, &resized, x, y);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Skipping image in {}: {e}", b.node),
            }
        }

        for child in &b.children {
            self.paint(canvas, doc, child, origin, scale, options);
        }
    }

    fn resolve_src(&self, src: &str, options: &RasterOptions) -> Option<RasterImage> {
        if src.starts_with("data:") {
            return RasterImage::from_data_uri(src)
                .map_err(|e| log::warn!("Skipping image: {e}"))
                .ok();
        }
        if !options.use_cors {
            log::debug!("Skipping cross-origin image {src:?} (use_cors is off)");
            return None;
        }
        let bytes = self.assets.as_ref()?.get(src)?;
        RasterImage::from_encoded(bytes)
            .map_err(|e| log::warn!("Skipping asset {src:?}: {e}"))
            .ok()
    }
}

fn fill(canvas: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Color) {
    let px = Rgba([
        (color.r * 255.0).round() as u8,
        (color.g * 255.0).round() as u8,
        (color.b * 255.0).round() as u8,
        (color.a * 255.0).round() as u8,
    ]);
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x + w as i64).max(0) as u32).min(canvas.width());
    let y1 = ((y + h as i64).max(0) as u32).min(canvas.height());
    for yy in y0..y1 {
        for xx in x0..x1 {
            canvas.put_pixel(xx, yy, px);
        }
    }
}

/// Largest canvas `rasterize` allocates (16384 × 16384, 1 GiB of RGBA).
const MAX_CANVAS_PIXELS: f64 = 16_384.0 * 16_384.0;

#[async_trait]
impl Rasterizer for SoftRasterizer {
    async fn rasterize(
        &self,
        doc: &Document,
        element: NodeId,
        options: &RasterOptions,
    ) -> Result<RasterImage, BoxError> {
        // Measure within the whole page so the element keeps its context.
        let context = doc.document_element().ok_or("document has no elements")?;
        let tree = layout::measure(doc, context, self.viewport_width)?;
        let target = tree
            .find(element)
            .ok_or_else(|| format!("element {element} is not laid out"))?;

        let scale = if options.scale > 0.0 { options.scale } else { 1.0 };
        let width = (f64::from(target.rect.width) * f64::from(scale)).round().max(1.0);
        let height = (f64::from(target.rect.height) * f64::from(scale)).round().max(1.0);
        let pixels = width * height;
        if !pixels.is_finite() || pixels > MAX_CANVAS_PIXELS {
            return Err(format!(
                "capturing {element} at scale {scale} needs a {width}x{height} canvas, over the {MAX_CANVAS_PIXELS} pixel limit"
            )
            .into());
        }
        let (width, height) = (width as u32, height as u32);
        let bg = self.background;
        let mut canvas = RgbaImage::from_pixel(
            width,
            height,
            Rgba([
                (bg.r * 255.0) as u8,
                (bg.g * 255.0) as u8,
                (bg.b * 255.0) as u8,
                (bg.a * 255.0) as u8,
            ]),
        );
        self.paint(
            &mut canvas,
            doc,
            target,
            (target.rect.x, target.rect.y),
            scale,
            options,
        );
        log::debug!("Rasterized {element} at {width}x{height}");
        RasterImage::from_rgba(&canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn solid_png(w: u32, h: u32, rgba: [u8; 4]) -> RasterImage {
        RasterImage::from_rgba(&RgbaImage::from_pixel(w, h, Rgba(rgba))).unwrap()
    }

    #[test]
    fn data_uri_keeps_dimensions() {
        let img = solid_png(7, 3, [10, 20, 30, 255]);
        let uri = img.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        let back = RasterImage::from_data_uri(&uri).unwrap();
        assert_eq!((back.width, back.height), (7, 3));
    }

    #[test]
    fn rejects_non_data_uri() {
        assert!(parse_data_uri("https://example.com/a.png").is_err());
        assert!(parse_data_uri("data:image/png,abc").is_err());
    }

    #[tokio::test]
    async fn paints_background_at_scale() {
        let doc = Document::parse(
            r#"<div><div id="box" style="width: 20px; height: 10px; background: #ff0000"></div></div>"#,
        );
        let target = doc
            .descendants(doc.root())
            .into_iter()
            .find(|&n| doc.element(n).and_then(|e| e.id()) == Some("box"))
            .unwrap();
        let options = RasterOptions {
            scale: 2.0,
            use_cors: false,
        };
        let image = SoftRasterizer::default()
            .rasterize(&doc, target, &options)
            .await
            .unwrap();
        assert_eq!((image.width, image.height), (40, 20));
        let pixels = image.decode().unwrap();
        assert_eq!(pixels.get_pixel(5, 5), &Rgba([255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn canvas_surface_is_copied() {
        let surface = solid_png(4, 4, [0, 0, 255, 255]);
        let html = format!(
            r#"<div><canvas width="4" height="4" data-surface="{}"></canvas></div>"#,
            surface.to_data_uri()
        );
        let doc = Document::parse(&html);
        let canvas = doc.descendants(doc.root())[1];
        assert!(doc.surface(canvas).is_some());
        let image = SoftRasterizer::default()
            .rasterize(&doc, canvas, &RasterOptions::default())
            .await
            .unwrap();
        assert_eq!(image.decode().unwrap().get_pixel(1, 1), &Rgba([0, 0, 255, 255]));
    }

    #[tokio::test]
    async fn oversized_scale_is_an_error() {
        let doc = Document::parse(r#"<div><div style="width: 20px; height: 10px"></div></div>"#);
        let target = doc.descendants(doc.root())[1];
        for scale in [1e30, f32::INFINITY, 5_000.0] {
            let options = RasterOptions {
                scale,
                use_cors: false,
            };
            let err = SoftRasterizer::default()
                .rasterize(&doc, target, &options)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("pixel limit"), "{err}");
        }
    }
}
