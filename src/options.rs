//! Generation options – the serialisable configuration of one `generate`
//! call, plus the coordinate projection shared by the text renderer and the
//! image reinsertion step.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::{Rect, DEFAULT_VIEWPORT_PX};
use crate::units::{px_to_unit, Orientation, PageFormat, Unit};

/// Options recognised by `generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Name of the saved file.
    pub filename: String,
    /// Selectors of the regions rendered as images, in priority order.
    pub render_selectors: Vec<String>,
    /// Forwarded to the text renderer.
    pub layout: LayoutOptions,
    /// Forwarded to the rasterizer.
    pub raster: RasterOptions,
    /// Skip text rendering; rasterize the whole root onto a page sized to it.
    pub fit_content: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            filename: "download.pdf".to_string(),
            render_selectors: Vec::new(),
            layout: LayoutOptions::default(),
            raster: RasterOptions::default(),
            fit_content: false,
        }
    }
}

impl GenerateOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Options(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Whether this call needs the rasterizer engine at all.
    pub fn needs_rasterizer(&self) -> bool {
        self.fit_content || !self.render_selectors.is_empty()
    }
}

/// Page margins in DOM px. Deserialises from a number, `[vertical,
/// horizontal]` or `[top, right, bottom, left]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "MarginSpec", into = "[f32; 4]")]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MarginSpec {
    All(f32),
    Pair([f32; 2]),
    Quad([f32; 4]),
}

impl From<MarginSpec> for Margins {
    fn from(spec: MarginSpec) -> Self {
        match spec {
            MarginSpec::All(v) => Margins::uniform(v),
            MarginSpec::Pair([v, h]) => Margins {
                top: v,
                right: h,
                bottom: v,
                left: h,
            },
            MarginSpec::Quad([top, right, bottom, left]) => Margins {
                top,
                right,
                bottom,
                left,
            },
        }
    }
}

impl From<Margins> for [f32; 4] {
    fn from(m: Margins) -> Self {
        [m.top, m.right, m.bottom, m.left]
    }
}

/// Layout options for the text renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    pub margin: Margins,
    pub unit: Unit,
    pub format: PageFormat,
    pub orientation: Orientation,
    /// Scale applied to DOM px before unit conversion.
    pub scale: f32,
    /// Target content width in `unit`; when set it overrides `scale` so the
    /// layout viewport maps exactly onto this width.
    pub width: Option<f32>,
    /// Layout viewport width in px.
    pub window_width: Option<f32>,
    /// Continue content onto further pages instead of clipping at the first.
    pub auto_paging: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            title: "pdf-splice output".to_string(),
            margin: Margins::default(),
            unit: Unit::Pt,
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            scale: 1.0,
            width: None,
            window_width: None,
            auto_paging: true,
        }
    }
}

/// Placement of content in output-document units, origin at the top-left of
/// the first page's content strip (margins included).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutOptions {
    /// Width of the layout viewport in px.
    pub fn viewport_width(&self) -> f32 {
        self.window_width.unwrap_or(DEFAULT_VIEWPORT_PX)
    }

    /// Scale from DOM px to scaled px.
    pub fn effective_scale(&self) -> f32 {
        match self.width {
            Some(width) if self.viewport_width() > 0.0 => {
                width / px_to_unit(self.viewport_width(), self.unit)
            }
            _ => self.scale,
        }
    }

    /// Project a rectangle measured relative to the rendered root into
    /// document units: `(position × scale + margin)` then unit conversion.
    pub fn project(&self, rect: Rect) -> Placement {
        let scale = self.effective_scale();
        Placement {
            x: px_to_unit(rect.x * scale + self.margin.left, self.unit),
            y: px_to_unit(rect.y * scale + self.margin.top, self.unit),
            width: px_to_unit(rect.width * scale, self.unit),
            height: px_to_unit(rect.height * scale, self.unit),
        }
    }
}

/// Options for the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Capture scale; 2.0 doubles the bitmap resolution.
    pub scale: f32,
    /// Include images that come from another origin (preloaded assets).
    pub use_cors: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            use_cors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = GenerateOptions::from_json("{}").unwrap();
        assert_eq!(opts.filename, "download.pdf");
        assert!(opts.render_selectors.is_empty());
        assert!(!opts.needs_rasterizer());
        assert_eq!(opts.layout.unit, Unit::Pt);
        assert!(opts.layout.auto_paging);
    }

    #[test]
    fn margin_forms() {
        let one: LayoutOptions = serde_json::from_str(r#"{"margin": 10}"#).unwrap();
        assert_eq!(one.margin, Margins::uniform(10.0));

        let pair: LayoutOptions = serde_json::from_str(r#"{"margin": [5, 10]}"#).unwrap();
        assert_eq!(pair.margin.top, 5.0);
        assert_eq!(pair.margin.left, 10.0);

        let quad: LayoutOptions = serde_json::from_str(r#"{"margin": [1, 2, 3, 4]}"#).unwrap();
        assert_eq!(quad.margin.left, 4.0);
    }

    #[test]
    fn full_options_parse() {
        let json = r##"{
            "filename": "report.pdf",
            "render_selectors": ["canvas", ".chart"],
            "layout": { "unit": "mm", "format": { "custom": { "width": 100, "height": 200 } } },
            "raster": { "scale": 2, "use_cors": true }
        }"##;
        let opts = GenerateOptions::from_json(json).unwrap();
        assert!(opts.needs_rasterizer());
        assert_eq!(opts.layout.unit, Unit::Mm);
        assert_eq!(
            opts.layout.format,
            PageFormat::Custom {
                width: 100.0,
                height: 200.0
            }
        );
        assert_eq!(opts.raster.scale, 2.0);
    }

    #[test]
    fn bad_json_is_an_options_error() {
        assert!(matches!(
            GenerateOptions::from_json("{\"filename\": 3}"),
            Err(Error::Options(_))
        ));
    }

    #[test]
    fn projection_adds_margin_before_conversion() {
        let layout = LayoutOptions {
            margin: Margins::uniform(10.0),
            ..LayoutOptions::default()
        };
        let p = layout.project(Rect {
            x: 30.0,
            y: 50.0,
            width: 100.0,
            height: 80.0,
        });
        assert_eq!(
            p,
            Placement {
                x: 30.0,
                y: 45.0,
                width: 75.0,
                height: 60.0
            }
        );
    }

    #[test]
    fn target_width_overrides_scale() {
        let layout = LayoutOptions {
            width: Some(300.0),
            window_width: Some(800.0),
            ..LayoutOptions::default()
        };
        // 800px = 600pt mapped onto 300pt.
        assert!((layout.effective_scale() - 0.5).abs() < 1e-6);
    }
}
