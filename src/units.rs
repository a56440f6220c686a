//! Measurement units and page formats.
//!
//! [`px_to_unit`] is the only place DOM pixels are converted into output
//! document units. Positions and sizes of both text and images go through
//! it, so the two can never drift apart.

use serde::{Deserialize, Serialize};

/// Points per CSS pixel (96 px = 72 pt).
pub const PX_TO_PT: f32 = 0.75;

/// Measurement unit of the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Pt,
    Mm,
    Cm,
    #[serde(rename = "in")]
    In,
    Px,
}

impl Unit {
    /// How many points one unit spans.
    pub fn pt_per_unit(self) -> f32 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
            Unit::Px => PX_TO_PT,
        }
    }

    pub fn to_pt(self, value: f32) -> f32 {
        value * self.pt_per_unit()
    }

    pub fn from_pt(self, pt: f32) -> f32 {
        pt / self.pt_per_unit()
    }
}

/// Convert DOM pixels into `unit`.
pub fn px_to_unit(px: f32, unit: Unit) -> f32 {
    unit.from_pt(px * PX_TO_PT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page size of the output document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// 210mm × 297mm.
    #[default]
    A4,
    /// 8.5in × 11in.
    Letter,
    /// Explicit size in the document's unit.
    Custom { width: f32, height: f32 },
}

impl PageFormat {
    /// Page size in points after applying `orientation`.
    pub fn size_pt(self, unit: Unit, orientation: Orientation) -> (f32, f32) {
        let (w, h) = match self {
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Custom { width, height } => (unit.to_pt(width), unit.to_pt(height)),
        };
        let (short, long) = (w.min(h), w.max(h));
        match orientation {
            Orientation::Portrait if w <= h => (w, h),
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        }
    }
}
