//! Sample pages for tests and the `--demo` mode of the binary.

use image::{Rgba, RgbaImage};

use crate::error::BoxError;
use crate::raster::RasterImage;

/// Draw a simple bar chart into a `width` × `height` surface.
pub fn bar_chart(width: u32, height: u32, values: &[f32], color: [u8; 3]) -> Result<RasterImage, BoxError> {
    let mut pixels = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let max = values.iter().copied().fold(0.0f32, f32::max).max(f32::EPSILON);
    let slot = width / values.len().max(1) as u32;
    for (i, value) in values.iter().enumerate() {
        let bar_height = ((value / max) * (height as f32 - 4.0)).max(0.0) as u32;
        let x0 = i as u32 * slot + slot / 4;
        let x1 = (x0 + slot / 2).min(width);
        for x in x0..x1 {
            for y in height - bar_height..height {
                pixels.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
            }
        }
    }
    RasterImage::from_rgba(&pixels)
}

/// A dashboard with two drawn canvases between blocks of text.
pub fn dashboard_page() -> Result<String, BoxError> {
    let revenue = bar_chart(360, 180, &[3.0, 5.0, 4.0, 7.0, 6.0], [37, 99, 235])?;
    let churn = bar_chart(360, 180, &[6.0, 4.0, 3.5, 2.0, 1.5], [220, 38, 38])?;
    Ok(format!(
        r##"<!DOCTYPE html>
<html>
<head><title>Quarterly dashboard</title></head>
<body>
<div id="report" style="width: 760px; padding: 20px">
    <h1>Quarterly dashboard</h1>
    <p>Revenue grew in four of the last five months while churn kept falling.</p>
    <div class="chart-card" style="border: 1px solid #cccccc; padding: 10px; margin-bottom: 16px">
        <h2>Revenue</h2>
        <canvas id="revenue" width="360" height="180" data-surface="{revenue}"></canvas>
    </div>
    <div class="chart-card" style="border: 1px solid #cccccc; padding: 10px">
        <h2>Churn</h2>
        <canvas id="churn" width="360" height="180" data-surface="{churn}"></canvas>
    </div>
    <p>Figures are preliminary and subject to the usual month-end adjustments.</p>
</div>
</body>
</html>"##,
        revenue = revenue.to_data_uri(),
        churn = churn.to_data_uri(),
    ))
}

/// Text-only report with headings, lists and a table.
pub fn report_template() -> &'static str {
    r##"
<div id="report" class="p-6">
    <h1 class="text-3xl font-bold mb-2">Quarterly Report</h1>
    <p class="mb-6">Q4 2025 - <span class="font-bold">Confidential</span></p>

    <h2 class="mb-2">Key Highlights</h2>
    <ul class="mb-4">
        <li>Customer acquisition cost reduced by 15%</li>
        <li>Net promoter score improved to 72</li>
        <li>Three new enterprise partnerships signed</li>
    </ul>

    <table class="w-full mb-6">
        <tr><th>Region</th><th>Revenue</th></tr>
        <tr><td>North</td><td>$1.4M</td></tr>
        <tr><td>South</td><td>$2.8M</td></tr>
    </table>
</div>
"##
}

/// Smallest useful page.
pub fn minimal_template() -> &'static str {
    r#"<div id="root"><p>Hello, world!</p></div>"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Tag};

    #[test]
    fn dashboard_canvases_carry_surfaces() {
        let doc = Document::parse(&dashboard_page().unwrap());
        let canvases: Vec<_> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|&n| matches!(doc.element(n), Some(e) if e.tag == Tag::Canvas))
            .collect();
        assert_eq!(canvases.len(), 2);
        for canvas in canvases {
            let surface = doc.surface(canvas).unwrap();
            assert_eq!((surface.width, surface.height), (360, 180));
        }
    }

    #[test]
    fn templates_parse() {
        for html in [report_template(), minimal_template()] {
            let doc = Document::parse(html);
            assert!(doc.document_element().is_some());
        }
    }

    #[test]
    fn chart_bars_reach_the_bottom() {
        let chart = bar_chart(50, 20, &[1.0, 2.0], [0, 0, 0]).unwrap();
        let pixels = chart.decode().unwrap();
        assert_eq!(pixels.get_pixel(35, 19), &Rgba([0, 0, 0, 255]));
        assert_eq!(pixels.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }
}
