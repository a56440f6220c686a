//! [`PdfOutput`] – the built-in [`OutputDocument`].
//!
//! Holds the paginated [`LayoutConfig`] produced by the text renderer and
//! serialises it with [`render_pdf`] on save.

use std::path::{Path, PathBuf};

use crate::engine::OutputDocument;
use crate::error::BoxError;
use crate::layout_config::{LayoutBox, LayoutConfig};
use crate::options::Placement;
use crate::pagination::PageGeometry;
use crate::raster::RasterImage;
use crate::render::render_pdf;
use crate::units::Unit;

#[derive(Debug, Clone)]
pub struct PdfOutput {
    config: LayoutConfig,
    geometry: PageGeometry,
    unit: Unit,
    out_dir: PathBuf,
    placed: Vec<(usize, Placement)>,
}

impl PdfOutput {
    pub fn new(config: LayoutConfig, geometry: PageGeometry, unit: Unit, out_dir: impl AsRef<Path>) -> Self {
        Self {
            config,
            geometry,
            unit,
            out_dir: out_dir.as_ref().to_path_buf(),
            placed: Vec::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Images added so far with the page each landed on.
    pub fn placed(&self) -> &[(usize, Placement)] {
        &self.placed
    }
}

impl OutputDocument for PdfOutput {
    fn add_image(&mut self, image: &RasterImage, at: Placement) -> Result<(), BoxError> {
        if image.width == 0 || image.height == 0 {
            return Err("image has no pixels".into());
        }
        let y_pt = self.unit.to_pt(at.y);
        let (page, y_on_page) = self.geometry.locate(y_pt);
        let lb = LayoutBox::image(
            self.unit.to_pt(at.x),
            y_on_page,
            self.unit.to_pt(at.width),
            self.unit.to_pt(at.height),
            image.to_data_uri(),
        );
        log::debug!(
            "Placing {}x{} image on page {} at ({:.1}, {:.1})pt",
            image.width,
            image.height,
            page + 1,
            lb.x,
            lb.y
        );
        self.config.page_mut(page).boxes.push(lb);
        self.placed.push((page, at));
        Ok(())
    }

    fn save(&mut self, filename: &str) -> Result<PathBuf, BoxError> {
        // Only the final component is honoured; the file always lands in
        // the output directory.
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| format!("`{filename}` is not a file name"))?;
        let bytes = render_pdf(&self.config)?;
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(name);
        std::fs::write(&path, &bytes)?;
        log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    fn page_count(&self) -> usize {
        self.config.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn output(dir: &Path) -> PdfOutput {
        let geometry = PageGeometry {
            page_width_pt: 200.0,
            page_height_pt: 120.0,
            margin_top_pt: 10.0,
            margin_bottom_pt: 10.0,
            auto_paging: true,
        };
        PdfOutput::new(LayoutConfig::new("t", 200.0, 120.0), geometry, Unit::Pt, dir)
    }

    fn pixel() -> RasterImage {
        RasterImage::from_rgba(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))).unwrap()
    }

    #[test]
    fn images_follow_the_page_slices() {
        let mut out = output(&std::env::temp_dir());
        let at = Placement {
            x: 5.0,
            y: 150.0,
            width: 20.0,
            height: 20.0,
        };
        out.add_image(&pixel(), at).unwrap();
        assert_eq!(out.page_count(), 2);
        let lb = &out.config().pages[1].boxes[0];
        assert_eq!((lb.x, lb.y), (5.0, 50.0));
        assert_eq!(out.placed(), &[(1, at)]);
    }

    #[test]
    fn save_keeps_only_the_file_name() {
        let dir = std::env::temp_dir().join(format!("pdf-splice-output-{}", std::process::id()));
        let mut out = output(&dir);
        let path = out.save("../../escape/out.pdf").unwrap();
        assert_eq!(path, dir.join("out.pdf"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
        assert!(out.save("..").is_err());
    }
}
