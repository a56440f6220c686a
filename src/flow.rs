//! [`FlowRenderer`] – the built-in [`TextRenderer`].
//!
//! Measures the subtree with the same layout pass the orchestrator uses,
//! paginates it and hands back a [`PdfOutput`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::dom::{Document, NodeId};
use crate::engine::{OutputDocument, TextRenderer};
use crate::error::BoxError;
use crate::layout;
use crate::layout_config::LayoutConfig;
use crate::options::LayoutOptions;
use crate::output::PdfOutput;
use crate::pagination::{paginate, PageGeometry};

#[derive(Debug, Clone)]
pub struct FlowRenderer {
    out_dir: PathBuf,
}

impl FlowRenderer {
    /// Saved documents land in `out_dir`.
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TextRenderer for FlowRenderer {
    async fn render(
        &self,
        doc: &Document,
        root: NodeId,
        layout: &LayoutOptions,
    ) -> Result<Box<dyn OutputDocument>, BoxError> {
        let tree = layout::measure(doc, root, layout.viewport_width())?;
        let config = paginate(doc, &tree, layout);
        log::debug!(
            "Laid out {} at {}px into {} page(s)",
            root,
            tree.root().rect.width,
            config.pages.len()
        );
        let geometry = PageGeometry::from_options(layout);
        Ok(Box::new(PdfOutput::new(config, geometry, layout.unit, &self.out_dir)))
    }

    fn blank(
        &self,
        width: f32,
        height: f32,
        layout: &LayoutOptions,
    ) -> Result<Box<dyn OutputDocument>, BoxError> {
        if width <= 0.0 || height <= 0.0 {
            return Err(format!("cannot create a {width}x{height} page").into());
        }
        let (w_pt, h_pt) = (layout.unit.to_pt(width), layout.unit.to_pt(height));
        let config = LayoutConfig::new(&layout.title, w_pt, h_pt);
        Ok(Box::new(PdfOutput::new(
            config,
            PageGeometry::single(w_pt, h_pt),
            layout.unit,
            &self.out_dir,
        )))
    }
}
