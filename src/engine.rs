//! Collaborator seams of the pipeline.
//!
//! The orchestrator only talks to these traits. Built-in implementations
//! live in [`flow`](crate::flow) ([`TextRenderer`]),
//! [`output`](crate::output) ([`OutputDocument`]) and
//! [`raster`](crate::raster) ([`Rasterizer`]); tests substitute recording
//! fakes.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::dom::{Document, NodeId};
use crate::error::BoxError;
use crate::options::{LayoutOptions, Placement, RasterOptions};
use crate::raster::RasterImage;

/// Converts a document subtree into paginated, selectable text.
#[async_trait]
pub trait TextRenderer: Send + Sync {
    /// Render the subtree at `root` as it currently stands in `doc`.
    async fn render(
        &self,
        doc: &Document,
        root: NodeId,
        layout: &LayoutOptions,
    ) -> Result<Box<dyn OutputDocument>, BoxError>;

    /// An empty single-page document of `width` × `height` in `layout.unit`.
    fn blank(
        &self,
        width: f32,
        height: f32,
        layout: &LayoutOptions,
    ) -> Result<Box<dyn OutputDocument>, BoxError>;
}

/// Renders an element's appearance into a bitmap.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        doc: &Document,
        element: NodeId,
        options: &RasterOptions,
    ) -> Result<RasterImage, BoxError>;
}

/// An in-progress output document.
pub trait OutputDocument: Send {
    /// Draw `image` at `at` (document units, see [`Placement`]).
    fn add_image(&mut self, image: &RasterImage, at: Placement) -> Result<(), BoxError>;

    /// Serialise the document under `filename`, returning where it went.
    fn save(&mut self, filename: &str) -> Result<PathBuf, BoxError>;

    fn page_count(&self) -> usize;
}
