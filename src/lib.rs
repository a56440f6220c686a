//! # pdf-splice – layout-preserving HTML → PDF export
//!
//! Turns a region of a live document into a paginated, text-selectable PDF
//! while drawing designated sub-regions (charts, canvases, anything matched
//! by a selector) as images at the exact place they occupied.
//!
//! The moving parts:
//!
//! 1. **Gate** – load engine resources once, however many calls race
//!    ([`gate`]).
//! 2. **Orchestrate** – capture, swap in placeholders, render text, reinsert
//!    images and restore the document ([`orchestrator`]).
//! 3. **Engines** – the collaborator traits ([`engine`]) and their built-in
//!    implementations: [`flow::FlowRenderer`] (style → Taffy layout →
//!    pagination), [`output::PdfOutput`] (printpdf) and
//!    [`raster::SoftRasterizer`].
//!
//! The document itself is an arena DOM ([`dom`]) parsed from HTML, styled
//! by [`style`] and measured by [`layout`].

pub mod assets;
pub mod dom;
pub mod engine;
pub mod error;
pub mod flow;
pub mod fonts;
pub mod gate;
pub mod layout;
pub mod layout_config;
pub mod options;
pub mod orchestrator;
pub mod output;
pub mod pagination;
pub mod raster;
pub mod render;
pub mod selector;
pub mod style;
pub mod templates;
pub mod units;

// Re-exports for convenience
pub use dom::{Document, NodeId};
pub use error::{BoxError, Error, LoadError, Result};
pub use gate::{EngineManifest, Needs, ReadinessGate, Resource, ResourceLoader};
pub use options::{GenerateOptions, LayoutOptions, Margins, Placement, RasterOptions};
pub use orchestrator::{GenerationReport, GenerationRequest, Orchestrator, Stage, Substitution};
