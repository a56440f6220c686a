//! Substitution orchestrator.
//!
//! One generation call runs these steps:
//!
//! 1. wait for the engines through the [`ReadinessGate`];
//! 2. resolve the render-as-image selectors below the root;
//! 3. capture each match to a [`RasterImage`] (canvas surfaces are read
//!    directly, everything else goes through the [`Rasterizer`]);
//! 4. swap every captured element for a same-sized placeholder;
//! 5. let the [`TextRenderer`] lay out the modified subtree;
//! 6. draw each capture where its placeholder ended up;
//! 7. save the output document;
//! 8. put the original elements back.
//!
//! Step 8 is owned by [`Substitution`], a guard that restores the document
//! when it goes out of scope. Early returns, panics and a dropped future
//! all leave the document as it was found.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::dom::{Document, DomError, NodeId, Tag};
use crate::engine::{Rasterizer, TextRenderer};
use crate::error::{Error, Result};
use crate::gate::{Needs, ReadinessGate};
use crate::layout::{self, Rect};
use crate::options::GenerateOptions;
use crate::raster::RasterImage;
use crate::selector::query_all;
use crate::style::resolve_in_context;
use crate::units::px_to_unit;

/// Attribute marking placeholders; its value is the index of the element
/// the placeholder stands in for.
pub const PLACEHOLDER_ATTR: &str = "data-splice-placeholder";

/// Milestones reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadingDependencies,
    DependenciesLoaded,
    Capturing,
    CaptureComplete,
    Rendering,
    Saving,
    Restoring,
    Restored,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::LoadingDependencies => "loading dependencies",
            Stage::DependenciesLoaded => "dependencies loaded",
            Stage::Capturing => "capturing regions",
            Stage::CaptureComplete => "capture complete",
            Stage::Rendering => "rendering text",
            Stage::Saving => "saving",
            Stage::Restoring => "restoring document",
            Stage::Restored => "document restored",
            Stage::Complete => "complete",
        };
        f.write_str(label)
    }
}

pub type ProgressFn = Arc<dyn Fn(Stage) + Send + Sync>;

/// What to generate and from where.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub root: NodeId,
    pub options: GenerateOptions,
}

impl GenerationRequest {
    pub fn new(root: NodeId, options: GenerateOptions) -> Self {
        Self { root, options }
    }
}

/// Summary of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    /// Where the output document was written.
    pub path: PathBuf,
    /// Regions drawn as images.
    pub captured: usize,
    /// Captures that could not be put back because their placeholder had
    /// left the document.
    pub skipped_restorations: usize,
    pub pages: usize,
}

/// One substituted element.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub original: NodeId,
    /// Parent at swap time.
    pub parent: NodeId,
    pub placeholder: NodeId,
    pub image: RasterImage,
    /// Box relative to the root, measured before any mutation.
    pub rect: Rect,
}

/// Result of putting originals back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored: usize,
    pub skipped: usize,
}

/// Exclusive access to a document while elements are swapped out.
///
/// Dropping the guard restores every swapped element in reverse order.
pub struct Substitution<'a> {
    doc: &'a mut Document,
    records: Vec<CaptureRecord>,
}

impl<'a> Substitution<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Self {
            doc,
            records: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &*self.doc
    }

    #[cfg(test)]
    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    pub fn records(&self) -> &[CaptureRecord] {
        &self.records
    }

    /// Replace `original` with a placeholder of the same outer size.
    pub fn swap(&mut self, original: NodeId, rect: Rect, image: RasterImage) -> Result<()> {
        let parent = self
            .doc
            .parent(original)
            .ok_or(DomError::Missing(original))?;
        let margin = resolve_in_context(&*self.doc, original).margin;
        let placeholder = self.doc.create_element(Tag::Div);
        let style = format!(
            "display: block; width: {}px; height: {}px; margin: {}px {}px {}px {}px; flex-grow: 0; flex-shrink: 0",
            rect.width, rect.height, margin.top, margin.right, margin.bottom, margin.left
        );
        let attached = self
            .doc
            .set_attr(placeholder, PLACEHOLDER_ATTR, original.index().to_string())
            .and_then(|_| self.doc.set_attr(placeholder, "style", style))
            .and_then(|_| self.doc.replace_child(parent, placeholder, original));
        if let Err(e) = attached {
            let _ = self.doc.discard(placeholder);
            return Err(e.into());
        }
        log::debug!("Swapped {original} for placeholder {placeholder}");
        self.records.push(CaptureRecord {
            original,
            parent,
            placeholder,
            image,
            rect,
        });
        Ok(())
    }

    /// Put every original back and report how that went.
    pub fn restore(mut self) -> RestoreOutcome {
        self.restore_all()
    }

    fn restore_all(&mut self) -> RestoreOutcome {
        let mut outcome = RestoreOutcome::default();
        while let Some(record) = self.records.pop() {
            let current_parent = self
                .doc
                .parent(record.placeholder)
                .filter(|_| self.doc.is_connected(record.placeholder));
            let put_back = match current_parent {
                Some(parent) => self
                    .doc
                    .replace_child(parent, record.original, record.placeholder)
                    .map_err(|e| e.to_string()),
                None => Err("placeholder is no longer in the document".to_string()),
            };
            match put_back {
                Ok(()) => outcome.restored += 1,
                Err(reason) => {
                    log::warn!(
                        "Restoration skipped for {} (placeholder {}): {reason}",
                        record.original,
                        record.placeholder
                    );
                    outcome.skipped += 1;
                }
            }
            let _ = self.doc.discard(record.placeholder);
        }
        outcome
    }
}

impl Drop for Substitution<'_> {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            let outcome = self.restore_all();
            log::debug!(
                "Substitution dropped early: restored {}, skipped {}",
                outcome.restored,
                outcome.skipped
            );
        }
    }
}

/// Runs generation calls against shared engines.
#[derive(Clone)]
pub struct Orchestrator {
    gate: Arc<ReadinessGate>,
    renderer: Arc<dyn TextRenderer>,
    rasterizer: Arc<dyn Rasterizer>,
    on_progress: Option<ProgressFn>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("gate", &self.gate)
            .field("on_progress", &self.on_progress.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        gate: Arc<ReadinessGate>,
        renderer: Arc<dyn TextRenderer>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self {
            gate,
            renderer,
            rasterizer,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    fn progress(&self, stage: Stage) {
        match stage {
            Stage::DependenciesLoaded | Stage::CaptureComplete | Stage::Restored | Stage::Complete => {
                log::info!("{stage}")
            }
            _ => log::debug!("{stage}"),
        }
        if let Some(cb) = &self.on_progress {
            cb(stage);
        }
    }

    /// Produce the output document for `request.root`.
    ///
    /// The document is borrowed exclusively for the whole call and is
    /// structurally unchanged when the call returns, whatever the outcome.
    pub async fn generate(
        &self,
        doc: &mut Document,
        request: &GenerationRequest,
    ) -> Result<GenerationReport> {
        let root = request.root;
        let options = &request.options;
        if !doc.is_element(root) {
            return Err(Error::InvalidRoot(root));
        }

        self.progress(Stage::LoadingDependencies);
        self.gate
            .ensure_ready(Needs {
                rasterizer: options.needs_rasterizer(),
            })
            .await?;
        self.progress(Stage::DependenciesLoaded);

        if options.fit_content {
            return self.generate_fit_content(doc, request).await;
        }

        let targets = capture_targets(doc, root, &options.render_selectors)?;
        let viewport = options.layout.viewport_width();

        self.progress(Stage::Capturing);
        let mut captures = Vec::with_capacity(targets.len());
        if !targets.is_empty() {
            let tree = layout::measure(doc, root, viewport)?;
            for element in targets {
                let Some(rect) = tree.rect(element).filter(|r| r.width > 0.0 && r.height > 0.0)
                else {
                    log::debug!("Skipping {element}: it has no box");
                    continue;
                };
                let image = match doc.surface(element) {
                    Some(surface) => surface.clone(),
                    None => self
                        .rasterizer
                        .rasterize(doc, element, &options.raster)
                        .await
                        .map_err(|source| Error::Rasterization { element, source })?,
                };
                captures.push((element, rect, image));
            }
        }
        self.progress(Stage::CaptureComplete);

        let mut sub = Substitution::new(doc);
        for (element, rect, image) in captures {
            sub.swap(element, rect, image)?;
        }

        self.progress(Stage::Rendering);
        let mut output = self
            .renderer
            .render(sub.document(), root, &options.layout)
            .await
            .map_err(Error::Render)?;

        if !sub.records().is_empty() {
            let tree = layout::measure(sub.document(), root, viewport)?;
            for record in sub.records() {
                let rect = tree.rect(record.placeholder).unwrap_or(record.rect);
                let at = options.layout.project(rect);
                output.add_image(&record.image, at).map_err(Error::Output)?;
            }
        }
        let captured = sub.records().len();

        self.progress(Stage::Saving);
        let path = output
            .save(&options.filename)
            .map_err(|source| Error::Save {
                filename: options.filename.clone(),
                source,
            })?;
        let pages = output.page_count();

        self.progress(Stage::Restoring);
        let outcome = sub.restore();
        self.progress(Stage::Restored);

        self.progress(Stage::Complete);
        Ok(GenerationReport {
            path,
            captured,
            skipped_restorations: outcome.skipped,
            pages,
        })
    }

    /// Rasterize the whole root onto one page sized to it.
    async fn generate_fit_content(
        &self,
        doc: &Document,
        request: &GenerationRequest,
    ) -> Result<GenerationReport> {
        let root = request.root;
        let options = &request.options;
        let layout = &options.layout;

        self.progress(Stage::Capturing);
        let tree = layout::measure(doc, root, layout.viewport_width())?;
        let size = tree.root().rect;
        let image = self
            .rasterizer
            .rasterize(doc, root, &options.raster)
            .await
            .map_err(|source| Error::Rasterization {
                element: root,
                source,
            })?;
        self.progress(Stage::CaptureComplete);

        let at = layout.project(Rect {
            x: 0.0,
            y: 0.0,
            width: size.width,
            height: size.height,
        });
        let width = at.x + at.width + px_to_unit(layout.margin.right, layout.unit);
        let height = at.y + at.height + px_to_unit(layout.margin.bottom, layout.unit);

        self.progress(Stage::Rendering);
        let mut output = self
            .renderer
            .blank(width, height, layout)
            .map_err(Error::Render)?;
        output.add_image(&image, at).map_err(Error::Output)?;

        self.progress(Stage::Saving);
        let path = output
            .save(&options.filename)
            .map_err(|source| Error::Save {
                filename: options.filename.clone(),
                source,
            })?;

        self.progress(Stage::Complete);
        Ok(GenerationReport {
            path,
            captured: 1,
            skipped_restorations: 0,
            pages: output.page_count(),
        })
    }
}

/// Elements to capture: selector matches minus those nested inside another
/// match, whose pixels the outer capture already contains.
fn capture_targets(doc: &Document, root: NodeId, selectors: &[String]) -> Result<Vec<NodeId>> {
    let matches = query_all(doc, root, selectors)?;
    let set: HashSet<NodeId> = matches.iter().copied().collect();
    let nested = |node: NodeId| {
        let mut current = doc.parent(node);
        while let Some(n) = current {
            if n == root {
                return false;
            }
            if set.contains(&n) {
                return true;
            }
            current = doc.parent(n);
        }
        false
    };
    let targets: Vec<NodeId> = matches.iter().copied().filter(|&n| !nested(n)).collect();
    if targets.len() < matches.len() {
        log::debug!(
            "{} match(es) sit inside another captured region",
            matches.len() - targets.len()
        );
    }
    Ok(targets)
}
