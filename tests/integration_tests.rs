//! Integration tests for the built-in engines.
//!
//! These tests validate:
//! - Exports through FlowRenderer, SoftRasterizer and PdfOutput write valid PDFs
//! - The live document hashes identically before and after an export
//! - Manifest resources are read from disk once and failures surface
//! - Layout config pagination and rendering work without the orchestrator

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use pdf_splice::assets::{AssetLoader, AssetStore};
use pdf_splice::flow::FlowRenderer;
use pdf_splice::layout::measure;
use pdf_splice::layout_config::LayoutConfig;
use pdf_splice::pagination::paginate;
use pdf_splice::raster::SoftRasterizer;
use pdf_splice::render::render_pdf;
use pdf_splice::selector::query_all;
use pdf_splice::{
    templates, Document, EngineManifest, Error, GenerateOptions, GenerationRequest, LayoutOptions,
    LoadError, NodeId, Orchestrator, ReadinessGate, Resource,
};

// =====================================================================
// Helpers
// =====================================================================

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pdf-splice-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn builtin(out_dir: &Path, manifest: EngineManifest) -> (Orchestrator, Arc<AssetStore>) {
    let store = Arc::new(AssetStore::new());
    let loader = Arc::new(AssetLoader::new(out_dir, store.clone()));
    let gate = Arc::new(ReadinessGate::new(loader, manifest));
    let orchestrator = Orchestrator::new(
        gate,
        Arc::new(FlowRenderer::new(out_dir)),
        Arc::new(SoftRasterizer::default().with_assets(store.clone())),
    );
    (orchestrator, store)
}

fn select(doc: &Document, selector: &str) -> NodeId {
    query_all(doc, doc.root(), &[selector]).unwrap()[0]
}

fn digest(doc: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.outer_html(doc.root()).as_bytes());
    hasher.update(format!("{:?}", doc.snapshot(doc.root())).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn options(filename: &str, selectors: &[&str]) -> GenerateOptions {
    GenerateOptions {
        filename: filename.into(),
        render_selectors: selectors.iter().map(|s| s.to_string()).collect(),
        ..GenerateOptions::default()
    }
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// End-to-end exports
// =====================================================================

#[tokio::test]
async fn dashboard_exports_charts_as_images() {
    let dir = scratch_dir("dashboard");
    let (orchestrator, _) = builtin(&dir, EngineManifest::default());
    let mut doc = Document::parse(&templates::dashboard_page().unwrap());
    let before = digest(&doc);
    let request = GenerationRequest::new(select(&doc, "#report"), options("dashboard.pdf", &["canvas"]));

    let report = orchestrator.generate(&mut doc, &request).await.unwrap();

    assert_eq!(report.captured, 2);
    assert_eq!(report.skipped_restorations, 0);
    assert_eq!(report.path, dir.join("dashboard.pdf"));
    assert!(report.pages >= 1);
    assert_valid_pdf(&std::fs::read(&report.path).unwrap());
    assert_eq!(digest(&doc), before);
}

#[tokio::test]
async fn chart_cards_go_through_the_soft_rasterizer() {
    let dir = scratch_dir("cards");
    let (orchestrator, _) = builtin(&dir, EngineManifest::default());
    let mut doc = Document::parse(&templates::dashboard_page().unwrap());
    let before = digest(&doc);
    // The canvases sit inside the cards and are captured with them.
    let request = GenerationRequest::new(
        select(&doc, "#report"),
        options("cards.pdf", &[".chart-card", "canvas"]),
    );

    let report = orchestrator.generate(&mut doc, &request).await.unwrap();

    assert_eq!(report.captured, 2);
    assert_valid_pdf(&std::fs::read(&report.path).unwrap());
    assert_eq!(digest(&doc), before);
}

#[tokio::test]
async fn fit_content_writes_a_single_page() {
    let dir = scratch_dir("fit");
    let (orchestrator, _) = builtin(&dir, EngineManifest::default());
    let mut doc = Document::parse(&templates::dashboard_page().unwrap());
    let before = digest(&doc);
    let mut opts = options("fit.pdf", &[]);
    opts.fit_content = true;
    let request = GenerationRequest::new(select(&doc, "#report"), opts);

    let report = orchestrator.generate(&mut doc, &request).await.unwrap();

    assert_eq!((report.captured, report.pages), (1, 1));
    assert_valid_pdf(&std::fs::read(&report.path).unwrap());
    assert_eq!(digest(&doc), before);
}

#[tokio::test]
async fn text_only_report_needs_no_rasterizer() {
    let dir = scratch_dir("report");
    let (orchestrator, _) = builtin(&dir, EngineManifest::default());
    let mut doc = Document::parse(templates::report_template());
    let request = GenerationRequest::new(select(&doc, "#report"), options("report.pdf", &[]));

    let report = orchestrator.generate(&mut doc, &request).await.unwrap();

    assert_eq!(report.captured, 0);
    assert_eq!(report.pages, 1);
    assert_valid_pdf(&std::fs::read(&report.path).unwrap());
}

#[tokio::test]
async fn long_documents_continue_onto_more_pages() {
    let dir = scratch_dir("long");
    let (orchestrator, _) = builtin(&dir, EngineManifest::default());
    let mut html = String::from(r#"<div id="root">"#);
    for i in 0..80 {
        html.push_str(&format!("<p>Paragraph {i} with enough words to take a full line.</p>"));
    }
    html.push_str("</div>");
    let mut doc = Document::parse(&html);
    let request = GenerationRequest::new(select(&doc, "#root"), options("long.pdf", &[]));

    let report = orchestrator.generate(&mut doc, &request).await.unwrap();

    assert!(report.pages > 1, "expected several pages, got {}", report.pages);
}

// =====================================================================
// Manifest resources
// =====================================================================

#[tokio::test]
async fn manifest_resources_are_read_from_disk() {
    let dir = scratch_dir("manifest");
    std::fs::write(dir.join("text.js"), b"// text engine").unwrap();
    std::fs::write(dir.join("raster.js"), b"// raster engine").unwrap();
    let manifest = EngineManifest {
        text_renderer: vec![Resource::new("text", "text.js")],
        rasterizer: vec![Resource::new("raster", "raster.js")],
    };
    let (orchestrator, store) = builtin(&dir, manifest);
    let mut doc = Document::parse(templates::minimal_template());
    let request = GenerationRequest::new(select(&doc, "#root"), options("min.pdf", &[]));

    orchestrator.generate(&mut doc, &request).await.unwrap();

    assert!(store.contains("text.js"));
    // No render selectors, so the rasterizer's resources stay unloaded.
    assert!(!store.contains("raster.js"));
}

#[tokio::test]
async fn missing_resource_fails_without_writing() {
    let dir = scratch_dir("missing");
    let manifest = EngineManifest {
        text_renderer: vec![Resource::new("font", "fonts/absent.ttf")],
        rasterizer: Vec::new(),
    };
    let (orchestrator, _) = builtin(&dir, manifest);
    let mut doc = Document::parse(templates::minimal_template());
    let before = digest(&doc);
    let request = GenerationRequest::new(select(&doc, "#root"), options("never.pdf", &[]));

    let err = orchestrator.generate(&mut doc, &request).await.unwrap_err();

    match err {
        Error::ResourceLoad { resource, source } => {
            assert_eq!(resource, "font");
            assert!(matches!(source, LoadError::Network { ref url, .. } if url == "fonts/absent.ttf"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dir.join("never.pdf").exists());
    assert_eq!(digest(&doc), before);
}

#[tokio::test]
async fn invalid_font_bytes_are_a_parse_error() {
    let dir = scratch_dir("badfont");
    std::fs::write(dir.join("broken.ttf"), b"not a font").unwrap();
    let manifest = EngineManifest {
        text_renderer: vec![Resource::new("font", "broken.ttf")],
        rasterizer: Vec::new(),
    };
    let (orchestrator, store) = builtin(&dir, manifest);
    let mut doc = Document::parse(templates::minimal_template());
    let request = GenerationRequest::new(select(&doc, "#root"), options("x.pdf", &[]));

    let err = orchestrator.generate(&mut doc, &request).await.unwrap_err();

    assert!(matches!(
        err,
        Error::ResourceLoad {
            source: LoadError::Parse { .. },
            ..
        }
    ));
    assert!(store.fonts().is_empty());
}

// =====================================================================
// Layout config pipeline
// =====================================================================

#[test]
fn report_template_paginates_and_renders() {
    let doc = Document::parse(templates::report_template());
    let root = select(&doc, "#report");
    let layout = LayoutOptions::default();
    let tree = measure(&doc, root, layout.viewport_width()).unwrap();
    let config = paginate(&doc, &tree, &layout);

    assert_eq!(config.pages.len(), 1);
    let texts: Vec<&str> = config.pages[0]
        .boxes
        .iter()
        .filter_map(|b| b.text.as_ref().map(|t| t.text.as_str()))
        .collect();
    assert!(texts.iter().any(|t| t.contains("Quarterly Report")));
    assert!(texts.iter().any(|t| t.contains("$2.8M")));
    for b in &config.pages[0].boxes {
        assert!(b.x >= 0.0 && b.y >= 0.0, "box outside the page: {b:?}");
    }
    assert_valid_pdf(&render_pdf(&config).unwrap());
}

#[test]
fn layout_config_json_roundtrip() {
    let doc = Document::parse(templates::report_template());
    let root = select(&doc, "#report");
    let layout = LayoutOptions::default();
    let tree = measure(&doc, root, layout.viewport_width()).unwrap();
    let config = paginate(&doc, &tree, &layout);

    let parsed = LayoutConfig::from_json(&config.to_json()).unwrap();
    assert_eq!(parsed, config);
    assert_valid_pdf(&render_pdf(&parsed).unwrap());
}

#[test]
fn options_load_from_json() {
    let opts = GenerateOptions::from_json(
        r#"{
            "filename": "q4.pdf",
            "render_selectors": ["canvas", ".chart"],
            "layout": { "margin": [10, 20], "unit": "mm" },
            "raster": { "scale": 2.0 }
        }"#,
    )
    .unwrap();
    assert_eq!(opts.filename, "q4.pdf");
    assert_eq!(opts.render_selectors, vec!["canvas", ".chart"]);
    assert_eq!((opts.layout.margin.top, opts.layout.margin.left), (10.0, 20.0));
    assert_eq!(opts.raster.scale, 2.0);
    assert!(opts.needs_rasterizer());
}
