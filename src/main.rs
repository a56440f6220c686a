//! splice – command-line HTML → PDF exporter with image-rendered regions.
//!
//! Usage:
//!   splice <input.html> [out-dir] [--root SEL] [--render SEL]... [--options FILE]
//!          [--manifest FILE] [--fit-content] [--title T]
//!   splice --demo [out-dir]
//!
//! The PDF is written to `<out-dir>/<filename>` (default: the current
//! directory and `download.pdf`). Manifest resources are read relative to
//! the manifest file; loaded `.ttf`/`.otf` assets are used to measure text.

use std::error::Error as _;
use std::{env, fs, path::Path, path::PathBuf, process, sync::Arc};

use pdf_splice::assets::{AssetLoader, AssetStore};
use pdf_splice::flow::FlowRenderer;
use pdf_splice::raster::SoftRasterizer;
use pdf_splice::selector::query_all;
use pdf_splice::{
    templates, BoxError, Document, EngineManifest, GenerateOptions, GenerationRequest, Needs,
    NodeId, Orchestrator, ReadinessGate, Stage,
};

#[derive(Default)]
struct Args {
    input: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    root: Option<String>,
    render: Vec<String>,
    options: Option<PathBuf>,
    manifest: Option<PathBuf>,
    fit_content: bool,
    title: Option<String>,
    demo: bool,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let args = parse_args(&argv);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn parse_args(argv: &[String]) -> Args {
    let prog = argv.first().map(String::as_str).unwrap_or("splice");
    let mut args = Args::default();
    let mut positional = 0usize;
    let mut iter = argv.iter().skip(1);

    let value = |flag: &str, next: Option<&String>| match next {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--root" => args.root = Some(value(arg, iter.next())),
            "--render" | "-r" => args.render.push(value(arg, iter.next())),
            "--options" => args.options = Some(PathBuf::from(value(arg, iter.next()))),
            "--manifest" => args.manifest = Some(PathBuf::from(value(arg, iter.next()))),
            "--title" | "-t" => args.title = Some(value(arg, iter.next())),
            "--fit-content" => args.fit_content = true,
            "--demo" => args.demo = true,
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(prog);
                process::exit(1);
            }
            path => {
                // With --demo there is no input file, so the first
                // positional is the output directory.
                match (positional, args.demo) {
                    (0, false) => args.input = Some(PathBuf::from(path)),
                    (0, true) | (1, false) => args.out_dir = Some(PathBuf::from(path)),
                    _ => {
                        eprintln!("Unexpected argument: {path}");
                        print_usage(prog);
                        process::exit(1);
                    }
                }
                positional += 1;
            }
        }
    }
    args
}

async fn run(args: Args) -> Result<(), BoxError> {
    let (html, default_title) = if args.demo {
        (templates::dashboard_page()?, "Quarterly dashboard".to_string())
    } else {
        let input = args.input.as_ref().ok_or("no input file specified")?;
        let html = fs::read_to_string(input)
            .map_err(|e| format!("reading '{}': {e}", input.display()))?;
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("pdf-splice output")
            .to_string();
        (html, stem)
    };

    let mut options = match &args.options {
        Some(path) => GenerateOptions::from_json(&fs::read_to_string(path)?)?,
        None => GenerateOptions::default(),
    };
    options.render_selectors.extend(args.render.iter().cloned());
    if args.demo && options.render_selectors.is_empty() {
        options.render_selectors.push("canvas".to_string());
    }
    options.fit_content |= args.fit_content;
    if let Some(title) = &args.title {
        options.layout.title = title.clone();
    } else if options.layout.title == GenerateOptions::default().layout.title {
        options.layout.title = default_title;
    }

    let (manifest, base_dir) = match &args.manifest {
        Some(path) => (
            EngineManifest::from_json(&fs::read_to_string(path)?)?,
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ),
        None => (EngineManifest::default(), PathBuf::from(".")),
    };
    let out_dir = args.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    let store = Arc::new(AssetStore::new());
    let loader = Arc::new(AssetLoader::new(base_dir, store.clone()));
    let gate = Arc::new(ReadinessGate::new(loader, manifest));
    let rasterizer = SoftRasterizer::new(options.layout.viewport_width()).with_assets(store.clone());
    let orchestrator = Orchestrator::new(
        gate.clone(),
        Arc::new(FlowRenderer::new(&out_dir)),
        Arc::new(rasterizer),
    )
    .with_progress(Arc::new(|stage: Stage| log::debug!("progress: {stage}")));

    let mut doc = Document::parse(&html);

    // Fonts must be in the document before anything is measured; the gate
    // makes the second wait inside `generate` free.
    gate.ensure_ready(Needs {
        rasterizer: options.needs_rasterizer(),
    })
    .await?;
    for (url, bytes) in store.fonts() {
        let family = Path::new(&url)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Helvetica")
            .to_string();
        doc.fonts_mut().load_font(&family, false, false, bytes)?;
    }

    let root_selector = args
        .root
        .clone()
        .or_else(|| args.demo.then(|| "#report".to_string()));
    let root = resolve_root(&doc, root_selector.as_deref())?;

    let request = GenerationRequest::new(root, options);
    let report = orchestrator.generate(&mut doc, &request).await?;
    println!(
        "Wrote '{}' ({} page{}, {} region{} as images{})",
        report.path.display(),
        report.pages,
        if report.pages == 1 { "" } else { "s" },
        report.captured,
        if report.captured == 1 { "" } else { "s" },
        if report.skipped_restorations > 0 {
            format!(", {} not restored", report.skipped_restorations)
        } else {
            String::new()
        }
    );
    Ok(())
}

fn resolve_root(doc: &Document, selector: Option<&str>) -> Result<NodeId, BoxError> {
    match selector {
        Some(sel) => query_all(doc, doc.root(), &[sel])?
            .first()
            .copied()
            .ok_or_else(|| format!("no element matches --root {sel:?}").into()),
        None => doc
            .body()
            .ok_or_else(|| "the document has no elements".into()),
    }
}

fn print_usage(prog: &str) {
    eprintln!("splice – HTML to PDF exporter with image-rendered regions (pdf-splice)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [out-dir] [flags]");
    eprintln!("  {prog} --demo [out-dir]");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --root SEL         Element to export (default: <body>)");
    eprintln!("  --render, -r SEL   Draw matches of SEL as images (repeatable)");
    eprintln!("  --options FILE     Generation options as JSON");
    eprintln!("  --manifest FILE    Engine resources to load, as JSON");
    eprintln!("  --fit-content      One page sized to the root, drawn as a single image");
    eprintln!("  --title, -t        Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --demo             Export a built-in dashboard with two charts");
    eprintln!("  --help             Print this message");
}
