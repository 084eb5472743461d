use anyhow::{bail, Context};
use clap::Parser;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use scan_studio::export::{
    Artifact, Delivery, DirectoryDestination, DownloadsFolder, ExportDestination, Exporter,
    ZipArchiver,
};
use scan_studio::pipeline::local::{ContrastBoost, Grayscale, ImageSummary};
use scan_studio::pipeline::auto_process;
use scan_studio::{BatchJob, BatchStatus, Engine, EngineConfig, SourceFile};

/// Clean up a folder of document photos and export the results
#[derive(Parser, Debug)]
#[command(name = "scan-studio", version, about)]
struct Args {
    /// Folder to scan for images (recursively)
    folder: PathBuf,

    /// Write exports here instead of the configured folder
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pack everything into one zip archive
    #[arg(long)]
    bundle: bool,

    /// Only run the image stages
    #[arg(long)]
    skip_ocr: bool,
}

/// Collect every file with an extension the image crate recognizes
fn scan_folder(folder: &Path) -> Vec<SourceFile> {
    info!("🔍 Scanning folder: {}", folder.display());

    WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(ImageFormat::from_extension)
                .is_some()
        })
        .map(|entry| SourceFile::from_path(entry.path()))
        .collect()
}

async fn build_exporter(args: &Args, config: &EngineConfig) -> anyhow::Result<Exporter> {
    let primary: Option<Box<dyn ExportDestination>> = match (&args.output, &config.export.directory) {
        (Some(dir), _) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create output folder {}", dir.display()))?;
            Some(Box::new(DirectoryDestination::new(dir)))
        }
        (None, Some(dir)) => Some(Box::new(DirectoryDestination::new(dir))),
        (None, None) => None,
    };
    Ok(Exporter::new(primary, Box::new(DownloadsFolder::new())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if !args.folder.is_dir() {
        bail!("{} is not a folder", args.folder.display());
    }

    let config = EngineConfig::load_or_default().context("Failed to load configuration")?;
    let exporter = build_exporter(&args, &config).await?;
    let mut engine = Engine::new(config);

    let files = scan_folder(&args.folder);
    if files.is_empty() {
        warn!("⚠️  No images found in {}", args.folder.display());
        return Ok(());
    }

    let report = engine.ingest_many(files).await;
    for failure in &report.failures {
        warn!("⚠️  Skipped {}: {}", failure.name, failure.error);
    }
    info!(
        "✅ Import complete: {} new, {} skipped",
        report.ingested.len(),
        report.failures.len()
    );

    let mut stages = auto_process(
        &engine.config().instructions,
        Arc::new(Grayscale),
        Arc::new(ContrastBoost::default()),
        Arc::new(ImageSummary),
    );
    if args.skip_ocr {
        stages.retain(|stage| !stage.produces_text());
    }

    let mut progress = engine.subscribe_progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if let Some(current) = progress.borrow_and_update().clone() {
                println!("⏳ {}", current);
            }
        }
    });

    let outcome = engine
        .run_batch(&BatchJob::new(report.ingested.clone(), stages))
        .await;

    if let Some(failure) = &outcome.failure {
        eprintln!("❌ {} failed: {}", failure.name, failure.error);
        if let Some(hint) = failure.error.guidance() {
            eprintln!("   {}", hint);
        }
        if !outcome.not_attempted.is_empty() {
            eprintln!("   {} items were not processed", outcome.not_attempted.len());
        }
    }
    if outcome.status() == BatchStatus::Failed {
        engine.shutdown();
        bail!("Batch failed before any item completed");
    }

    // Export whatever finished, including the item that failed part way
    let ids = engine.registry().ids();
    let mut saved = 0;
    if args.bundle {
        let packed = engine
            .export_archive(&ids, &ZipArchiver)
            .await
            .context("Failed to build the archive")?;
        for skip in &packed.skipped {
            warn!("⚠️  Left out of bundle: {}", skip.error);
        }
        if deliver(&exporter, &packed.archive).await? {
            saved += 1;
        }
    } else {
        let bundle = engine.export_many(&ids).await;
        for skip in &bundle.skipped {
            warn!("⚠️  Not exported: {}", skip.error);
        }
        for artifact in &bundle.artifacts {
            if deliver(&exporter, artifact).await? {
                saved += 1;
            }
        }
    }

    let released = engine.shutdown();
    println!(
        "✅ Done: {} processed, {} files saved, {} thumbnails released",
        outcome.completed.len(),
        saved,
        released
    );
    Ok(())
}

async fn deliver(exporter: &Exporter, artifact: &Artifact) -> anyhow::Result<bool> {
    let delivery = exporter
        .deliver(artifact)
        .await
        .with_context(|| format!("Failed to save {}", artifact.name))?;
    Ok(!matches!(delivery, Delivery::Cancelled))
}
