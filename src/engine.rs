//! The engine owns all state and is passed by reference to every operation
//!
//! There is no global state: callers create an [`Engine`], feed it files,
//! run batch jobs on it, export from it, and shut it down explicitly.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::batch::{BatchCoordinator, BatchJob, BatchOutcome, BatchProgress};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::export::{ArchiveAssembler, Artifact, Bundle, ExportAssembler, SkippedExport};
use crate::payload::{Payload, ResidencyGauge, SourceFile};
use crate::pipeline::{ImageCapability, Stage, TextCapability};
use crate::state::{IngestReport, Item, ItemId, ItemRegistry, TextResults};

pub struct Engine {
    config: EngineConfig,
    registry: ItemRegistry,
    results: TextResults,
    progress: watch::Sender<Option<BatchProgress>>,
    residency: Arc<ResidencyGauge>,
}

/// A bundle packed into one archive artifact
#[derive(Debug)]
pub struct PackedBundle {
    pub archive: Artifact,
    /// Number of files inside the archive
    pub file_count: usize,
    pub skipped: Vec<SkippedExport>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            registry: ItemRegistry::new(config.thumbnail_size)
                .with_ingest_concurrency(config.ingest_concurrency),
            config,
            results: TextResults::new(),
            progress,
            residency: Arc::new(ResidencyGauge::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.registry.get(id)
    }

    pub fn text_results(&self) -> &TextResults {
        &self.results
    }

    /// Observe batch progress; `None` while no batch is running
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<BatchProgress>> {
        self.progress.subscribe()
    }

    pub fn residency(&self) -> &Arc<ResidencyGauge> {
        &self.residency
    }

    /// Free-form edit stage, labelled with the configured prompt length
    pub fn edit_stage(&self, capability: Arc<dyn ImageCapability>, prompt: &str) -> Stage {
        Stage::edit(capability, prompt, self.config.label_prompt_chars)
    }

    pub fn generate_stage(&self, capability: Arc<dyn ImageCapability>, prompt: &str) -> Stage {
        Stage::generate(capability, prompt, self.config.label_prompt_chars)
    }

    pub fn analyze_stage(&self, capability: Arc<dyn TextCapability>, prompt: &str) -> Stage {
        Stage::analyze(capability, prompt, self.config.label_prompt_chars)
    }

    pub async fn ingest(&mut self, file: SourceFile) -> Result<ItemId> {
        self.registry.ingest(file).await
    }

    pub async fn ingest_many(&mut self, files: Vec<SourceFile>) -> IngestReport {
        self.registry.ingest_many(files).await
    }

    /// Remove an item, releasing its thumbnail and dropping its text results
    pub fn remove(&mut self, id: ItemId) -> bool {
        self.results.forget(id);
        self.registry.remove(id).is_some()
    }

    /// Record a revision produced outside a pipeline
    pub fn append(&mut self, id: ItemId, payload: Payload, label: impl Into<String>) -> Result<()> {
        let item = self.registry.get_mut(id).ok_or(EngineError::NotFound(id))?;
        item.append(payload, label);
        Ok(())
    }

    pub async fn run_batch(&mut self, job: &BatchJob) -> BatchOutcome {
        BatchCoordinator::new(
            &mut self.registry,
            &mut self.results,
            &self.progress,
            &self.residency,
        )
        .run(job)
        .await
    }

    pub async fn export_one(&self, id: ItemId) -> Result<Artifact> {
        ExportAssembler::new(&self.registry).export_one(id).await
    }

    pub async fn export_many(&self, ids: &[ItemId]) -> Bundle {
        let assembler = ExportAssembler::new(&self.registry);
        if self.config.export.include_text_results {
            assembler.with_text_results(&self.results).export_many(ids).await
        } else {
            assembler.export_many(ids).await
        }
    }

    /// Export several items and pack them into one archive
    pub async fn export_archive(
        &self,
        ids: &[ItemId],
        archiver: &dyn ArchiveAssembler,
    ) -> Result<PackedBundle> {
        let bundle = self.export_many(ids).await;
        let bytes = archiver.assemble(&bundle.artifacts)?;
        info!(
            "📦 Packed {} files ({} skipped) into {}",
            bundle.artifacts.len(),
            bundle.skipped.len(),
            self.config.export.bundle_name
        );
        Ok(PackedBundle {
            archive: Artifact {
                name: self.config.export.bundle_name.clone(),
                mime_type: archiver.mime_type().to_string(),
                bytes,
            },
            file_count: bundle.artifacts.len(),
            skipped: bundle.skipped,
        })
    }

    /// Teardown: release every thumbnail and drop all items
    pub fn shutdown(&mut self) -> usize {
        self.results.clear();
        self.registry.release_all()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
