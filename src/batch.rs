//! Batch coordinator
//!
//! Applies a list of stages to many items, strictly one item after another.
//! Only the item being processed has a full-resolution payload checked out,
//! which bounds peak memory. The first pipeline failure aborts the batch:
//! items before it keep their committed work, items after it are left
//! untouched.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::TransformationError;
use crate::payload::ResidencyGauge;
use crate::pipeline::{Stage, TransformationPipeline};
use crate::state::{ItemId, ItemRegistry, TextResults};

/// A requested operation over a set of items
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Items to process, in order
    pub target_ids: Vec<ItemId>,
    /// Stages applied to each item, in order
    pub stages: Vec<Stage>,
}

impl BatchJob {
    pub fn new(target_ids: Vec<ItemId>, stages: Vec<Stage>) -> Self {
        Self { target_ids, stages }
    }

    /// One capability over many items
    pub fn single(target_ids: Vec<ItemId>, stage: Stage) -> Self {
        Self::new(target_ids, vec![stage])
    }
}

/// Cursor published before each item is processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// Zero-based position in the job's target list
    pub index: usize,
    pub total: usize,
    /// Name of the item being processed
    pub label: String,
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processing {}/{}: {}", self.index + 1, self.total, self.label)
    }
}

/// Per-item result of a completed pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub id: ItemId,
    pub name: String,
    pub entries_appended: usize,
    pub texts_recorded: usize,
}

/// The item that stopped the batch
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub id: ItemId,
    pub name: String,
    /// Entries committed by this item's stages before the failing one
    pub entries_appended: usize,
    pub error: TransformationError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Nothing was processed
    Empty,
    Completed,
    /// Some items finished before a failure aborted the rest
    PartiallyCompleted,
    /// The first attempted item failed
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub completed: Vec<ItemReport>,
    pub failure: Option<BatchFailure>,
    /// Targets no longer in the registry, skipped
    pub missing: Vec<ItemId>,
    /// Targets after the failing item
    pub not_attempted: Vec<ItemId>,
}

impl BatchOutcome {
    pub fn status(&self) -> BatchStatus {
        match (&self.failure, self.completed.is_empty()) {
            (None, true) => BatchStatus::Empty,
            (None, false) => BatchStatus::Completed,
            (Some(_), true) => BatchStatus::Failed,
            (Some(_), false) => BatchStatus::PartiallyCompleted,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct BatchCoordinator<'a> {
    registry: &'a mut ItemRegistry,
    results: &'a mut TextResults,
    progress: &'a watch::Sender<Option<BatchProgress>>,
    gauge: &'a Arc<ResidencyGauge>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        registry: &'a mut ItemRegistry,
        results: &'a mut TextResults,
        progress: &'a watch::Sender<Option<BatchProgress>>,
        gauge: &'a Arc<ResidencyGauge>,
    ) -> Self {
        Self {
            registry,
            results,
            progress,
            gauge,
        }
    }

    pub async fn run(&mut self, job: &BatchJob) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let total = job.target_ids.len();

        if total == 0 || job.stages.is_empty() {
            outcome.not_attempted = job.target_ids.clone();
            return outcome;
        }

        info!("🚀 Batch started: {} items × {} stages", total, job.stages.len());
        let pipeline = TransformationPipeline::new(&job.stages).with_residency(self.gauge);

        for (index, &id) in job.target_ids.iter().enumerate() {
            let Some(item) = self.registry.get_mut(id) else {
                warn!("⚠️  Item {} is gone, skipping", id);
                outcome.missing.push(id);
                continue;
            };
            let name = item.name().to_string();

            self.progress.send_replace(Some(BatchProgress {
                index,
                total,
                label: name.clone(),
            }));

            match pipeline.run(item, &mut *self.results).await {
                Ok(run) => outcome.completed.push(ItemReport {
                    id,
                    name,
                    entries_appended: run.entries_appended,
                    texts_recorded: run.texts_recorded,
                }),
                Err(failure) => {
                    warn!(
                        "🛑 Batch aborted at {} ({}/{}): {}",
                        name,
                        index + 1,
                        total,
                        failure.error
                    );
                    outcome.failure = Some(BatchFailure {
                        id,
                        name,
                        entries_appended: failure.committed.entries_appended,
                        error: failure.error,
                    });
                    outcome.not_attempted = job.target_ids[index + 1..].to_vec();
                    break;
                }
            }
        }

        self.progress.send_replace(None);
        info!(
            "✅ Batch finished: {} completed, {} missing, {} not attempted",
            outcome.completed.len(),
            outcome.missing.len(),
            outcome.not_attempted.len()
        );
        outcome
    }
}
