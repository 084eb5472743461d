//! Runs an ordered chain of stages over one item
//!
//! Every image stage commits its output to history before the next stage
//! reads the item's current payload, so a stage never sees an uncommitted
//! intermediate. The first failing stage stops the chain; what earlier
//! stages committed stays in history.

use tracing::{info, warn};

use super::stage::{Stage, StageKind};
use crate::error::{CapabilityError, TransformationError};
use crate::payload::{Payload, PayloadCodec, ResidencyGauge};
use crate::state::{Item, TextResults};

/// What one pipeline run left behind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineRun {
    pub entries_appended: usize,
    pub texts_recorded: usize,
}

/// A stopped pipeline: the error plus the work committed before it
#[derive(Debug, Clone)]
pub struct PipelineFailure {
    pub error: TransformationError,
    pub committed: PipelineRun,
}

pub struct TransformationPipeline<'a> {
    stages: &'a [Stage],
    residency: Option<&'a ResidencyGauge>,
}

impl<'a> TransformationPipeline<'a> {
    pub fn new(stages: &'a [Stage]) -> Self {
        Self {
            stages,
            residency: None,
        }
    }

    /// Take a lease on `gauge` for every payload a stage checks out
    pub fn with_residency(mut self, gauge: &'a ResidencyGauge) -> Self {
        self.residency = Some(gauge);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        self.stages
    }

    pub async fn run(
        &self,
        item: &mut Item,
        results: &mut TextResults,
    ) -> Result<PipelineRun, PipelineFailure> {
        let mut run = PipelineRun::default();

        for stage in self.stages {
            let _lease = self.residency.map(ResidencyGauge::lease);
            if let Err(error) = run_stage(stage, item, results, &mut run).await {
                warn!("❌ {} failed on {}: {}", stage.label(), item.name(), error.source);
                return Err(PipelineFailure {
                    error,
                    committed: run,
                });
            }
        }

        Ok(run)
    }
}

async fn run_stage(
    stage: &Stage,
    item: &mut Item,
    results: &mut TextResults,
    run: &mut PipelineRun,
) -> Result<(), TransformationError> {
    let fail = |source: CapabilityError| TransformationError::new(stage.label(), source);

    let input = item
        .current_payload()
        .await
        .map_err(|e| fail(CapabilityError::Unavailable(format!("cannot read input: {}", e))))?;

    match stage.kind() {
        StageKind::Image(capability) => {
            info!("🔧 {} → {} ({})", item.name(), stage.label(), capability.name());
            let output = capability
                .transform(&input, stage.instruction())
                .await
                .map_err(fail)?;
            drop(input);
            check_image_output(&output).map_err(fail)?;

            let entry = item.append(output, stage.label());
            info!("   {} bytes recorded as '{}'", entry.byte_size(), entry.label());
            run.entries_appended += 1;
        }
        StageKind::Text(capability) => {
            info!("📝 {} → {} ({})", item.name(), stage.label(), capability.name());
            let text = capability
                .extract(&input, stage.instruction())
                .await
                .map_err(fail)?;
            if text.trim().is_empty() {
                return Err(fail(CapabilityError::EmptyResponse));
            }
            results.record(item.id(), stage.label(), text);
            run.texts_recorded += 1;
        }
    }

    Ok(())
}

/// An image stage must return a decodable, non-empty payload that declares
/// an image type. Checked before the append prunes the previous revision.
fn check_image_output(output: &Payload) -> Result<(), CapabilityError> {
    if !output.mime_type().starts_with("image/") {
        return Err(CapabilityError::InvalidOutput(format!(
            "expected an image, got {}",
            output.mime_type()
        )));
    }
    let decoded =
        PayloadCodec::decode(output).map_err(|e| CapabilityError::InvalidOutput(e.to_string()))?;
    if decoded.bytes.is_empty() {
        return Err(CapabilityError::EmptyResponse);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capability::fakes::{Echo, Fixed, Tagging};
    use crate::payload::SourceFile;
    use crate::pipeline::ImageCapability;
    use crate::state::{ItemRegistry, PayloadState};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    async fn registry_with(bytes: &[u8]) -> (ItemRegistry, crate::state::ItemId) {
        let mut registry = ItemRegistry::new(32);
        let id = registry
            .ingest(SourceFile::from_bytes("doc.png", "image/png", bytes.to_vec()))
            .await
            .unwrap();
        (registry, id)
    }

    fn decoded_latest(item: &Item) -> Vec<u8> {
        PayloadCodec::decode(item.history().latest_payload().unwrap())
            .unwrap()
            .bytes
    }

    #[tokio::test]
    async fn test_each_stage_reads_committed_output() {
        let (mut registry, id) = registry_with(b"src").await;
        let first = Arc::new(Tagging::new("-a"));
        let second = Arc::new(Tagging::new("-b"));
        let stages = vec![
            Stage::image("Preprocessed", first.clone(), "fix"),
            Stage::image("Enhanced for OCR", second.clone(), "enhance"),
        ];

        let mut results = TextResults::new();
        let item = registry.get_mut(id).unwrap();
        let run = TransformationPipeline::new(&stages)
            .run(item, &mut results)
            .await
            .unwrap();

        assert_eq!(run.entries_appended, 2);
        assert_eq!(first.inputs.lock().unwrap()[0], b"src");
        assert_eq!(second.inputs.lock().unwrap()[0], b"src-a");
        assert_eq!(decoded_latest(item), b"src-a-b");
        assert_eq!(item.history().resident_count(), 1);
    }

    #[tokio::test]
    async fn test_text_stage_goes_to_sink_not_history() {
        let (mut registry, id) = registry_with(b"src").await;
        let stages = vec![
            Stage::image("Preprocessed", Arc::new(Tagging::new("-a")), "fix"),
            Stage::text("Extracted text", Arc::new(Echo("TOTAL 4.20")), "read"),
        ];

        let mut results = TextResults::new();
        let item = registry.get_mut(id).unwrap();
        let run = TransformationPipeline::new(&stages)
            .run(item, &mut results)
            .await
            .unwrap();

        assert_eq!(run, PipelineRun { entries_appended: 1, texts_recorded: 1 });
        assert_eq!(item.history().len(), 1);
        assert_eq!(results.latest(id).unwrap().text, "TOTAL 4.20");
        assert_eq!(results.latest(id).unwrap().label, "Extracted text");
    }

    #[tokio::test]
    async fn test_failure_stops_chain_and_keeps_prior_entries() {
        let (mut registry, id) = registry_with(b"src").await;
        let third = Arc::new(Tagging::new("-c"));
        let stages = vec![
            Stage::image("Preprocessed", Arc::new(Tagging::new("-a")), "fix"),
            Stage::image(
                "Enhanced for OCR",
                Arc::new(Tagging::failing_on("-b", 1, CapabilityError::Refused("SAFETY".into()))),
                "enhance",
            ),
            Stage::image("Third", third.clone(), "more"),
        ];

        let mut results = TextResults::new();
        let item = registry.get_mut(id).unwrap();
        let failure = TransformationPipeline::new(&stages)
            .run(item, &mut results)
            .await
            .unwrap_err();

        assert_eq!(failure.error.stage, "Enhanced for OCR");
        assert_eq!(failure.error.source, CapabilityError::Refused("SAFETY".into()));
        assert_eq!(failure.committed.entries_appended, 1);
        assert_eq!(item.history().len(), 1);
        assert_eq!(decoded_latest(item), b"src-a");
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_unusable_outputs_fail_the_stage() {
        let (mut registry, id) = registry_with(b"src").await;
        let mut results = TextResults::new();

        let not_image = vec![Stage::image(
            "Edit: x",
            Arc::new(Fixed(PayloadCodec::encode("text/plain", b"nope"))),
            "x",
        )];
        let item = registry.get_mut(id).unwrap();
        let failure = TransformationPipeline::new(&not_image)
            .run(item, &mut results)
            .await
            .unwrap_err();
        assert!(matches!(failure.error.source, CapabilityError::InvalidOutput(_)));

        let empty = vec![Stage::image(
            "Edit: y",
            Arc::new(Fixed(PayloadCodec::encode("image/png", b""))),
            "y",
        )];
        let failure = TransformationPipeline::new(&empty)
            .run(item, &mut results)
            .await
            .unwrap_err();
        assert_eq!(failure.error.source, CapabilityError::EmptyResponse);

        let blank = vec![Stage::text("Extracted text", Arc::new(Echo("  \n")), "read")];
        let failure = TransformationPipeline::new(&blank)
            .run(item, &mut results)
            .await
            .unwrap_err();
        assert_eq!(failure.error.source, CapabilityError::EmptyResponse);

        assert!(item.history().is_empty());
        assert!(results.for_item(id).is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_output_keeps_previous_revision() {
        let (mut registry, id) = registry_with(b"src").await;
        let corrupt = Payload::parse("data:image/png;base64,@@@@").unwrap();
        let stages = vec![
            Stage::image("Preprocessed", Arc::new(Tagging::new("-a")), "fix"),
            Stage::image("Enhanced for OCR", Arc::new(Fixed(corrupt)), "enhance"),
        ];

        let mut results = TextResults::new();
        let item = registry.get_mut(id).unwrap();
        let failure = TransformationPipeline::new(&stages)
            .run(item, &mut results)
            .await
            .unwrap_err();

        assert_eq!(failure.error.stage, "Enhanced for OCR");
        assert!(matches!(failure.error.source, CapabilityError::InvalidOutput(_)));
        assert_eq!(failure.committed.entries_appended, 1);
        assert_eq!(item.history().len(), 1);
        assert!(matches!(item.history().entries()[0].payload(), PayloadState::Resident(_)));
        assert_eq!(decoded_latest(item), b"src-a");
    }

    /// Returns its input once the barrier is full
    struct Rendezvous(Barrier);

    #[async_trait]
    impl ImageCapability for Rendezvous {
        fn name(&self) -> &str {
            "rendezvous"
        }

        async fn transform(&self, input: &Payload, _: &str) -> Result<Payload, CapabilityError> {
            self.0.wait().await;
            Ok(input.clone())
        }
    }

    #[tokio::test]
    async fn test_residency_sees_overlapping_checkouts() {
        let (mut first, first_id) = registry_with(b"one").await;
        let (mut second, second_id) = registry_with(b"two").await;
        let stages = vec![Stage::image("Both", Arc::new(Rendezvous(Barrier::new(2))), "")];
        let gauge = ResidencyGauge::new();
        let pipeline = TransformationPipeline::new(&stages).with_residency(&gauge);
        let mut results_a = TextResults::new();
        let mut results_b = TextResults::new();

        let (a, b) = tokio::join!(
            pipeline.run(first.get_mut(first_id).unwrap(), &mut results_a),
            pipeline.run(second.get_mut(second_id).unwrap(), &mut results_b),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(gauge.peak(), 2);
        assert_eq!(gauge.live(), 0);
    }

    #[tokio::test]
    async fn test_residency_released_between_stages() {
        let (mut registry, id) = registry_with(b"src").await;
        let stages = vec![
            Stage::image("A", Arc::new(Tagging::new("-a")), ""),
            Stage::image("B", Arc::new(Tagging::new("-b")), ""),
        ];
        let gauge = ResidencyGauge::new();

        let mut results = TextResults::new();
        TransformationPipeline::new(&stages)
            .with_residency(&gauge)
            .run(registry.get_mut(id).unwrap(), &mut results)
            .await
            .unwrap();

        assert_eq!(gauge.peak(), 1);
        assert_eq!(gauge.live(), 0);
    }
}
