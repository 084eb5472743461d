//! Pipeline stages and the labels they leave in history

use std::fmt;
use std::sync::Arc;

use super::capability::{ImageCapability, TextCapability};
use crate::config::StageInstructions;

pub const PREPROCESSED_LABEL: &str = "Preprocessed";
pub const ENHANCED_LABEL: &str = "Enhanced for OCR";
pub const EXTRACTED_LABEL: &str = "Extracted text";

/// What a stage produces
#[derive(Clone)]
pub enum StageKind {
    /// Produces a new image, appended to history
    Image(Arc<dyn ImageCapability>),
    /// Produces text, delivered to the result sink
    Text(Arc<dyn TextCapability>),
}

/// One named capability call with its instruction
#[derive(Clone)]
pub struct Stage {
    label: String,
    instruction: String,
    kind: StageKind,
}

impl Stage {
    pub fn image(
        label: impl Into<String>,
        capability: Arc<dyn ImageCapability>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            instruction: instruction.into(),
            kind: StageKind::Image(capability),
        }
    }

    pub fn text(
        label: impl Into<String>,
        capability: Arc<dyn TextCapability>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            instruction: instruction.into(),
            kind: StageKind::Text(capability),
        }
    }

    /// Free-form edit; the label carries the start of the prompt
    pub fn edit(capability: Arc<dyn ImageCapability>, prompt: &str, max_chars: usize) -> Self {
        let label = format!("Edit: {}", truncate_prompt(prompt, max_chars));
        Self::image(label, capability, prompt)
    }

    pub fn generate(capability: Arc<dyn ImageCapability>, prompt: &str, max_chars: usize) -> Self {
        let label = format!("Generate: {}", truncate_prompt(prompt, max_chars));
        Self::image(label, capability, prompt)
    }

    /// Free-form question about the image, answered as text
    pub fn analyze(capability: Arc<dyn TextCapability>, prompt: &str, max_chars: usize) -> Self {
        let label = format!("Analysis: {}", truncate_prompt(prompt, max_chars));
        Self::text(label, capability, prompt)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    pub fn produces_text(&self) -> bool {
        matches!(self.kind, StageKind::Text(_))
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capability = match &self.kind {
            StageKind::Image(cap) => cap.name(),
            StageKind::Text(cap) => cap.name(),
        };
        f.debug_struct("Stage")
            .field("label", &self.label)
            .field("capability", &capability)
            .field("produces_text", &self.produces_text())
            .finish()
    }
}

/// The document chain: straighten, enhance, then read the text
pub fn auto_process(
    instructions: &StageInstructions,
    corrector: Arc<dyn ImageCapability>,
    enhancer: Arc<dyn ImageCapability>,
    reader: Arc<dyn TextCapability>,
) -> Vec<Stage> {
    vec![
        Stage::image(PREPROCESSED_LABEL, corrector, &instructions.perspective),
        Stage::image(ENHANCED_LABEL, enhancer, &instructions.enhance),
        Stage::text(EXTRACTED_LABEL, reader, &instructions.extract),
    ]
}

/// Shorten a prompt to `max_chars` characters for use in a label
pub fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    let prompt = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if prompt.chars().count() <= max_chars {
        return prompt;
    }
    let mut short: String = prompt.chars().take(max_chars).collect();
    short.truncate(short.trim_end().len());
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capability::fakes::{Echo, Tagging};

    #[test]
    fn test_truncate_prompt() {
        assert_eq!(truncate_prompt("make it brighter", 30), "make it brighter");
        assert_eq!(truncate_prompt("  make \n it   brighter ", 30), "make it brighter");
        assert_eq!(truncate_prompt("remove the coffee stain", 10), "remove the...");
        assert_eq!(truncate_prompt("éééééé", 3), "ééé...");
    }

    #[test]
    fn test_prompt_stage_labels() {
        let cap = Arc::new(Tagging::new("e"));
        let edit = Stage::edit(cap.clone(), "remove the coffee stain please", 10);
        assert_eq!(edit.label(), "Edit: remove the...");
        assert_eq!(edit.instruction(), "remove the coffee stain please");
        assert!(!edit.produces_text());

        assert_eq!(Stage::generate(cap, "a cat", 10).label(), "Generate: a cat");

        let analysis = Stage::analyze(Arc::new(Echo("ok")), "what is this?", 30);
        assert_eq!(analysis.label(), "Analysis: what is this?");
        assert!(analysis.produces_text());
    }

    #[test]
    fn test_auto_process_order() {
        let stages = auto_process(
            &StageInstructions::default(),
            Arc::new(Tagging::new("p")),
            Arc::new(Tagging::new("e")),
            Arc::new(Echo("text")),
        );
        let labels: Vec<&str> = stages.iter().map(Stage::label).collect();
        assert_eq!(labels, vec![PREPROCESSED_LABEL, ENHANCED_LABEL, EXTRACTED_LABEL]);
        assert!(stages[2].produces_text());
    }
}
