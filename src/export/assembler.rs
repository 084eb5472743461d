//! Turns items' current content into named artifacts
//!
//! An item with history exports its latest payload; an untouched item
//! exports its original source. Bundles skip items that cannot be exported
//! and report why, instead of failing the whole bundle.

use image::ImageFormat;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::payload::PayloadCodec;
use crate::state::{Item, ItemId, ItemRegistry, PayloadState, TextResults, ORIGINAL_LABEL};

/// A named binary ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// An item left out of a bundle
#[derive(Debug)]
pub struct SkippedExport {
    pub id: ItemId,
    /// File name, when the item still exists
    pub name: Option<String>,
    pub error: EngineError,
}

/// Artifacts for several items, plus the ones that were skipped
#[derive(Debug, Default)]
pub struct Bundle {
    pub artifacts: Vec<Artifact>,
    pub skipped: Vec<SkippedExport>,
}

impl Bundle {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn push(&mut self, mut artifact: Artifact, taken: &mut HashSet<String>) {
        artifact.name = unique_name(&artifact.name, taken);
        self.artifacts.push(artifact);
    }
}

pub struct ExportAssembler<'a> {
    registry: &'a ItemRegistry,
    results: Option<&'a TextResults>,
}

impl<'a> ExportAssembler<'a> {
    pub fn new(registry: &'a ItemRegistry) -> Self {
        Self {
            registry,
            results: None,
        }
    }

    /// Also emit text results as .txt artifacts in bundles
    pub fn with_text_results(mut self, results: &'a TextResults) -> Self {
        self.results = Some(results);
        self
    }

    /// Export one item's current content
    pub async fn export_one(&self, id: ItemId) -> Result<Artifact> {
        let item = self.registry.get(id).ok_or(EngineError::NotFound(id))?;
        current_artifact(item).await
    }

    /// Export several items; failures are reported per item in `skipped`
    pub async fn export_many(&self, ids: &[ItemId]) -> Bundle {
        let mut bundle = Bundle::default();
        let mut taken = HashSet::new();

        for &id in ids {
            let Some(item) = self.registry.get(id) else {
                bundle.skipped.push(SkippedExport {
                    id,
                    name: None,
                    error: EngineError::NotFound(id),
                });
                continue;
            };

            match current_artifact(item).await {
                Ok(artifact) => bundle.push(artifact, &mut taken),
                Err(error) => {
                    match &error {
                        EngineError::MemoryPruned { .. } => {
                            debug!("Skipping {} in bundle: {}", item.name(), error)
                        }
                        _ => warn!("⚠️  Skipping {} in bundle: {}", item.name(), error),
                    }
                    bundle.skipped.push(SkippedExport {
                        id,
                        name: Some(item.name().to_string()),
                        error,
                    });
                    continue;
                }
            }

            if let Some(results) = self.results {
                for result in results.for_item(id) {
                    let artifact = Artifact {
                        name: format!(
                            "{}_{}.txt",
                            item.source().base_name(),
                            sanitize(&result.label)
                        ),
                        mime_type: "text/plain".to_string(),
                        bytes: result.text.clone().into_bytes(),
                    };
                    bundle.push(artifact, &mut taken);
                }
            }
        }

        bundle
    }
}

async fn current_artifact(item: &Item) -> Result<Artifact> {
    let base = item.source().base_name();

    let Some(entry) = item.history().latest() else {
        let mime_type = item.source().mime_type().to_string();
        return Ok(Artifact {
            name: artifact_name(base, ORIGINAL_LABEL, &mime_type),
            bytes: item.source().bytes().await?,
            mime_type,
        });
    };

    match entry.payload() {
        PayloadState::Resident(payload) => {
            let decoded = PayloadCodec::decode(payload)?;
            Ok(Artifact {
                name: artifact_name(base, entry.label(), &decoded.mime_type),
                mime_type: decoded.mime_type,
                bytes: decoded.bytes,
            })
        }
        PayloadState::Pruned => Err(EngineError::MemoryPruned {
            id: item.id(),
            name: item.name().to_string(),
        }),
    }
}

/// `<base>_<label>.<ext>`, with the extension taken from the MIME type
pub fn artifact_name(base: &str, label: &str, mime_type: &str) -> String {
    format!("{}_{}.{}", base, sanitize(label), extension_for(mime_type))
}

fn extension_for(mime_type: &str) -> &'static str {
    ImageFormat::from_mime_type(mime_type)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin")
}

/// Keep letters, digits, '-' and '.'; everything else collapses into '_'
fn sanitize(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_alphanumeric() || c == '-' || c == '.' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "export".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Append " (n)" before the extension until the name is free
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
