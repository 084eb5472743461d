//! Sink for text produced by image-to-text stages
//!
//! Extraction and analysis results never enter an item's image history;
//! they are kept here, keyed by item id, in the order they were produced.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::data::ItemId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResult {
    pub label: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TextResults {
    by_item: HashMap<ItemId, Vec<TextResult>>,
}

impl TextResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: ItemId, label: impl Into<String>, text: impl Into<String>) {
        self.by_item.entry(id).or_default().push(TextResult {
            label: label.into(),
            text: text.into(),
            created_at: Utc::now(),
        });
    }

    /// All results for an item, oldest first
    pub fn for_item(&self, id: ItemId) -> &[TextResult] {
        self.by_item.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, id: ItemId) -> Option<&TextResult> {
        self.for_item(id).last()
    }

    pub fn forget(&mut self, id: ItemId) {
        self.by_item.remove(&id);
    }

    pub fn clear(&mut self) {
        self.by_item.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_keyed_by_item() {
        let mut results = TextResults::new();
        let a = ItemId::new();
        let b = ItemId::new();
        results.record(a, "Extracted text", "TOTAL 12.00");
        results.record(a, "Analysis: what is this", "A receipt");
        results.record(b, "Extracted text", "Hello");

        assert_eq!(results.for_item(a).len(), 2);
        assert_eq!(results.latest(a).unwrap().text, "A receipt");
        assert_eq!(results.for_item(b)[0].label, "Extracted text");

        results.forget(a);
        assert!(results.for_item(a).is_empty());
        assert_eq!(results.for_item(b).len(), 1);
    }
}
