use serde::{Deserialize, Serialize};

use crate::runs::ImageMetadata;

/// One completed run. `images` and `metadata` are index-aligned and only
/// hold the images that actually loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub images: Vec<String>,
    pub metadata: Vec<ImageMetadata>,
}

/// Newest-first, in-memory log of completed runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryEntry, HistoryLedger};

    fn entry(prompt: &str) -> HistoryEntry {
        HistoryEntry {
            prompt: prompt.to_string(),
            images: vec![format!("https://image.example/prompt/{prompt}")],
            metadata: Vec::new(),
        }
    }

    #[test]
    fn append_prepends_newest_first() {
        let mut ledger = HistoryLedger::new();
        assert!(ledger.is_empty());
        ledger.append(entry("first"));
        ledger.append(entry("second"));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.latest().map(|e| e.prompt.as_str()), Some("second"));
        let prompts: Vec<&str> = ledger.entries().iter().map(|e| e.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["second", "first"]);
    }
}
