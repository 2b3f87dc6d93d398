//! Transcript assembly and export.
//!
//! Display-ready entries arrive in the order their uploads complete and
//! are never revisited; exports are generated entirely client-side from
//! the already-rendered entries.

pub mod export;

use crate::cluster::SpeakerId;
use serde::Serialize;

pub use export::ExportFormat;

/// One display-ready transcript line.
#[derive(Clone, Debug, Serialize)]
pub struct TranscriptEntry {
    /// Identity assigned by the clustering engine
    pub speaker: SpeakerId,

    /// Speaker label at the time the entry was rendered
    pub speaker_name: String,

    pub text: String,

    /// Segment start, seconds from the beginning of its utterance
    pub start: f64,

    /// Segment end, seconds
    pub end: f64,

    pub emotion: Option<String>,
}

/// Append-only store of rendered transcript entries.
#[derive(Default)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; insertion order is display order.
    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries for a new conversation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            speaker: SpeakerId(0),
            speaker_name: name.to_string(),
            text: text.to_string(),
            start: 0.0,
            end: 1.0,
            emotion: None,
        }
    }

    #[test]
    fn test_store_preserves_order() {
        let mut store = TranscriptStore::new();
        store.push(entry("Speaker A", "first"));
        store.push(entry("Speaker B", "second"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[0].text, "first");
        assert_eq!(store.entries()[1].text, "second");
    }

    #[test]
    fn test_clear() {
        let mut store = TranscriptStore::new();
        store.push(entry("Speaker A", "line"));
        store.clear();
        assert!(store.is_empty());
    }
}
