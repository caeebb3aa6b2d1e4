use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::tokens::Side;

mod store;

pub use store::{JsonFileVocabularyStore, MemoryVocabularyStore, StoreFuture, VocabularyStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyContext {
    pub source_sentence: String,
    pub target_sentence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<u64>,
}

impl VocabularyMetadata {
    /// Fills fields left empty here from `fallback`.
    pub fn or(self, fallback: VocabularyMetadata) -> VocabularyMetadata {
        VocabularyMetadata {
            part_of_speech: self.part_of_speech.or(fallback.part_of_speech),
            difficulty: self.difficulty.or(fallback.difficulty),
            definition: self.definition.or(fallback.definition),
            notes: self.notes.or(fallback.notes),
            saved_at: self.saved_at.or(fallback.saved_at),
        }
    }
}

/// One saved word pair, always stored in source -> target direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub source_word: String,
    pub target_word: String,
    pub source_language_id: u32,
    pub target_language_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<VocabularyContext>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VocabularyMetadata>,
}

impl VocabularyEntry {
    pub fn new(
        source_word: impl Into<String>,
        target_word: impl Into<String>,
        source_language_id: u32,
        target_language_id: u32,
    ) -> Self {
        Self {
            source_word: source_word.into(),
            target_word: target_word.into(),
            source_language_id,
            target_language_id,
            contexts: None,
            metadata: None,
        }
    }

    /// Same word pair in the same language pair, ignoring case.
    pub fn matches(
        &self,
        source_word: &str,
        target_word: &str,
        source_language_id: u32,
        target_language_id: u32,
    ) -> bool {
        self.source_language_id == source_language_id
            && self.target_language_id == target_language_id
            && normalize_word(&self.source_word) == normalize_word(source_word)
            && normalize_word(&self.target_word) == normalize_word(target_word)
    }

    pub fn word(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_word,
            Side::Target => &self.target_word,
        }
    }
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Lookup sets over the saved vocabulary of one language pair.
///
/// Built from the whole collection every time it or the pair changes; never
/// patched in place.
#[derive(Debug, Clone, Default)]
pub struct SavedVocabularyIndex {
    source_language_id: u32,
    target_language_id: u32,
    saved_source_words: HashSet<String>,
    saved_target_words: HashSet<String>,
    by_source: HashMap<String, VocabularyEntry>,
    by_target: HashMap<String, VocabularyEntry>,
    entries: Vec<VocabularyEntry>,
}

impl SavedVocabularyIndex {
    pub fn build(
        entries: &[VocabularyEntry],
        source_language_id: u32,
        target_language_id: u32,
    ) -> Self {
        let mut index = SavedVocabularyIndex {
            source_language_id,
            target_language_id,
            ..SavedVocabularyIndex::default()
        };
        let matching = entries.iter().filter(|entry| {
            entry.source_language_id == source_language_id
                && entry.target_language_id == target_language_id
        });
        for entry in matching {
            index.entries.push(entry.clone());
            let source = normalize_word(&entry.source_word);
            if !source.is_empty() {
                index.saved_source_words.insert(source.clone());
                index.by_source.insert(source, entry.clone());
            }
            let target = normalize_word(&entry.target_word);
            if !target.is_empty() {
                index.saved_target_words.insert(target.clone());
                index.by_target.insert(target, entry.clone());
            }
        }
        index
    }

    pub fn language_ids(&self) -> (u32, u32) {
        (self.source_language_id, self.target_language_id)
    }

    pub fn saved_source_words(&self) -> &HashSet<String> {
        &self.saved_source_words
    }

    pub fn saved_target_words(&self) -> &HashSet<String> {
        &self.saved_target_words
    }

    pub fn find_by_source_word(&self, word: &str) -> Option<&VocabularyEntry> {
        self.by_source.get(&normalize_word(word))
    }

    pub fn find_by_target_word(&self, word: &str) -> Option<&VocabularyEntry> {
        self.by_target.get(&normalize_word(word))
    }

    /// Entry saving exactly `source_word -> target_word`, whichever entry
    /// the per-word lookups resolve to.
    pub fn find_pair(&self, source_word: &str, target_word: &str) -> Option<&VocabularyEntry> {
        self.entries.iter().find(|entry| {
            entry.matches(
                source_word,
                target_word,
                self.source_language_id,
                self.target_language_id,
            )
        })
    }

    pub fn find(&self, side: Side, word: &str) -> Option<&VocabularyEntry> {
        match side {
            Side::Source => self.find_by_source_word(word),
            Side::Target => self.find_by_target_word(word),
        }
    }

    pub fn is_saved(&self, side: Side, word: &str) -> bool {
        let word = normalize_word(word);
        match side {
            Side::Source => self.saved_source_words.contains(&word),
            Side::Target => self.saved_target_words.contains(&word),
        }
    }

    pub fn len(&self) -> usize {
        self.by_source.len().max(self.by_target.len())
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty() && self.by_target.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_matching_language_pair_is_indexed() {
        let entries = vec![
            VocabularyEntry::new("house", "casa", 1, 2),
            VocabularyEntry::new("maison", "house", 3, 1),
        ];
        let index = SavedVocabularyIndex::build(&entries, 1, 2);
        assert_eq!(index.saved_source_words().len(), 1);
        assert!(index.saved_source_words().contains("house"));
        assert!(!index.saved_source_words().contains("maison"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.language_ids(), (1, 2));
    }

    #[test]
    fn lookups_ignore_case() {
        let entries = vec![VocabularyEntry::new("Berlin", "Berlín", 1, 2)];
        let index = SavedVocabularyIndex::build(&entries, 1, 2);
        assert!(index.is_saved(Side::Source, "BERLIN"));
        assert!(index.is_saved(Side::Target, " berlín "));
        let entry = index.find_by_target_word("BERLÍN").expect("entry");
        assert_eq!(entry.source_word, "Berlin");
        assert_eq!(index.find(Side::Source, "paris"), None);
    }

    #[test]
    fn later_entries_win_and_blank_words_are_skipped() {
        let entries = vec![
            VocabularyEntry::new("bank", "banco", 1, 2),
            VocabularyEntry::new("bank", "orilla", 1, 2),
            VocabularyEntry::new("", "nada", 1, 2),
        ];
        let index = SavedVocabularyIndex::build(&entries, 1, 2);
        assert_eq!(
            index.find_by_source_word("bank").map(|e| e.target_word.as_str()),
            Some("orilla")
        );
        assert!(index.is_saved(Side::Target, "banco"));
        assert!(index.is_saved(Side::Target, "nada"));
        assert_eq!(
            index.find_pair("Bank", "BANCO").map(|e| e.target_word.as_str()),
            Some("banco")
        );
        assert_eq!(index.find_pair("bank", "ribera"), None);
        assert!(!index.saved_source_words().contains(""));
    }

    #[test]
    fn empty_collection_builds_empty_index() {
        let index = SavedVocabularyIndex::build(&[], 1, 2);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn entry_match_is_case_insensitive_and_pair_scoped() {
        let entry = VocabularyEntry::new("Dog", "Perro", 1, 2);
        assert!(entry.matches("dog", "perro", 1, 2));
        assert!(!entry.matches("dog", "perro", 2, 1));
        assert_eq!(entry.word(Side::Target), "Perro");
    }

    #[test]
    fn metadata_fallback_fills_gaps() {
        let merged = VocabularyMetadata {
            notes: Some("tricky".to_string()),
            ..VocabularyMetadata::default()
        }
        .or(VocabularyMetadata {
            part_of_speech: Some("noun".to_string()),
            notes: Some("ignored".to_string()),
            ..VocabularyMetadata::default()
        });
        assert_eq!(merged.notes.as_deref(), Some("tricky"));
        assert_eq!(merged.part_of_speech.as_deref(), Some("noun"));
    }

    #[test]
    fn entry_json_omits_absent_fields() {
        let entry = VocabularyEntry::new("cat", "gato", 1, 2);
        let value = serde_json::to_value(&entry).expect("serialize");
        assert!(value.get("contexts").is_none());
        assert!(value.get("metadata").is_none());
        let parsed: VocabularyEntry = serde_json::from_value(value).expect("parse");
        assert_eq!(parsed, entry);
    }
}
