use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use super::VocabularyEntry;

pub type StoreFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Persistent home of the saved vocabulary.
pub trait VocabularyStore: Send + Sync {
    fn list(&self) -> StoreFuture<Vec<VocabularyEntry>>;

    /// Inserts `entry`, replacing an existing entry for the same word pair.
    fn save(&self, entry: VocabularyEntry) -> StoreFuture<()>;

    /// Returns whether anything was removed.
    fn remove(
        &self,
        source_word: &str,
        target_word: &str,
        source_language_id: u32,
        target_language_id: u32,
    ) -> StoreFuture<bool>;
}

fn upsert(entries: &mut Vec<VocabularyEntry>, entry: VocabularyEntry) {
    let existing = entries.iter().position(|current| {
        current.matches(
            &entry.source_word,
            &entry.target_word,
            entry.source_language_id,
            entry.target_language_id,
        )
    });
    match existing {
        Some(index) => entries[index] = entry,
        None => entries.push(entry),
    }
}

fn remove_matching(
    entries: &mut Vec<VocabularyEntry>,
    source_word: &str,
    target_word: &str,
    source_language_id: u32,
    target_language_id: u32,
) -> bool {
    let before = entries.len();
    entries.retain(|entry| {
        !entry.matches(
            source_word,
            target_word,
            source_language_id,
            target_language_id,
        )
    });
    entries.len() != before
}

#[derive(Debug, Clone, Default)]
pub struct MemoryVocabularyStore {
    entries: Arc<Mutex<Vec<VocabularyEntry>>>,
}

impl MemoryVocabularyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<VocabularyEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn entries(&self) -> Vec<VocabularyEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VocabularyStore for MemoryVocabularyStore {
    fn list(&self) -> StoreFuture<Vec<VocabularyEntry>> {
        let entries = self.entries();
        Box::pin(async move { Ok(entries) })
    }

    fn save(&self, entry: VocabularyEntry) -> StoreFuture<()> {
        upsert(
            &mut self.entries.lock().unwrap_or_else(PoisonError::into_inner),
            entry,
        );
        Box::pin(async { Ok(()) })
    }

    fn remove(
        &self,
        source_word: &str,
        target_word: &str,
        source_language_id: u32,
        target_language_id: u32,
    ) -> StoreFuture<bool> {
        let removed = remove_matching(
            &mut self.entries.lock().unwrap_or_else(PoisonError::into_inner),
            source_word,
            target_word,
            source_language_id,
            target_language_id,
        );
        Box::pin(async move { Ok(removed) })
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct VocabularyFile {
    entries: Vec<VocabularyEntry>,
}

/// Vocabulary kept in a single JSON document, created on first save.
#[derive(Debug, Clone)]
pub struct JsonFileVocabularyStore {
    path: PathBuf,
}

impl JsonFileVocabularyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_file(path: &Path) -> Result<VocabularyFile> {
    if !path.exists() {
        return Ok(VocabularyFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read vocabulary: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(VocabularyFile::default());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse vocabulary: {}", path.display()))
}

fn write_file(path: &Path, file: &VocabularyFile) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create vocabulary dir: {}", dir.display()))?;
    }
    let content = serde_json::to_string_pretty(file)?;
    fs::write(path, content)
        .with_context(|| format!("failed to write vocabulary: {}", path.display()))?;
    Ok(())
}

impl VocabularyStore for JsonFileVocabularyStore {
    fn list(&self) -> StoreFuture<Vec<VocabularyEntry>> {
        let path = self.path.clone();
        Box::pin(async move { Ok(read_file(&path)?.entries) })
    }

    fn save(&self, entry: VocabularyEntry) -> StoreFuture<()> {
        let path = self.path.clone();
        Box::pin(async move {
            let mut file = read_file(&path)?;
            upsert(&mut file.entries, entry);
            write_file(&path, &file)
        })
    }

    fn remove(
        &self,
        source_word: &str,
        target_word: &str,
        source_language_id: u32,
        target_language_id: u32,
    ) -> StoreFuture<bool> {
        let path = self.path.clone();
        let source_word = source_word.to_string();
        let target_word = target_word.to_string();
        Box::pin(async move {
            let mut file = read_file(&path)?;
            let removed = remove_matching(
                &mut file.entries,
                &source_word,
                &target_word,
                source_language_id,
                target_language_id,
            );
            if removed {
                write_file(&path, &file)?;
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn memory_store_upserts_case_insensitively() {
        let store = MemoryVocabularyStore::new();
        store
            .save(VocabularyEntry::new("Dog", "perro", 1, 2))
            .await
            .expect("save");
        let mut updated = VocabularyEntry::new("dog", "Perro", 1, 2);
        updated.contexts = Some(Vec::new());
        store.save(updated.clone()).await.expect("save");
        store
            .save(VocabularyEntry::new("dog", "perro", 2, 1))
            .await
            .expect("save");

        let entries = store.list().await.expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], updated);
    }

    #[tokio::test]
    async fn memory_store_remove_reports_change() {
        let store =
            MemoryVocabularyStore::with_entries(vec![VocabularyEntry::new("cat", "gato", 1, 2)]);
        assert!(!store.remove("cat", "gato", 2, 1).await.expect("remove"));
        assert!(store.remove("CAT", "gato", 1, 2).await.expect("remove"));
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn json_store_creates_file_on_first_save() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("vocabulary.json");
        let store = JsonFileVocabularyStore::new(&path);
        assert!(store.list().await.expect("list").is_empty());

        store
            .save(VocabularyEntry::new("house", "casa", 1, 2))
            .await
            .expect("save");
        assert!(path.exists());

        let reopened = JsonFileVocabularyStore::new(&path);
        let entries = reopened.list().await.expect("list");
        assert_eq!(entries, vec![VocabularyEntry::new("house", "casa", 1, 2)]);

        assert!(reopened.remove("house", "casa", 1, 2).await.expect("remove"));
        assert!(reopened.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn json_store_rejects_corrupt_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vocabulary.json");
        fs::write(&path, "{not json").expect("write");
        let store = JsonFileVocabularyStore::new(&path);
        let err = store.list().await.expect_err("corrupt file");
        assert!(err.to_string().contains("failed to parse vocabulary"));
    }
}
