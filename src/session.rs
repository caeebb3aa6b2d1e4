use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::TranslationBackend;
use crate::cache::{TranslationCache, WordRequest};
use crate::interaction::{ObservedWord, TokenId, WordInteractions, WordState};
use crate::languages::LanguagePair;
use crate::orientation::{self, CanonicalContext, Orientation};
use crate::sentence::BilingualSentences;
use crate::tokens::{Side, Token};
use crate::vocabulary::{
    SavedVocabularyIndex, VocabularyContext, VocabularyEntry, VocabularyMetadata,
    VocabularyStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(VocabularyEntry),
    AlreadySaved(VocabularyEntry),
    /// The opposite word could not be translated, so nothing was persisted.
    TranslationUnavailable,
    NotAWord,
}

struct SessionView {
    orientation: Orientation,
    interactions: WordInteractions,
    index: SavedVocabularyIndex,
}

/// One reader's session over one token stream.
///
/// Owns the translation cache, the vocabulary index and the per-word UI
/// state; dropping the session discards all of it.
pub struct ReadingSession {
    tokens: Vec<Token>,
    sentences: BilingualSentences,
    languages: LanguagePair,
    cache: TranslationCache,
    store: Arc<dyn VocabularyStore>,
    view: Mutex<SessionView>,
}

struct WordTarget {
    request: WordRequest,
    /// The same token read on the other side.
    mirror: WordRequest,
    id: TokenId,
    side: Side,
    position: usize,
}

impl ReadingSession {
    pub fn new(
        tokens: Vec<Token>,
        languages: LanguagePair,
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn VocabularyStore>,
    ) -> Self {
        let sentences = BilingualSentences::new(&tokens);
        let index = SavedVocabularyIndex::build(&[], languages.source.id, languages.target.id);
        Self {
            tokens,
            sentences,
            cache: TranslationCache::new(backend, languages.clone()),
            languages,
            store,
            view: Mutex::new(SessionView {
                orientation: Orientation::default(),
                interactions: WordInteractions::new(),
                index,
            }),
        }
    }

    /// Creates a session and loads the saved vocabulary from `store`.
    pub async fn open(
        tokens: Vec<Token>,
        languages: LanguagePair,
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn VocabularyStore>,
        orientation: Orientation,
    ) -> Result<Self> {
        let session = Self::new(tokens, languages, backend, store);
        session.set_orientation(orientation);
        session.reload_vocabulary().await?;
        Ok(session)
    }

    pub fn close(self) {
        debug!(
            "closing reading session ({} tokens, {} cached words)",
            self.tokens.len(),
            self.cache.snapshot().words.len()
        );
    }

    fn view(&self) -> MutexGuard<'_, SessionView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }

    pub fn orientation(&self) -> Orientation {
        self.view().orientation
    }

    /// Switches the displayed side. Menu focus, running translations and
    /// saves carry over since token identity does not depend on the side.
    pub fn set_orientation(&self, orientation: Orientation) {
        self.view().orientation = orientation;
    }

    pub fn set_display_source(&self, displaying_source: bool) {
        self.set_orientation(Orientation::new(displaying_source));
    }

    /// Sentence around `position` on the displayed side.
    pub fn sentence_at(&self, position: i64) -> String {
        let side = self.orientation().displayed_side();
        self.sentences.sentence_at(side, position).to_string()
    }

    pub fn sentences(&self) -> &BilingualSentences {
        &self.sentences
    }

    /// Rebuilds the vocabulary index from the full collection.
    pub fn set_vocabulary(&self, entries: &[VocabularyEntry]) {
        let index = SavedVocabularyIndex::build(
            entries,
            self.languages.source.id,
            self.languages.target.id,
        );
        let mut view = self.view();
        view.index = index;
        view.interactions.clear_saved();
    }

    pub async fn reload_vocabulary(&self) -> Result<()> {
        let entries = self.store.list().await?;
        self.set_vocabulary(&entries);
        Ok(())
    }

    pub fn vocabulary_index(&self) -> SavedVocabularyIndex {
        self.view().index.clone()
    }

    fn word_target(&self, position: usize) -> Option<WordTarget> {
        let token = self.tokens.get(position)?.as_word()?;
        let side = self.orientation().displayed_side();
        Some(WordTarget {
            request: WordRequest::for_token(token, side, position),
            mirror: WordRequest::for_token(token, side.opposite(), position),
            id: TokenId::new(token.word(Side::Source), Some(position)),
            side,
            position,
        })
    }

    pub fn token_id(&self, position: usize) -> Option<TokenId> {
        self.word_target(position).map(|target| target.id)
    }

    pub fn word_state(&self, position: usize) -> Option<WordState> {
        let target = self.word_target(position)?;
        let in_flight = self.cache.is_word_in_flight(&target.request.key)
            || self.cache.is_word_in_flight(&target.mirror.key);
        let translated = self.cache.word_translation(&target.request.key).is_some()
            || self.cache.word_translation(&target.mirror.key).is_some();
        let view = self.view();
        let observed = ObservedWord {
            in_flight,
            translated,
            saved_in_index: view.index.is_saved(target.side, &target.request.word),
        };
        Some(view.interactions.state(&target.id, observed))
    }

    /// Cached translation of the displayed word at `position`, if any.
    pub fn translation_at(&self, position: usize) -> Option<String> {
        let target = self.word_target(position)?;
        self.cache
            .word_translation(&target.request.key)
            .or_else(|| {
                self.cache
                    .word_translation(&target.mirror.key)
                    .map(|_| target.mirror.word.clone())
            })
    }

    /// Starts translating the displayed sentence around `position`.
    pub fn request_sentence_translation(&self, position: usize) {
        let side = self.orientation().displayed_side();
        let sentence = self.sentences.sentence_at(side, position as i64);
        self.cache.ensure_sentence_translated(side, sentence);
    }

    /// Starts translating the word at `position` without waiting.
    pub fn request_translation(&self, position: usize) {
        let Some(target) = self.word_target(position) else {
            return;
        };
        let (side, position) = (target.side, target.position as i64);
        self.cache.ensure_word_translated(target.request, || {
            self.sentences.sentence_at(side, position).to_string()
        });
    }

    /// Translates the word at `position` and waits for the result.
    pub async fn translate(&self, position: usize) -> Option<String> {
        let target = self.word_target(position)?;
        let _translating = TranslatingGuard::begin(self, &target.id);
        if let Some(known) = self.mirrored_translation(&target).await {
            debug!("reusing translation made on the other side for position {}", position);
            return Some(known);
        }
        let (side, position) = (target.side, target.position as i64);
        self.cache
            .translate(target.request, || {
                self.sentences.sentence_at(side, position).to_string()
            })
            .await
    }

    /// Opposite word known from a translation started on the other side,
    /// awaiting it when it is still running.
    async fn mirrored_translation(&self, target: &WordTarget) -> Option<String> {
        let key = &target.mirror.key;
        if !self.cache.is_word_in_flight(key) && self.cache.word_translation(key).is_none() {
            return None;
        }
        self.cache
            .settled_word_translation(key)
            .await
            .map(|_| target.mirror.word.clone())
    }

    /// Toggles the menu of the word at `position`; returns whether it is now open.
    pub fn toggle_menu(&self, position: usize) -> bool {
        let Some(target) = self.word_target(position) else {
            return false;
        };
        self.view().interactions.toggle_menu(target.id)
    }

    pub fn close_menu(&self) {
        self.view().interactions.close_menu();
    }

    pub fn canonical_context(&self, position: usize) -> Option<CanonicalContext> {
        orientation::resolve_context(
            &self.tokens,
            &self.sentences,
            position,
            self.orientation(),
            &self.cache,
        )
    }

    /// Saves the word at `position` in source -> target direction.
    ///
    /// When the opposite word is not known yet it is translated first; if that
    /// fails nothing is persisted.
    pub async fn save(
        &self,
        position: usize,
        metadata: VocabularyMetadata,
    ) -> Result<SaveOutcome> {
        let Some(mut context) = self.canonical_context(position) else {
            return Ok(SaveOutcome::NotAWord);
        };
        if !context.is_complete() {
            debug!("translating position {} before saving", position);
            self.translate(position).await;
            context = match self.canonical_context(position) {
                Some(context) => context,
                None => return Ok(SaveOutcome::NotAWord),
            };
            if !context.is_complete() {
                warn!("not saving position {}: translation unavailable", position);
                return Ok(SaveOutcome::TranslationUnavailable);
            }
        }

        let existing = self
            .view()
            .index
            .find_pair(&context.word.source, &context.word.target)
            .cloned();
        if let Some(existing) = existing {
            return Ok(SaveOutcome::AlreadySaved(existing));
        }

        let entry = build_entry(&context, &self.languages, metadata);
        self.store.save(entry.clone()).await?;
        info!("saved '{}' -> '{}'", entry.source_word, entry.target_word);
        if let Some(id) = self.token_id(position) {
            self.view().interactions.mark_saved(id);
        }
        self.reload_vocabulary().await?;
        Ok(SaveOutcome::Saved(entry))
    }

    /// Removes the saved entry for the displayed word at `position`.
    pub async fn unsave(&self, position: usize) -> Result<bool> {
        let Some(target) = self.word_target(position) else {
            return Ok(false);
        };
        let entry = self
            .view()
            .index
            .find(target.side, &target.request.word)
            .cloned();
        let Some(entry) = entry else {
            return Ok(false);
        };
        let removed = self
            .store
            .remove(
                &entry.source_word,
                &entry.target_word,
                entry.source_language_id,
                entry.target_language_id,
            )
            .await?;
        self.view().interactions.forget_saved(&target.id);
        self.reload_vocabulary().await?;
        Ok(removed)
    }
}

/// Holds a word in `Translating` for the lifetime of an awaited translation.
struct TranslatingGuard<'a> {
    session: &'a ReadingSession,
    id: Option<TokenId>,
}

impl<'a> TranslatingGuard<'a> {
    fn begin(session: &'a ReadingSession, id: &TokenId) -> Self {
        let started = session.view().interactions.begin_translation(id);
        Self {
            session,
            id: started.then(|| id.clone()),
        }
    }
}

impl Drop for TranslatingGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.session.view().interactions.finish_translation(&id);
        }
    }
}

fn build_entry(
    context: &CanonicalContext,
    languages: &LanguagePair,
    metadata: VocabularyMetadata,
) -> VocabularyEntry {
    let contexts = if context.sentence.source.is_empty() && context.sentence.target.is_empty() {
        None
    } else {
        Some(vec![VocabularyContext {
            source_sentence: context.sentence.source.clone(),
            target_sentence: context.sentence.target.clone(),
        }])
    };
    let metadata = metadata.or(VocabularyMetadata {
        part_of_speech: context.part_of_speech.clone(),
        difficulty: context.difficulty.clone(),
        definition: context.definition.clone(),
        notes: None,
        saved_at: Some(now_unix()),
    });
    VocabularyEntry {
        source_word: context.word.source.trim().to_string(),
        target_word: context.word.target.trim().to_string(),
        source_language_id: languages.source.id,
        target_language_id: languages.target.id,
        contexts,
        metadata: Some(metadata),
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
