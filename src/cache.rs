use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{TranslationBackend, non_empty};
use crate::languages::LanguagePair;
use crate::tokens::{Side, WordToken};

/// Word cache key: the lemma read on `side`, optionally pinned to a token position.
///
/// An entry without a position is valid for every occurrence of the lemma
/// until a positional entry overrides it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordKey {
    pub side: Side,
    pub lemma: String,
    pub position: Option<usize>,
}

impl WordKey {
    pub fn new(side: Side, lemma: &str, position: Option<usize>) -> Self {
        Self {
            side,
            lemma: lemma.trim().to_lowercase(),
            position,
        }
    }

    pub fn at(side: Side, lemma: &str, position: usize) -> Self {
        Self::new(side, lemma, Some(position))
    }

    pub fn lemma_only(&self) -> WordKey {
        WordKey {
            side: self.side,
            lemma: self.lemma.clone(),
            position: None,
        }
    }
}

/// Sentence cache key: the sentence text exactly as read on `side`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentenceKey {
    pub side: Side,
    pub text: String,
}

impl SentenceKey {
    pub fn new(side: Side, text: &str) -> Self {
        Self {
            side,
            text: text.trim().to_string(),
        }
    }
}

/// A word to translate: its cache key plus the surface form sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRequest {
    pub key: WordKey,
    pub word: String,
}

impl WordRequest {
    pub fn new(key: WordKey, word: impl Into<String>) -> Self {
        Self {
            key,
            word: word.into(),
        }
    }

    /// Request for the word token at `position`, read on `side`.
    pub fn for_token(token: &WordToken, side: Side, position: usize) -> Self {
        Self::new(
            WordKey::at(side, token.lemma(side), position),
            token.word(side),
        )
    }

    fn query_text(&self) -> &str {
        if self.word.trim().is_empty() {
            &self.key.lemma
        } else {
            self.word.trim()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PendingKey {
    Word(WordKey),
    Sentence(SentenceKey),
}

enum Claim {
    Hit(String),
    InFlight,
    Claimed,
}

/// Point-in-time copy of everything the cache exposes to a renderer.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub revision: u64,
    pub words: HashMap<WordKey, String>,
    pub sentences: HashMap<SentenceKey, String>,
    pub words_in_flight: HashSet<WordKey>,
    pub sentences_in_flight: HashSet<SentenceKey>,
}

#[derive(Debug, Default)]
struct CacheState {
    words: HashMap<WordKey, String>,
    sentences: HashMap<SentenceKey, String>,
    in_flight: HashSet<PendingKey>,
}

impl CacheState {
    fn lookup_word(&self, key: &WordKey) -> Option<String> {
        if let Some(found) = self.words.get(key) {
            return Some(found.clone());
        }
        if key.position.is_some() {
            return self.words.get(&key.lemma_only()).cloned();
        }
        None
    }

    fn lookup(&self, key: &PendingKey) -> Option<String> {
        match key {
            PendingKey::Word(word) => self.lookup_word(word),
            PendingKey::Sentence(sentence) => self.sentences.get(sentence).cloned(),
        }
    }

    /// Returns a cached value, or marks `key` in flight when nobody else has.
    ///
    /// A lemma-only hit for a positional key is copied into the positional
    /// slot on the way out.
    fn claim(&mut self, key: &PendingKey) -> (Claim, bool) {
        match key {
            PendingKey::Word(word) => {
                if let Some(found) = self.words.get(word) {
                    return (Claim::Hit(found.clone()), false);
                }
                if word.position.is_some()
                    && let Some(found) = self.words.get(&word.lemma_only()).cloned()
                {
                    debug!(
                        "promoting lemma-only translation of '{}' to position {:?}",
                        word.lemma, word.position
                    );
                    self.words.insert(word.clone(), found.clone());
                    return (Claim::Hit(found), true);
                }
            }
            PendingKey::Sentence(sentence) => {
                if let Some(found) = self.sentences.get(sentence) {
                    return (Claim::Hit(found.clone()), false);
                }
            }
        }
        if self.in_flight.contains(key) {
            return (Claim::InFlight, false);
        }
        self.in_flight.insert(key.clone());
        (Claim::Claimed, true)
    }
}

struct Shared {
    state: Mutex<CacheState>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(CacheState::default()),
            revision,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<R>(&self, read: impl FnOnce(&CacheState) -> R) -> R {
        read(&self.lock())
    }

    /// Applies one mutation under the lock, then notifies subscribers.
    fn update<R>(&self, update: impl FnOnce(&mut CacheState) -> (R, bool)) -> R {
        let (result, changed) = {
            let mut state = self.lock();
            update(&mut state)
        };
        if changed {
            self.revision.send_modify(|revision| *revision += 1);
        }
        result
    }

    fn claim(&self, key: &PendingKey) -> Claim {
        self.update(|state| state.claim(key))
    }
}

/// Clears an in-flight marker however the request ends, including when it is dropped.
struct PendingGuard {
    shared: Weak<Shared>,
    key: Option<PendingKey>,
}

impl PendingGuard {
    fn new(shared: Weak<Shared>, key: PendingKey) -> Self {
        Self {
            shared,
            key: Some(key),
        }
    }

    /// Stores `value` (when present) and clears the marker in one update.
    fn finish(mut self, value: Option<String>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let Some(shared) = self.shared.upgrade() else {
            debug!("translation resolved after its session closed; dropping result");
            return;
        };
        shared.update(|state| {
            if let Some(value) = value {
                match &key {
                    PendingKey::Word(word) => {
                        state.words.insert(word.clone(), value);
                    }
                    PendingKey::Sentence(sentence) => {
                        state.sentences.insert(sentence.clone(), value);
                    }
                }
            }
            state.in_flight.remove(&key);
            ((), true)
        });
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take()
            && let Some(shared) = self.shared.upgrade()
        {
            shared.update(|state| ((), state.in_flight.remove(&key)));
        }
    }
}

/// Position-keyed memo of word and sentence translations for one reading session.
///
/// At most one backend request is outstanding per key. State lives as long
/// as the cache; requests still running when it is dropped resolve into
/// nothing.
pub struct TranslationCache {
    shared: Arc<Shared>,
    backend: Arc<dyn TranslationBackend>,
    languages: LanguagePair,
}

impl TranslationCache {
    pub fn new(backend: Arc<dyn TranslationBackend>, languages: LanguagePair) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            backend,
            languages,
        }
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    /// Revision counter bumped after every visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn word_translation(&self, key: &WordKey) -> Option<String> {
        self.shared.read(|state| state.lookup_word(key))
    }

    pub fn sentence_translation(&self, side: Side, sentence: &str) -> Option<String> {
        let key = SentenceKey::new(side, sentence);
        self.shared.read(|state| state.sentences.get(&key).cloned())
    }

    pub fn is_word_in_flight(&self, key: &WordKey) -> bool {
        let key = PendingKey::Word(key.clone());
        self.shared.read(|state| state.in_flight.contains(&key))
    }

    pub fn is_sentence_in_flight(&self, side: Side, sentence: &str) -> bool {
        let key = PendingKey::Sentence(SentenceKey::new(side, sentence));
        self.shared.read(|state| state.in_flight.contains(&key))
    }

    /// Seeds a word translation, e.g. from a dictionary lookup.
    pub fn insert_word(&self, key: WordKey, translation: impl Into<String>) {
        let translation = translation.into();
        self.shared.update(|state| {
            state.words.insert(key, translation);
            ((), true)
        });
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let revision = *self.shared.revision.borrow();
        self.shared.read(|state| {
            let mut words_in_flight = HashSet::new();
            let mut sentences_in_flight = HashSet::new();
            for key in &state.in_flight {
                match key {
                    PendingKey::Word(word) => {
                        words_in_flight.insert(word.clone());
                    }
                    PendingKey::Sentence(sentence) => {
                        sentences_in_flight.insert(sentence.clone());
                    }
                }
            }
            CacheSnapshot {
                revision,
                words: state.words.clone(),
                sentences: state.sentences.clone(),
                words_in_flight,
                sentences_in_flight,
            }
        })
    }

    /// Starts translating `request` in the background unless it is cached or
    /// already running. `sentence` is only called when a request is issued.
    ///
    /// Progress is observed through the read accessors and [`Self::subscribe`].
    pub fn ensure_word_translated(&self, request: WordRequest, sentence: impl FnOnce() -> String) {
        self.spawn_word_job(request, sentence);
    }

    fn spawn_word_job(
        &self,
        request: WordRequest,
        sentence: impl FnOnce() -> String,
    ) -> Option<JoinHandle<()>> {
        let pending = PendingKey::Word(request.key.clone());
        match self.shared.claim(&pending) {
            Claim::Hit(_) => {
                debug!("'{}' already translated", request.key.lemma);
                return None;
            }
            Claim::InFlight => {
                debug!("'{}' already in flight", request.key.lemma);
                return None;
            }
            Claim::Claimed => {}
        }
        let guard = PendingGuard::new(Arc::downgrade(&self.shared), pending);
        let sentence = sentence();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                "no async runtime available; translation of '{}' not started",
                request.key.lemma
            );
            return None;
        };
        let job = WordJob {
            shared: Arc::downgrade(&self.shared),
            backend: self.backend.clone(),
            languages: self.languages.clone(),
            request,
            sentence,
        };
        Some(runtime.spawn(async move {
            job.run(guard).await;
        }))
    }

    /// Cached translation for `key`, waiting first if a request for it is in
    /// flight. Never issues a request.
    pub async fn settled_word_translation(&self, key: &WordKey) -> Option<String> {
        let pending = PendingKey::Word(key.clone());
        let revisions = self.subscribe();
        self.wait_for(&pending, revisions).await
    }

    /// Translates `request`, waiting for completion.
    ///
    /// Shares state with [`Self::ensure_word_translated`]: a cached value is
    /// returned directly, and a request already in flight is awaited rather
    /// than issued again.
    pub async fn translate(
        &self,
        request: WordRequest,
        sentence: impl FnOnce() -> String,
    ) -> Option<String> {
        let pending = PendingKey::Word(request.key.clone());
        let revisions = self.subscribe();
        match self.shared.claim(&pending) {
            Claim::Hit(found) => return Some(found),
            Claim::InFlight => return self.wait_for(&pending, revisions).await,
            Claim::Claimed => {}
        }
        let guard = PendingGuard::new(Arc::downgrade(&self.shared), pending);
        let job = WordJob {
            shared: Arc::downgrade(&self.shared),
            backend: self.backend.clone(),
            languages: self.languages.clone(),
            request,
            sentence: sentence(),
        };
        job.run(guard).await
    }

    /// Translates a whole sentence read on `side`, with the same de-duplication
    /// rules as word translation.
    pub async fn translate_sentence(&self, side: Side, sentence: &str) -> Option<String> {
        let key = SentenceKey::new(side, sentence);
        if key.text.is_empty() {
            return None;
        }
        let pending = PendingKey::Sentence(key.clone());
        let revisions = self.subscribe();
        match self.shared.claim(&pending) {
            Claim::Hit(found) => Some(found),
            Claim::InFlight => self.wait_for(&pending, revisions).await,
            Claim::Claimed => {
                let guard = PendingGuard::new(Arc::downgrade(&self.shared), pending);
                resolve_sentence(&self.backend, &self.languages, &key, guard).await
            }
        }
    }

    /// Background counterpart of [`Self::translate_sentence`].
    pub fn ensure_sentence_translated(&self, side: Side, sentence: &str) {
        let key = SentenceKey::new(side, sentence);
        if key.text.is_empty() {
            return;
        }
        let pending = PendingKey::Sentence(key.clone());
        if !matches!(self.shared.claim(&pending), Claim::Claimed) {
            return;
        }
        let guard = PendingGuard::new(Arc::downgrade(&self.shared), pending);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available; sentence translation not started");
            return;
        };
        let backend = self.backend.clone();
        let languages = self.languages.clone();
        runtime.spawn(async move {
            resolve_sentence(&backend, &languages, &key, guard).await;
        });
    }

    async fn wait_for(
        &self,
        key: &PendingKey,
        mut revisions: watch::Receiver<u64>,
    ) -> Option<String> {
        loop {
            let (pending, found) = self
                .shared
                .read(|state| (state.in_flight.contains(key), state.lookup(key)));
            if !pending {
                return found;
            }
            if revisions.changed().await.is_err() {
                return None;
            }
        }
    }
}

struct WordJob {
    shared: Weak<Shared>,
    backend: Arc<dyn TranslationBackend>,
    languages: LanguagePair,
    request: WordRequest,
    sentence: String,
}

impl WordJob {
    async fn run(self, guard: PendingGuard) -> Option<String> {
        let side = self.request.key.side;
        let from = self.languages.language(side).code.clone();
        let to = self.languages.language(side.opposite()).code.clone();

        let sentence_key = SentenceKey::new(side, &self.sentence);
        if !sentence_key.text.is_empty()
            && let Some(shared) = self.shared.upgrade()
        {
            let pending = PendingKey::Sentence(sentence_key.clone());
            if let Claim::Claimed = shared.claim(&pending) {
                drop(shared);
                let sentence_guard = PendingGuard::new(self.shared.clone(), pending);
                resolve_sentence(&self.backend, &self.languages, &sentence_key, sentence_guard)
                    .await;
            }
        }

        debug!(
            "requesting translation of '{}' ({} -> {})",
            self.request.query_text(),
            from,
            to
        );
        let result = self
            .backend
            .translate_word_in_sentence(self.request.query_text(), &sentence_key.text, &from, &to)
            .await;
        let translation = match result {
            Ok(value) => {
                let value = non_empty(value);
                if value.is_none() {
                    warn!("no translation returned for '{}'", self.request.query_text());
                }
                value
            }
            Err(err) => {
                warn!(
                    "failed to translate '{}': {:#}",
                    self.request.query_text(),
                    err
                );
                None
            }
        };
        guard.finish(translation.clone());
        translation
    }
}

async fn resolve_sentence(
    backend: &Arc<dyn TranslationBackend>,
    languages: &LanguagePair,
    key: &SentenceKey,
    guard: PendingGuard,
) -> Option<String> {
    let from = &languages.language(key.side).code;
    let to = &languages.language(key.side.opposite()).code;
    let translation = match backend.translate_sentence(&key.text, from, to).await {
        Ok(value) => non_empty(value),
        Err(err) => {
            warn!("failed to translate sentence '{}': {:#}", key.text, err);
            None
        }
    };
    guard.finish(translation.clone());
    translation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::languages::LanguageRegistry;

    fn pair() -> LanguagePair {
        let registry = LanguageRegistry::load().expect("registry");
        LanguagePair::resolve(&registry, "en", "es").expect("pair")
    }

    fn cache(backend: &RecordingBackend) -> TranslationCache {
        TranslationCache::new(Arc::new(backend.clone()), pair())
    }

    fn hello(position: usize) -> WordRequest {
        WordRequest::new(WordKey::at(Side::Source, "hello", position), "Hello")
    }

    #[tokio::test]
    async fn translate_twice_hits_backend_once() {
        let backend = RecordingBackend::new()
            .with_word("Hello", "Hola")
            .with_sentence("Hello world!", "¡Hola mundo!");
        let cache = cache(&backend);

        let first = cache.translate(hello(0), || "Hello world!".to_string()).await;
        let second = cache.translate(hello(0), || "Hello world!".to_string()).await;

        assert_eq!(first.as_deref(), Some("Hola"));
        assert_eq!(second.as_deref(), Some("Hola"));
        assert_eq!(backend.word_calls(), 1);
        assert_eq!(backend.sentence_calls(), 1);
        assert_eq!(
            cache.sentence_translation(Side::Source, "Hello world!").as_deref(),
            Some("¡Hola mundo!")
        );
    }

    #[tokio::test]
    async fn concurrent_translations_share_one_request() {
        let (backend, gate) = RecordingBackend::new().with_word("Hello", "Hola").gated();
        let cache = cache(&backend);

        let first = cache.translate(hello(0), || "Hello world!".to_string());
        let second = cache.translate(hello(0), || "Hello world!".to_string());
        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (first, second, _) = tokio::join!(first, second, release);

        assert_eq!(first.as_deref(), Some("Hola"));
        assert_eq!(second.as_deref(), Some("Hola"));
        assert_eq!(backend.word_calls(), 1);
        assert!(!cache.is_word_in_flight(&hello(0).key));
    }

    #[tokio::test]
    async fn fire_and_forget_marks_in_flight_until_resolved() {
        let (backend, gate) = RecordingBackend::new().with_word("Hello", "Hola").gated();
        let cache = cache(&backend);
        let mut revisions = cache.subscribe();

        cache.ensure_word_translated(hello(0), || "Hello world!".to_string());
        cache.ensure_word_translated(hello(0), || "Hello world!".to_string());
        assert!(cache.is_word_in_flight(&hello(0).key));

        gate.notify_one();
        while cache.is_word_in_flight(&hello(0).key) {
            revisions.changed().await.expect("revision");
        }
        assert_eq!(
            cache.word_translation(&hello(0).key).as_deref(),
            Some("Hola")
        );
        assert_eq!(backend.word_calls(), 1);
    }

    #[tokio::test]
    async fn lemma_only_entry_is_promoted_without_request() {
        let backend = RecordingBackend::new();
        let cache = cache(&backend);
        cache.insert_word(WordKey::new(Side::Source, "Hello", None), "Hola");

        let found = cache.translate(hello(4), || "ignored".to_string()).await;

        assert_eq!(found.as_deref(), Some("Hola"));
        assert_eq!(backend.word_calls(), 0);
        let snapshot = cache.snapshot();
        assert_eq!(
            snapshot.words.get(&hello(4).key).map(String::as_str),
            Some("Hola")
        );
    }

    #[test]
    fn positional_entry_overrides_lemma_only() {
        let backend = RecordingBackend::new();
        let cache = cache(&backend);
        cache.insert_word(WordKey::new(Side::Source, "bank", None), "banco");
        cache.insert_word(WordKey::at(Side::Source, "bank", 7), "orilla");

        assert_eq!(
            cache
                .word_translation(&WordKey::at(Side::Source, "bank", 7))
                .as_deref(),
            Some("orilla")
        );
        assert_eq!(
            cache
                .word_translation(&WordKey::at(Side::Source, "bank", 2))
                .as_deref(),
            Some("banco")
        );
    }

    #[tokio::test]
    async fn failure_leaves_entry_unset_and_allows_retry() {
        let backend = RecordingBackend::new()
            .with_word("Hello", "Hola")
            .failing_words();
        let cache = cache(&backend);

        let first = cache.translate(hello(0), || "Hello world!".to_string()).await;
        assert_eq!(first, None);
        assert!(!cache.is_word_in_flight(&hello(0).key));
        assert_eq!(cache.word_translation(&hello(0).key), None);

        let second = cache.translate(hello(0), || "Hello world!".to_string()).await;
        assert_eq!(second, None);
        assert_eq!(backend.word_calls(), 2);
    }

    #[tokio::test]
    async fn empty_translation_is_not_cached() {
        let backend = RecordingBackend::new().with_word("Hello", "   ");
        let cache = cache(&backend);
        let found = cache.translate(hello(0), String::new).await;
        assert_eq!(found, None);
        assert_eq!(cache.word_translation(&hello(0).key), None);
        assert_eq!(backend.sentence_calls(), 0);
    }

    #[tokio::test]
    async fn direction_follows_key_side() {
        let backend = RecordingBackend::new().with_word("mundo", "world");
        let cache = cache(&backend);
        let request = WordRequest::new(WordKey::at(Side::Target, "mundo", 2), "mundo");
        let found = cache.translate(request, || "Hola mundo!".to_string()).await;
        assert_eq!(found.as_deref(), Some("world"));
        let calls = backend.calls.lock().expect("calls").clone();
        assert_eq!(
            calls,
            vec![
                "sentence:Hola mundo!:es>en".to_string(),
                "word:mundo@Hola mundo!:es>en".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn sentence_translation_is_memoized() {
        let backend = RecordingBackend::new().with_sentence("I run.", "Yo corro.");
        let cache = cache(&backend);
        let first = cache.translate_sentence(Side::Source, " I run. ").await;
        let second = cache.translate_sentence(Side::Source, "I run.").await;
        assert_eq!(first.as_deref(), Some("Yo corro."));
        assert_eq!(second.as_deref(), Some("Yo corro."));
        assert_eq!(backend.sentence_calls(), 1);
        assert_eq!(cache.translate_sentence(Side::Source, "  ").await, None);
    }

    #[tokio::test]
    async fn background_sentence_request_is_deduplicated() {
        let backend = RecordingBackend::new().with_sentence("I run.", "Yo corro.");
        let cache = cache(&backend);
        let mut revisions = cache.subscribe();

        cache.ensure_sentence_translated(Side::Source, "I run.");
        cache.ensure_sentence_translated(Side::Source, "I run. ");
        assert!(cache.is_sentence_in_flight(Side::Source, "I run."));
        while cache.sentence_translation(Side::Source, "I run.").is_none() {
            revisions.changed().await.expect("revision");
        }
        assert_eq!(backend.sentence_calls(), 1);
        assert!(!cache.is_sentence_in_flight(Side::Source, "I run."));
    }

    #[tokio::test]
    async fn late_resolution_after_drop_is_ignored() {
        let (backend, gate) = RecordingBackend::new().with_word("Hello", "Hola").gated();
        let cache = cache(&backend);
        let handle = cache
            .spawn_word_job(hello(0), || "Hello world!".to_string())
            .expect("job spawned");
        tokio::task::yield_now().await;
        drop(cache);

        gate.notify_one();
        assert!(handle.await.is_ok());
        assert_eq!(backend.word_calls(), 1);
    }

    #[tokio::test]
    async fn settled_translation_waits_for_in_flight_request() {
        let (backend, gate) = RecordingBackend::new().with_word("Hello", "Hola").gated();
        let cache = cache(&backend);
        let key = hello(0).key;
        assert_eq!(cache.settled_word_translation(&key).await, None);

        cache.ensure_word_translated(hello(0), || "Hello world!".to_string());
        let waiting = cache.settled_word_translation(&key);
        gate.notify_one();
        assert_eq!(waiting.await.as_deref(), Some("Hola"));
        assert_eq!(backend.word_calls(), 1);
    }

    #[test]
    fn fire_and_forget_without_runtime_releases_claim() {
        let backend = RecordingBackend::new();
        let cache = cache(&backend);
        cache.ensure_word_translated(hello(0), String::new);
        assert!(!cache.is_word_in_flight(&hello(0).key));
        assert_eq!(backend.word_calls(), 0);
    }
}
