mod common;

use bilingual_reader::ReadingSession;
use bilingual_reader::SaveOutcome;
use bilingual_reader::interaction::TranslationPhase;
use bilingual_reader::languages::{LanguagePair, LanguageRegistry};
use bilingual_reader::orientation::Orientation;
use bilingual_reader::tokens::Side;
use bilingual_reader::vocabulary::{
    JsonFileVocabularyStore, MemoryVocabularyStore, VocabularyEntry, VocabularyMetadata,
    VocabularyStore,
};
use common::{DOG, FAST, ScriptedBackend, dog_story};
use std::sync::Arc;
use tempfile::tempdir;

fn en_es() -> LanguagePair {
    let registry = LanguageRegistry::load().expect("registry");
    LanguagePair::resolve(&registry, "en", "es").expect("pair")
}

async fn open(
    backend: &ScriptedBackend,
    store: Arc<dyn VocabularyStore>,
    orientation: Orientation,
) -> ReadingSession {
    ReadingSession::open(
        dog_story(),
        en_es(),
        Arc::new(backend.clone()),
        store,
        orientation,
    )
    .await
    .expect("session")
}

#[tokio::test]
async fn second_sentence_context_excludes_the_first() {
    let backend = ScriptedBackend::new();
    let session = open(
        &backend,
        Arc::new(MemoryVocabularyStore::new()),
        Orientation::source(),
    )
    .await;

    assert_eq!(session.sentence_at(FAST as i64), "It is fast.");
    session.set_display_source(false);
    assert_eq!(session.sentence_at(FAST as i64), "Él es rápido.");
    assert_eq!(session.sentence_at(0), "El perro corre.");
}

#[tokio::test]
async fn concurrent_translations_share_one_request() {
    let backend = ScriptedBackend::new();
    let session = open(
        &backend,
        Arc::new(MemoryVocabularyStore::new()),
        Orientation::source(),
    )
    .await;

    let (first, second) = tokio::join!(session.translate(DOG), session.translate(DOG));
    assert_eq!(first.as_deref(), Some("perro"));
    assert_eq!(second.as_deref(), Some("perro"));
    assert_eq!(backend.word_calls(), 1);
    assert_eq!(
        backend.calls(),
        vec![
            "sentence:The dog runs.:en>es".to_string(),
            "word:dog@The dog runs.:en>es".to_string(),
        ]
    );

    let state = session.word_state(DOG).expect("word");
    assert_eq!(state.phase, TranslationPhase::Translated);
    assert!(!state.saved);
}

#[tokio::test]
async fn fire_and_forget_request_resolves_in_background() {
    let backend = ScriptedBackend::new();
    let session = open(
        &backend,
        Arc::new(MemoryVocabularyStore::new()),
        Orientation::source(),
    )
    .await;
    let mut changes = session.subscribe();

    session.request_translation(DOG);
    while session.translation_at(DOG).is_none() {
        changes.changed().await.expect("session alive");
    }
    assert_eq!(session.translation_at(DOG).as_deref(), Some("perro"));

    session.request_translation(DOG);
    assert_eq!(backend.word_calls(), 1);
}

#[tokio::test]
async fn target_display_saves_in_source_direction() {
    let backend = ScriptedBackend::new();
    let store = MemoryVocabularyStore::new();
    let session = open(&backend, Arc::new(store.clone()), Orientation::target()).await;

    let outcome = session
        .save(DOG, VocabularyMetadata::default())
        .await
        .expect("save");
    let SaveOutcome::Saved(entry) = outcome.clone() else {
        panic!("expected a saved entry, got {:?}", outcome);
    };
    assert_eq!(entry.source_word, "dog");
    assert_eq!(entry.target_word, "perro");
    assert_eq!((entry.source_language_id, entry.target_language_id), (1, 2));
    let context = &entry.contexts.as_ref().expect("contexts")[0];
    assert_eq!(context.source_sentence, "The dog runs.");
    assert_eq!(context.target_sentence, "El perro corre.");
    assert!(backend.calls().contains(&"word:perro@El perro corre.:es>en".to_string()));

    assert_eq!(store.entries(), vec![entry.clone()]);
    assert!(session.vocabulary_index().is_saved(Side::Source, "Dog"));
    assert!(session.word_state(DOG).expect("word").saved);

    let again = session
        .save(DOG, VocabularyMetadata::default())
        .await
        .expect("save");
    assert_eq!(again, SaveOutcome::AlreadySaved(entry));
}

#[tokio::test]
async fn failed_translation_saves_nothing() {
    let backend = ScriptedBackend::new();
    let store = MemoryVocabularyStore::new();
    let session = open(&backend, Arc::new(store.clone()), Orientation::source()).await;

    let runs = 4;
    let outcome = session
        .save(runs, VocabularyMetadata::default())
        .await
        .expect("save");
    assert_eq!(outcome, SaveOutcome::TranslationUnavailable);
    assert!(store.entries().is_empty());
    assert_eq!(
        session.save(1, VocabularyMetadata::default()).await.expect("save"),
        SaveOutcome::NotAWord
    );
}

#[tokio::test]
async fn vocabulary_index_only_covers_the_session_pair() {
    let store = MemoryVocabularyStore::with_entries(vec![
        VocabularyEntry::new("fast", "rápido", 1, 2),
        VocabularyEntry::new("vite", "fast", 3, 1),
    ]);
    let session = open(
        &ScriptedBackend::new(),
        Arc::new(store),
        Orientation::source(),
    )
    .await;

    let index = session.vocabulary_index();
    assert_eq!(index.saved_source_words().len(), 1);
    assert!(index.saved_source_words().contains("fast"));
    assert!(session.word_state(FAST).expect("word").saved);
    assert!(!session.word_state(DOG).expect("word").saved);
}

#[tokio::test]
async fn saved_vocabulary_survives_a_new_session() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("vocabulary.json");
    let backend = ScriptedBackend::new();

    let first = open(
        &backend,
        Arc::new(JsonFileVocabularyStore::new(&path)),
        Orientation::source(),
    )
    .await;
    let outcome = first
        .save(
            FAST,
            VocabularyMetadata {
                notes: Some("adjective".to_string()),
                ..VocabularyMetadata::default()
            },
        )
        .await
        .expect("save");
    assert!(matches!(outcome, SaveOutcome::Saved(_)));
    first.close();

    let second = open(
        &backend,
        Arc::new(JsonFileVocabularyStore::new(&path)),
        Orientation::target(),
    )
    .await;
    let entry = second
        .vocabulary_index()
        .find_by_target_word("RÁPIDO")
        .cloned()
        .expect("entry");
    assert_eq!(entry.source_word, "fast");
    let metadata = entry.metadata.expect("metadata");
    assert_eq!(metadata.notes.as_deref(), Some("adjective"));
    assert!(metadata.saved_at.is_some());

    assert!(second.unsave(FAST).await.expect("unsave"));
    assert!(second.vocabulary_index().is_empty());
}

#[tokio::test]
async fn flipping_orientation_keeps_menu_and_translation() {
    let backend = ScriptedBackend::new();
    let session = open(
        &backend,
        Arc::new(MemoryVocabularyStore::new()),
        Orientation::source(),
    )
    .await;

    assert!(session.toggle_menu(DOG));
    assert_eq!(session.translate(DOG).await.as_deref(), Some("perro"));
    session.set_display_source(false);

    let state = session.word_state(DOG).expect("word");
    assert!(state.menu_open);
    assert_eq!(state.phase, TranslationPhase::Translated);
    assert_eq!(session.translation_at(DOG).as_deref(), Some("dog"));
    assert_eq!(session.translate(DOG).await.as_deref(), Some("dog"));
    assert_eq!(backend.word_calls(), 1);
    assert_eq!(session.orientation().displayed_side(), Side::Target);
}
