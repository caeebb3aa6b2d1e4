use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub mod backend;
pub mod cache;
pub mod interaction;
pub mod languages;
pub mod logging;
pub mod orientation;
mod paths;
mod providers;
pub mod sentence;
pub mod session;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod tokens;
mod translator;
pub mod vocabulary;

pub use backend::{TranslationBackend, TranslationFuture};
pub use providers::{OpenAI, Provider, ProviderFuture, ProviderResponse, ProviderUsage, ToolSpec};
pub use session::{ReadingSession, SaveOutcome};
pub use translator::Translator;

use languages::{LanguagePair, LanguageRegistry};
use orientation::{CanonicalContext, Orientation};
use settings::Settings;
use tokens::{Side, Token};
use vocabulary::{JsonFileVocabularyStore, VocabularyMetadata, VocabularyStore};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub tokens_path: Option<String>,
    pub position: i64,
    pub display: Option<String>,
    pub sentence: bool,
    pub save: bool,
    pub show_vocabulary: bool,
    pub show_languages: bool,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
}

impl Config {
    fn needs_tokens(&self) -> bool {
        !(self.show_languages || self.show_vocabulary)
    }

    fn needs_backend(&self) -> bool {
        self.needs_tokens() && !self.sentence
    }
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let translator = if config.needs_backend() {
        let key = providers::resolve_key(config.key.as_deref())
            .with_context(|| "no API key found for translation")?;
        let model = config
            .model
            .clone()
            .or_else(|| settings.model.clone())
            .unwrap_or_else(|| providers::DEFAULT_MODEL.to_string());
        let registry = registry_for(&settings)?;
        let mut provider = OpenAI::new(key).with_model(model);
        if let Some(base_url) = settings.base_url.as_deref() {
            provider = provider.with_base_url(base_url);
        }
        Some(Translator::new(provider, registry))
    } else {
        None
    };

    let backend = translator
        .clone()
        .map(|translator| Arc::new(translator) as Arc<dyn TranslationBackend>);
    let output = execute(config, &settings, backend, input).await;
    if let Some(translator) = translator {
        debug!("token usage: {:?}", translator.usage());
    }
    output
}

/// Runs one CLI command against already-loaded settings.
///
/// `backend` is only consulted by the translating commands.
pub async fn execute(
    config: Config,
    settings: &Settings,
    backend: Option<Arc<dyn TranslationBackend>>,
    input: Option<String>,
) -> Result<String> {
    let registry = registry_for(settings)?;
    if config.show_languages {
        return Ok(format_languages(&registry));
    }

    let source_lang = config.source_lang.as_deref().unwrap_or(&settings.source_lang);
    let target_lang = config.target_lang.as_deref().unwrap_or(&settings.target_lang);
    let languages = LanguagePair::resolve(&registry, source_lang, target_lang)?;
    let store: Arc<dyn VocabularyStore> =
        Arc::new(JsonFileVocabularyStore::new(&settings.vocabulary_path));

    if config.show_vocabulary {
        return show_vocabulary(store.as_ref(), &languages).await;
    }

    let tokens = load_tokens(config.tokens_path.as_deref(), input)?;
    let orientation = resolve_orientation(config.display.as_deref(), settings)?;

    if config.sentence {
        let sentences = sentence::BilingualSentences::new(&tokens);
        return Ok(sentences
            .sentence_at(orientation.displayed_side(), config.position)
            .to_string());
    }

    let position = usize::try_from(config.position)
        .map_err(|_| anyhow!("position must not be negative (got {})", config.position))?;
    let backend = backend.ok_or_else(|| anyhow!("no translation backend configured"))?;
    let session = ReadingSession::open(tokens, languages, backend, store, orientation).await?;

    let output = if config.save {
        save_word(&session, position).await
    } else {
        translate_word(&session, position).await
    };
    session.close();
    output
}

fn registry_for(settings: &Settings) -> Result<LanguageRegistry> {
    Ok(LanguageRegistry::load()?.with_overrides(&settings.language_ids))
}

fn load_tokens(path: Option<&str>, input: Option<String>) -> Result<Vec<Token>> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read tokens: {}", path))?,
        None => input.unwrap_or_default(),
    };
    if raw.trim().is_empty() {
        return Err(anyhow!("no tokens given (use --tokens or stdin)"));
    }
    tokens::parse_tokens(&raw)
}

fn resolve_orientation(display: Option<&str>, settings: &Settings) -> Result<Orientation> {
    let Some(display) = display else {
        return Ok(Orientation::new(settings.display_source));
    };
    match Side::parse(display) {
        Some(side) => Ok(Orientation::new(side == Side::Source)),
        None => Err(anyhow!(
            "invalid --display value '{}' (expected source or target)",
            display
        )),
    }
}

async fn translate_word(session: &ReadingSession, position: usize) -> Result<String> {
    session.translate(position).await;
    let context = session
        .canonical_context(position)
        .ok_or_else(|| anyhow!("no word at position {}", position))?;
    let saved = session
        .word_state(position)
        .map(|state| state.saved)
        .unwrap_or(false);
    Ok(format_context(&context, saved))
}

async fn save_word(session: &ReadingSession, position: usize) -> Result<String> {
    match session.save(position, VocabularyMetadata::default()).await? {
        SaveOutcome::Saved(entry) => Ok(format!(
            "saved: {} -> {}",
            entry.source_word, entry.target_word
        )),
        SaveOutcome::AlreadySaved(entry) => Ok(format!(
            "already saved: {} -> {}",
            entry.source_word, entry.target_word
        )),
        SaveOutcome::TranslationUnavailable => Err(anyhow!(
            "translation unavailable for position {}; nothing saved",
            position
        )),
        SaveOutcome::NotAWord => Err(anyhow!("no word at position {}", position)),
    }
}

async fn show_vocabulary(store: &dyn VocabularyStore, languages: &LanguagePair) -> Result<String> {
    let entries = store.list().await?;
    let lines = entries
        .iter()
        .filter(|entry| {
            entry.source_language_id == languages.source.id
                && entry.target_language_id == languages.target.id
        })
        .map(|entry| format!("{}\t{}", entry.source_word, entry.target_word))
        .collect::<Vec<_>>();
    Ok(lines.join("\n"))
}

fn format_languages(registry: &LanguageRegistry) -> String {
    registry
        .entries()
        .into_iter()
        .map(|(code, id)| {
            let name = registry.name(&code).unwrap_or("-");
            format!("{}\t{}\t{}", code, id, name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_context(context: &CanonicalContext, saved: bool) -> String {
    let show = |value: &str| {
        if value.is_empty() {
            "(unavailable)".to_string()
        } else {
            value.to_string()
        }
    };
    let mut lines = vec![
        format!("source word: {}", show(&context.word.source)),
        format!("target word: {}", show(&context.word.target)),
        format!("source sentence: {}", show(&context.sentence.source)),
        format!("target sentence: {}", show(&context.sentence.target)),
    ];
    if let Some(pos) = context.part_of_speech.as_deref() {
        lines.push(format!("part of speech: {}", pos));
    }
    if let Some(definition) = context.definition.as_deref() {
        lines.push(format!("definition: {}", definition));
    }
    lines.push(format!("saved: {}", if saved { "yes" } else { "no" }));
    lines.join("\n")
}
