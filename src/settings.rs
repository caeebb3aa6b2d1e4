use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub display_source: bool,
    pub model: Option<String>,
    /// OpenAI-compatible endpoint; `OPENAI_BASE_URL` or the public API when unset.
    pub base_url: Option<String>,
    pub vocabulary_path: PathBuf,
    pub language_ids: HashMap<String, u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
            display_source: true,
            model: None,
            base_url: None,
            vocabulary_path: paths::default_vocabulary_path(),
            language_ids: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    reader: Option<ReaderSettings>,
    translation: Option<TranslationSettings>,
    vocabulary: Option<VocabularySettings>,
    languages: Option<LanguageSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ReaderSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
    display_source: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    model: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VocabularySettings {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageSettings {
    ids: Option<HashMap<String, u32>>,
}

/// Merges every settings file found, later files winning field by field.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(base) = paths::base_dir() {
        ordered_paths.push(base.join("settings.toml"));
        ordered_paths.push(base.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(reader) = incoming.reader {
            if let Some(lang) = non_blank(reader.source_lang) {
                self.source_lang = lang;
            }
            if let Some(lang) = non_blank(reader.target_lang) {
                self.target_lang = lang;
            }
            if let Some(display_source) = reader.display_source {
                self.display_source = display_source;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(model) = non_blank(translation.model) {
                self.model = Some(model);
            }
            if let Some(base_url) = non_blank(translation.base_url) {
                self.base_url = Some(base_url);
            }
        }
        if let Some(path) = incoming
            .vocabulary
            .and_then(|v| v.path)
            .and_then(|path| paths::normalize_dir(&path))
        {
            self.vocabulary_path = path;
        }
        if let Some(ids) = incoming.languages.and_then(|l| l.ids) {
            self.language_ids.extend(ids);
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(base) = paths::base_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&base)
        .with_context(|| format!("failed to create settings directory: {}", base.display()))?;
    let path = base.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
