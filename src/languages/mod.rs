use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::HashMap;

use crate::tokens::Side;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub code: String,
    pub id: u32,
}

/// The (source, target) language pair a reading session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: Language,
    pub target: Language,
}

impl LanguagePair {
    pub fn resolve(registry: &LanguageRegistry, source: &str, target: &str) -> Result<Self> {
        let source = registry.language(source)?;
        let target = registry.language(target)?;
        if source.id == target.id {
            return Err(anyhow!(
                "source and target language must differ (both '{}')",
                source.code
            ));
        }
        Ok(Self { source, target })
    }

    pub fn language(&self, side: Side) -> &Language {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }
}

/// Language code to numeric id lookup shared with the vocabulary store.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    ids: HashMap<String, u32>,
    names: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn load() -> Result<Self> {
        let raw = include_str!("language_ids.json");
        let parsed: LanguageData =
            serde_json::from_str(raw).with_context(|| "failed to parse language id data")?;
        let mut ids = HashMap::new();
        let mut names = HashMap::new();
        for (code, entry) in parsed.languages {
            let code = normalize_code(&code);
            ids.insert(code.clone(), entry.id);
            names.insert(code, entry.name);
        }
        Ok(LanguageRegistry { ids, names })
    }

    /// Adds or replaces ids, typically from the `[languages.ids]` settings table.
    pub fn with_overrides(mut self, overrides: &HashMap<String, u32>) -> Self {
        for (code, id) in overrides {
            self.ids.insert(normalize_code(code), *id);
        }
        self
    }

    pub fn id(&self, code: &str) -> Option<u32> {
        self.ids.get(&normalize_code(code)).copied()
    }

    pub fn name(&self, code: &str) -> Option<&str> {
        self.names.get(&normalize_code(code)).map(String::as_str)
    }

    pub fn language(&self, code: &str) -> Result<Language> {
        let normalized = normalize_code(code);
        let id = self
            .ids
            .get(&normalized)
            .copied()
            .ok_or_else(|| anyhow!("unknown language code '{}'", code.trim()))?;
        Ok(Language {
            code: normalized,
            id,
        })
    }

    /// Known codes with their ids, ordered by id.
    pub fn entries(&self) -> Vec<(String, u32)> {
        let mut entries = self
            .ids
            .iter()
            .map(|(code, id)| (code.clone(), *id))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct LanguageData {
    languages: HashMap<String, LanguageEntry>,
}

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    id: u32,
    name: String,
}
