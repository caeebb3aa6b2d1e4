use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "BILINGUAL_READER_DIR";
const DEFAULT_DIR_NAME: &str = ".bilingual-reader";

/// Directory holding user settings and the vocabulary file.
pub(crate) fn base_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    home_join(DEFAULT_DIR_NAME)
}

pub(crate) fn default_vocabulary_path() -> PathBuf {
    base_dir()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR_NAME))
        .join("vocabulary.json")
}

/// Expands `~` and drops redundant separators.
pub(crate) fn normalize_dir(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_tilde(trimmed);
    Some(normalize_path(PathBuf::from(expanded)))
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV)
        .ok()
        .and_then(|value| normalize_dir(&value))
}

fn home_join(suffix: &str) -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(suffix))
        }
    })
}

fn normalize_path(path: PathBuf) -> PathBuf {
    path.components().collect()
}

fn expand_tilde(value: &str) -> String {
    if (value == "~" || value.starts_with("~/"))
        && let Ok(home) = std::env::var("HOME")
    {
        let home = home.trim();
        if !home.is_empty() {
            return format!("{}{}", home, &value[1..]);
        }
    }
    value.to_string()
}
