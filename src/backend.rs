use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

pub type TranslationFuture = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send>>;

/// The translation service a reading session consumes.
///
/// `Ok(None)` and `Err(_)` both mean "no translation available"; the cache
/// treats them the same way and never stores a result for either.
pub trait TranslationBackend: Send + Sync {
    fn translate_sentence(&self, sentence: &str, from: &str, to: &str) -> TranslationFuture;

    fn translate_word_in_sentence(
        &self,
        word: &str,
        sentence: &str,
        from: &str,
        to: &str,
    ) -> TranslationFuture;
}

/// Treats blank translations as missing.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
