use serde::Serialize;

use crate::cache::{TranslationCache, WordRequest};
use crate::sentence::BilingualSentences;
use crate::tokens::{Side, Token, WordToken};

/// A (source, target) pair in fixed direction, whatever side is on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalPair {
    pub source: String,
    pub target: String,
}

impl CanonicalPair {
    /// Both sides known. Saving requires this.
    pub fn is_complete(&self) -> bool {
        !self.source.trim().is_empty() && !self.target.trim().is_empty()
    }

    pub fn get(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }
}

/// Maps the displayed word and its opposite (if known) onto the fixed
/// source/target direction. An unknown opposite becomes `""`.
pub fn canonical_pair(
    displayed: &str,
    opposite: Option<&str>,
    displaying_source: bool,
) -> CanonicalPair {
    let displayed = displayed.to_string();
    let opposite = opposite.unwrap_or_default().to_string();
    if displaying_source {
        CanonicalPair {
            source: displayed,
            target: opposite,
        }
    } else {
        CanonicalPair {
            source: opposite,
            target: displayed,
        }
    }
}

/// Same inversion as [`canonical_pair`], applied to sentence context.
pub fn canonical_sentences(
    displayed_sentence: &str,
    opposite_sentence: Option<&str>,
    displaying_source: bool,
) -> CanonicalPair {
    canonical_pair(displayed_sentence, opposite_sentence, displaying_source)
}

/// Which side of the parallel text is currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    displaying_source: bool,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::source()
    }
}

impl Orientation {
    pub fn new(displaying_source: bool) -> Self {
        Self { displaying_source }
    }

    pub fn source() -> Self {
        Self::new(true)
    }

    pub fn target() -> Self {
        Self::new(false)
    }

    pub fn displaying_source(&self) -> bool {
        self.displaying_source
    }

    pub fn displayed_side(&self) -> Side {
        if self.displaying_source {
            Side::Source
        } else {
            Side::Target
        }
    }

    pub fn opposite_side(&self) -> Side {
        self.displayed_side().opposite()
    }

    pub fn flipped(self) -> Self {
        Self::new(!self.displaying_source)
    }

    pub fn canonical_pair(&self, displayed: &str, opposite: Option<&str>) -> CanonicalPair {
        canonical_pair(displayed, opposite, self.displaying_source)
    }
}

/// Fixed-direction view of one on-screen word and its sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalContext {
    pub position: usize,
    pub word: CanonicalPair,
    pub sentence: CanonicalPair,
    pub displayed_lemma: String,
    pub part_of_speech: Option<String>,
    pub difficulty: Option<String>,
    pub definition: Option<String>,
}

impl CanonicalContext {
    pub fn is_complete(&self) -> bool {
        self.word.is_complete()
    }
}

/// Builds the canonical context of the word at `position`.
///
/// The opposite word comes only from the translation cache; the opposite
/// sentence comes from the parallel stream, or from the sentence cache when
/// the stream has nothing on that side. Returns `None` for non-word positions.
pub fn resolve_context(
    tokens: &[Token],
    sentences: &BilingualSentences,
    position: usize,
    orientation: Orientation,
    cache: &TranslationCache,
) -> Option<CanonicalContext> {
    let token = tokens.get(position)?.as_word()?;
    let displayed = orientation.displayed_side();
    let opposite_word = opposite_word(token, position, orientation, cache);

    let displayed_sentence = sentences.sentence_at(displayed, position as i64);
    let parallel = sentences.sentence_at(orientation.opposite_side(), position as i64);
    let opposite_sentence = if parallel.is_empty() {
        cache.sentence_translation(displayed, displayed_sentence)
    } else {
        Some(parallel.to_string())
    };

    Some(CanonicalContext {
        position,
        word: orientation.canonical_pair(token.word(displayed), opposite_word.as_deref()),
        sentence: canonical_sentences(
            displayed_sentence,
            opposite_sentence.as_deref(),
            orientation.displaying_source(),
        ),
        displayed_lemma: token.lemma(displayed).to_string(),
        part_of_speech: token.part_of_speech.clone(),
        difficulty: token.difficulty.clone(),
        definition: token.definition.clone(),
    })
}

fn opposite_word(
    token: &WordToken,
    position: usize,
    orientation: Orientation,
    cache: &TranslationCache,
) -> Option<String> {
    let displayed = orientation.displayed_side();
    let request = WordRequest::for_token(token, displayed, position);
    if let Some(found) = cache.word_translation(&request.key) {
        return Some(found);
    }
    // Translated while the other side was shown: the token itself holds the word.
    let mirror = WordRequest::for_token(token, displayed.opposite(), position);
    cache.word_translation(&mirror.key).map(|_| mirror.word)
}
