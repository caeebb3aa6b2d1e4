use serde::Serialize;
use std::collections::HashSet;

use crate::vocabulary::normalize_word;

/// Identity of a word in the text: its normalized source-side form plus,
/// when known, its position. The same on both display orientations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenId {
    pub word: String,
    pub position: Option<usize>,
}

impl TokenId {
    pub fn new(word: &str, position: Option<usize>) -> Self {
        Self {
            word: normalize_word(word),
            position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationPhase {
    Idle,
    Translating,
    Translated,
}

/// Everything a renderer needs to draw one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WordState {
    pub phase: TranslationPhase,
    pub menu_open: bool,
    pub saved: bool,
}

/// What the translation cache and vocabulary index report for one word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedWord {
    pub in_flight: bool,
    pub translated: bool,
    pub saved_in_index: bool,
}

/// Per-word UI state for one rendered text block.
///
/// Translation progress comes from the cache; this only adds what the cache
/// cannot know: which menu has focus, which translations this block started,
/// and saves not yet reflected by a rebuilt vocabulary index.
#[derive(Debug, Clone, Default)]
pub struct WordInteractions {
    open_menu: Option<TokenId>,
    translating: HashSet<TokenId>,
    saved: HashSet<TokenId>,
}

impl WordInteractions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_menu(&self) -> Option<&TokenId> {
        self.open_menu.as_ref()
    }

    pub fn is_menu_open(&self, id: &TokenId) -> bool {
        self.open_menu.as_ref() == Some(id)
    }

    /// Opens the menu of `id`, closing any other; closes it if it was already open.
    /// Returns whether the menu of `id` is now open.
    pub fn toggle_menu(&mut self, id: TokenId) -> bool {
        if self.is_menu_open(&id) {
            self.open_menu = None;
            false
        } else {
            self.open_menu = Some(id);
            true
        }
    }

    pub fn close_menu(&mut self) {
        self.open_menu = None;
    }

    /// `Idle -> Translating`. False when `id` is already translating.
    pub fn begin_translation(&mut self, id: &TokenId) -> bool {
        self.translating.insert(id.clone())
    }

    pub fn finish_translation(&mut self, id: &TokenId) {
        self.translating.remove(id);
    }

    pub fn is_translating(&self, id: &TokenId) -> bool {
        self.translating.contains(id)
    }

    pub fn mark_saved(&mut self, id: TokenId) {
        self.saved.insert(id);
    }

    pub fn forget_saved(&mut self, id: &TokenId) {
        self.saved.remove(id);
    }

    /// Drops optimistic saves once the vocabulary index has been rebuilt.
    pub fn clear_saved(&mut self) {
        self.saved.clear();
    }

    pub fn state(&self, id: &TokenId, observed: ObservedWord) -> WordState {
        let phase = if observed.in_flight || self.translating.contains(id) {
            TranslationPhase::Translating
        } else if observed.translated {
            TranslationPhase::Translated
        } else {
            TranslationPhase::Idle
        };
        WordState {
            phase,
            menu_open: self.is_menu_open(id),
            saved: observed.saved_in_index || self.saved.contains(id),
        }
    }
}
