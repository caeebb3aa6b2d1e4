#![allow(dead_code)]

use anyhow::anyhow;
use bilingual_reader::tokens::Token;
use bilingual_reader::{TranslationBackend, TranslationFuture};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// "The dog runs. It is fast." aligned with "El perro corre. Él es rápido."
pub fn dog_story() -> Vec<Token> {
    vec![
        Token::word("The", "the", "El", "el"),
        Token::whitespace(" "),
        Token::word("dog", "dog", "perro", "perro"),
        Token::whitespace(" "),
        Token::word("runs", "run", "corre", "correr"),
        Token::punctuation("."),
        Token::whitespace(" "),
        Token::word("It", "it", "Él", "él"),
        Token::whitespace(" "),
        Token::word("is", "be", "es", "ser"),
        Token::whitespace(" "),
        Token::word("fast", "fast", "rápido", "rápido"),
        Token::punctuation("."),
    ]
}

pub const DOG: usize = 2;
pub const FAST: usize = 11;

/// Backend answering from fixed tables and logging every request.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    words: HashMap<String, String>,
    sentences: HashMap<String, String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
            .word("dog", "perro")
            .word("perro", "dog")
            .word("fast", "rápido")
            .sentence("The dog runs.", "El perro corre.")
    }

    pub fn word(mut self, word: &str, translation: &str) -> Self {
        self.words.insert(word.to_string(), translation.to_string());
        self
    }

    pub fn sentence(mut self, sentence: &str, translation: &str) -> Self {
        self.sentences
            .insert(sentence.to_string(), translation.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn word_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("word:"))
            .count()
    }
}

impl TranslationBackend for ScriptedBackend {
    fn translate_sentence(&self, sentence: &str, from: &str, to: &str) -> TranslationFuture {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("sentence:{}:{}>{}", sentence, from, to));
        let result = self.sentences.get(sentence).cloned();
        Box::pin(async move { Ok(result) })
    }

    fn translate_word_in_sentence(
        &self,
        word: &str,
        sentence: &str,
        from: &str,
        to: &str,
    ) -> TranslationFuture {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("word:{}@{}:{}>{}", word, sentence, from, to));
        let result = self.words.get(word).cloned();
        Box::pin(async move {
            match result {
                Some(translation) => Ok(Some(translation)),
                None => Err(anyhow!("no scripted translation")),
            }
        })
    }
}
