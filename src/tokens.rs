use serde::{Deserialize, Serialize};

/// Which language of the parallel text a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    pub fn parse(value: &str) -> Option<Side> {
        match value.trim().to_lowercase().as_str() {
            "source" | "src" => Some(Side::Source),
            "target" | "tgt" => Some(Side::Target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordToken {
    pub source_word: String,
    pub source_lemma: String,
    pub target_word: String,
    pub target_lemma: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl WordToken {
    pub fn new(
        source_word: impl Into<String>,
        source_lemma: impl Into<String>,
        target_word: impl Into<String>,
        target_lemma: impl Into<String>,
    ) -> Self {
        Self {
            source_word: source_word.into(),
            source_lemma: source_lemma.into(),
            target_word: target_word.into(),
            target_lemma: target_lemma.into(),
            part_of_speech: None,
            difficulty: None,
            definition: None,
        }
    }

    pub fn word(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_word,
            Side::Target => &self.target_word,
        }
    }

    /// Lemma on `side`, falling back to the surface word when the upstream
    /// generator left it blank.
    pub fn lemma(&self, side: Side) -> &str {
        let lemma = match side {
            Side::Source => &self.source_lemma,
            Side::Target => &self.target_lemma,
        };
        if lemma.trim().is_empty() {
            self.word(side)
        } else {
            lemma
        }
    }
}

/// One atomic unit of the displayed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Token {
    Word(WordToken),
    Punctuation { value: String },
    Whitespace { value: String },
}

impl Token {
    pub fn word(
        source_word: impl Into<String>,
        source_lemma: impl Into<String>,
        target_word: impl Into<String>,
        target_lemma: impl Into<String>,
    ) -> Self {
        Token::Word(WordToken::new(
            source_word,
            source_lemma,
            target_word,
            target_lemma,
        ))
    }

    pub fn punctuation(value: impl Into<String>) -> Self {
        Token::Punctuation {
            value: value.into(),
        }
    }

    pub fn whitespace(value: impl Into<String>) -> Self {
        Token::Whitespace {
            value: value.into(),
        }
    }

    /// Text of this token when the stream is read on `side`.
    pub fn text(&self, side: Side) -> &str {
        match self {
            Token::Word(word) => word.word(side),
            Token::Punctuation { value } => value,
            Token::Whitespace { value } => value,
        }
    }

    pub fn as_word(&self) -> Option<&WordToken> {
        match self {
            Token::Word(word) => Some(word),
            Token::Punctuation { .. } | Token::Whitespace { .. } => None,
        }
    }

    pub fn is_word(&self) -> bool {
        matches!(self, Token::Word(_))
    }
}

/// Per-token text of the stream on one side.
pub fn project(tokens: &[Token], side: Side) -> Vec<&str> {
    tokens.iter().map(|token| token.text(side)).collect()
}

/// Full text of one side; the concatenation of the projection.
pub fn full_text(tokens: &[Token], side: Side) -> String {
    tokens.iter().map(|token| token.text(side)).collect()
}

pub fn parse_tokens(raw: &str) -> anyhow::Result<Vec<Token>> {
    use anyhow::Context;
    serde_json::from_str(raw).with_context(|| "failed to parse token stream")
}
