use crate::tokens::{Side, Token};

const TERMINALS: [char; 3] = ['.', '!', '?'];

/// True when `text` ends a sentence: its last non-whitespace char is `.`, `!` or `?`.
pub fn is_sentence_boundary(text: &str) -> bool {
    text.trim_end()
        .ends_with(|ch: char| TERMINALS.contains(&ch))
}

/// Inclusive `[start, end]` token range of the sentence containing `position`.
///
/// Out-of-range positions search from the nearest end of the stream. Returns
/// `None` only for an empty stream.
pub fn sentence_bounds<S: AsRef<str>>(tokens: &[S], position: i64) -> Option<(usize, usize)> {
    let last = tokens.len().checked_sub(1)?;
    let position = position.clamp(0, last as i64) as usize;

    let start = tokens[..position]
        .iter()
        .rposition(|token| is_sentence_boundary(token.as_ref()))
        .map(|index| index + 1)
        .unwrap_or(0);
    let end = tokens[position..]
        .iter()
        .position(|token| is_sentence_boundary(token.as_ref()))
        .map(|offset| position + offset)
        .unwrap_or(last);
    Some((start, end))
}

/// Literal sentence text around `position` on one projection of the stream.
///
/// A span holding nothing but whitespace before its terminating boundary
/// (for example a position sitting between `.` and `!`) yields `""`.
pub fn extract_sentence<S: AsRef<str>>(tokens: &[S], position: i64) -> String {
    match sentence_bounds(tokens, position) {
        Some((start, end)) => render_span(&tokens[start..=end]),
        None => String::new(),
    }
}

/// Sentence around `position` on `side` of a token stream.
pub fn sentence_on_side(tokens: &[Token], side: Side, position: i64) -> String {
    let projected = crate::tokens::project(tokens, side);
    extract_sentence(&projected, position)
}

fn render_span<S: AsRef<str>>(span: &[S]) -> String {
    let body = match span.split_last() {
        Some((last, rest)) if is_sentence_boundary(last.as_ref()) => rest,
        _ => span,
    };
    if body.iter().all(|token| token.as_ref().trim().is_empty()) {
        return String::new();
    }
    let joined: String = span.iter().map(|token| token.as_ref()).collect();
    joined.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Precomputed sentence segmentation of one side of a stream.
///
/// Gives the same answers as [`extract_sentence`] without rescanning the
/// stream on every lookup.
#[derive(Debug, Clone)]
pub struct SentenceIndex {
    side: Side,
    spans: Vec<SentenceSpan>,
    span_of: Vec<usize>,
}

impl SentenceIndex {
    pub fn new(tokens: &[Token], side: Side) -> Self {
        let projected = crate::tokens::project(tokens, side);
        let mut spans = Vec::new();
        let mut span_of = Vec::with_capacity(projected.len());
        let mut start = 0usize;
        for (index, text) in projected.iter().enumerate() {
            span_of.push(spans.len());
            if is_sentence_boundary(text) {
                spans.push(SentenceSpan {
                    start,
                    end: index,
                    text: render_span(&projected[start..=index]),
                });
                start = index + 1;
            }
        }
        if start < projected.len() {
            let end = projected.len() - 1;
            spans.push(SentenceSpan {
                start,
                end,
                text: render_span(&projected[start..=end]),
            });
        }
        Self {
            side,
            spans,
            span_of,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn spans(&self) -> &[SentenceSpan] {
        &self.spans
    }

    pub fn span_at(&self, position: i64) -> Option<&SentenceSpan> {
        let last = self.span_of.len().checked_sub(1)?;
        let position = position.clamp(0, last as i64) as usize;
        self.spans.get(self.span_of[position])
    }

    pub fn sentence_at(&self, position: i64) -> &str {
        self.span_at(position)
            .map(|span| span.text.as_str())
            .unwrap_or("")
    }
}

/// Sentence indexes for both sides of one stream.
#[derive(Debug, Clone)]
pub struct BilingualSentences {
    source: SentenceIndex,
    target: SentenceIndex,
}

impl BilingualSentences {
    pub fn new(tokens: &[Token]) -> Self {
        Self {
            source: SentenceIndex::new(tokens, Side::Source),
            target: SentenceIndex::new(tokens, Side::Target),
        }
    }

    pub fn index(&self, side: Side) -> &SentenceIndex {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn sentence_at(&self, side: Side, position: i64) -> &str {
        self.index(side).sentence_at(position)
    }
}
