use super::Rect;

/// A piece of text: either a word or the whitespace between words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Word(&'a str),
    Space(&'a str),
}

impl<'a> Token<'a> {
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        match self {
            Token::Word(s) | Token::Space(s) => *s,
        }
    }
}

/// Split text into alternating word and whitespace tokens.
///
/// Concatenating the tokens reproduces the input exactly, so a renderer can
/// wrap each word without disturbing spacing.
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (idx, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev != is_space => {
                tokens.push(make_token(&text[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        in_space = Some(is_space);
    }
    if let Some(prev) = in_space {
        tokens.push(make_token(&text[start..], prev));
    }
    tokens
}

fn make_token(s: &str, is_space: bool) -> Token<'_> {
    if is_space { Token::Space(s) } else { Token::Word(s) }
}

/// A rendered word with its bounding box and highlight state.
#[derive(Debug, Clone, PartialEq)]
pub struct WordSpan {
    pub index: usize,
    pub text: String,
    pub rect: Rect,
    pub highlighted: bool,
}

impl WordSpan {
    #[must_use]
    pub fn new(index: usize, text: impl Into<String>, rect: Rect) -> Self {
        Self {
            index,
            text: text.into(),
            rect,
            highlighted: false,
        }
    }
}
