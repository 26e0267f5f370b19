//! Shared tokenizer for the text extractors.
//!
//! Splits model output into a flat token stream (numbers, words, single
//! symbols, line breaks). Whitespace is not emitted as a token; instead
//! every token records whether whitespace preceded it, which is what the
//! grammars need to tell `R5` (radius) from `R 5`.

/// Diameter signs. Always a `Symbol`, even though `Ø` is also a letter.
pub const DIAMETER_MARKS: &[char] = &['Ø', '∅', '⌀'];

fn is_word_char(c: char) -> bool {
    c.is_alphabetic() && !DIAMETER_MARKS.contains(&c)
}

/// Token classes recognised by the extractor grammars.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    /// Digits with at most one decimal separator (`.` or `,`) between digits.
    Number(&'a str),
    /// A run of alphabetic characters.
    Word(&'a str),
    /// Any other single non-whitespace character.
    Symbol(char),
    Newline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// Whether horizontal whitespace separated this token from the previous one.
    pub spaced: bool,
}

impl Token<'_> {
    pub fn is_symbol(&self, c: char) -> bool {
        self.kind == TokenKind::Symbol(c)
    }

    pub fn number(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn word(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }
}

/// Tokenize `text` in a single pass.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut spaced = false;

    while let Some((start, c)) = chars.next() {
        if c == '\n' {
            tokens.push(Token {
                kind: TokenKind::Newline,
                start,
                end: start + 1,
                spaced,
            });
            spaced = false;
            continue;
        }
        if c.is_whitespace() {
            spaced = true;
            continue;
        }

        let kind = if c.is_ascii_digit() {
            let mut end = start + c.len_utf8();
            let mut seen_separator = false;
            while let Some(&(i, next)) = chars.peek() {
                if next.is_ascii_digit() {
                    chars.next();
                    end = i + next.len_utf8();
                } else if (next == '.' || next == ',') && !seen_separator {
                    // A separator only belongs to the number when a digit follows it.
                    let after = text[i + 1..].chars().next();
                    if after.is_some_and(|a| a.is_ascii_digit()) {
                        seen_separator = true;
                        chars.next();
                        end = i + 1;
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
            TokenKind::Number(&text[start..end])
        } else if is_word_char(c) {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if is_word_char(next) {
                    chars.next();
                    end = i + next.len_utf8();
                } else {
                    break;
                }
            }
            TokenKind::Word(&text[start..end])
        } else {
            TokenKind::Symbol(c)
        };

        let end = match kind {
            TokenKind::Number(n) | TokenKind::Word(n) => start + n.len(),
            _ => start + c.len_utf8(),
        };
        tokens.push(Token {
            kind,
            start,
            end,
            spaced,
        });
        spaced = false;
    }

    tokens
}
