//! Part number extraction.
//!
//! Grammar, applied line by line:
//!
//! ```text
//! entry       := PREFIX SEP* TOKEN description?
//!              | DESIGNATOR description?          ; only when enabled
//! PREFIX      := "p/n" | "pn" | "part no" | "part number" | "part #" | "item"
//!              | "item no" | "pos" | "pos." | "position" | "teil-nr" | "art.-nr"
//! SEP         := whitespace | ":" | "#" | "." | "="
//! TOKEN       := [alnum -_./]+ with a digit, or upper-case letters only
//!                after a part-number prefix (`P/N ABC-DEF`)
//! DESIGNATOR  := UPPER DIGIT{1,4}                  ; R1, C5, U12
//! description := rest of the line up to the next entry
//! ```
//!
//! A quantity clause inside the description (`Qty 4`, `Menge: 2`, `4x`,
//! `4 pcs`, `3 Stk`) is lifted out into [`PartNumber::quantity`].

use serde::{Deserialize, Serialize};

use super::lexer::{tokenize, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartNumber {
    pub number: String,
    pub description: Option<String>,
    pub quantity: Option<u32>,
}

/// Knobs for [`extract_part_numbers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartNumberOptions {
    /// Also accept bare reference designators (`R1`, `C5`). Off by default
    /// because they are too common in general prose.
    pub include_designators: bool,
}

/// Longest first so that `part no` wins over `part`.
const PREFIXES: &[&str] = &[
    "part number",
    "part no.",
    "part no",
    "part #",
    "teil-nr.",
    "teil-nr",
    "art.-nr.",
    "art.-nr",
    "item no.",
    "item no",
    "position",
    "p/n",
    "pos.",
    "item",
    "pos",
    "pn",
];

/// Prefixes that also start ordinary prose; their token needs a digit.
const COUNTING_PREFIXES: &[&str] = &["item no.", "item no", "position", "pos.", "item", "pos"];

const QUANTITY_WORDS: &[&str] = &["qty", "quantity", "menge", "anzahl"];
const QUANTITY_SUFFIXES: &[&str] = &["x", "pcs", "pc", "pieces", "stk", "stück", "off"];
const MAX_DESIGNATOR_DIGITS: usize = 4;

#[derive(Debug)]
struct Entry {
    /// Where the entry starts (prefix or designator).
    start: usize,
    /// End of the part number token.
    end: usize,
    number: String,
    designator: bool,
}

/// Extract part numbers from `text`, in order of appearance.
pub fn extract_part_numbers(text: &str, options: PartNumberOptions) -> Vec<PartNumber> {
    text.lines()
        .flat_map(|line| scan_line(line, options))
        .collect()
}

fn scan_line(line: &str, options: PartNumberOptions) -> Vec<PartNumber> {
    let mut entries = prefixed_entries(line);
    if options.include_designators {
        for designator in designator_entries(line) {
            let overlaps = entries
                .iter()
                .any(|e| designator.start < e.end && e.start < designator.end);
            if !overlaps {
                entries.push(designator);
            }
        }
        entries.sort_by_key(|e| e.start);
    }

    let mut parts = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let tail_end = entries.get(idx + 1).map_or(line.len(), |next| next.start);
        let tail = &line[entry.end..tail_end];

        // Designators in lists ("R1, R2") only get a description after an
        // explicit separator.
        let tail = if entry.designator {
            let trimmed = tail.trim_start();
            if trimmed.starts_with([':', '-', '–', '—', '=']) {
                trimmed
            } else {
                ""
            }
        } else {
            tail
        };

        let (description, quantity) = split_description(tail);
        parts.push(PartNumber {
            number: entry.number.clone(),
            description,
            quantity,
        });
    }
    parts
}

fn is_boundary_before(line: &str, at: usize) -> bool {
    line[..at]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

fn prefixed_entries(line: &str) -> Vec<Entry> {
    // ASCII lowercasing keeps byte offsets aligned with `line`.
    let lower = line.to_ascii_lowercase();
    let mut entries = Vec::new();
    let mut at = 0;

    'outer: while at < lower.len() {
        if !lower.is_char_boundary(at) || !is_boundary_before(line, at) {
            at += 1;
            continue;
        }
        for prefix in PREFIXES {
            if !lower[at..].starts_with(prefix) {
                continue;
            }
            let after_prefix = at + prefix.len();
            let prefix_ends_alnum = prefix.chars().last().is_some_and(|c| c.is_alphanumeric());
            let next_char = line[after_prefix..].chars().next();
            if prefix_ends_alnum && next_char.is_some_and(|c| c.is_alphanumeric()) {
                continue;
            }
            let needs_digit = COUNTING_PREFIXES.contains(prefix);
            if let Some((number, end)) = read_part_token(line, after_prefix, needs_digit) {
                entries.push(Entry {
                    start: at,
                    end,
                    number,
                    designator: false,
                });
                at = end;
                continue 'outer;
            }
        }
        at += 1;
    }
    entries
}

/// Skip separators after a prefix and read the part token.
fn read_part_token(line: &str, from: usize, needs_digit: bool) -> Option<(String, usize)> {
    let rest = &line[from..];
    let skipped = rest.len()
        - rest
            .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '#' | '.' | '='))
            .len();
    let start = from + skipped;

    let token_len: usize = line[start..]
        .chars()
        .take_while(|&c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        .map(char::len_utf8)
        .sum();
    let token = line[start..start + token_len].trim_end_matches(['-', '_', '.', '/']);

    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let upper_letters_only = token.chars().any(char::is_alphabetic)
        && !token.chars().any(char::is_lowercase);
    if token.is_empty() || !(has_digit || (!needs_digit && upper_letters_only)) {
        return None;
    }
    Some((token.to_string(), start + token.len()))
}

fn designator_entries(line: &str) -> Vec<Entry> {
    let bytes = line.as_bytes();
    let mut entries = Vec::new();
    let mut at = 0;
    while at < bytes.len() {
        if !bytes[at].is_ascii_uppercase() || !is_boundary_before(line, at) {
            at += 1;
            continue;
        }
        let digits = bytes[at + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let end = at + 1 + digits;
        let next = line[end..].chars().next();
        let decimal_follows = next == Some('.')
            && line[end + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());
        if (1..=MAX_DESIGNATOR_DIGITS).contains(&digits)
            && !next.is_some_and(|c| c.is_alphanumeric())
            && !decimal_follows
        {
            entries.push(Entry {
                start: at,
                end,
                number: line[at..end].to_string(),
                designator: true,
            });
            at = end;
        } else {
            at += 1;
        }
    }
    entries
}

/// Clean up the trailing text of an entry and lift out a quantity clause.
fn split_description(tail: &str) -> (Option<String>, Option<u32>) {
    let cleaned: String = tail.chars().filter(|c| !matches!(c, '*' | '`')).collect();
    let (remaining, quantity) = take_quantity(&cleaned);
    let description = collapse_whitespace(&remaining)
        .replace("( )", " ")
        .replace("()", " ");
    let description = collapse_whitespace(&description);
    let description = description
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, ':' | '-' | '–' | '—' | '|' | ',' | ';' | '=')
        })
        .to_string();
    ((!description.is_empty()).then_some(description), quantity)
}

/// Find the first quantity clause; return the text without it.
fn take_quantity(text: &str) -> (String, Option<u32>) {
    let tokens = tokenize(text);
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Word(w) if QUANTITY_WORDS.contains(&w.to_lowercase().as_str()) => {
                let mut k = i + 1;
                if tokens
                    .get(k)
                    .is_some_and(|t| t.is_symbol(':') || t.is_symbol('=') || t.is_symbol('.'))
                {
                    k += 1;
                }
                if let Some(qty) = tokens.get(k).and_then(|t| t.number()?.parse::<u32>().ok()) {
                    return (cut(text, token.start, tokens[k].end), Some(qty));
                }
            }
            TokenKind::Word(w) if w.eq_ignore_ascii_case("x") => {
                // "x4"
                if let Some(next) = tokens.get(i + 1).filter(|t| !t.spaced) {
                    if let Some(qty) = next.number().and_then(|n| n.parse::<u32>().ok()) {
                        return (cut(text, token.start, next.end), Some(qty));
                    }
                }
            }
            TokenKind::Number(n) => {
                // "4x", "4 pcs", "3 Stk"
                let Ok(qty) = n.parse::<u32>() else {
                    continue;
                };
                if let Some(unit) = tokens.get(i + 1) {
                    let is_suffix = unit
                        .word()
                        .is_some_and(|w| QUANTITY_SUFFIXES.contains(&w.to_lowercase().as_str()));
                    let glued_ok = !unit.spaced
                        || !unit.word().is_some_and(|w| w.eq_ignore_ascii_case("x"));
                    let ends_word = tokens
                        .get(i + 2)
                        .map_or(true, |t| t.spaced || !matches!(t.kind, TokenKind::Number(_)));
                    if is_suffix && glued_ok && ends_word {
                        return (cut(text, token.start, unit.end), Some(qty));
                    }
                }
            }
            _ => {}
        }
    }
    (text.to_string(), None)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cut(text: &str, start: usize, end: usize) -> String {
    format!("{} {}", &text[..start], &text[end..])
}
