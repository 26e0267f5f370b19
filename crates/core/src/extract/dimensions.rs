//! Dimension extraction.
//!
//! Grammar (over [`lexer`](super::lexer) tokens, one pass, no backtracking
//! beyond a single candidate):
//!
//! ```text
//! dimension  := diameter | radius | angular | linear | toleranced
//! diameter   := ("Ø" | "∅" | "⌀") NUMBER unit? tolerance?
//!             | DIAMETER_WORD ":"? NUMBER unit? tolerance?
//! radius     := "R" NUMBER unit? tolerance?      ; "R" glued to the number
//!             | "radius" ":"? NUMBER unit? tolerance?
//! angular    := NUMBER "°" tolerance?
//! linear     := NUMBER unit tolerance?
//! toleranced := NUMBER tolerance                  ; no unit, no marker -> unknown
//! tolerance  := ("±" | "+" "/" "-") NUMBER unit?
//!             | "+" NUMBER ("/"? "-") NUMBER unit?
//! ```
//!
//! Numbers glued to a preceding word or number (`M8`, `DIN912`) are not
//! dimensions. A bare number with nothing after it is ignored.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::lexer::{tokenize, Token, TokenKind, DIAMETER_MARKS};

/// Kind of measurement a [`Dimension`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    Linear,
    Diameter,
    Radius,
    Angular,
    Unknown,
}

/// A measurement found in model output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    /// The numeric part exactly as written (`"25"`, `"0,5"`).
    pub value: String,
    pub dimension_type: DimensionType,
    pub unit: Option<String>,
    pub tolerance: Option<String>,
}

impl fmt::Display for Dimension {
    /// Canonical rendering; extracting from it reproduces the same fields.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimension_type {
            DimensionType::Diameter => write!(f, "Ø{}", self.value)?,
            DimensionType::Radius => write!(f, "R{}", self.value)?,
            _ => write!(f, "{}", self.value)?,
        }
        if let Some(unit) = &self.unit {
            if is_glued_unit(unit) {
                write!(f, "{unit}")?;
            } else {
                write!(f, " {unit}")?;
            }
        }
        if let Some(tolerance) = &self.tolerance {
            write!(f, " {tolerance}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Token classes
// ---------------------------------------------------------------------------

const DIAMETER_WORDS: &[&str] = &["diameter", "durchmesser", "dia"];
const RADIUS_WORDS: &[&str] = &["radius"];

const LENGTH_UNITS: &[&str] = &[
    "mm", "cm", "dm", "m", "µm", "μm", "um", "in", "inch", "inches", "ft",
];
/// Units too ambiguous to accept when separated from the number by a space.
const GLUED_ONLY_UNITS: &[&str] = &["m", "in"];
const SYMBOL_UNITS: &[char] = &['"', '″', '\'', '′'];

fn is_glued_unit(unit: &str) -> bool {
    GLUED_ONLY_UNITS.contains(&unit)
        || (unit.chars().count() == 1 && !unit.chars().all(char::is_alphabetic))
}

fn canonical_unit(raw: &str) -> String {
    match raw {
        "inch" | "inches" => "in".to_string(),
        "μm" | "um" => "µm".to_string(),
        "″" => "\"".to_string(),
        "′" => "'".to_string(),
        other => other.to_string(),
    }
}

/// Whole-word match, plus suffix match for long German compounds
/// (`Außendurchmesser`).
fn is_keyword(word: &str, family: &[&str]) -> bool {
    let lower = word.to_lowercase();
    family
        .iter()
        .any(|kw| lower == *kw || (kw.len() > 6 && lower.ends_with(kw)))
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Extract every dimension in `text`, in order of appearance.
pub fn extract_dimensions(text: &str) -> Vec<Dimension> {
    let tokens = tokenize(text);
    let mut dimensions = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match scan_dimension(&tokens, i) {
            Some((dimension, next)) => {
                dimensions.push(dimension);
                i = next;
            }
            None => i += 1,
        }
    }
    dimensions
}

/// Drop repeats sharing `(value, dimension_type, unit)`, keeping the first.
pub fn dedup_dimensions(dimensions: Vec<Dimension>) -> Vec<Dimension> {
    let mut seen = HashSet::new();
    dimensions
        .into_iter()
        .filter(|d| seen.insert((d.value.clone(), d.dimension_type, d.unit.clone())))
        .collect()
}

/// Try to read one dimension starting at `i`. Returns it with the index of
/// the first token after it.
fn scan_dimension(tokens: &[Token<'_>], i: usize) -> Option<(Dimension, usize)> {
    let token = &tokens[i];
    let (marker, number_at) = match token.kind {
        TokenKind::Symbol(c) if DIAMETER_MARKS.contains(&c) => {
            (Some(DimensionType::Diameter), number_after_marker(tokens, i + 1)?)
        }
        TokenKind::Word(w) if is_keyword(w, DIAMETER_WORDS) => {
            (Some(DimensionType::Diameter), number_after_keyword(tokens, i + 1)?)
        }
        TokenKind::Word(w) if is_keyword(w, RADIUS_WORDS) => {
            (Some(DimensionType::Radius), number_after_keyword(tokens, i + 1)?)
        }
        TokenKind::Word("R") => {
            let next = tokens.get(i + 1)?;
            if next.spaced || next.number().is_none() || glued_to_previous(tokens, i) {
                return None;
            }
            (Some(DimensionType::Radius), i + 1)
        }
        TokenKind::Number(_) => {
            if glued_to_previous(tokens, i) {
                return None;
            }
            (None, i)
        }
        _ => return None,
    };

    let value = tokens[number_at].number()?.to_string();
    let mut next = number_at + 1;

    let (mut dimension_type, mut unit) = match marker {
        Some(kind) => {
            let unit = parse_unit(tokens, next).map(|(u, after)| {
                next = after;
                u
            });
            (kind, unit)
        }
        None => {
            if tokens.get(next).is_some_and(|t| t.is_symbol('°')) {
                next += 1;
                (DimensionType::Angular, Some("°".to_string()))
            } else if let Some((u, after)) = parse_unit(tokens, next) {
                next = after;
                (DimensionType::Linear, Some(u))
            } else {
                (DimensionType::Unknown, None)
            }
        }
    };

    let tolerance = match parse_tolerance(tokens, next) {
        Some((text, tolerance_unit, after)) => {
            next = after;
            if unit.is_none() {
                if let Some(u) = tolerance_unit {
                    if dimension_type == DimensionType::Unknown {
                        dimension_type = if u == "°" {
                            DimensionType::Angular
                        } else {
                            DimensionType::Linear
                        };
                    }
                    unit = Some(u);
                }
            }
            Some(text)
        }
        None => None,
    };

    // A bare number needs at least a tolerance to count.
    if dimension_type == DimensionType::Unknown && tolerance.is_none() {
        return None;
    }

    Some((
        Dimension {
            value,
            dimension_type,
            unit,
            tolerance,
        },
        next,
    ))
}

/// Whether token `i` touches a preceding word or number with no space.
fn glued_to_previous(tokens: &[Token<'_>], i: usize) -> bool {
    if i == 0 || tokens[i].spaced {
        return false;
    }
    matches!(
        tokens[i - 1].kind,
        TokenKind::Word(_) | TokenKind::Number(_)
    )
}

fn number_after_marker(tokens: &[Token<'_>], at: usize) -> Option<usize> {
    tokens.get(at)?.number().map(|_| at)
}

fn number_after_keyword(tokens: &[Token<'_>], mut at: usize) -> Option<usize> {
    if tokens
        .get(at)
        .is_some_and(|t| t.is_symbol(':') || t.is_symbol('='))
    {
        at += 1;
    }
    number_after_marker(tokens, at)
}

fn parse_unit(tokens: &[Token<'_>], at: usize) -> Option<(String, usize)> {
    let token = tokens.get(at)?;
    match token.kind {
        TokenKind::Word(w) => {
            let lower = w.to_lowercase();
            if !LENGTH_UNITS.contains(&lower.as_str()) {
                return None;
            }
            if token.spaced && GLUED_ONLY_UNITS.contains(&lower.as_str()) {
                return None;
            }
            Some((canonical_unit(&lower), at + 1))
        }
        TokenKind::Symbol(c) if SYMBOL_UNITS.contains(&c) && !token.spaced => {
            Some((canonical_unit(&c.to_string()), at + 1))
        }
        _ => None,
    }
}

/// Parse a tolerance suffix. Returns the normalized text (`±0.1`,
/// `+0.2/-0.1`), an optional unit written after it, and the next index.
fn parse_tolerance(tokens: &[Token<'_>], at: usize) -> Option<(String, Option<String>, usize)> {
    let first = tokens.get(at)?;
    let (text, mut next) = if first.is_symbol('±') {
        let n = tokens.get(at + 1)?.number()?;
        (format!("±{n}"), at + 2)
    } else if first.is_symbol('+') {
        let second = tokens.get(at + 1)?;
        if second.is_symbol('/') {
            // "+/-0.1"
            if !tokens.get(at + 2)?.is_symbol('-') {
                return None;
            }
            let n = tokens.get(at + 3)?.number()?;
            (format!("±{n}"), at + 4)
        } else {
            let upper = second.number()?;
            let mut k = at + 2;
            if tokens.get(k).is_some_and(|t| t.is_symbol('/')) {
                k += 1;
            }
            if !tokens.get(k).is_some_and(|t| t.is_symbol('-')) {
                return None;
            }
            let lower = tokens.get(k + 1)?.number()?;
            (format!("+{upper}/-{lower}"), k + 2)
        }
    } else {
        return None;
    };

    let unit = if tokens.get(next).is_some_and(|t| t.is_symbol('°')) {
        next += 1;
        Some("°".to_string())
    } else if let Some((u, after)) = parse_unit(tokens, next) {
        next = after;
        Some(u)
    } else {
        None
    };

    Some((text, unit, next))
}
