//! Label classification for grounded elements.
//!
//! The model only supplies a free-text label for each box; the element type
//! shown to users is derived here with a fixed keyword priority so that a
//! label mixing several families (e.g. "section view showing Ø25") lands in
//! the first family that matches.

use serde::{Deserialize, Serialize};

use crate::extract::dimensions::extract_dimensions;

/// Semantic category of a detected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Dimension,
    PartNumber,
    Table,
    Title,
    View,
    Text,
    Image,
}

// ---------------------------------------------------------------------------
// Keyword families
// ---------------------------------------------------------------------------

const VIEW_WORDS: &[&str] = &[
    "view",
    "views",
    "front",
    "side",
    "top",
    "rear",
    "section",
    "sectional",
    "detail",
    "isometric",
    "iso",
    "elevation",
    "projection",
];
/// Matched as substrings to catch German compounds (Vorderansicht, Schnitt A-A).
const VIEW_FRAGMENTS: &[&str] = &["ansicht", "schnitt", "draufsicht", "einzelheit", "isometrie"];

const DIMENSION_SYMBOLS: &[char] = &['Ø', '∅', '⌀', '±', '°'];
const DIMENSION_WORDS: &[&str] = &[
    "dimension",
    "dimensions",
    "diameter",
    "radius",
    "tolerance",
    "length",
    "width",
    "height",
    "thickness",
    "maß",
    "maße",
    "durchmesser",
    "toleranz",
    "länge",
    "breite",
    "höhe",
    "dicke",
];

const PART_WORDS: &[&str] = &[
    "part",
    "item",
    "pos",
    "position",
    "pn",
    "teil",
    "teilenummer",
    "artikel",
    "sachnummer",
];
const PART_PHRASES: &[&str] = &["p/n", "part no", "teil-nr", "art.-nr"];

const TABLE_WORDS: &[&str] = &[
    "table",
    "tabelle",
    "bom",
    "qty",
    "quantity",
    "stückliste",
    "stueckliste",
];
const TABLE_PHRASES: &[&str] = &["bill of materials", "parts list"];

const TITLE_WORDS: &[&str] = &[
    "title",
    "titel",
    "drawing",
    "dwg",
    "revision",
    "rev",
    "sheet",
    "blatt",
    "scale",
    "maßstab",
    "zeichnungsnummer",
    "zeichnung",
    "schriftfeld",
];

const IMAGE_LABELS: &[&str] = &["image", "figure", "picture", "photo", "bild", "abbildung", "logo"];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify a free-text label into exactly one [`ElementType`].
///
/// Total and deterministic: every input, including the empty string, maps
/// to one type.
pub fn classify(label: &str) -> ElementType {
    let lower = label.trim().to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_word = |family: &[&str]| words.iter().any(|w| family.contains(w));
    let has_fragment = |family: &[&str]| family.iter().any(|f| lower.contains(f));

    if has_word(VIEW_WORDS) || has_fragment(VIEW_FRAGMENTS) {
        return ElementType::View;
    }
    if label.contains(DIMENSION_SYMBOLS)
        || has_word(DIMENSION_WORDS)
        || !extract_dimensions(label).is_empty()
    {
        return ElementType::Dimension;
    }
    if has_word(PART_WORDS) || has_fragment(PART_PHRASES) {
        return ElementType::PartNumber;
    }
    if has_word(TABLE_WORDS) || has_fragment(TABLE_PHRASES) {
        return ElementType::Table;
    }
    if has_word(TITLE_WORDS) {
        return ElementType::Title;
    }
    if IMAGE_LABELS.contains(&lower.as_str()) {
        return ElementType::Image;
    }
    ElementType::Text
}
