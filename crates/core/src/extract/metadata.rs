//! Title-block metadata (title, drawing number, revision, scale).
//!
//! Answers usually restate the title block as `Key: value` lines, possibly
//! wrapped in markdown emphasis, in English or German.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingMetadata {
    pub title: Option<String>,
    pub drawing_number: Option<String>,
    pub revision: Option<String>,
    pub scale: Option<String>,
}

impl DrawingMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.drawing_number.is_none()
            && self.revision.is_none()
            && self.scale.is_none()
    }
}

/// `Title: ...` at the start of a line; the value runs to the end of the line.
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[\s*#>|-]*(?:drawing\s+title|title|titel|bezeichnung|benennung)\s*\**\s*[:=]\s*\**\s*(.+?)[\s*|]*$",
    )
    .expect("valid regex")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:drawing\s*(?:no\b\.?|number\b|nr\b\.?|#)|dwg\b\.?\s*(?:no\b\.?|#)?|zeichnungs-?(?:nummer\b|nr\b\.?))\s*\**\s*[:#=]?\s*\**\s*([A-Z0-9][A-Z0-9._/-]*)",
    )
    .expect("valid regex")
});

static REVISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:revision\b|rev\b\.?|änderungsindex\b|index\b)\s*\**\s*[:#=]?\s*\**\s*([A-Z0-9]{1,4})\b",
    )
    .expect("valid regex")
});

static SCALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:scale|maßstab|massstab)\b\s*\**\s*[:=]?\s*\**\s*(\d+(?:[.,]\d+)?\s*:\s*\d+(?:[.,]\d+)?)",
    )
    .expect("valid regex")
});

/// Scan `text` for title-block fields. The first plausible match per field wins.
pub fn extract_metadata(text: &str) -> DrawingMetadata {
    let title = TITLE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());

    let drawing_number = NUMBER_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-', '/', '_']).to_string())
        .find(|n| n.chars().any(|c| c.is_ascii_digit()));

    let revision = REVISION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase());

    let scale = SCALE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<String>());

    DrawingMetadata {
        title,
        drawing_number,
        revision,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_title_block() {
        let text = "## Title block\n\n\
                    - **Title:** Flange DN50\n\
                    - **Drawing No.:** FL-2024-017\n\
                    - **Revision:** C\n\
                    - **Scale:** 1 : 2\n";
        let meta = extract_metadata(text);
        assert_eq!(meta.title.as_deref(), Some("Flange DN50"));
        assert_eq!(meta.drawing_number.as_deref(), Some("FL-2024-017"));
        assert_eq!(meta.revision.as_deref(), Some("C"));
        assert_eq!(meta.scale.as_deref(), Some("1:2"));
    }

    #[test]
    fn german_title_block() {
        let text = "Benennung: Lagerdeckel\nZeichnungsnummer: 4711-200\nÄnderungsindex: b\nMaßstab 1:5";
        let meta = extract_metadata(text);
        assert_eq!(meta.title.as_deref(), Some("Lagerdeckel"));
        assert_eq!(meta.drawing_number.as_deref(), Some("4711-200"));
        assert_eq!(meta.revision.as_deref(), Some("B"));
        assert_eq!(meta.scale.as_deref(), Some("1:5"));
    }

    #[test]
    fn ignores_words_that_only_start_like_keywords() {
        let meta = extract_metadata("The part was revised twice. See the drawing for details.");
        assert!(meta.revision.is_none());
        assert!(meta.drawing_number.is_none());
    }

    #[test]
    fn drawing_number_needs_a_digit() {
        let meta = extract_metadata("DWG: TBD\nDWG No. 88-1");
        assert_eq!(meta.drawing_number.as_deref(), Some("88-1"));
    }

    #[test]
    fn empty_text_yields_empty_metadata() {
        assert!(extract_metadata("").is_empty());
    }
}
