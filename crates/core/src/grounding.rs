//! Grounding output parsing.
//!
//! Vision models localize what they talk about in one of several textual
//! dialects. [`parse`] tries each [`Dialect`] in a fixed order and uses the
//! first one that yields at least one box:
//!
//! | Dialect       | Shape                                                       | Coordinates      |
//! |---------------|-------------------------------------------------------------|------------------|
//! | `TaggedBox`   | `<ref>label</ref><box>(x1,y1),(x2,y2)</box>`                | 0-999 grid       |
//! | `DetTags`     | `<\|ref\|>label<\|/ref\|><\|det\|>[[x1,y1,x2,y2],...]<\|/det\|>` | 0-999 grid |
//! | `JsonArray`   | `[{"bbox_2d":[x1,y1,x2,y2],"label":"...","sub_label":"..."}]` | absolute pixels |
//!
//! Boxes are converted to pixels, clamped to the image and dropped when
//! empty. Element types come from [`classify`]; the model never supplies them.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::{BoundingBox, CoordinateSpace};
use crate::labels::{classify, ElementType};
use crate::types::ImageFrame;

/// A localized, classified region of the drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedElement {
    pub bbox: BoundingBox,
    pub element_type: ElementType,
    pub label: String,
    pub sub_label: Option<String>,
}

/// Supported grounding syntaxes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TaggedBox,
    DetTags,
    JsonArray,
}

impl Dialect {
    pub const ORDER: [Dialect; 3] = [Dialect::TaggedBox, Dialect::DetTags, Dialect::JsonArray];

    pub fn coordinate_space(self) -> CoordinateSpace {
        match self {
            Dialect::TaggedBox | Dialect::DetTags => CoordinateSpace::Normalized999,
            Dialect::JsonArray => CoordinateSpace::AbsolutePixels,
        }
    }

    fn raw_boxes(self, text: &str) -> Vec<RawBox> {
        match self {
            Dialect::TaggedBox => tagged_boxes(text),
            Dialect::DetTags => det_boxes(text),
            Dialect::JsonArray => json_boxes(text),
        }
    }
}

/// A box as emitted by the model, before conversion and clamping.
#[derive(Debug, Clone, PartialEq)]
struct RawBox {
    label: String,
    sub_label: Option<String>,
    coords: [f64; 4],
}

const NUM: &str = r"(-?\d+(?:\.\d+)?)";

static TAGGED_BOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pair = format!(r"\(\s*{NUM}\s*,\s*{NUM}\s*\)");
    Regex::new(&format!(r"<ref>([^<]*)</ref>\s*<box>\s*{pair}\s*,?\s*{pair}\s*</box>"))
        .expect("valid regex")
});
static DET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\|ref\|>([^<]*)<\|/ref\|>\s*<\|det\|>(.*?)<\|/det\|>").expect("valid regex")
});
static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
static LOOSE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<box>.*?</box>|<\|det\|>.*?<\|/det\|>|</?ref>|<\|/?ref\|>|<\|grounding\|>")
        .expect("valid regex")
});
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse grounding markup in `completion` into elements for an image of
/// `image_width` x `image_height` pixels.
///
/// Dialects are tried in [`Dialect::ORDER`]; the first one that yields at
/// least one valid box wins. Never fails: unparseable or absent grounding
/// yields an empty vector.
pub fn parse(completion: &str, image_width: u32, image_height: u32) -> Vec<DetectedElement> {
    let frame = ImageFrame::new(image_width, image_height);
    Dialect::ORDER
        .into_iter()
        .map(|dialect| elements(dialect, completion, frame))
        .find(|elements| !elements.is_empty())
        .unwrap_or_default()
}

fn elements(dialect: Dialect, completion: &str, frame: ImageFrame) -> Vec<DetectedElement> {
    let space = dialect.coordinate_space();
    dialect
        .raw_boxes(completion)
        .into_iter()
        .filter_map(|raw| {
            let bbox = BoundingBox::clamped(space.to_absolute(raw.coords, frame), frame)?;
            Some(DetectedElement {
                bbox,
                element_type: classify(&raw.label),
                label: raw.label,
                sub_label: raw.sub_label,
            })
        })
        .collect()
}

fn tagged_boxes(text: &str) -> Vec<RawBox> {
    TAGGED_BOX_RE
        .captures_iter(text)
        .filter_map(|c| {
            let coord = |i: usize| c.get(i)?.as_str().parse::<f64>().ok();
            Some(RawBox {
                label: c.get(1)?.as_str().trim().to_string(),
                sub_label: None,
                coords: [coord(2)?, coord(3)?, coord(4)?, coord(5)?],
            })
        })
        .collect()
}

fn det_boxes(text: &str) -> Vec<RawBox> {
    let mut boxes = Vec::new();
    for c in DET_RE.captures_iter(text) {
        let (Some(label), Some(body)) = (c.get(1), c.get(2)) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) else {
            continue;
        };
        let label = label.as_str().trim();
        // Either a list of boxes or a single flat box.
        let candidates = match &value {
            Value::Array(items) if items.iter().all(Value::is_array) => items.iter().collect(),
            Value::Array(_) => vec![&value],
            _ => continue,
        };
        boxes.extend(candidates.into_iter().filter_map(coords_of).map(|coords| RawBox {
            label: label.to_string(),
            sub_label: None,
            coords,
        }));
    }
    boxes
}

fn coords_of(value: &Value) -> Option<[f64; 4]> {
    match value.as_array()?.as_slice() {
        [x1, y1, x2, y2] => Some([x1.as_f64()?, y1.as_f64()?, x2.as_f64()?, y2.as_f64()?]),
        _ => None,
    }
}

fn has_bbox(item: &Value) -> bool {
    item.get("bbox_2d").is_some()
}

/// Locate the first syntactically valid JSON array containing at least one
/// `bbox_2d` object. Returns its byte span and items.
fn find_bbox_array(text: &str) -> Option<(usize, usize, Vec<Value>)> {
    for (start, _) in text.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = stream.next() {
            if items.iter().any(has_bbox) {
                return Some((start, start + stream.byte_offset(), items));
            }
        }
    }
    None
}

fn json_boxes(text: &str) -> Vec<RawBox> {
    let Some((_, _, items)) = find_bbox_array(text) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let coords = coords_of(item.get("bbox_2d")?)?;
            let label = item
                .get("label")
                .or_else(|| item.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            let sub_label = item
                .get("sub_label")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            Some(RawBox {
                label,
                sub_label,
                coords,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Answer text
// ---------------------------------------------------------------------------

/// Remove reasoning blocks (`<think>...</think>`).
///
/// Thinking models sometimes omit the opening tag; a lone `</think>` drops
/// everything before it.
pub fn strip_reasoning(completion: &str) -> String {
    let without_blocks = THINK_BLOCK_RE.replace_all(completion, "");
    let answer: &str = match without_blocks.rfind("</think>") {
        Some(idx) => &without_blocks[idx + "</think>".len()..],
        None => &without_blocks,
    };
    answer.trim().to_string()
}

/// Derive the human-readable answer from a raw completion.
///
/// Tag dialects keep their label text, JSON grounding arrays (with any code
/// fence around them) are removed, and reasoning blocks are dropped.
pub fn strip_grounding(completion: &str) -> String {
    let mut text = strip_reasoning(completion);

    text = TAGGED_BOX_RE
        .replace_all(&text, |c: &regex::Captures<'_>| c[1].trim().to_string())
        .into_owned();
    text = DET_RE
        .replace_all(&text, |c: &regex::Captures<'_>| c[1].trim().to_string())
        .into_owned();
    text = LOOSE_TAG_RE.replace_all(&text, "").into_owned();

    while let Some((start, end, _)) = find_bbox_array(&text) {
        let (start, end) = widen_to_fence(&text, start, end);
        text.replace_range(start..end, "");
    }

    BLANK_LINES_RE.replace_all(&text, "\n\n").trim().to_string()
}

/// Extend `start..end` over a markdown code fence that wraps exactly it.
fn widen_to_fence(text: &str, start: usize, end: usize) -> (usize, usize) {
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();
    let opening = ["```json", "```JSON", "```"]
        .into_iter()
        .find(|fence| before.ends_with(fence));
    match opening {
        Some(fence) if after.starts_with("```") => {
            let fence_start = before.len() - fence.len();
            let fence_end = text.len() - after.len() + "```".len();
            (fence_start, fence_end)
        }
        _ => (start, end),
    }
}
