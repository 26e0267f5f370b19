//! Prompt construction for drawing analysis turns.
//!
//! Prompts are plain strings that start with the [`IMAGE_PLACEHOLDER`]
//! token; the model adapter swaps it for the actual image attachment.

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Marks where the image goes in the user message.
pub const IMAGE_PLACEHOLDER: &str = "<image>";

/// Maximum length of a chat question in characters.
pub const MAX_QUESTION_LENGTH: usize = 4_000;

/// System message sent with every invocation.
pub const SYSTEM_PROMPT: &str = "You are an expert technical drawing analyst. You specialize in reading and interpreting engineering drawings, CAD diagrams, blueprints, and technical schematics.

Your capabilities include:
- Reading dimensions, tolerances, and measurements
- Identifying part numbers and callouts
- Extracting Bills of Materials (BOMs) and tables
- Understanding engineering symbols and annotations
- Identifying drawing metadata (title, revision, scale, standards)
- Analyzing geometric tolerancing (GD&T)
- Reading material specifications

Always provide precise, structured answers. When asked about specific measurements or data, extract the exact values from the drawing.";

const GROUNDING_INSTRUCTION: &str = "After your answer, localize every element you refer to. \
Output a JSON array in which each entry has the form \
{\"bbox_2d\": [x1, y1, x2, y2], \"label\": \"<what the region shows>\", \"sub_label\": \"<optional detail>\"}. \
Coordinates are absolute pixel positions in the input image, with (x1, y1) the top-left \
and (x2, y2) the bottom-right corner. Omit sub_label when there is nothing to add.";

/// Whole words that mark a question as spatial, English and German.
const SPATIAL_KEYWORDS: &[&str] = &[
    "where",
    "show",
    "locate",
    "find",
    "highlight",
    "mark",
    "point",
    "view",
    "wo",
    "zeige",
    "zeig",
    "zeigen",
    "finde",
    "markiere",
    "ansicht",
];

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// What a turn asks the model to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisMode {
    TechnicalDrawing,
    DimensionsOnly,
    PartNumbers,
    BomExtraction,
    PlainOcr,
    ViewDetection,
    /// Free-form user question.
    Custom(String),
}

impl AnalysisMode {
    pub fn id(&self) -> &'static str {
        match self {
            AnalysisMode::TechnicalDrawing => "technical_drawing",
            AnalysisMode::DimensionsOnly => "dimensions_only",
            AnalysisMode::PartNumbers => "part_numbers",
            AnalysisMode::BomExtraction => "bom_extraction",
            AnalysisMode::PlainOcr => "plain_ocr",
            AnalysisMode::ViewDetection => "view_detection",
            AnalysisMode::Custom(_) => "custom",
        }
    }

    /// Resolve a mode id. `custom` takes its text from `question`.
    pub fn from_id(id: &str, question: Option<&str>) -> Result<Self, CoreError> {
        let mode = match id.trim() {
            "technical_drawing" => AnalysisMode::TechnicalDrawing,
            "dimensions_only" => AnalysisMode::DimensionsOnly,
            "part_numbers" => AnalysisMode::PartNumbers,
            "bom_extraction" => AnalysisMode::BomExtraction,
            "plain_ocr" => AnalysisMode::PlainOcr,
            "view_detection" => AnalysisMode::ViewDetection,
            "custom" => {
                let question = question.map(str::trim).unwrap_or_default();
                if question.is_empty() {
                    return Err(CoreError::Validation(
                        "Mode 'custom' requires a question".to_string(),
                    ));
                }
                AnalysisMode::Custom(question.to_string())
            }
            other => {
                return Err(CoreError::Validation(format!(
                    "Unknown analysis mode '{other}'"
                )))
            }
        };
        Ok(mode)
    }

    /// Whether bare reference designators (`R1`, `C5`) count as part numbers.
    pub fn wants_designators(&self) -> bool {
        matches!(
            self,
            AnalysisMode::PartNumbers | AnalysisMode::BomExtraction
        )
    }

    fn instruction(&self) -> &str {
        match self {
            AnalysisMode::TechnicalDrawing => {
                "Analyze this technical drawing thoroughly. Extract all dimensions, part numbers, tables (especially BOMs), drawing metadata (title, number, revision, scale), and annotations. Provide a structured markdown output."
            }
            AnalysisMode::DimensionsOnly => {
                "Extract all dimensions and measurements from this technical drawing including linear dimensions, diameters (Ø), radii (R), angular dimensions, tolerances (±), and units. List them clearly."
            }
            AnalysisMode::PartNumbers => {
                "Identify and extract all part numbers, item numbers, and callouts from this technical drawing with their descriptions."
            }
            AnalysisMode::BomExtraction => {
                "Extract all tables from this drawing, especially Bills of Materials (BOMs). Preserve the table structure with headers and all rows in markdown format."
            }
            AnalysisMode::PlainOcr => "Read and transcribe all text visible in this image.",
            AnalysisMode::ViewDetection => {
                "Identify every view of this technical drawing (front, side, top, section, detail, isometric) as well as the title block and any tables. Name each region precisely, for example \"front view\" or \"section A-A\"."
            }
            AnalysisMode::Custom(question) => question.as_str(),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Catalog entry for mode listings.
#[derive(Debug, Clone, Serialize)]
pub struct ModeInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn modes() -> Vec<ModeInfo> {
    let entry = |id, name, description| ModeInfo {
        id,
        name,
        description,
    };
    vec![
        entry(
            "technical_drawing",
            "Technical Drawing Analysis",
            "Complete analysis: dimensions, part numbers, tables, annotations",
        ),
        entry(
            "dimensions_only",
            "Dimension Extraction",
            "Extract measurements, tolerances, and geometric dimensions",
        ),
        entry(
            "part_numbers",
            "Part Number Detection",
            "Identify part numbers, item numbers, and callouts",
        ),
        entry("bom_extraction", "BOM Extraction", "Extract bill of materials tables"),
        entry("plain_ocr", "Plain OCR", "Simple text extraction without analysis"),
        entry(
            "view_detection",
            "View Detection",
            "Locate drawing views, title block and tables",
        ),
        entry("custom", "Custom Question", "Ask anything about the drawing"),
    ]
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Build the user prompt for `mode`.
///
/// Placeholder and grounding tags a user typed into a custom question are
/// removed so that the image is attached exactly once.
pub fn build(mode: &AnalysisMode, grounding_requested: bool) -> String {
    let body = match mode {
        AnalysisMode::Custom(question) => question
            .replace(IMAGE_PLACEHOLDER, "")
            .replace("<|grounding|>", "")
            .trim()
            .to_string(),
        other => other.instruction().to_string(),
    };

    let mut prompt = format!("{IMAGE_PLACEHOLDER}\n{body}");
    if grounding_requested {
        prompt.push_str("\n\n");
        prompt.push_str(GROUNDING_INSTRUCTION);
    }
    prompt
}

/// Whether a free-form question asks where something is.
///
/// Matches whole words only, so "showcase" or "wobei" do not trigger.
pub fn wants_grounding(question: &str) -> bool {
    question
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| SPATIAL_KEYWORDS.contains(&word))
}

/// Validate a chat question. Empty questions are allowed only when
/// `allow_empty` is set (an explicit non-custom mode supplies the prompt).
pub fn validate_question(question: &str, allow_empty: bool) -> Result<(), CoreError> {
    if !allow_empty && question.trim().is_empty() {
        return Err(CoreError::Validation(
            "Question must not be empty".to_string(),
        ));
    }
    let length = question.chars().count();
    if length > MAX_QUESTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Question exceeds maximum length of {MAX_QUESTION_LENGTH} characters (got {length})"
        )));
    }
    Ok(())
}
