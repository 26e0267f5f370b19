//! Table extraction from markdown pipe tables and simple HTML tables.
//!
//! Markdown blocks are runs of consecutive lines that start or end with `|`.
//! A block whose second line is a dash separator (`|---|:--:|`) has a header
//! row; otherwise every line is a data row and `headers` is `None`.
//!
//! HTML tables are matched as `<table>` ... `</table>` with `<tr>` rows and
//! `<th>`/`<td>` cells. A first row made only of `<th>` cells becomes the
//! header row.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    BillOfMaterials,
    RevisionHistory,
    DimensionTable,
    GeneralNotes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub table_type: Option<TableType>,
    pub headers: Option<Vec<String>>,
    /// Rows keep their own cell count; they are never padded to the header width.
    pub rows: Vec<TableRow>,
}

const TYPE_KEYWORDS: &[(TableType, &[&str])] = &[
    (
        TableType::BillOfMaterials,
        &[
            "item", "pos", "position", "part", "qty", "quantity", "description", "material",
            "benennung", "menge", "werkstoff", "stückliste", "bom",
        ],
    ),
    (
        TableType::RevisionHistory,
        &[
            "rev", "revision", "date", "change", "changes", "approved", "by", "index", "datum",
            "änderung", "name",
        ],
    ),
    (
        TableType::DimensionTable,
        &[
            "dimension", "dim", "nominal", "tolerance", "min", "max", "value", "size", "maß",
            "toleranz", "nennmaß",
        ],
    ),
    (
        TableType::GeneralNotes,
        &["note", "notes", "general", "remark", "remarks", "hinweis", "hinweise", "anmerkung"],
    ),
];

static HTML_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").expect("valid regex"));
static HTML_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid regex"));
static HTML_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(t[hd])\b[^>]*>(.*?)</t[hd]\s*>").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Extract every table in `text`, in order of appearance.
pub fn extract_tables(text: &str) -> Vec<ExtractedTable> {
    let mut found: Vec<(usize, ExtractedTable)> = markdown_tables(text);
    found.extend(html_tables(text));
    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, table)| table).collect()
}

/// Pick the table type whose keywords overlap most with the header words.
pub fn classify_headers(headers: &[String]) -> Option<TableType> {
    let words: Vec<String> = headers
        .iter()
        .flat_map(|h| {
            h.to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    let mut best: Option<(TableType, usize)> = None;
    for (table_type, keywords) in TYPE_KEYWORDS {
        let score = words.iter().filter(|w| keywords.contains(&w.as_str())).count();
        if score > 0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((*table_type, score));
        }
    }
    best.map(|(table_type, _)| table_type)
}

fn build_table(headers: Option<Vec<String>>, rows: Vec<Vec<String>>) -> ExtractedTable {
    ExtractedTable {
        table_type: headers.as_deref().and_then(classify_headers),
        headers,
        rows: rows.into_iter().map(|cells| TableRow { cells }).collect(),
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn is_pipe_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() > 1 && (trimmed.starts_with('|') || trimmed.ends_with('|'))
}

fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            let core = cell.trim_start_matches(':').trim_end_matches(':');
            !core.is_empty() && core.chars().all(|c| c == '-')
        })
}

fn markdown_tables(text: &str) -> Vec<(usize, ExtractedTable)> {
    let mut tables = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut block_start = 0;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        if is_pipe_line(line) {
            if block.is_empty() {
                block_start = offset;
            }
            block.push(line);
        } else if !block.is_empty() {
            tables.extend(finish_block(&block).map(|t| (block_start, t)));
            block.clear();
        }
        offset += raw.len();
    }
    if !block.is_empty() {
        tables.extend(finish_block(&block).map(|t| (block_start, t)));
    }
    tables
}

fn finish_block(lines: &[&str]) -> Option<ExtractedTable> {
    if lines.len() < 2 {
        return None;
    }
    let rows: Vec<Vec<String>> = lines.iter().map(|line| split_cells(line)).collect();

    if is_separator(&rows[1]) {
        let headers = rows[0].clone();
        let data = rows
            .into_iter()
            .skip(2)
            .filter(|row| !is_separator(row))
            .collect();
        Some(build_table(Some(headers), data))
    } else {
        let data: Vec<_> = rows.into_iter().filter(|row| !is_separator(row)).collect();
        if data.is_empty() {
            return None;
        }
        Some(build_table(None, data))
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn html_cell_text(inner: &str) -> String {
    let text = HTML_TAG.replace_all(inner, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn html_tables(text: &str) -> Vec<(usize, ExtractedTable)> {
    let mut tables = Vec::new();
    for table in HTML_TABLE.captures_iter(text) {
        let (Some(whole), Some(body)) = (table.get(0), table.get(1)) else {
            continue;
        };

        let mut rows: Vec<(bool, Vec<String>)> = Vec::new();
        for row in HTML_ROW.captures_iter(body.as_str()) {
            let Some(row_body) = row.get(1) else { continue };
            let mut all_header = true;
            let mut cells = Vec::new();
            for cell in HTML_CELL.captures_iter(row_body.as_str()) {
                let is_header = cell
                    .get(1)
                    .is_some_and(|tag| tag.as_str().eq_ignore_ascii_case("th"));
                all_header &= is_header;
                cells.push(html_cell_text(cell.get(2).map_or("", |m| m.as_str())));
            }
            if !cells.is_empty() {
                rows.push((all_header, cells));
            }
        }
        if rows.is_empty() {
            continue;
        }

        let headers = if rows[0].0 {
            Some(rows.remove(0).1)
        } else {
            None
        };
        let data = rows.into_iter().map(|(_, cells)| cells).collect();
        tables.push((whole.start(), build_table(headers, data)));
    }
    tables
}
