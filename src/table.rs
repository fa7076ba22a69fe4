// Markdown-table extraction for model replies.
//
// The model answers a PQRS with a two-column `| Campo | Valor |` table,
// usually surrounded by prose. This module turns that raw text into a
// field/value record for display. The raw text stays the source of truth:
// extraction is re-run on every render and is best-effort throughout.
//
// Two inherited quirks are kept on purpose (see DESIGN.md): the first two
// matched rows are discarded by position without checking that row 2 is a
// separator, and prose boundaries are the first/last pipe of the whole text,
// not of the detected table.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    // A candidate row: a pipe, anything, a pipe — all on one line.
    static ref TABLE_ROW: Regex = Regex::new(r"\|.*\|").unwrap();
}

/// Column labels are fixed regardless of the header text in the input.
pub const FIELD_LABEL: &str = "Campo";
pub const VALUE_LABEL: &str = "Valor";

/// One extracted field/value pair. Duplicate field names simply produce
/// duplicate rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub campo: String,
    pub valor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTable {
    pub rows: Vec<TableRow>,
}

/// Result of a table scan: the parsed record (if the text looked tabular at
/// all) and any prose outside the pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub table: Option<ParsedTable>,
    pub prose: Option<String>,
}

/// Scans `text` for a pipe-delimited markdown table.
///
/// Every line containing `|...|` is a candidate row. The first two matches
/// are assumed to be the header and separator rows and dropped unread; each
/// remaining row is split on `|`, the fragments outside the outer pipes are
/// discarded, and the row is kept only when exactly two trimmed cells remain.
/// Rows with any other cell count are silently skipped.
///
/// With no `|` in the text there is no table and the whole text is prose.
/// With pipes but no full candidate row, both results are empty and the
/// caller falls back to the raw text.
pub fn extract_table_data(text: &str) -> Extraction {
    if !text.contains('|') {
        return Extraction {
            table: None,
            prose: Some(text.to_string()),
        };
    }

    let candidates: Vec<&str> = text
        .lines()
        .filter_map(|line| TABLE_ROW.find(line).map(|m| m.as_str()))
        .collect();

    if candidates.is_empty() {
        return Extraction {
            table: None,
            prose: None,
        };
    }

    let rows = candidates
        .get(2..)
        .unwrap_or(&[])
        .iter()
        .filter_map(|row| parse_data_row(row))
        .collect();

    // Prose is everything before the first pipe and after the last pipe of
    // the whole text, not of the table.
    let pre_table = text.split('|').next().unwrap_or("").trim();
    let post_table = text.rsplit('|').next().unwrap_or("").trim();
    let other_text = format!("{pre_table}\n\n{post_table}");
    let other_text = other_text.trim();

    Extraction {
        table: Some(ParsedTable { rows }),
        prose: (!other_text.is_empty()).then(|| other_text.to_string()),
    }
}

fn parse_data_row(row: &str) -> Option<TableRow> {
    let fragments: Vec<&str> = row.split('|').collect();
    // Drop the fragments outside the leading/trailing pipe.
    let cells: Vec<&str> = fragments
        .get(1..fragments.len().saturating_sub(1))
        .unwrap_or(&[])
        .iter()
        .map(|cell| cell.trim())
        .collect();

    match cells.as_slice() {
        [campo, valor] => Some(TableRow {
            campo: (*campo).to_string(),
            valor: (*valor).to_string(),
        }),
        _ => None,
    }
}

/// What the display sink should show for a piece of assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Render {
    /// No usable table: the raw markdown, verbatim.
    Text { text: String },
    /// A detected record, with any surrounding prose kept separate.
    Table {
        prose: Option<String>,
        rows: Vec<TableRow>,
    },
}

/// Decides how a (possibly partial) reply is displayed. Any `|` in the text
/// triggers a table scan; when the scan yields nothing the text renders
/// verbatim. Recomputed from the raw text on every call.
pub fn render_response(text: &str) -> Render {
    if text.contains('|') {
        if let Extraction {
            table: Some(table),
            prose,
        } = extract_table_data(text)
        {
            return Render::Table {
                prose,
                rows: table.rows,
            };
        }
    }
    Render::Text {
        text: text.to_string(),
    }
}
