//! Best-effort CSV handling.
//!
//! Lines are split on `\n` and fields on commas outside double quotes.
//! Quoted fields may contain commas but not newlines.

use std::collections::HashMap;

use base64::Engine as _;
use serde::Serialize;
use tc_domain::error::{Error, Result};

/// One parsed row: header name to raw cell text.
pub type Row = HashMap<String, String>;

/// Parsed tabular data with its column order preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularData {
    /// Raw cell lookup; missing cells read as empty.
    pub fn cell<'a>(&'a self, row: &'a Row, column: &str) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }

    /// Case-insensitive header lookup returning the stored spelling.
    pub fn find_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

/// The pending "chip" for a CSV dropped this turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvAttachment {
    pub name: String,
    pub headers: Vec<String>,
    pub row_count: usize,
    /// Header plus the first few data lines, verbatim.
    pub preview: String,
    /// Base64 of the raw text, cut at the character cap.
    #[serde(skip)]
    pub base64: String,
    pub truncated: bool,
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty())
        .collect()
}

/// Split one CSV line on commas outside quotes, trimming whitespace and
/// unwrapping quoted values (`""` inside quotes becomes `"`).
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            other => current.push(other),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Byte offset of the `cap`-th character, or `None` when the text is shorter.
fn char_cut(text: &str, cap: usize) -> Option<usize> {
    text.char_indices().nth(cap).map(|(i, _)| i)
}

/// Build the pending attachment for a CSV file.
///
/// Fails with [`Error::Parse`] when the text has no non-blank lines.
pub fn parse_csv(name: &str, text: &str, char_cap: usize, preview_lines: usize) -> Result<CsvAttachment> {
    let lines = non_blank_lines(text);
    let Some(first) = lines.first() else {
        return Err(Error::Parse(format!("{name}: CSV has no content")));
    };

    let headers = split_line(first);
    let preview = lines
        .iter()
        .take(preview_lines)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let (raw, truncated) = match char_cut(text, char_cap) {
        Some(end) => (&text[..end], true),
        None => (text, false),
    };
    let base64 = base64::engine::general_purpose::STANDARD.encode(raw.as_bytes());

    Ok(CsvAttachment {
        name: name.to_string(),
        headers,
        row_count: lines.len() - 1,
        preview,
        base64,
        truncated,
    })
}

/// Parse the full text into rows keyed by header.
///
/// Short rows leave trailing columns empty; extra cells are dropped.
pub fn parse_rows(text: &str) -> Result<TabularData> {
    let lines = non_blank_lines(text);
    let Some((first, rest)) = lines.split_first() else {
        return Err(Error::Parse("CSV has no content".into()));
    };

    let headers = split_line(first);
    let rows = rest
        .iter()
        .map(|line| {
            let cells = split_line(line);
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect();

    Ok(TabularData { headers, rows })
}

/// Render rows back to CSV for the given columns.
pub fn write_csv(data: &TabularData, columns: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(&columns.iter().map(|c| escape_field(c)).collect::<Vec<_>>().join(","));
    for row in &data.rows {
        out.push('\n');
        let line = columns
            .iter()
            .map(|c| escape_field(data.cell(row, c)))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
    }
    out
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
