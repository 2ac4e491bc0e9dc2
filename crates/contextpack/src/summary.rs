//! Column statistics and the slim projection sent with prompts.

use crate::attachments::csv::write_csv;
use crate::attachments::TabularData;

/// Parse a cell as a number, tolerating thousands separators.
pub fn numeric(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// Human-readable per-column summary.
///
/// A column counts as numeric when every non-empty cell parses.
pub fn dataset_summary(data: &TabularData) -> String {
    let mut lines = vec![format!(
        "Dataset summary ({} rows, {} columns):",
        data.rows.len(),
        data.headers.len()
    )];

    for header in &data.headers {
        let cells: Vec<&str> = data
            .rows
            .iter()
            .map(|r| data.cell(r, header))
            .filter(|c| !c.trim().is_empty())
            .collect();
        if cells.is_empty() {
            lines.push(format!("- {header}: empty"));
            continue;
        }

        let numbers: Vec<f64> = cells.iter().filter_map(|c| numeric(c)).collect();
        if numbers.len() == cells.len() {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            lines.push(format!(
                "- {header} (numeric): min {}, max {}, mean {}",
                fmt_num(min),
                fmt_num(max),
                fmt_num(mean)
            ));
        } else {
            let mut distinct: Vec<&str> = cells.clone();
            distinct.sort_unstable();
            distinct.dedup();
            lines.push(format!("- {header} (text): {} distinct values", distinct.len()));
        }
    }

    lines.join("\n")
}

/// Key-column projection sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SlimCsv {
    pub csv: String,
    /// Data rows kept.
    pub rows: usize,
    pub total_rows: usize,
}

impl SlimCsv {
    pub fn is_truncated(&self) -> bool {
        self.rows < self.total_rows
    }
}

/// Project onto the allowlisted columns present in the data, in allowlist
/// order, keeping whole rows while the text stays within `max_chars`.
/// The header is always kept. `None` when no allowlisted column exists.
pub fn slim_csv(data: &TabularData, allowlist: &[String], max_chars: usize) -> Option<SlimCsv> {
    let columns: Vec<&str> = allowlist
        .iter()
        .filter_map(|c| data.find_header(c))
        .collect();
    if columns.is_empty() {
        return None;
    }

    let full = write_csv(data, &columns);
    let total_rows = data.rows.len();
    if full.chars().count() <= max_chars {
        return Some(SlimCsv { csv: full, rows: total_rows, total_rows });
    }

    let mut lines = full.split('\n');
    let mut csv = lines.next().unwrap_or_default().to_string();
    let mut used = csv.chars().count();
    let mut rows = 0;
    for line in lines {
        let cost = line.chars().count() + 1;
        if used + cost > max_chars {
            break;
        }
        csv.push('\n');
        csv.push_str(line);
        used += cost;
        rows += 1;
    }
    Some(SlimCsv { csv, rows, total_rows })
}
