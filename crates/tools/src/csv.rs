//! Tools over the session CSV.

use serde_json::{json, Value};
use tc_contextpack::attachments::TabularData;
use tc_contextpack::engagement::ENGAGEMENT_COLUMN;
use tc_contextpack::summary::numeric;
use tc_domain::chart::Chart;
use tc_domain::tool::ToolDefinition;

use crate::context::ToolContext;
use crate::registry::ToolHandler;
use crate::stats::{describe, json_number};

/// Columns tried, in order, for a row label on charts.
const LABEL_COLUMNS: &[&str] = &["title", "text", "name"];

fn resolve_column<'t>(table: &'t TabularData, requested: &str) -> Result<&'t str, String> {
    table.find_header(requested.trim()).ok_or_else(|| {
        format!(
            "Column \"{}\" not found. Available: {}.",
            requested.trim(),
            table.headers.join(", ")
        )
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// compute_csv_stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ComputeCsvStats;

#[async_trait::async_trait]
impl ToolHandler for ComputeCsvStats {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "compute_csv_stats".into(),
            description: "Compute statistics (mean, median, std, min, max, count) for a numeric \
                          column of the loaded CSV."
                .into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "column": { "type": "STRING", "description": "Column name from the CSV header." }
                },
                "required": ["column"]
            }),
        }
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let table = ctx.table()?;
        let requested = args.get("column").and_then(Value::as_str).unwrap_or_default();
        let column = resolve_column(table, requested)?;

        let values: Vec<f64> = table
            .rows
            .iter()
            .filter_map(|row| numeric(table.cell(row, column)))
            .collect();
        describe(&values)
            .map(|s| s.to_json("column", column))
            .ok_or_else(|| format!("Column \"{column}\" has no numeric values."))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// plot_engagement
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PlotEngagement;

/// `{label, value}` per row with a numeric value in `column`. Rows are
/// labelled by the first label column present, else by 1-based index.
pub fn engagement_points(table: &TabularData, column: &str) -> Vec<Value> {
    let label_col = LABEL_COLUMNS.iter().find_map(|c| table.find_header(c));
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let value = numeric(table.cell(row, column))?;
            let label = label_col
                .map(|c| table.cell(row, c).to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| (i + 1).to_string());
            Some(json!({ "label": label, "value": json_number(value) }))
        })
        .collect()
}

#[async_trait::async_trait]
impl ToolHandler for PlotEngagement {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "plot_engagement".into(),
            description: "Chart a per-row metric of the loaded CSV. Defaults to the derived \
                          engagement score ((likes + comments) / views)."
                .into(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "metricColumn": {
                        "type": "STRING",
                        "description": "Numeric column to chart. Defaults to engagement."
                    }
                }
            }),
        }
    }

    async fn call(&self, args: &Value, ctx: &ToolContext<'_>) -> Result<Value, String> {
        let table = ctx.table()?;
        let requested = args
            .get("metricColumn")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(ENGAGEMENT_COLUMN);
        let column = resolve_column(table, requested)?;

        let data = engagement_points(table, column);
        if data.is_empty() {
            return Err(format!("Column \"{column}\" has no numeric values."));
        }
        let chart = Chart::Engagement { data, metric_column: column.to_string() };
        serde_json::to_value(&chart).map_err(|e| e.to_string())
    }
}
