//! Descriptive statistics shared by the JSON and CSV stats tools and the
//! HTTP stats endpoint.

use serde_json::{json, Map, Value};

/// Field names suggested when a lookup finds nothing numeric.
pub const NUMERIC_FIELD_HINT: &str = "view_count, like_count, comment_count, duration";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    /// `{<key>: <label>, mean, median, std, min, max, count}` with
    /// mean/median/std rounded to 4 places and min/max left as is.
    pub fn to_json(&self, key: &str, label: &str) -> Value {
        let mut out = Map::new();
        out.insert(key.to_string(), json!(label));
        out.insert("mean".into(), json_number(round4(self.mean)));
        out.insert("median".into(), json_number(round4(self.median)));
        out.insert("std".into(), json_number(round4(self.std)));
        out.insert("min".into(), json_number(self.min));
        out.insert("max".into(), json_number(self.max));
        out.insert("count".into(), json!(self.count));
        Value::Object(out)
    }
}

pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Integral values serialize as JSON integers (`4`, not `4.0`).
pub(crate) fn json_number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        json!(v as i64)
    } else {
        json!(v)
    }
}

/// Numbers pass through; strings are parsed after trimming. Anything
/// else, blank strings and non-finite values are not numeric.
pub fn coerce_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Summary statistics, `None` for an empty slice.
pub fn describe(values: &[f64]) -> Option<Stats> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Some(Stats {
        count: values.len(),
        mean,
        median,
        std: variance.sqrt(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    })
}

/// Statistics for one field across channel videos. The error string is
/// meant for the user.
pub fn compute_field_stats(videos: &[Value], field: &str) -> Result<Value, String> {
    let field = field.trim();
    let values: Vec<f64> = videos
        .iter()
        .filter_map(|v| v.get(field))
        .filter_map(coerce_number)
        .collect();
    describe(&values)
        .map(|s| s.to_json("field", field))
        .ok_or_else(|| format!("Field \"{field}\" has no numeric values. Try: {NUMERIC_FIELD_HINT}."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_values() {
        let s = describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert_eq!(round4(s.std), 1.118);
        assert_eq!((s.min, s.max), (1.0, 4.0));
    }

    #[test]
    fn median_parity() {
        assert_eq!(describe(&[5.0, 1.0, 3.0]).unwrap().median, 3.0);
        assert_eq!(describe(&[1.0, 2.0, 3.0, 4.0]).unwrap().median, 2.5);
    }

    #[test]
    fn empty_has_no_stats() {
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn coercion_accepts_numeric_strings_only() {
        assert_eq!(coerce_number(&json!(3)), Some(3.0));
        assert_eq!(coerce_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(coerce_number(&json!("n/a")), None);
        assert_eq!(coerce_number(&json!("")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn field_stats_wire_shape() {
        let videos = vec![
            json!({"view_count": 1}),
            json!({"view_count": "2"}),
            json!({"view_count": 3}),
            json!({"view_count": 4}),
            json!({"view_count": "hidden"}),
            json!({"title": "no count"}),
        ];
        let out = compute_field_stats(&videos, "view_count").unwrap();
        assert_eq!(out["field"], "view_count");
        assert_eq!(out["count"], 4);
        assert_eq!(out["mean"], 2.5);
        assert_eq!(out["median"], 2.5);
        assert_eq!(out["std"], 1.118);
        assert_eq!(out["min"], 1);
        assert_eq!(out["max"], 4);
    }

    #[test]
    fn field_without_numbers_is_reported() {
        let err = compute_field_stats(&[json!({"title": "x"})], "title").unwrap_err();
        assert_eq!(
            err,
            "Field \"title\" has no numeric values. Try: view_count, like_count, comment_count, duration."
        );
    }
}
