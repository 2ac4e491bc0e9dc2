use regex::Regex;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn routing and prompt context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keyword lists driving intent classification, plus prompt sizing knobs.
///
/// Each keyword entry is a regex fragment. Entries are joined into one
/// case-insensitive alternation wrapped in word boundaries, so entries for
/// agglutinative languages should absorb trailing particles (`\w*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Analysis only runnable code can produce (regressions, histograms...).
    /// A match always selects code execution.
    #[serde(default = "d_code_required")]
    pub code_required: Vec<String>,
    /// General "needs code" phrasing. Selects code execution only when no
    /// dataset is loaded.
    #[serde(default = "d_code_general")]
    pub code_general: Vec<String>,
    /// Image-generation intent, in every language the user base writes.
    #[serde(default = "d_image_intent")]
    pub image_intent: Vec<String>,
    /// Columns kept in the slim CSV projection, in output order.
    #[serde(default = "d_slim_columns")]
    pub slim_columns: Vec<String>,
    /// Raw CSV text beyond this many characters is cut before encoding.
    #[serde(default = "d_base64_char_cap")]
    pub base64_char_cap: usize,
    /// Character budget of the slim projection; whole rows past it are dropped.
    #[serde(default = "d_slim_char_cap")]
    pub slim_char_cap: usize,
    /// Lines kept in the CSV preview (header included).
    #[serde(default = "d_preview_lines")]
    pub preview_lines: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            code_required: d_code_required(),
            code_general: d_code_general(),
            image_intent: d_image_intent(),
            slim_columns: d_slim_columns(),
            base64_char_cap: d_base64_char_cap(),
            slim_char_cap: d_slim_char_cap(),
            preview_lines: d_preview_lines(),
        }
    }
}

/// Compile a keyword list into a single case-insensitive matcher.
///
/// An empty list yields `None`, which callers treat as "never matches".
pub fn keyword_regex(patterns: &[String]) -> Result<Option<Regex>, regex::Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let alternation = patterns.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).map(Some)
}

// ── serde default helpers ───────────────────────────────────────────

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn d_code_required() -> Vec<String> {
    strings(&[
        "regression",
        "scatter",
        "histogram",
        "seaborn",
        "matplotlib",
        "numpy",
        "time.?series",
        "heatmap",
        "box.?plot",
        "violin",
        r"distribut\w*",
        "linear.?model",
        "logistic",
        "forecast",
        "trend.?line",
    ])
}
fn d_code_general() -> Vec<String> {
    strings(&[
        "code",
        "python",
        "script",
        "calculate",
        "compute",
        "correlation",
        r"statistic\w*",
        r"analy[sz]\w*",
        r"plot\w*",
        r"chart\w*",
        r"graph\w*",
    ])
}
fn d_image_intent() -> Vec<String> {
    strings(&[
        "image",
        "picture",
        "thumbnail",
        "generate",
        "create",
        "draw",
        "infographic",
        r"이미지\w*",
        r"그림\w*",
        r"생성\w*",
        r"만들\w*",
        r"시각\w*",
        r"썸네일\w*",
    ])
}
fn d_slim_columns() -> Vec<String> {
    strings(&[
        "title",
        "text",
        "type",
        "date",
        "created_at",
        "release_date",
        "view_count",
        "like_count",
        "comment_count",
        "views",
        "likes",
        "comments",
        "retweets",
        "engagement",
    ])
}
fn d_base64_char_cap() -> usize {
    500_000
}
fn d_slim_char_cap() -> usize {
    100_000
}
fn d_preview_lines() -> usize {
    6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lists_compile() {
        let cfg = RoutingConfig::default();
        assert!(keyword_regex(&cfg.code_required).unwrap().is_some());
        assert!(keyword_regex(&cfg.code_general).unwrap().is_some());
        assert!(keyword_regex(&cfg.image_intent).unwrap().is_some());
    }

    #[test]
    fn empty_list_never_matches() {
        assert!(keyword_regex(&[]).unwrap().is_none());
    }

    #[test]
    fn keywords_respect_word_boundaries() {
        let re = keyword_regex(&strings(&["image"])).unwrap().unwrap();
        assert!(re.is_match("Make an IMAGE of a cat"));
        assert!(!re.is_match("imagery"));
    }

    #[test]
    fn particles_attach_to_korean_terms() {
        let re = keyword_regex(&d_image_intent()).unwrap().unwrap();
        assert!(re.is_match("썸네일을 만들어줘"));
    }

    #[test]
    fn distribution_matches_prefix_entry() {
        let re = keyword_regex(&d_code_required()).unwrap().unwrap();
        assert!(re.is_match("show the distribution of views"));
        assert!(re.is_match("run a linear model"));
    }
}
