//! Derived "engagement" column for tabular data.

use crate::attachments::TabularData;

pub const ENGAGEMENT_COLUMN: &str = "engagement";

const LIKE_COLUMNS: &[&str] = &["like_count", "likes", "favorite_count", "favorites"];
const COMMENT_COLUMNS: &[&str] = &["comment_count", "comments", "reply_count", "replies"];
const VIEW_COLUMNS: &[&str] = &["view_count", "views", "impression_count", "impressions"];

/// Turns raw interaction counts into one normalized score.
pub trait EngagementFormula: Send + Sync {
    fn score(&self, likes: f64, comments: f64, views: f64) -> f64;
}

/// `(likes + comments) / views`, or 0 when there are no views.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatioEngagement;

impl EngagementFormula for RatioEngagement {
    fn score(&self, likes: f64, comments: f64, views: f64) -> f64 {
        if views <= 0.0 {
            return 0.0;
        }
        (likes + comments) / views
    }
}

fn pick_column(data: &TabularData, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|c| data.find_header(c))
        .map(str::to_string)
}

fn number(raw: &str) -> f64 {
    raw.trim().replace(',', "").parse::<f64>().unwrap_or(0.0)
}

/// Append the engagement column when a view column and at least one of
/// likes/comments exist. Returns whether the column was added.
pub fn enrich_with_engagement(data: &mut TabularData, formula: &dyn EngagementFormula) -> bool {
    if data.find_header(ENGAGEMENT_COLUMN).is_some() {
        return false;
    }
    let views = pick_column(data, VIEW_COLUMNS);
    if views.is_none() {
        return false;
    }
    let likes = pick_column(data, LIKE_COLUMNS);
    let comments = pick_column(data, COMMENT_COLUMNS);
    if likes.is_none() && comments.is_none() {
        return false;
    }

    for row in &mut data.rows {
        let read = |col: &Option<String>| {
            col.as_ref()
                .and_then(|c| row.get(c))
                .map(|v| number(v))
                .unwrap_or(0.0)
        };
        let score = formula.score(read(&likes), read(&comments), read(&views));
        row.insert(ENGAGEMENT_COLUMN.to_string(), format!("{score:.4}"));
    }
    data.headers.push(ENGAGEMENT_COLUMN.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::csv::parse_rows;

    #[test]
    fn ratio_falls_back_to_zero_without_views() {
        assert_eq!(RatioEngagement.score(10.0, 5.0, 0.0), 0.0);
        assert!((RatioEngagement.score(10.0, 5.0, 100.0) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn enrich_adds_column_to_every_row() {
        let mut data = parse_rows("title,view_count,like_count,comment_count\nA,200,10,10\nB,0,3,1\n").unwrap();
        assert!(enrich_with_engagement(&mut data, &RatioEngagement));
        assert_eq!(data.headers.last().unwrap(), "engagement");
        assert_eq!(data.rows[0]["engagement"], "0.1000");
        assert_eq!(data.rows[1]["engagement"], "0.0000");
    }

    #[test]
    fn enrich_skips_when_no_view_column() {
        let mut data = parse_rows("title,likes\nA,1\n").unwrap();
        assert!(!enrich_with_engagement(&mut data, &RatioEngagement));
        assert_eq!(data.headers, vec!["title", "likes"]);
    }

    struct LikesOnly;
    impl EngagementFormula for LikesOnly {
        fn score(&self, likes: f64, _comments: f64, _views: f64) -> f64 {
            likes
        }
    }

    #[test]
    fn formula_is_pluggable() {
        let mut data = parse_rows("views,likes\n10,7\n").unwrap();
        enrich_with_engagement(&mut data, &LikesOnly);
        assert_eq!(data.rows[0]["engagement"], "7.0000");
    }
}
