//! End-to-end calls through the registry, the way the turn runtime makes them.

use serde_json::{json, Value};
use tc_tools::{ToolContext, ToolRegistry};

fn channel(values: &[(&str, i64)]) -> Value {
    let videos: Vec<Value> = values
        .iter()
        .enumerate()
        .map(|(i, (date, views))| {
            json!({
                "title": format!("video {i}"),
                "release_date": format!("{date}T12:00:00Z"),
                "view_count": views,
                "video_url": format!("https://www.youtube.com/watch?v={i}")
            })
        })
        .collect();
    json!({ "videos": videos })
}

#[tokio::test]
async fn stats_of_one_to_four() {
    let data = channel(&[("2024-01-01", 1), ("2024-01-02", 2), ("2024-01-03", 3), ("2024-01-04", 4)]);
    let ctx = ToolContext { channel: Some(&data), ..Default::default() };
    let out = ToolRegistry::with_builtin()
        .execute("compute_stats_json", &json!({"field": "view_count"}), &ctx)
        .await;
    assert_eq!(out["count"], 4);
    assert_eq!(out["mean"], 2.5);
    assert_eq!(out["median"], 2.5);
    assert_eq!(out["min"], 1);
    assert_eq!(out["max"], 4);
    assert_eq!(out["std"], 1.118);
}

#[tokio::test]
async fn odd_count_median_is_middle_value() {
    let data = channel(&[("2024-01-01", 5), ("2024-01-02", 1), ("2024-01-03", 3)]);
    let ctx = ToolContext { channel: Some(&data), ..Default::default() };
    let out = ToolRegistry::with_builtin()
        .execute("compute_stats_json", &json!({"field": "view_count"}), &ctx)
        .await;
    assert_eq!(out["median"], 3);
}

#[tokio::test]
async fn metric_points_come_back_in_date_order() {
    let data = channel(&[("2024-03-01", 10), ("2024-01-15", 20)]);
    let ctx = ToolContext { channel: Some(&data), ..Default::default() };
    let out = ToolRegistry::with_builtin()
        .execute("plot_metric_vs_time", &json!({"metric": "view_count"}), &ctx)
        .await;
    let dates: Vec<&str> = out["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-01-15", "2024-03-01"]);
}

#[tokio::test]
async fn tools_without_their_data_return_error_objects() {
    let reg = ToolRegistry::with_builtin();
    let ctx = ToolContext::default();
    for (name, args) in [
        ("plot_metric_vs_time", json!({"metric": "view_count"})),
        ("compute_stats_json", json!({"field": "view_count"})),
        ("play_video", json!({"ordinal": 1})),
        ("compute_csv_stats", json!({"column": "views"})),
        ("plot_engagement", json!({})),
        ("generateImage", json!({"prompt": "a cat"})),
    ] {
        let out = reg.execute(name, &args, &ctx).await;
        assert!(out["error"].is_string(), "{name} returned {out}");
    }
}

#[tokio::test]
async fn missing_metric_explains_examples() {
    let data = channel(&[("2024-01-01", 1)]);
    let ctx = ToolContext { channel: Some(&data), ..Default::default() };
    let out = ToolRegistry::with_builtin().execute("plot_metric_vs_time", &json!({}), &ctx).await;
    assert_eq!(
        out["error"],
        "metric (string) is required. Examples: view_count, like_count, comment_count, duration."
    );
}
