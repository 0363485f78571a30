// End-to-end tests: git repo -> index -> query engine -> JSON wire shape

mod common;

use common::*;
use repovis::model::Metric;
use repovis::pipeline::{DateWindow, Pipeline};
use repovis::query::{ContributorFilter, QueryEngine};
use serde_json::Value;

async fn build_engine() -> (tempfile::TempDir, QueryEngine) {
    let (dir, repo_path) = build_scenario_repo();
    let db = create_test_db().await;
    Pipeline::quiet(&repo_path, DateWindow::default())
        .run(&db)
        .await
        .unwrap();
    (dir, QueryEngine::new(db))
}

#[tokio::test]
async fn test_tree_response_wire_shape() {
    let (_dir, engine) = build_engine().await;

    let response = engine
        .tree(None, None, &ContributorFilter::All, Metric::CommitCount)
        .await
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["metric_type"], "commit_count");
    assert_eq!(json["date_range"]["min_date"], "2024-01-01");
    assert_eq!(json["date_range"]["max_date"], "2024-01-02");

    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);
    // Node fields are flattened next to the metrics object
    let entry = files
        .iter()
        .find(|f| f["path"] == "src/a.py")
        .unwrap();
    assert!(entry["id"].is_i64());
    assert_eq!(entry["is_directory"], false);
    assert_eq!(entry["name"], "a.py");
    assert_eq!(entry["metrics"]["commit_count"], 2);
    assert_eq!(entry["metrics"]["lines_added"], 12);
    assert_eq!(entry["metrics"]["lines_deleted"], 1);
    assert_eq!(entry["metrics"]["value"], 2);

    let dir_entry = files.iter().find(|f| f["path"] == "src/").unwrap();
    assert_eq!(dir_entry["is_directory"], true);
    assert!(dir_entry["parent_id"].is_null());
    assert_eq!(dir_entry["metrics"]["value"], 3);
}

#[tokio::test]
async fn test_contributor_and_timeline_wire_shape() {
    let (_dir, engine) = build_engine().await;

    let contributors = serde_json::to_value(engine.contributors().await.unwrap()).unwrap();
    let list = contributors.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["name"], "Alice");
    assert_eq!(list[0]["email"], "alice@example.com");
    assert!(list[0]["id"].is_i64());

    let timeline = serde_json::to_value(engine.timeline(None, None).await.unwrap()).unwrap();
    let points = timeline.as_array().unwrap();
    assert_eq!(points[0]["date"], "2024-01-01");
    assert_eq!(points[0]["count"], 2);
    assert_eq!(points[1]["date"], "2024-01-02");
    assert_eq!(points[1]["count"], 1);
}

#[tokio::test]
async fn test_file_detail_wire_shape() {
    let (_dir, engine) = build_engine().await;
    let nodes = engine.database().load_nodes().await.unwrap();
    let a = nodes.iter().find(|n| n.path == "src/a.py").unwrap();

    let detail = engine.file_detail(a.id).await.unwrap();
    let json = serde_json::to_value(&detail).unwrap();

    assert_eq!(json["path"], "src/a.py");
    assert_eq!(json["id"], a.id);
    let top = json["top_contributors"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    for c in top {
        assert!(c["id"].is_i64());
        assert!(c["name"].is_string());
        assert!(c["email"].is_string());
        assert!(c["commits"].is_i64());
    }
}

#[tokio::test]
async fn test_queries_survive_a_rebuild() {
    let (_dir, repo_path) = build_scenario_repo();
    let db = create_test_db().await;

    Pipeline::quiet(&repo_path, DateWindow::default())
        .run(&db)
        .await
        .unwrap();
    let engine = QueryEngine::new(db.clone());

    let before = engine
        .tree(None, None, &ContributorFilter::All, Metric::CommitCount)
        .await
        .unwrap();

    let repo = git2::Repository::open(&repo_path).unwrap();
    add_commit_at(
        &repo,
        &[("src/c.py", "one line\n")],
        "add c",
        "Carol",
        "carol@example.com",
        day_ts(2),
    );
    Pipeline::quiet(&repo_path, DateWindow::default())
        .run(&db)
        .await
        .unwrap();

    let after = engine
        .tree(None, None, &ContributorFilter::All, Metric::CommitCount)
        .await
        .unwrap();
    assert_eq!(after.files.len(), before.files.len() + 1);
    assert_eq!(after.date_range.max_date.as_deref(), Some("2024-01-03"));

    let json: Value = serde_json::to_value(&after).unwrap();
    assert!(
        json["files"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["path"] == "src/c.py")
    );
}
