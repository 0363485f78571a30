// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use git2::{Repository, Signature, Time};
use repovis::store::Database;
use std::path::PathBuf;
use tempfile::TempDir;

/// Noon UTC on 2024-01-01; `day_ts(n)` is noon on 2024-01-01 + n days.
pub const DAY0: i64 = 1_704_110_400;

pub fn day_ts(days: i64) -> i64 {
    DAY0 + days * 86_400
}

/// Create an in-memory test database with the schema initialized
pub async fn create_test_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}

/// Create a temporary git repository (no commits yet)
pub fn create_test_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Write files, stage them, and commit as the given author at a fixed
/// timestamp so tests get deterministic day buckets.
pub fn add_commit_at(
    repo: &Repository,
    files: &[(&str, &str)],
    message: &str,
    author_name: &str,
    author_email: &str,
    timestamp: i64,
) -> git2::Oid {
    let sig = Signature::new(author_name, author_email, &Time::new(timestamp, 0)).unwrap();

    let mut index = repo.index().unwrap();

    for (path, content) in files {
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();

        index.add_path(std::path::Path::new(path)).unwrap();
    }

    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    match parent {
        Some(parent) => repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
            .unwrap(),
        None => repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])
            .unwrap(),
    }
}

/// Remove a file and commit the deletion
pub fn remove_file_commit(
    repo: &Repository,
    path: &str,
    message: &str,
    author_name: &str,
    author_email: &str,
    timestamp: i64,
) -> git2::Oid {
    let sig = Signature::new(author_name, author_email, &Time::new(timestamp, 0)).unwrap();

    let full_path = repo.workdir().unwrap().join(path);
    if full_path.exists() {
        std::fs::remove_file(&full_path).unwrap();
    }

    let mut index = repo.index().unwrap();
    index.remove_path(std::path::Path::new(path)).unwrap();
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let parent = repo.head().unwrap().peel_to_commit().unwrap();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
        .unwrap()
}

/// The three-commit scenario most tests share:
///
/// - day 0: alice adds `src/a.py` (10 lines)
/// - day 0: bob modifies `src/a.py` (replaces the last line, appends one)
/// - day 1: alice adds `src/b.py` (5 lines)
pub fn build_scenario_repo() -> (TempDir, PathBuf) {
    let (dir, repo_path, repo) = create_test_repo();

    let a_v1: String = (0..10).map(|i| format!("line {}\n", i)).collect();
    add_commit_at(
        &repo,
        &[("src/a.py", &a_v1)],
        "add a",
        "Alice",
        "alice@example.com",
        day_ts(0),
    );

    let mut a_v2: String = (0..9).map(|i| format!("line {}\n", i)).collect();
    a_v2.push_str("line nine changed\nline ten\n");
    add_commit_at(
        &repo,
        &[("src/a.py", &a_v2)],
        "tweak a",
        "Bob",
        "bob@example.com",
        day_ts(0) + 3600,
    );

    let b_v1: String = (0..5).map(|i| format!("b {}\n", i)).collect();
    add_commit_at(
        &repo,
        &[("src/b.py", &b_v1)],
        "add b",
        "Alice",
        "alice@example.com",
        day_ts(1),
    );

    (dir, repo_path)
}
