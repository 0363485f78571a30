//! Domain types for the activity index
//!
//! These types form the data contract between the ingestion pipeline,
//! the persistent store and the query engine.

use serde::Serialize;
use time::Date;

/// A node in the file/directory hierarchy.
///
/// Directory paths carry a trailing '/' so that a file and a directory
/// with the same name remain distinct lookup keys. `parent_id` is `None`
/// only for top-level entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub id: i64,
    pub path: String,
    pub parent_id: Option<i64>,
    pub name: String,
    pub is_directory: bool,
}

/// A committer identity, deduplicated by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contributor {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// One history entry, bucketed to a calendar day.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub sha: String,
    pub contributor_id: i64,
    pub day: Date,
    pub message: String,
}

/// The aggregation unit: counters for one (file, contributor, day) triple.
///
/// Repeated touches to the same file by the same contributor on the same
/// day fold into one bucket, which is what keeps range queries a plain
/// `SUM(...)` over a bounded number of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricBucket {
    pub file_id: i64,
    pub contributor_id: i64,
    pub day: Date,
    pub commit_count: i64,
    pub lines_added: i64,
    pub lines_deleted: i64,
}

/// Which counter a tree query aggregates into each node's `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CommitCount,
    LinesAdded,
    LinesDeleted,
}

impl Metric {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commit_count" => Some(Metric::CommitCount),
            "lines_added" => Some(Metric::LinesAdded),
            "lines_deleted" => Some(Metric::LinesDeleted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::CommitCount => "commit_count",
            Metric::LinesAdded => "lines_added",
            Metric::LinesDeleted => "lines_deleted",
        }
    }
}
