//! Read-only query engine over a built index.
//!
//! Every call is stateless and side-effect-free: concurrent queries need
//! no locking beyond the store's reader isolation, and a caller dropping
//! a query mid-flight (client disconnect) simply abandons the scan with
//! no partial result ever produced.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::HashMap;
use time::Date;

use crate::model::{Contributor, FileNode, Metric};
use crate::store::{BucketFilter, Database, FileContributor, MetricSums, TimelinePoint};
use crate::util::dates::format_day;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid date range: end {end} is before start {start}")]
    InvalidRange { start: String, end: String },
    #[error("file {0} not found")]
    FileNotFound(i64),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Which contributors a tree query should count.
///
/// `Include` and `Exclude` carry the caller's raw id lists; ids that do
/// not exist in the index match nothing and are silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributorFilter {
    All,
    Include(Vec<i64>),
    Exclude(Vec<i64>),
}

/// Aggregated counters attached to every node in a tree response.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct NodeMetrics {
    pub commit_count: i64,
    pub lines_added: i64,
    pub lines_deleted: i64,
    /// The counter selected by the query's metric parameter.
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    #[serde(flatten)]
    pub node: FileNode,
    pub metrics: NodeMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateBounds {
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeResponse {
    pub files: Vec<TreeEntry>,
    pub date_range: DateBounds,
    pub metric_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDetail {
    #[serde(flatten)]
    pub node: FileNode,
    pub top_contributors: Vec<FileContributor>,
}

/// How a tree query will touch the bucket table.
#[derive(Debug, PartialEq, Eq)]
enum ScanPlan {
    Scan(BucketFilter),
    /// Empty selection: defined zero-result behavior, no scan at all.
    MatchNone,
}

/// Read-only query surface over one built index.
#[derive(Clone)]
pub struct QueryEngine {
    db: Database,
}

impl QueryEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Aggregate the requested metric per node over `[start, end]` for
    /// the filtered contributor set.
    ///
    /// Missing bounds default to the index's overall commit date range.
    /// Directory values are the sum of all descendant file sums,
    /// recomputed here rather than stored. Every node in the hierarchy
    /// appears in the response even when nothing matched, so the
    /// client's structural view never changes shape under filtering.
    pub async fn tree(
        &self,
        start: Option<Date>,
        end: Option<Date>,
        filter: &ContributorFilter,
        metric: Metric,
    ) -> Result<TreeResponse, QueryError> {
        validate_range(start, end)?;

        let bounds = self.db.commit_date_bounds().await?;
        let (min_date, max_date) = match bounds {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };

        let start = start.map(format_day).or_else(|| min_date.clone());
        let end = end.map(format_day).or_else(|| max_date.clone());

        let mut totals: FxHashMap<i64, MetricSums> = FxHashMap::default();
        if let (Some(start), Some(end)) = (start, end) {
            let all_ids = self.db.contributor_ids().await?;
            if let ScanPlan::Scan(bucket_filter) = select_plan(filter, &all_ids) {
                totals = self.db.sum_metrics(&start, &end, &bucket_filter).await?;
            }
        }

        let nodes = self.db.load_nodes().await?;
        roll_up(&nodes, &mut totals);

        let files = nodes
            .into_iter()
            .map(|node| {
                let sums = totals.get(&node.id).copied().unwrap_or_default();
                TreeEntry {
                    node,
                    metrics: node_metrics(sums, metric),
                }
            })
            .collect();

        Ok(TreeResponse {
            files,
            date_range: DateBounds { min_date, max_date },
            metric_type: metric.as_str().to_string(),
        })
    }

    /// Daily commit totals, independent of tree/contributor filters.
    pub async fn timeline(
        &self,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<TimelinePoint>, QueryError> {
        validate_range(start, end)?;
        let start = start.map(format_day);
        let end = end.map(format_day);
        Ok(self.db.timeline(start.as_deref(), end.as_deref()).await?)
    }

    pub async fn contributors(&self) -> Result<Vec<Contributor>, QueryError> {
        Ok(self.db.load_contributors().await?)
    }

    pub async fn metadata(&self) -> Result<HashMap<String, String>, QueryError> {
        Ok(self.db.metadata_map().await?)
    }

    /// Single node detail with its top contributors by commit count.
    pub async fn file_detail(&self, id: i64) -> Result<FileDetail, QueryError> {
        let node = self
            .db
            .load_node(id)
            .await?
            .ok_or(QueryError::FileNotFound(id))?;
        let top_contributors = self.db.top_contributors(id, 10).await?;
        Ok(FileDetail {
            node,
            top_contributors,
        })
    }
}

fn validate_range(start: Option<Date>, end: Option<Date>) -> Result<(), QueryError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(QueryError::InvalidRange {
                start: format_day(start),
                end: format_day(end),
            });
        }
    }
    Ok(())
}

/// Pick the cheapest contributor predicate for a selection.
///
/// With S selected out of T total: no predicate when S == T, an
/// inclusion list when S <= T/2, otherwise an exclusion list over the
/// T - S unselected ids, so the predicate never carries more than T/2
/// operands. An empty selection skips the scan entirely. The choice is
/// invisible to callers: results are identical across strategies.
fn select_plan(filter: &ContributorFilter, all_ids: &[i64]) -> ScanPlan {
    let selected: Vec<i64> = match filter {
        ContributorFilter::All => return ScanPlan::Scan(BucketFilter::All),
        ContributorFilter::Include(ids) => {
            // Intersect with known ids: unknown ids match nothing
            let requested: FxHashSet<i64> = ids.iter().copied().collect();
            all_ids
                .iter()
                .copied()
                .filter(|id| requested.contains(id))
                .collect()
        }
        ContributorFilter::Exclude(ids) => {
            let excluded: FxHashSet<i64> = ids.iter().copied().collect();
            all_ids
                .iter()
                .copied()
                .filter(|id| !excluded.contains(id))
                .collect()
        }
    };

    let total = all_ids.len();
    if selected.is_empty() {
        ScanPlan::MatchNone
    } else if selected.len() == total {
        ScanPlan::Scan(BucketFilter::All)
    } else if selected.len() * 2 <= total {
        ScanPlan::Scan(BucketFilter::IdsIn(selected))
    } else {
        let chosen: FxHashSet<i64> = selected.into_iter().collect();
        let unselected: Vec<i64> = all_ids
            .iter()
            .copied()
            .filter(|id| !chosen.contains(id))
            .collect();
        ScanPlan::Scan(BucketFilter::IdsNotIn(unselected))
    }
}

/// Propagate per-file sums up the parent chain so directories carry the
/// sum of their descendants. Buckets are only ever stored against leaf
/// nodes, so walking each leaf's ancestor chain never double-counts.
fn roll_up(nodes: &[FileNode], totals: &mut FxHashMap<i64, MetricSums>) {
    let parent_of: FxHashMap<i64, Option<i64>> =
        nodes.iter().map(|n| (n.id, n.parent_id)).collect();

    let leaf_sums: Vec<(i64, MetricSums)> = totals.iter().map(|(id, s)| (*id, *s)).collect();
    for (id, sums) in leaf_sums {
        let mut parent = parent_of.get(&id).copied().flatten();
        while let Some(pid) = parent {
            let entry = totals.entry(pid).or_default();
            entry.commit_count += sums.commit_count;
            entry.lines_added += sums.lines_added;
            entry.lines_deleted += sums.lines_deleted;
            parent = parent_of.get(&pid).copied().flatten();
        }
    }
}

fn node_metrics(sums: MetricSums, metric: Metric) -> NodeMetrics {
    let value = match metric {
        Metric::CommitCount => sums.commit_count,
        Metric::LinesAdded => sums.lines_added,
        Metric::LinesDeleted => sums.lines_deleted,
    };
    NodeMetrics {
        commit_count: sums.commit_count,
        lines_added: sums.lines_added,
        lines_deleted: sums.lines_deleted,
        value,
    }
}
