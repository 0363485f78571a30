mod database;

pub use database::{Database, FileContributor, MetricSums, TimelinePoint};

// Re-export the schema version for callers who need it
pub const SCHEMA_VERSION: &str = "1";

/// Contributor predicate chosen by the query engine for a bucket scan.
///
/// The engine picks whichever of inclusion/exclusion is the smaller
/// operand; the store just renders it into SQL. Results are identical
/// across variants, only cost differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketFilter {
    /// No contributor predicate at all.
    All,
    /// `contributor_id IN (...)`.
    IdsIn(Vec<i64>),
    /// `contributor_id NOT IN (...)`.
    IdsNotIn(Vec<i64>),
}
