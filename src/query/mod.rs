mod engine;

pub use engine::{
    ContributorFilter, DateBounds, FileDetail, NodeMetrics, QueryEngine, QueryError, TreeEntry,
    TreeResponse,
};
