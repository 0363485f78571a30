mod types;

pub use types::{CommitRecord, Contributor, FileNode, Metric, MetricBucket};
