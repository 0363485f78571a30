//! History ingestion pipeline
//!
//! Turns a repository's commit history into the durable activity index.
//!
//! # Architecture
//!
//! - **hierarchy**: path -> node id resolution with directory synthesis
//! - **contributors**: author identity -> contributor id, deduped by email
//! - **accumulator**: (file, contributor, day) metric folding
//! - **walker**: chronological commit walk feeding the three above
//!
//! The pipeline owns all in-memory maps for the duration of one run and
//! hands everything to the store in a single bulk write at the end, so a
//! failed rebuild never leaves a half-written index behind.

mod accumulator;
mod contributors;
mod hierarchy;
mod walker;

pub use accumulator::MetricAccumulator;
pub use contributors::ContributorRegistry;
pub use hierarchy::HierarchyBuilder;
pub use walker::{DateWindow, HistoryWalker, WalkStats};

use anyhow::{Context, Result};
use git2::Repository;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::model::CommitRecord;
use crate::store::Database;
use crate::util::dates::format_day;

/// In-memory state owned by a single pipeline run.
#[derive(Default)]
pub struct IndexState {
    pub hierarchy: HierarchyBuilder,
    pub contributors: ContributorRegistry,
    pub accumulator: MetricAccumulator,
    pub commits: Vec<CommitRecord>,
}

impl IndexState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What an ingestion run produced (or found already built).
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub head_sha: String,
    pub processed_commits: u64,
    pub skipped_commits: u64,
    pub total_files: u64,
    pub total_contributors: u64,
    pub total_buckets: u64,
    /// False when the stored index was already at HEAD and reused.
    pub rebuilt: bool,
}

/// Full-rebuild ingestion pipeline for one repository.
pub struct Pipeline {
    repo_path: PathBuf,
    window: DateWindow,
    force: bool,
    verbose: bool,
}

impl Pipeline {
    pub fn new(repo_path: impl AsRef<Path>, window: DateWindow) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            window,
            force: false,
            verbose: true,
        }
    }

    /// Create a quiet pipeline (no progress output, used by tests)
    pub fn quiet(repo_path: impl AsRef<Path>, window: DateWindow) -> Self {
        Self {
            verbose: false,
            ..Self::new(repo_path, window)
        }
    }

    /// Rebuild even when the stored index already matches HEAD.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Run the full pipeline: walk history, accumulate, bulk-write.
    ///
    /// Opening the repository is the only fatal setup step; everything
    /// after that either completes or leaves the previous index intact.
    pub async fn run(&self, db: &Database) -> Result<IndexSummary> {
        let repo = Repository::open(&self.repo_path)
            .with_context(|| format!("failed to open git repository at {}", self.repo_path.display()))?;
        let head_sha = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .context("failed to resolve HEAD commit")?
            .id()
            .to_string();

        if !self.force && db.get_metadata("head_sha").await.as_deref() == Some(&head_sha) {
            self.log(&format!(
                "Index is up to date (HEAD: {}), skipping rebuild",
                &head_sha[..8]
            ));
            return Ok(self.summary_from_metadata(db, head_sha).await);
        }

        let mut state = IndexState::new();
        let walker = HistoryWalker::new(&repo, self.window);
        let progress = self.progress_bar();
        let stats = walker.walk(&mut state, &progress)?;
        progress.finish_and_clear();

        let min_day = state.commits.iter().map(|c| c.day).min();
        let max_day = state.commits.iter().map(|c| c.day).max();

        let files = state.hierarchy.into_nodes();
        let contributors = state.contributors.into_contributors();
        let buckets = state.accumulator.drain();
        let commits = state.commits;

        let summary = IndexSummary {
            head_sha: head_sha.clone(),
            processed_commits: stats.processed,
            skipped_commits: stats.skipped,
            total_files: files.len() as u64,
            total_contributors: contributors.len() as u64,
            total_buckets: buckets.len() as u64,
            rebuilt: true,
        };

        let metadata = self.build_metadata(&summary, min_day.zip(max_day))?;

        self.log(&format!(
            "Writing {} files, {} contributors, {} buckets, {} commits...",
            files.len(),
            contributors.len(),
            buckets.len(),
            commits.len()
        ));
        db.write_all(&files, &contributors, &buckets, &commits, &metadata)
            .await?;

        Ok(summary)
    }

    fn build_metadata(
        &self,
        summary: &IndexSummary,
        day_bounds: Option<(time::Date, time::Date)>,
    ) -> Result<Vec<(String, String)>> {
        let repo_name = self
            .repo_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repo")
            .to_string();
        let processed_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("failed to format timestamp")?;

        let mut metadata = vec![
            ("repo_path".into(), self.repo_path.display().to_string()),
            ("repo_name".into(), repo_name),
            ("processed_at".into(), processed_at),
            ("head_sha".into(), summary.head_sha.clone()),
            ("total_commits".into(), summary.processed_commits.to_string()),
            ("skipped_commits".into(), summary.skipped_commits.to_string()),
            ("total_contributors".into(), summary.total_contributors.to_string()),
            ("total_files".into(), summary.total_files.to_string()),
            ("total_buckets".into(), summary.total_buckets.to_string()),
        ];
        if let Some((min, max)) = day_bounds {
            metadata.push(("min_date".into(), format_day(min)));
            metadata.push(("max_date".into(), format_day(max)));
        }
        if let Some(since) = self.window.since {
            metadata.push(("since".into(), format_day(since)));
        }
        if let Some(until) = self.window.until {
            metadata.push(("until".into(), format_day(until)));
        }
        Ok(metadata)
    }

    /// Rebuild a summary for the fast path from persisted metadata.
    async fn summary_from_metadata(&self, db: &Database, head_sha: String) -> IndexSummary {
        IndexSummary {
            head_sha,
            processed_commits: read_count(db, "total_commits").await,
            skipped_commits: read_count(db, "skipped_commits").await,
            total_files: read_count(db, "total_files").await,
            total_contributors: read_count(db, "total_contributors").await,
            total_buckets: read_count(db, "total_buckets").await,
            rebuilt: false,
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.verbose {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Indexing: [{bar:50.cyan/blue}] {pos}/{len} ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    }

    fn log(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", msg);
        }
    }
}

async fn read_count(db: &Database, key: &str) -> u64 {
    db.get_metadata(key)
        .await
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
