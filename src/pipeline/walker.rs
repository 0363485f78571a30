//! Chronological history walk.
//!
//! Iterates commits oldest-first, computes first-parent diffs with
//! per-delta line stats, and feeds the hierarchy, contributor registry
//! and metric accumulator. A commit whose diff cannot be computed is
//! skipped and counted, never fatal; the unopenable-repository case is
//! handled by the pipeline before walking begins.

use anyhow::Result;
use git2::{Commit, DiffOptions, Patch, Repository, Sort};
use indicatif::ProgressBar;
use time::Date;
use tracing::warn;

use crate::model::CommitRecord;
use crate::util::dates::day_from_unix;

use super::IndexState;

/// Commit messages are free text from history; cap what we persist.
const MAX_MESSAGE_CHARS: usize = 500;

/// Inclusive date bounds for the walk. `None` on either side means
/// unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateWindow {
    pub since: Option<Date>,
    pub until: Option<Date>,
}

impl DateWindow {
    pub fn contains(&self, day: Date) -> bool {
        if let Some(since) = self.since {
            if day < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if day > until {
                return false;
            }
        }
        true
    }
}

/// Counts reported back to the pipeline after a walk.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkStats {
    pub processed: u64,
    pub skipped: u64,
}

struct FileChange {
    path: String,
    added: i64,
    deleted: i64,
}

pub struct HistoryWalker<'repo> {
    repo: &'repo Repository,
    window: DateWindow,
}

impl<'repo> HistoryWalker<'repo> {
    pub fn new(repo: &'repo Repository, window: DateWindow) -> Self {
        Self { repo, window }
    }

    /// Walk all reachable commits oldest-first, forwarding change events
    /// into `state`. Commits outside the date window are ignored without
    /// counting as skipped.
    pub fn walk(&self, state: &mut IndexState, progress: &ProgressBar) -> Result<WalkStats> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TIME | Sort::REVERSE)?;
        let oids: Vec<git2::Oid> = revwalk.filter_map(|r| r.ok()).collect();

        progress.set_length(oids.len() as u64);

        let mut stats = WalkStats::default();
        for oid in oids {
            progress.inc(1);

            let commit = match self.repo.find_commit(oid) {
                Ok(c) => c,
                Err(err) => {
                    warn!(commit = %oid, error = %err, "skipping unreadable commit");
                    stats.skipped += 1;
                    continue;
                }
            };

            let Some(day) = day_from_unix(commit.time().seconds()) else {
                warn!(commit = %oid, "skipping commit with out-of-range timestamp");
                stats.skipped += 1;
                continue;
            };
            if !self.window.contains(day) {
                continue;
            }

            let changes = match self.diff_commit(&commit) {
                Ok(changes) => changes,
                Err(err) => {
                    warn!(commit = %oid, error = %err, "skipping commit: diff failed");
                    stats.skipped += 1;
                    continue;
                }
            };

            let author = commit.author();
            let contributor_id = state.contributors.resolve(
                author.name().unwrap_or("unknown"),
                author.email().unwrap_or("unknown"),
            );

            for change in changes {
                let file_id = state.hierarchy.resolve_file(&change.path);
                state
                    .accumulator
                    .record(file_id, contributor_id, day, change.added, change.deleted);
            }

            state.commits.push(CommitRecord {
                sha: oid.to_string(),
                contributor_id,
                day,
                message: truncate_message(commit.message().unwrap_or("")),
            });
            stats.processed += 1;
        }

        Ok(stats)
    }

    /// Diff a commit against its first parent (or the empty tree for a
    /// root commit) and count added/deleted lines per touched file.
    fn diff_commit(&self, commit: &Commit<'_>) -> Result<Vec<FileChange>> {
        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };

        let mut opts = DiffOptions::new();
        let diff =
            self.repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

        let mut changes = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            // Prefer the post-image path so renames land on the new name
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .and_then(|p| p.to_str());
            let Some(path) = path else { continue };

            // Binary deltas have no patch; they count as a touch with no lines
            let (added, deleted) = match Patch::from_diff(&diff, idx)? {
                Some(patch) => {
                    let (_context, added, deleted) = patch.line_stats()?;
                    (added as i64, deleted as i64)
                }
                None => (0, 0),
            };

            changes.push(FileChange {
                path: path.to_string(),
                added,
                deleted,
            });
        }
        Ok(changes)
    }
}

fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}
