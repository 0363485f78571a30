use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;
use sqlx::{
    Pool, QueryBuilder, Row, Sqlite, Transaction,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::collections::HashMap;
use std::str::FromStr;

use crate::model::{CommitRecord, Contributor, FileNode, MetricBucket};
use crate::util::dates::{format_day, parse_day};

use super::{BucketFilter, SCHEMA_VERSION};

/// Per-file sums for one range/filter scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricSums {
    pub commit_count: i64,
    pub lines_added: i64,
    pub lines_deleted: i64,
}

/// One day of the commit timeline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimelinePoint {
    pub date: String,
    pub count: i64,
}

/// A contributor's commit total for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileContributor {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub commits: i64,
}

/// Database abstraction for SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Configure connection options with PRAGMAs applied to every connection
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-64000"); // 64MB cache

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Initialize database schema, returns true if schema was rebuilt
    pub async fn init_schema(&self) -> Result<bool> {
        // Create metadata table first (needed to check version)
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Check schema version
        let stored_version: Option<String> =
            sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
                .fetch_optional(&self.pool)
                .await?
                .map(|row| row.get("value"));

        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if stored_version.is_some() {
                eprintln!(
                    "Schema version changed ({} -> {}), rebuilding index...",
                    stored_version.unwrap_or_default(),
                    SCHEMA_VERSION
                );
            }
            sqlx::query("DROP TABLE IF EXISTS file_metrics").execute(&self.pool).await?;
            sqlx::query("DROP TABLE IF EXISTS commits").execute(&self.pool).await?;
            sqlx::query("DROP TABLE IF EXISTS files").execute(&self.pool).await?;
            sqlx::query("DROP TABLE IF EXISTS contributors").execute(&self.pool).await?;
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                parent_id INTEGER,
                name TEXT NOT NULL,
                is_directory INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS contributors (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS commits (
                sha TEXT PRIMARY KEY,
                contributor_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                message TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // One row per (file, contributor, day); repeated touches accumulate
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS file_metrics (
                file_id INTEGER NOT NULL,
                contributor_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                commit_count INTEGER NOT NULL,
                lines_added INTEGER NOT NULL,
                lines_deleted INTEGER NOT NULL,
                PRIMARY KEY (file_id, contributor_id, date)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Range scans by day, and the common "file + range (+ contributor)"
        // query shape, must not degrade to full scans
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_date ON file_metrics (date)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_file_date ON file_metrics (file_id, date)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_file_date_contributor \
             ON file_metrics (file_id, date, contributor_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_date ON commits (date)")
            .execute(&self.pool)
            .await?;

        // Store current schema version
        if needs_rebuild {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await?;
        }

        Ok(needs_rebuild)
    }

    /// Whether the store was built with the schema this build expects.
    ///
    /// `serve` checks this at startup so an outdated store fails with a
    /// clear message instead of SQL errors on the first query.
    pub async fn schema_is_current(&self) -> bool {
        self.get_metadata("schema_version").await.as_deref() == Some(SCHEMA_VERSION)
    }

    /// Get metadata value by key
    pub async fn get_metadata(&self, key: &str) -> Option<String> {
        sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get("value"))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Load the full metadata map
    pub async fn metadata_map(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM metadata")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    /// Replace the whole index in ONE transaction.
    ///
    /// Readers either see the previous index or the new one, never a mix;
    /// a failed rebuild rolls back and leaves the old index queryable.
    pub async fn write_all(
        &self,
        files: &[FileNode],
        contributors: &[Contributor],
        buckets: &[MetricBucket],
        commits: &[CommitRecord],
        metadata: &[(String, String)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM file_metrics").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM commits").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM files").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM contributors").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM metadata WHERE key != 'schema_version'")
            .execute(&mut *tx)
            .await?;

        self.insert_files(&mut tx, files).await?;
        self.insert_contributors(&mut tx, contributors).await?;
        self.insert_buckets(&mut tx, buckets).await?;
        self.insert_commits(&mut tx, commits).await?;

        for (key, value) in metadata {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load all hierarchy nodes ordered by path
    pub async fn load_nodes(&self) -> Result<Vec<FileNode>> {
        let rows = sqlx::query(
            "SELECT id, path, parent_id, name, is_directory FROM files ORDER BY path",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| node_from_row(&row)).collect())
    }

    /// Point lookup of a single node
    pub async fn load_node(&self, id: i64) -> Result<Option<FileNode>> {
        let row = sqlx::query(
            "SELECT id, path, parent_id, name, is_directory FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| node_from_row(&row)))
    }

    /// Load all contributors ordered by name
    pub async fn load_contributors(&self) -> Result<Vec<Contributor>> {
        let rows = sqlx::query("SELECT id, name, email FROM contributors ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Contributor {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
            })
            .collect())
    }

    /// All contributor ids, sorted (used for filter-strategy selection)
    pub async fn contributor_ids(&self) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM contributors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Load all metric buckets, ordered by key (used by tests)
    pub async fn load_buckets(&self) -> Result<Vec<MetricBucket>> {
        let rows = sqlx::query(
            "SELECT file_id, contributor_id, date, commit_count, lines_added, lines_deleted \
             FROM file_metrics ORDER BY file_id, contributor_id, date",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let date: String = row.get("date");
                Ok(MetricBucket {
                    file_id: row.get("file_id"),
                    contributor_id: row.get("contributor_id"),
                    day: parse_day(&date)?,
                    commit_count: row.get("commit_count"),
                    lines_added: row.get("lines_added"),
                    lines_deleted: row.get("lines_deleted"),
                })
            })
            .collect()
    }

    /// Sum bucket counters per file over a day range with the given
    /// contributor predicate.
    pub async fn sum_metrics(
        &self,
        start: &str,
        end: &str,
        filter: &BucketFilter,
    ) -> Result<FxHashMap<i64, MetricSums>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT file_id, \
                SUM(commit_count) AS commit_count, \
                SUM(lines_added) AS lines_added, \
                SUM(lines_deleted) AS lines_deleted \
             FROM file_metrics WHERE date >= ",
        );
        qb.push_bind(start);
        qb.push(" AND date <= ");
        qb.push_bind(end);

        match filter {
            BucketFilter::All => {}
            BucketFilter::IdsIn(ids) => {
                qb.push(" AND contributor_id IN (");
                let mut sep = qb.separated(", ");
                for id in ids {
                    sep.push_bind(*id);
                }
                qb.push(")");
            }
            BucketFilter::IdsNotIn(ids) => {
                qb.push(" AND contributor_id NOT IN (");
                let mut sep = qb.separated(", ");
                for id in ids {
                    sep.push_bind(*id);
                }
                qb.push(")");
            }
        }
        qb.push(" GROUP BY file_id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<i64, _>("file_id"),
                    MetricSums {
                        commit_count: row.get("commit_count"),
                        lines_added: row.get("lines_added"),
                        lines_deleted: row.get("lines_deleted"),
                    },
                )
            })
            .collect())
    }

    /// Daily commit totals, optionally bounded, ordered by day
    pub async fn timeline(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Vec<TimelinePoint>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT date, COUNT(*) AS count FROM commits");
        if start.is_some() || end.is_some() {
            qb.push(" WHERE 1=1");
            if let Some(start) = start {
                qb.push(" AND date >= ");
                qb.push_bind(start);
            }
            if let Some(end) = end {
                qb.push(" AND date <= ");
                qb.push_bind(end);
            }
        }
        qb.push(" GROUP BY date ORDER BY date");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelinePoint {
                date: row.get("date"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Min and max commit day in the index, if any commits exist
    pub async fn commit_date_bounds(&self) -> Result<Option<(String, String)>> {
        let row = sqlx::query("SELECT MIN(date) AS min_date, MAX(date) AS max_date FROM commits")
            .fetch_one(&self.pool)
            .await?;
        let min: Option<String> = row.get("min_date");
        let max: Option<String> = row.get("max_date");
        Ok(min.zip(max))
    }

    /// Top contributors for one file by total commit count
    pub async fn top_contributors(&self, file_id: i64, limit: i64) -> Result<Vec<FileContributor>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name, c.email, SUM(m.commit_count) AS commits \
             FROM file_metrics m \
             JOIN contributors c ON m.contributor_id = c.id \
             WHERE m.file_id = ? \
             GROUP BY c.id \
             ORDER BY commits DESC \
             LIMIT ?",
        )
        .bind(file_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FileContributor {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
                commits: row.get("commits"),
            })
            .collect())
    }

    async fn insert_files(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        files: &[FileNode],
    ) -> Result<()> {
        const BATCH_SIZE: usize = 5000;

        for chunk in files.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO files (id, path, parent_id, name, is_directory) ");
            qb.push_values(chunk, |mut row, node| {
                row.push_bind(node.id)
                    .push_bind(node.path.as_str())
                    .push_bind(node.parent_id)
                    .push_bind(node.name.as_str())
                    .push_bind(node.is_directory);
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn insert_contributors(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        contributors: &[Contributor],
    ) -> Result<()> {
        const BATCH_SIZE: usize = 5000;

        for chunk in contributors.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO contributors (id, name, email) ");
            qb.push_values(chunk, |mut row, c| {
                row.push_bind(c.id)
                    .push_bind(c.name.as_str())
                    .push_bind(c.email.as_str());
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn insert_buckets(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        buckets: &[MetricBucket],
    ) -> Result<()> {
        const BATCH_SIZE: usize = 5000;

        for chunk in buckets.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO file_metrics \
                 (file_id, contributor_id, date, commit_count, lines_added, lines_deleted) ",
            );
            qb.push_values(chunk, |mut row, b| {
                row.push_bind(b.file_id)
                    .push_bind(b.contributor_id)
                    .push_bind(format_day(b.day))
                    .push_bind(b.commit_count)
                    .push_bind(b.lines_added)
                    .push_bind(b.lines_deleted);
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn insert_commits(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        commits: &[CommitRecord],
    ) -> Result<()> {
        const BATCH_SIZE: usize = 5000;

        for chunk in commits.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO commits (sha, contributor_id, date, message) ",
            );
            qb.push_values(chunk, |mut row, c| {
                row.push_bind(c.sha.as_str())
                    .push_bind(c.contributor_id)
                    .push_bind(format_day(c.day))
                    .push_bind(c.message.as_str());
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }
}

fn node_from_row(row: &sqlx::sqlite::SqliteRow) -> FileNode {
    FileNode {
        id: row.get("id"),
        path: row.get("path"),
        parent_id: row.get("parent_id"),
        name: row.get("name"),
        is_directory: row.get("is_directory"),
    }
}
