use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "repovis",
    about = "Index git history into a queryable activity database"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build (or refresh) the activity index for a repository
    Index {
        /// Path to the git repository
        #[arg(default_value = ".")]
        repo_path: PathBuf,

        /// Only include commits on or after this date (YYYY-MM-DD or e.g. "90d")
        #[arg(long)]
        since: Option<String>,

        /// Only include commits on or before this date (YYYY-MM-DD or e.g. "7d")
        #[arg(long)]
        until: Option<String>,

        /// Rebuild even if the index is already up to date
        #[arg(long)]
        force: bool,

        /// Explicit path for the index database (defaults to the cache dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Serve the query API over a built index
    Serve {
        /// Path to the git repository whose index should be served
        #[arg(default_value = ".")]
        repo_path: PathBuf,

        /// Date bound the index was built with, if any
        #[arg(long)]
        since: Option<String>,

        /// Date bound the index was built with, if any
        #[arg(long)]
        until: Option<String>,

        /// Explicit path to the index database
        #[arg(long)]
        data: Option<PathBuf>,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to run the server on
        #[arg(long, short, default_value_t = 8000)]
        port: u16,
    },
}

/// Default index location for one (repository, date bounds) combination.
///
/// The filename hashes the canonical repository path together with the
/// resolved bounds, so differently-bounded indexes of the same
/// repository coexist without collision.
pub fn store_path(repo_path: &Path, since: Option<&str>, until: Option<&str>) -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .context("Could not determine cache directory")?
        .join("repovis");
    std::fs::create_dir_all(&cache_dir)?;

    let abs_repo_path = std::fs::canonicalize(repo_path)
        .with_context(|| format!("Could not resolve path: {}", repo_path.display()))?;
    let repo_name = abs_repo_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo");

    let mut hasher = DefaultHasher::new();
    abs_repo_path.hash(&mut hasher);
    since.hash(&mut hasher);
    until.hash(&mut hasher);
    let hash = hasher.finish();

    Ok(cache_dir.join(format!("{}_{:016x}.db", repo_name, hash)))
}
