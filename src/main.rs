use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use time::{Date, OffsetDateTime};
use tracing_subscriber::EnvFilter;

use repovis::cli::{self, Cli, Command};
use repovis::pipeline::{DateWindow, Pipeline};
use repovis::query::QueryEngine;
use repovis::server;
use repovis::store::Database;
use repovis::util::dates::{format_day, parse_date_expr};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repovis=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Index {
            repo_path,
            since,
            until,
            force,
            output,
        } => index(repo_path, since, until, force, output).await,
        Command::Serve {
            repo_path,
            since,
            until,
            data,
            host,
            port,
        } => serve(repo_path, since, until, data, host, port).await,
    }
}

async fn index(
    repo_path: PathBuf,
    since: Option<String>,
    until: Option<String>,
    force: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let window = resolve_window(since.as_deref(), until.as_deref())?;
    let db_path = match output {
        Some(path) => path,
        None => derived_store_path(&repo_path, &window)?,
    };
    eprintln!("Using index: {}", db_path.display());

    let db = open_database(&db_path).await?;
    db.init_schema().await?;

    let mut pipeline = Pipeline::new(&repo_path, window);
    if force {
        pipeline = pipeline.force();
    }
    let summary = pipeline.run(&db).await?;

    if summary.rebuilt {
        eprintln!(
            "Indexed {} commits ({} skipped): {} files, {} contributors, {} activity buckets",
            summary.processed_commits,
            summary.skipped_commits,
            summary.total_files,
            summary.total_contributors,
            summary.total_buckets
        );
    }
    Ok(())
}

async fn serve(
    repo_path: PathBuf,
    since: Option<String>,
    until: Option<String>,
    data: Option<PathBuf>,
    host: String,
    port: u16,
) -> Result<()> {
    let db_path = match data {
        Some(path) => path,
        None => {
            let window = resolve_window(since.as_deref(), until.as_deref())?;
            derived_store_path(&repo_path, &window)?
        }
    };
    if !db_path.exists() {
        bail!(
            "no index found at {} - run `repovis index` first",
            db_path.display()
        );
    }

    let db = open_database(&db_path).await?;
    if !db.schema_is_current().await {
        bail!(
            "index at {} was built with an incompatible schema - re-run `repovis index`",
            db_path.display()
        );
    }
    let engine = QueryEngine::new(db);
    server::serve(engine, &format!("{}:{}", host, port)).await
}

fn resolve_window(since: Option<&str>, until: Option<&str>) -> Result<DateWindow> {
    let today = OffsetDateTime::now_utc().date();
    let resolve = |expr: Option<&str>| -> Result<Option<Date>> {
        expr.map(|s| parse_date_expr(s, today)).transpose()
    };
    Ok(DateWindow {
        since: resolve(since)?,
        until: resolve(until)?,
    })
}

fn derived_store_path(repo_path: &Path, window: &DateWindow) -> Result<PathBuf> {
    let since = window.since.map(format_day);
    let until = window.until.map(format_day);
    cli::store_path(repo_path, since.as_deref(), until.as_deref())
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .with_context(|| format!("non-UTF-8 database path: {}", path.display()))?;
    Database::new(path_str).await
}
