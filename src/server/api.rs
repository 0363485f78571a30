use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use time::Date;
use tracing::error;

use crate::model::Metric;
use crate::query::{ContributorFilter, FileDetail, QueryError, TreeResponse};
use crate::util::dates::parse_day;

use super::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidRange { .. } => ApiError::BadRequest(err.to_string()),
            QueryError::FileNotFound(_) => ApiError::NotFound(err.to_string()),
            QueryError::Internal(inner) => ApiError::Internal(inner),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(err) => {
                error!(error = %err, "query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
        };
        let body = Json(json!({
            "error": { "code": code, "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
pub struct TreeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Comma-separated contributor ids; mutually exclusive with
    /// `exclude_contributors`
    pub contributors: Option<String>,
    pub exclude_contributors: Option<String>,
    pub metric: Option<String>,
}

pub async fn tree(
    State(state): State<AppState>,
    Query(params): Query<TreeParams>,
) -> Result<Json<TreeResponse>, ApiError> {
    let start = parse_day_param(params.start_date.as_deref(), "start_date")?;
    let end = parse_day_param(params.end_date.as_deref(), "end_date")?;

    let filter = match (&params.contributors, &params.exclude_contributors) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "contributors and exclude_contributors are mutually exclusive".to_string(),
            ));
        }
        (Some(list), None) => ContributorFilter::Include(parse_id_list(list, "contributors")?),
        (None, Some(list)) => {
            ContributorFilter::Exclude(parse_id_list(list, "exclude_contributors")?)
        }
        (None, None) => ContributorFilter::All,
    };

    let metric = match params.metric.as_deref() {
        None => Metric::CommitCount,
        Some(s) => Metric::parse(s).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unknown metric '{}', expected commit_count, lines_added or lines_deleted",
                s
            ))
        })?,
    };

    Ok(Json(state.engine.tree(start, end, &filter, metric).await?))
}

pub async fn contributors(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let contributors = state.engine.contributors().await?;
    Ok(Json(json!({ "contributors": contributors })))
}

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let start = parse_day_param(params.start_date.as_deref(), "start_date")?;
    let end = parse_day_param(params.end_date.as_deref(), "end_date")?;
    let timeline = state.engine.timeline(start, end).await?;
    Ok(Json(json!({ "timeline": timeline })))
}

pub async fn metadata(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    Ok(Json(state.engine.metadata().await?))
}

pub async fn file_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FileDetail>, ApiError> {
    Ok(Json(state.engine.file_detail(id).await?))
}

fn parse_day_param(value: Option<&str>, name: &str) -> Result<Option<Date>, ApiError> {
    match value {
        None => Ok(None),
        Some(s) => parse_day(s)
            .map(Some)
            .map_err(|err| ApiError::BadRequest(format!("{}: {}", name, err))),
    }
}

fn parse_id_list(value: &str, name: &str) -> Result<Vec<i64>, ApiError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("{}: '{}' is not a valid id", name, s)))
        })
        .collect()
}
