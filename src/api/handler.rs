use crate::bitrix::DataSource;
use crate::error::{AppError, AppResult};
use crate::rollup::types::{MonthlyRollup, PerformanceSnapshot, RankingInfo, YearlyRollup};
use crate::rollup::RollupService;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Raw query parameters. Kept as strings so validation messages stay ours.
#[derive(Debug, Default, Deserialize)]
pub struct RollupParams {
    pub id: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
}

impl RollupParams {
    /// The `id` as sent, once it is known to be a number.
    pub fn raw_id(&self) -> AppResult<&str> {
        self.user_id()?;
        Ok(self.id.as_deref().map(str::trim).unwrap_or_default())
    }

    pub fn user_id(&self) -> AppResult<u64> {
        let raw = self.id.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(AppError::InvalidArgument(
                "Missing required parameter 'id'".to_string(),
            ));
        }
        raw.parse::<u64>().map_err(|_| {
            AppError::InvalidArgument("Parameter 'id' must be a number".to_string())
        })
    }

    pub fn year(&self) -> AppResult<i32> {
        match self.year.as_deref().map(str::trim) {
            None | Some("") => Ok(Local::now().year()),
            Some(raw) => raw.parse::<i32>().map_err(|_| {
                AppError::InvalidArgument("Parameter 'year' must be a number".to_string())
            }),
        }
    }

    pub fn month(&self) -> AppResult<u32> {
        match self.month.as_deref().map(str::trim) {
            None | Some("") => Ok(Local::now().month()),
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                AppError::InvalidArgument("Parameter 'month' must be a number".to_string())
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache_entries: u64,
}

/// GET /performance - Current-month performance snapshot.
pub async fn performance<D: DataSource>(
    State(svc): State<Arc<RollupService<D>>>,
    Query(params): Query<RollupParams>,
) -> AppResult<Json<PerformanceSnapshot>> {
    let user_id = params.user_id()?;
    Ok(Json(svc.get_snapshot(user_id).await?))
}

/// GET /performance/monthly - One month's rollup.
pub async fn monthly<D: DataSource>(
    State(svc): State<Arc<RollupService<D>>>,
    Query(params): Query<RollupParams>,
) -> AppResult<Json<MonthlyRollup>> {
    let user_id = params.user_id()?;
    let year = params.year()?;
    let month = params.month()?;
    Ok(Json(svc.get_monthly(user_id, year, month).await?))
}

/// GET /performance/yearly - Every elapsed month of a year.
pub async fn yearly<D: DataSource>(
    State(svc): State<Arc<RollupService<D>>>,
    Query(params): Query<RollupParams>,
) -> AppResult<Json<YearlyRollup>> {
    let user_id = params.user_id()?;
    let year = params.year()?;
    Ok(Json(svc.get_yearly(user_id, year).await?))
}

/// GET /ranking
pub async fn ranking<D: DataSource>(
    State(svc): State<Arc<RollupService<D>>>,
    Query(params): Query<RollupParams>,
) -> AppResult<Json<RankingInfo>> {
    let id = params.raw_id()?;
    Ok(Json(svc.get_ranking(id)?))
}

/// GET /health
pub async fn health<D: DataSource>(
    State(svc): State<Arc<RollupService<D>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        cache_entries: svc.cache().entry_count(),
    })
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Resource not found" })),
    )
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method Not Allowed" })),
    )
}
