use crate::bitrix::{DataSource, ListingQuery, UpstreamError};
use crate::error::{AppError, AppResult};
use crate::rollup::aggregator::aggregate;
use crate::rollup::cache::ExpiringCache;
use crate::rollup::types::{
    EmployeeSummary, MonthlyRollup, PerformanceSnapshot, RankingInfo, YearlyRollup,
};
use crate::types::{MonthWindow, UserProfile};
use chrono::{Datelike, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

pub const DEFAULT_TTL_SECS: u64 = 300;

pub const RANKING_MESSAGE: &str = "Ranking data retrieved successfully.";

/// Cache slot for a user's current-month performance snapshot.
pub fn snapshot_key(user_id: u64) -> String {
    format!("performance_{user_id}")
}

/// Cache slot for one user-month rollup.
pub fn monthly_key(user_id: u64, window: MonthWindow) -> String {
    format!(
        "performance_month_{}_{}_{}",
        user_id,
        window.year(),
        window.month()
    )
}

/// Keyed by the id as the caller sent it, so `007` and `7` are separate entries.
pub fn ranking_key(id: &str) -> String {
    format!("ranking_{id}")
}

/// Number of months of `year` that have started as of `today`.
pub fn months_elapsed(year: i32, today: NaiveDate) -> AppResult<u32> {
    match year.cmp(&today.year()) {
        Ordering::Less => Ok(12),
        Ordering::Equal => Ok(today.month()),
        Ordering::Greater => Err(AppError::InvalidArgument(format!(
            "year {year} is in the future"
        ))),
    }
}

fn month_window(year: i32, month: u32) -> AppResult<MonthWindow> {
    MonthWindow::new(year, month)
        .ok_or_else(|| AppError::InvalidArgument(format!("invalid month: {year}-{month}")))
}

/// Cache-fronted rollups over a [`DataSource`].
///
/// Values are cached as serialized JSON so every caller gets its own copy.
pub struct RollupService<D> {
    source: D,
    cache: Arc<ExpiringCache<String>>,
    ttl_secs: u64,
}

impl<D: DataSource> RollupService<D> {
    pub fn new(source: D, cache: Arc<ExpiringCache<String>>, ttl_secs: u64) -> Self {
        Self {
            source,
            cache,
            ttl_secs,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn cache(&self) -> &Arc<ExpiringCache<String>> {
        &self.cache
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                self.cache.invalidate(key);
                None
            }
        }
    }

    fn store<T: Serialize>(&self, key: String, value: &T) -> AppResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("serialize {key}: {e}")))?;
        self.cache.set(key, raw, self.ttl_secs);
        Ok(())
    }

    async fn require_user(&self, user_id: u64) -> AppResult<UserProfile> {
        self.source
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn compute_monthly(
        &self,
        user_id: u64,
        user: &UserProfile,
        window: MonthWindow,
        key: String,
    ) -> AppResult<MonthlyRollup> {
        if user.email.trim().is_empty() {
            return Err(UpstreamError::Decode(format!("user {user_id} has no EMAIL")).into());
        }
        let query = ListingQuery::for_agent(user.email.trim()).in_month(window);
        let records = self.source.fetch_listings(&query).await?;
        let rollup = aggregate(&records, window);
        self.store(key, &rollup)?;
        tracing::info!(
            user_id,
            window = %window,
            fetched = records.len(),
            total = rollup.total_ads,
            "computed monthly rollup"
        );
        Ok(rollup)
    }

    /// Monthly path for a user already looked up.
    async fn monthly_for(
        &self,
        user_id: u64,
        user: &UserProfile,
        window: MonthWindow,
    ) -> AppResult<MonthlyRollup> {
        let key = monthly_key(user_id, window);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }
        self.compute_monthly(user_id, user, window, key).await
    }

    pub async fn get_monthly(
        &self,
        user_id: u64,
        year: i32,
        month: u32,
    ) -> AppResult<MonthlyRollup> {
        let window = month_window(year, month)?;
        let key = monthly_key(user_id, window);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }
        let user = self.require_user(user_id).await?;
        self.compute_monthly(user_id, &user, window, key).await
    }

    /// Every elapsed month of `year`, ascending. Any failing month fails the whole call.
    pub async fn get_yearly(&self, user_id: u64, year: i32) -> AppResult<YearlyRollup> {
        self.get_yearly_as_of(user_id, year, Local::now().date_naive())
            .await
    }

    pub async fn get_yearly_as_of(
        &self,
        user_id: u64,
        year: i32,
        today: NaiveDate,
    ) -> AppResult<YearlyRollup> {
        let elapsed = months_elapsed(year, today)?;
        // validates the year before any upstream call
        month_window(year, 1)?;
        let user = self.require_user(user_id).await?;

        let mut months = Vec::with_capacity(elapsed as usize);
        for month in 1..=elapsed {
            let rollup = self
                .monthly_for(user_id, &user, month_window(year, month)?)
                .await
                .inspect_err(|e| {
                    tracing::warn!(user_id, year, month, error = %e, "yearly rollup aborted");
                })?;
            months.push(rollup);
        }

        Ok(YearlyRollup {
            employee: EmployeeSummary::from(&user),
            year,
            months,
        })
    }

    /// Profile plus the current month's rollup.
    pub async fn get_snapshot(&self, user_id: u64) -> AppResult<PerformanceSnapshot> {
        let key = snapshot_key(user_id);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }
        let user = self.require_user(user_id).await?;
        let rollup = self
            .monthly_for(user_id, &user, MonthWindow::current())
            .await?;
        let snapshot = PerformanceSnapshot {
            employee: EmployeeSummary::from(&user),
            rollup,
        };
        self.store(key, &snapshot)?;
        Ok(snapshot)
    }

    pub fn get_ranking(&self, id: &str) -> AppResult<RankingInfo> {
        let key = ranking_key(id);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }
        let info = RankingInfo {
            id: id.to_string(),
            message: RANKING_MESSAGE.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        self.store(key, &info)?;
        Ok(info)
    }
}
