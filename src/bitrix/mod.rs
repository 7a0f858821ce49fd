pub mod client;

use crate::types::{ListingRecord, MonthWindow, UserProfile};
use std::future::Future;

pub use client::BitrixClient;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("api error {error}: {description}")]
    Api { error: String, description: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Listing filter: one agent's listings, optionally limited to a creation month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub agent_email: String,
    pub created: Option<MonthWindow>,
}

impl ListingQuery {
    pub fn for_agent(agent_email: impl Into<String>) -> Self {
        Self {
            agent_email: agent_email.into(),
            created: None,
        }
    }

    pub fn in_month(mut self, window: MonthWindow) -> Self {
        self.created = Some(window);
        self
    }
}

/// Source of user profiles and raw listing records.
pub trait DataSource: Send + Sync + 'static {
    /// `Ok(None)` when no user has this id.
    fn fetch_user(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<UserProfile>, UpstreamError>> + Send;

    fn fetch_listings(
        &self,
        query: &ListingQuery,
    ) -> impl Future<Output = Result<Vec<ListingRecord>, UpstreamError>> + Send;
}
