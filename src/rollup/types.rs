use crate::types::{Channel, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing counts and worth for one user over one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRollup {
    pub month: String,
    pub live_ads: u64,
    pub published_ads: u64,
    pub draft_ads: u64,
    pub total_ads: u64,
    pub pf_ads: u64,
    pub bayut_ads: u64,
    pub dubizzle_ads: u64,
    pub website_ads: u64,
    /// Sum of prices over PUBLISHED listings only.
    pub total_worth_of_ads: f64,
}

impl MonthlyRollup {
    pub fn channel_count(&self, channel: Channel) -> u64 {
        match channel {
            Channel::PropertyFinder => self.pf_ads,
            Channel::Bayut => self.bayut_ads,
            Channel::Dubizzle => self.dubizzle_ads,
            Channel::Website => self.website_ads,
        }
    }

    pub(crate) fn channel_count_mut(&mut self, channel: Channel) -> &mut u64 {
        match channel {
            Channel::PropertyFinder => &mut self.pf_ads,
            Channel::Bayut => &mut self.bayut_ads,
            Channel::Dubizzle => &mut self.dubizzle_ads,
            Channel::Website => &mut self.website_ads,
        }
    }
}

/// Profile fields passed through from the CRM user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub employee: String,
    pub role: String,
    pub employee_photo: String,
    pub email: String,
    #[serde(default)]
    pub social: BTreeMap<String, String>,
}

impl From<&UserProfile> for EmployeeSummary {
    fn from(user: &UserProfile) -> Self {
        Self {
            employee: user.display_name(),
            role: user.work_position.clone(),
            employee_photo: user.personal_photo.clone(),
            email: user.email.clone(),
            social: user.social(),
        }
    }
}

/// Current-month performance card for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    #[serde(flatten)]
    pub employee: EmployeeSummary,
    #[serde(flatten)]
    pub rollup: MonthlyRollup,
}

/// Month-by-month rollups for the elapsed part of a year, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRollup {
    #[serde(flatten)]
    pub employee: EmployeeSummary,
    pub year: i32,
    pub months: Vec<MonthlyRollup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingInfo {
    pub id: String,
    pub message: String,
    pub timestamp: i64,
}
