use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Listing lifecycle status as reported by the CRM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingStatus {
    Published,
    Live,
    Draft,
    /// Any status outside the three tracked buckets. A missing status is `Other("")`.
    Other(String),
}

impl Default for ListingStatus {
    fn default() -> Self {
        ListingStatus::Other(String::new())
    }
}

impl ListingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PUBLISHED" => ListingStatus::Published,
            "LIVE" => ListingStatus::Live,
            "DRAFT" => ListingStatus::Draft,
            other => ListingStatus::Other(other.to_string()),
        }
    }
}

/// Distribution outlet a published listing can be pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    PropertyFinder,
    Bayut,
    Dubizzle,
    Website,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::PropertyFinder,
        Channel::Bayut,
        Channel::Dubizzle,
        Channel::Website,
    ];

    /// CRM field carrying the enablement flag for this channel.
    pub fn crm_field(&self) -> &'static str {
        match self {
            Channel::PropertyFinder => "ufCrm37PfEnable",
            Channel::Bayut => "ufCrm37BayutEnable",
            Channel::Dubizzle => "ufCrm37DubizzleEnable",
            Channel::Website => "ufCrm37WebsiteEnable",
        }
    }
}

/// Value the CRM uses for an enabled channel flag.
pub const FLAG_ENABLED: &str = "Y";

/// One listing item fetched from the CRM.
///
/// Deserialization never fails on malformed field values: bad flags read as
/// disabled, bad prices as `None`, unparseable timestamps as `None`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ListingRecord {
    #[serde(rename = "ufCrm37Status", default, deserialize_with = "de_status")]
    pub status: ListingStatus,
    #[serde(rename = "ufCrm37PfEnable", default, deserialize_with = "de_flag")]
    pub pf_enabled: bool,
    #[serde(rename = "ufCrm37BayutEnable", default, deserialize_with = "de_flag")]
    pub bayut_enabled: bool,
    #[serde(rename = "ufCrm37DubizzleEnable", default, deserialize_with = "de_flag")]
    pub dubizzle_enabled: bool,
    #[serde(rename = "ufCrm37WebsiteEnable", default, deserialize_with = "de_flag")]
    pub website_enabled: bool,
    #[serde(rename = "ufCrm37Price", default, deserialize_with = "de_price")]
    pub price: Option<f64>,
    #[serde(rename = "createdTime", default, deserialize_with = "de_timestamp")]
    pub created_at: Option<DateTime<FixedOffset>>,
}

impl ListingRecord {
    pub fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::PropertyFinder => self.pf_enabled,
            Channel::Bayut => self.bayut_enabled,
            Channel::Dubizzle => self.dubizzle_enabled,
            Channel::Website => self.website_enabled,
        }
    }
}

fn de_status<'de, D: Deserializer<'de>>(d: D) -> Result<ListingStatus, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => ListingStatus::parse(&s),
        _ => ListingStatus::default(),
    })
}

fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s == FLAG_ENABLED,
        Value::Bool(b) => b,
        _ => false,
    })
}

fn de_price<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let price = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(price.filter(|p| p.is_finite()))
}

fn de_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => parse_crm_timestamp(&s),
        _ => None,
    })
}

/// Parse a CRM timestamp. Offset-less values are read as server-local time.
pub fn parse_crm_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// A calendar month scoping which records an aggregation considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthWindow {
    year: i32,
    month: u32,
}

impl MonthWindow {
    /// Returns `None` for a month outside 1..=12 or a year outside 1..=9999.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return None;
        }
        Some(Self { year, month })
    }

    /// The month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in server-local time.
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Whether `ts` falls in this month on the server-local calendar.
    ///
    /// Agrees with [`MonthWindow::local_bounds`] whatever offset `ts` carries.
    pub fn contains<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> bool {
        let local = ts.with_timezone(&Local);
        local.year() == self.year && local.month() == self.month
    }

    /// Human label such as `"March 2024"`.
    pub fn label(&self) -> String {
        format!("{} {}", self.first_day().format("%B"), self.year)
    }

    /// Half-open `[start, end)` bounds of the month at server-local midnight.
    pub fn local_bounds(&self) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        (
            local_midnight(self.first_day()),
            local_midnight(self.next().first_day()),
        )
    }
}

impl std::fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<FixedOffset> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.fixed_offset(),
        None => naive.and_utc().fixed_offset(),
    }
}

/// CRM user record. Only `email` scopes listing queries; the rest is passed through.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "ID", default, deserialize_with = "de_text")]
    pub id: String,
    #[serde(rename = "NAME", default, deserialize_with = "de_text")]
    pub name: String,
    #[serde(rename = "LAST_NAME", default, deserialize_with = "de_text")]
    pub last_name: String,
    #[serde(rename = "EMAIL", default, deserialize_with = "de_text")]
    pub email: String,
    #[serde(rename = "WORK_POSITION", default, deserialize_with = "de_text")]
    pub work_position: String,
    #[serde(rename = "PERSONAL_PHOTO", default, deserialize_with = "de_text")]
    pub personal_photo: String,
    #[serde(rename = "UF_FACEBOOK", default, deserialize_with = "de_text")]
    pub facebook: String,
    #[serde(rename = "UF_LINKEDIN", default, deserialize_with = "de_text")]
    pub linkedin: String,
    #[serde(rename = "UF_TWITTER", default, deserialize_with = "de_text")]
    pub twitter: String,
    #[serde(rename = "UF_SKYPE", default, deserialize_with = "de_text")]
    pub skype: String,
    #[serde(rename = "UF_WEB_SITES", default, deserialize_with = "de_text")]
    pub web_sites: String,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.last_name).trim().to_string()
    }

    /// Non-empty social handles keyed by network.
    pub fn social(&self) -> BTreeMap<String, String> {
        [
            ("facebook", &self.facebook),
            ("linkedin", &self.linkedin),
            ("twitter", &self.twitter),
            ("skype", &self.skype),
            ("website", &self.web_sites),
        ]
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.to_string(), v.trim().to_string()))
        .collect()
    }
}

fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}
