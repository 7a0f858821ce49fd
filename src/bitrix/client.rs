use super::{DataSource, ListingQuery, UpstreamError};
use crate::config::BitrixConfig;
use crate::types::{Channel, ListingRecord, UserProfile};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

const STATUS_FIELD: &str = "ufCrm37Status";
const PRICE_FIELD: &str = "ufCrm37Price";
const AGENT_EMAIL_FIELD: &str = "ufCrm37AgentEmail";
const CREATED_FIELD: &str = "createdTime";

/// Standard Bitrix24 REST response wrapper.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    next: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemPage {
    #[serde(default)]
    items: Vec<ListingRecord>,
}

/// Bitrix24 inbound-webhook client for users and listing items.
pub struct BitrixClient {
    client: reqwest::Client,
    base_url: String,
    listing_entity_type_id: u32,
}

impl BitrixClient {
    pub fn new(config: &BitrixConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.webhook_url.trim_end_matches('/').to_string(),
            listing_entity_type_id: config.listing_entity_type_id,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<Envelope<T>, UpstreamError> {
        let url = format!("{}/{}.json", self.base_url, method);
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        let envelope: Result<Envelope<T>, _> = serde_json::from_slice(&bytes);
        match envelope {
            Ok(Envelope {
                error: Some(error),
                error_description,
                ..
            }) => Err(UpstreamError::Api {
                error,
                description: error_description.unwrap_or_default(),
            }),
            _ if !status.is_success() => Err(UpstreamError::Status(status.as_u16())),
            Ok(envelope) => Ok(envelope),
            Err(e) => Err(UpstreamError::Decode(format!("{method}: {e}"))),
        }
    }

    fn listing_select() -> Vec<&'static str> {
        let mut select = vec![STATUS_FIELD, PRICE_FIELD, CREATED_FIELD];
        select.extend(Channel::ALL.iter().map(|c| c.crm_field()));
        select
    }

    fn listing_filter(query: &ListingQuery) -> Map<String, Value> {
        let mut filter = Map::new();
        filter.insert(AGENT_EMAIL_FIELD.to_string(), json!(query.agent_email));
        if let Some(window) = query.created {
            let (start, end) = window.local_bounds();
            filter.insert(format!(">={CREATED_FIELD}"), json!(start.to_rfc3339()));
            filter.insert(format!("<{CREATED_FIELD}"), json!(end.to_rfc3339()));
        }
        filter
    }
}

impl DataSource for BitrixClient {
    async fn fetch_user(&self, id: u64) -> Result<Option<UserProfile>, UpstreamError> {
        let body = json!({ "FILTER": { "ID": id } });
        let envelope: Envelope<Vec<UserProfile>> = self.call("user.get", &body).await?;
        let users = envelope
            .result
            .ok_or_else(|| UpstreamError::Decode("user.get: missing result".to_string()))?;
        Ok(users.into_iter().next())
    }

    async fn fetch_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ListingRecord>, UpstreamError> {
        let filter = Self::listing_filter(query);
        let select = Self::listing_select();
        let mut records = Vec::new();
        let mut start: u64 = 0;

        loop {
            let body = json!({
                "entityTypeId": self.listing_entity_type_id,
                "filter": filter,
                "select": select,
                "start": start,
            });
            let envelope: Envelope<ItemPage> = self.call("crm.item.list", &body).await?;
            let page = envelope
                .result
                .ok_or_else(|| UpstreamError::Decode("crm.item.list: missing result".to_string()))?;
            let fetched = page.items.len();
            records.extend(page.items);

            match envelope.next {
                Some(next) if next > start && fetched > 0 => start = next,
                _ => break,
            }
        }

        tracing::debug!(
            agent = %query.agent_email,
            window = ?query.created.map(|w| w.to_string()),
            count = records.len(),
            "fetched listings"
        );
        Ok(records)
    }
}
