//! In-process Bitrix24 stand-in for integration tests.
//!
//! Serves `user.get` and `crm.item.list` on an ephemeral port, paginates items
//! and counts calls so tests can assert on cache behavior.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use perfboard::config::BitrixConfig;

/// How `crm.item.list` should misbehave, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    None,
    ServerError,
    ApiError,
    Garbage,
}

pub struct MockCrm {
    pub users: Mutex<HashMap<u64, Value>>,
    pub items: Mutex<Vec<Value>>,
    pub page_size: usize,
    pub user_calls: AtomicUsize,
    pub item_calls: AtomicUsize,
    pub failure: Mutex<Failure>,
    pub saw_window_filter: AtomicBool,
}

impl MockCrm {
    pub fn new(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(HashMap::new()),
            items: Mutex::new(Vec::new()),
            page_size,
            user_calls: AtomicUsize::new(0),
            item_calls: AtomicUsize::new(0),
            failure: Mutex::new(Failure::None),
            saw_window_filter: AtomicBool::new(false),
        })
    }

    pub fn add_user(&self, id: u64, name: &str, last_name: &str, email: &str) {
        self.users.lock().unwrap().insert(
            id,
            json!({
                "ID": id.to_string(),
                "NAME": name,
                "LAST_NAME": last_name,
                "EMAIL": email,
                "WORK_POSITION": "Property Consultant",
                "PERSONAL_PHOTO": format!("https://cdn.example.com/{id}.jpg"),
                "UF_LINKEDIN": format!("{}-{}", name.to_lowercase(), id),
            }),
        );
    }

    pub fn add_item(&self, item: Value) {
        self.items.lock().unwrap().push(item);
    }

    pub fn set_failure(&self, failure: Failure) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }
}

pub fn item(email: &str, status: &str, price: Value, pf: &str, created: &str) -> Value {
    json!({
        "ufCrm37AgentEmail": email,
        "ufCrm37Status": status,
        "ufCrm37Price": price,
        "ufCrm37PfEnable": pf,
        "ufCrm37BayutEnable": "N",
        "ufCrm37DubizzleEnable": "N",
        "ufCrm37WebsiteEnable": "N",
        "createdTime": created,
    })
}

fn parse_bound(filter: &Value, key: &str) -> Option<DateTime<FixedOffset>> {
    filter
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

async fn user_get(State(crm): State<Arc<MockCrm>>, Json(body): Json<Value>) -> Json<Value> {
    crm.user_calls.fetch_add(1, Ordering::SeqCst);
    let id = body["FILTER"]["ID"].as_u64().unwrap_or(0);
    let users: Vec<Value> = crm.users.lock().unwrap().get(&id).cloned().into_iter().collect();
    Json(json!({ "result": users, "total": users.len() }))
}

async fn item_list(
    State(crm): State<Arc<MockCrm>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    crm.item_calls.fetch_add(1, Ordering::SeqCst);

    let failure = *crm.failure.lock().unwrap();
    match failure {
        Failure::None => {}
        Failure::ServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
        }
        Failure::ApiError => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "INVALID_ARG_VALUE",
                    "error_description": "entityTypeId is invalid"
                })),
            )
                .into_response();
        }
        Failure::Garbage => return (StatusCode::OK, "<html>").into_response(),
    }

    let filter = &body["filter"];
    let email = filter["ufCrm37AgentEmail"].as_str().unwrap_or_default();
    let from = parse_bound(filter, ">=createdTime");
    let to = parse_bound(filter, "<createdTime");
    if from.is_some() && to.is_some() {
        crm.saw_window_filter.store(true, Ordering::SeqCst);
    }

    let matching: Vec<Value> = crm
        .items
        .lock()
        .unwrap()
        .iter()
        .filter(|it| it["ufCrm37AgentEmail"].as_str() == Some(email))
        .filter(|it| {
            let created = it["createdTime"]
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            match (created, from, to) {
                (Some(c), Some(f), Some(t)) => c >= f && c < t,
                _ => true,
            }
        })
        .cloned()
        .collect();

    let start = body["start"].as_u64().unwrap_or(0) as usize;
    let page: Vec<Value> = matching
        .iter()
        .skip(start)
        .take(crm.page_size)
        .cloned()
        .collect();
    let end = start + page.len();

    let mut resp = json!({
        "result": { "items": page },
        "total": matching.len(),
    });
    if end < matching.len() {
        resp["next"] = json!(end);
    }
    Json(resp).into_response()
}

/// Spawn the mock CRM and return its webhook base URL.
pub async fn spawn_crm(crm: Arc<MockCrm>) -> String {
    let app = Router::new()
        .route("/rest/1/token/user.get.json", post(user_get))
        .route("/rest/1/token/crm.item.list.json", post(item_list))
        .with_state(crm);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/rest/1/token")
}

pub fn bitrix_config(webhook_url: &str) -> BitrixConfig {
    BitrixConfig {
        webhook_url: webhook_url.to_string(),
        listing_entity_type_id: 1036,
        timeout_secs: 5,
    }
}
