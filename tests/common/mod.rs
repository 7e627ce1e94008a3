//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Months, NaiveDate, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use journal_access::casa::{InMemoryNonceStore, NonceStore};
use journal_access::config::EngineConfig;
use journal_access::http::HttpServer;
use journal_access::lifecycle::Shutdown;
use journal_access::subscription::{Dataset, InMemoryRepository, SubscriptionRepository};

pub const CASA_SECRET: &str = "integration-casa-secret";
pub const TICKET_KEY: &str = "integration-ticket-key";
pub const CAMPUS_CIDR: &str = "192.0.2.0/24";
pub const CAMPUS_REFERER: &str = "https://proxy.example.edu/ezproxy";

/// Issue published last month: the journal's latest, under embargo.
pub const RECENT_ISSUE: &str = "ae-recent";
/// Issue published years ago: free.
pub const OLD_ISSUE: &str = "ae-old";
/// Issue still in production.
pub const UNPUBLISHED_ISSUE: &str = "ae-next";
pub const RECENT_ARTICLE: &str = "ae-recent-a1";

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn months_ago(months: u32) -> NaiveDate {
    today().checked_sub_months(Months::new(months)).unwrap()
}

fn months_ahead(months: u32) -> NaiveDate {
    today().checked_add_months(Months::new(months)).unwrap()
}

/// One closed scientific journal with three issues and three subscriptions:
/// a campus (IP range + referer), an individual (user 7), and a CASA-only institution.
pub fn dataset() -> Dataset {
    let current = json!([{ "start": months_ago(6), "end": months_ahead(6) }]);
    serde_json::from_value(json!({
        "journals": [{
            "id": 1,
            "code": "ae",
            "localidentifier": "ae1",
            "collection": 1,
            "type": "scientific",
            "open_access": false,
            "latest_issue": RECENT_ISSUE
        }],
        "issues": [
            {
                "localidentifier": RECENT_ISSUE,
                "journal": 1,
                "publication_date": months_ago(1),
                "is_published": true,
                "volume": "12",
                "number": "2"
            },
            {
                "localidentifier": OLD_ISSUE,
                "journal": 1,
                "publication_date": months_ago(60),
                "is_published": true,
                "volume": "7",
                "number": "1"
            },
            {
                "localidentifier": UNPUBLISHED_ISSUE,
                "journal": 1,
                "is_published": false
            }
        ],
        "articles": [
            { "localidentifier": RECENT_ARTICLE, "issue": RECENT_ISSUE }
        ],
        "subscriptions": [
            {
                "id": 1,
                "owner": { "kind": "institutional", "organisation": 10 },
                "scope": { "kind": "collection", "collection": 1 },
                "periods": current,
                "ip_ranges": [{ "cidr": CAMPUS_CIDR }],
                "referers": [CAMPUS_REFERER]
            },
            {
                "id": 2,
                "owner": { "kind": "individual", "user": 7 },
                "scope": { "kind": "journals", "journals": [1] },
                "periods": current
            },
            {
                "id": 3,
                "owner": { "kind": "institutional", "organisation": 11 },
                "scope": { "kind": "collection", "collection": 1 },
                "periods": current
            }
        ]
    }))
    .unwrap()
}

pub fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.casa.enabled = true;
    config.casa.secret = CASA_SECRET.into();
    config.tickets.key = TICKET_KEY.into();
    config.identity.trust_headers = true;
    config.observability.metrics_enabled = false;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<EngineConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a server over the fixture dataset on an ephemeral port.
pub async fn start_server(config: EngineConfig) -> TestServer {
    let repository = Arc::new(InMemoryRepository::from_dataset(dataset()));
    start_server_with(config, repository, Arc::new(InMemoryNonceStore::new())).await
}

/// Start a server over caller-supplied stores.
pub async fn start_server_with(
    config: EngineConfig,
    repository: Arc<dyn SubscriptionRepository>,
    nonces: Arc<dyn NonceStore>,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, repository, nonces);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    wait_until_ready(addr).await;
    TestServer { addr, shutdown, config_updates }
}

async fn wait_until_ready(addr: SocketAddr) {
    let client = client();
    for _ in 0..50 {
        if client.get(format!("http://{}/health", addr)).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server on {} never became ready", addr);
}

/// Client without connection pooling or cookie store.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
