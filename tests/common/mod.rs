#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use portal_api::audit::{AuditLogger, ManualClock, AUDIT_POOL, AUDIT_TABLE};
use portal_api::auth::dev_users;
use portal_api::config::AppConfig;
use portal_api::database::{MemoryConnector, MemoryDatabase, PoolRegistry, Row};
use portal_api::schema::SchemaCatalog;
use portal_api::{app, AppState};

pub const IMSI_RANGES: &str = "/api/gtp/imsi-ranges";
pub const MCCMNC_MAPPINGS: &str = "/api/gtp/mccmnc-mappings";
pub const AUDIT_TRAIL: &str = "/api/admin/audit-trail";

/// The router wired to in-memory pools, driven in-process.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub connector: Arc<MemoryConnector>,
    pub clock: Arc<ManualClock>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    /// GTP_PROXY and CORE configured against memory pools.
    pub fn new() -> Self {
        Self::with_vars(&[("GTP_PROXY_DB_URL", "memory://gtp"), ("CORE_DB_URL", "memory://core")])
    }

    pub fn with_vars(extra: &[(&str, &str)]) -> Self {
        let mut vars = vec![("SESSION_SECRET", "integration-secret")];
        vars.extend_from_slice(extra);
        let config = AppConfig::from_vars(vars);

        let connector = Arc::new(MemoryConnector::new());
        let registry = Arc::new(PoolRegistry::new(connector.clone()));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()));

        let audit_registry = registry.clone();
        let audit_clock = clock.clone();
        let state = AppState::with_audit(config, SchemaCatalog::builtin().unwrap(), registry, move |config| {
            AuditLogger::new(audit_registry, config.pool_url(AUDIT_POOL).map(String::from), &config.audit)
                .with_clock(audit_clock)
        })
        .expect("app state");

        Self { router: app(state.clone()), state, connector, clock }
    }

    pub fn token(&self, username: &str) -> String {
        let user = dev_users::find(username).expect("dev user");
        self.state.sessions.issue(user).expect("session token").0
    }

    pub fn pool(&self, name: &str) -> Arc<MemoryDatabase> {
        self.connector.database(name)
    }

    pub fn audit_rows(&self) -> Vec<Row> {
        self.pool(AUDIT_POOL).rows(AUDIT_TABLE)
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::DELETE, path, Some(token), Some(body)).await
    }
}

// Process-level server for smoke tests

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // No pools configured: entity routes serve mock data
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_portal-api"));
        cmd.env("PORTAL_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("SESSION_SECRET", "smoke-secret")
            .env_remove("CORE_DB_URL")
            .env_remove("GTP_PROXY_DB_URL")
            .env_remove("PORTAL_SCHEMA_DIR")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}
