#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tokio::net::TcpListener;

use fieldmap_api::config::AppConfig;
use fieldmap_api::database::MemoryPolygonStore;
use fieldmap_api::server::{app, AppState};

pub const PASSWORD: &str = "team-password";
pub const SESSION_COOKIE: &str = "fieldmap_session";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
}

impl TestServer {
    /// Serve the app on a free port inside the current test runtime, backed
    /// by a fresh in-memory store.
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let state = AppState::new(test_config(), Arc::new(MemoryPolygonStore::new()));

        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        let server = Self { port, base_url };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in and return the `name=value` cookie pair to send back.
    pub async fn login(&self, client: &reqwest::Client) -> Result<String> {
        let res = client
            .post(self.url("/api/auth"))
            .json(&serde_json::json!({ "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        session_cookie(&res).context("login response had no session cookie")
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.shared_password = PASSWORD.to_string();
    config.security.session_secret = "integration-test-secret".to_string();
    config
}

/// Client that does not follow redirects so 303s can be asserted.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build reqwest client")
}

pub fn session_cookie(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{}=", SESSION_COOKIE)))
        .map(str::to_string)
}

pub fn square(offset: f64) -> serde_json::Value {
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [[
            [offset, offset],
            [offset, offset + 1.0],
            [offset + 1.0, offset + 1.0],
            [offset + 1.0, offset],
            [offset, offset]
        ]]
    })
}
