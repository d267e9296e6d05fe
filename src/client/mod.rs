//! Typed HTTP client for the polygon API.

use async_trait::async_trait;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use reqwest::{header, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::auth::SESSION_COOKIE;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Login succeeded but no session cookie was returned")]
    MissingSession,
}

/// Polygon persistence as seen from the application shell.
#[async_trait]
pub trait PolygonApi: Send + Sync {
    async fn list(&self) -> Result<FeatureCollection, ClientError>;
    async fn create(&self, geometry: &Geometry, attributes: &JsonObject) -> Result<Feature, ClientError>;
    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

/// reqwest client that logs in with the shared password and replays the
/// session cookie on later calls.
#[derive(Debug)]
pub struct PolygonApiClient {
    client: reqwest::Client,
    base_url: Url,
    session: RwLock<Option<String>>,
}

impl PolygonApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            session: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", path, e)))
    }

    pub fn session_token(&self) -> Option<String> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_session_token(&self, token: Option<String>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// POST /api/auth and keep the returned session cookie.
    pub async fn login(&self, password: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/api/auth")?)
            .json(&json!({ "password": password }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let token = session_from_response(&response).ok_or(ClientError::MissingSession)?;
        debug!("Obtained session cookie");
        self.set_session_token(Some(token));
        Ok(())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session_token() {
            Some(token) => request.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => request,
        }
    }
}

#[async_trait]
impl PolygonApi for PolygonApiClient {
    async fn list(&self) -> Result<FeatureCollection, ClientError> {
        let response = self.authorize(self.client.get(self.url("/api/polygons")?)).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn create(&self, geometry: &Geometry, attributes: &JsonObject) -> Result<Feature, ClientError> {
        let body = json!({ "geometry": geometry, "attributes": attributes });
        let response = self
            .authorize(self.client.post(self.url("/api/polygons")?))
            .json(&body)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/api/polygons/{}", id);
        let response = self.authorize(self.client.delete(self.url(&path)?)).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies use the {"success": false, "error": "..."} envelope
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        _ => ClientError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

fn session_from_response(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_api_paths_onto_base_url() {
        let client = PolygonApiClient::new("http://localhost:3000").unwrap();
        assert_eq!(client.url("/api/polygons").unwrap().as_str(), "http://localhost:3000/api/polygons");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(PolygonApiClient::new("::nope"), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn session_token_round_trips() {
        let client = PolygonApiClient::new("http://localhost:3000").unwrap();
        assert_eq!(client.session_token(), None);
        client.set_session_token(Some("abc".to_string()));
        assert_eq!(client.session_token(), Some("abc".to_string()));
    }
}
