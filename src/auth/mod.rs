use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{clamp_ttl_days, AppConfig};

/// Name of the HTTP-only session cookie.
pub const SESSION_COOKIE: &str = "fieldmap_session";

/// Every session belongs to the one shared team identity.
const SESSION_SUBJECT: &str = "team";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// `ttl_days` is clamped so an oversized value cannot overflow the expiry.
    pub fn new(ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: SESSION_SUBJECT.to_string(),
            exp: (now + Duration::days(clamp_ttl_days(ttl_days))).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Session secret is not configured")]
    InvalidSecret,

    #[error("Token generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

/// Sign a new session token.
pub fn issue_token(config: &AppConfig) -> Result<String, AuthError> {
    let secret = &config.security.session_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let claims = Claims::new(config.security.session_ttl_days);
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Decode and validate signature and expiry.
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, AuthError> {
    let secret = &config.security.session_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

pub fn verify_token(config: &AppConfig, token: &str) -> bool {
    decode_token(config, token).is_ok()
}

/// Compare against the shared password. An unconfigured password never matches.
pub fn password_matches(config: &AppConfig, provided: &str) -> bool {
    let expected = &config.security.shared_password;
    if expected.is_empty() {
        return false;
    }

    // Fixed-length digests keep the comparison independent of input length
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(provided.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn session_cookie(config: &AppConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE,
        token,
        config.session_max_age()
    );
    if config.security.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(config: &AppConfig) -> String {
    let mut cookie = format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax", SESSION_COOKIE);
    if config.security.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Pull the session token out of the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_SESSION_TTL_DAYS;
    use axum::http::HeaderValue;

    fn config() -> AppConfig {
        let mut config = AppConfig::development();
        config.security.shared_password = "open sesame".to_string();
        config.security.session_secret = "test-secret".to_string();
        config
    }

    #[test]
    fn issued_token_verifies() {
        let config = config();
        let token = issue_token(&config).unwrap();
        assert!(verify_token(&config, &token));

        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "team");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn oversized_ttl_issues_a_capped_token() {
        let mut config = config();
        config.security.session_ttl_days = i64::MAX;

        let token = issue_token(&config).unwrap();
        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_SESSION_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = config();
        let mut other = config.clone();
        other.security.session_secret = "different".to_string();

        let token = issue_token(&other).unwrap();
        assert!(!verify_token(&config, &token));
        assert!(!verify_token(&config, "not-a-jwt"));
    }

    #[test]
    fn empty_secret_cannot_issue() {
        let mut config = config();
        config.security.session_secret.clear();
        assert!(matches!(issue_token(&config), Err(AuthError::InvalidSecret)));
    }

    #[test]
    fn password_comparison() {
        let config = config();
        assert!(password_matches(&config, "open sesame"));
        assert!(!password_matches(&config, "open sesame "));
        assert!(!password_matches(&config, ""));

        let mut unset = config.clone();
        unset.security.shared_password.clear();
        assert!(!password_matches(&unset, ""));
    }

    #[test]
    fn cookie_attributes() {
        let mut config = config();
        let cookie = session_cookie(&config, "abc");
        assert_eq!(cookie, "fieldmap_session=abc; HttpOnly; Path=/; Max-Age=604800; SameSite=Lax");

        config.security.cookie_secure = true;
        assert!(session_cookie(&config, "abc").ends_with("; Secure"));
        assert!(clear_session_cookie(&config).contains("Max-Age=0"));
    }

    #[test]
    fn extracts_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; fieldmap_session=tok.en.value; other=1"),
        );
        assert_eq!(token_from_headers(&headers), Some("tok.en.value".to_string()));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("fieldmap_session="));
        assert_eq!(token_from_headers(&empty), None);
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
