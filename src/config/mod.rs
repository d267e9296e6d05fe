use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Longest session lifetime accepted from `SESSION_TTL_DAYS`.
pub const MAX_SESSION_TTL_DAYS: i64 = 365;

/// Runtime settings, built from an environment profile plus variable overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub map: MapConfig,
    pub poi: PoiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// `APP_ENV` value; anything unrecognized is development.
    fn from_name(name: &str) -> Self {
        match name {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// When unset the server falls back to the in-memory polygon store.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub default_lat: f64,
    pub default_lng: f64,
    pub default_zoom: f64,
    /// POIs are neither fetched nor drawn below this zoom level.
    pub poi_min_zoom: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiConfig {
    /// Empty disables the POI overlay.
    pub base_url: String,
    pub type_name: String,
    pub max_features: u32,
    /// Decimal digits kept per edge when building a bounds key.
    pub bounds_precision: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub shared_password: String,
    pub session_secret: String,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = env::var("APP_ENV")
            .map(|name| Environment::from_name(&name))
            .unwrap_or(Environment::Development);

        Self::for_environment(environment).with_env_overrides()
    }

    fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Staging => Self::staging(),
            Environment::Production => Self::production(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(port) = parsed("FIELDMAP_PORT").or_else(|| parsed("PORT")) {
            self.server.port = port;
        }
        override_with(&mut self.server.enable_request_logging, "SERVER_ENABLE_REQUEST_LOGGING");

        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = Some(url).filter(|s| !s.trim().is_empty());
        }
        override_with(&mut self.database.max_connections, "DATABASE_MAX_CONNECTIONS");
        override_with(&mut self.database.connection_timeout, "DATABASE_CONNECTION_TIMEOUT");

        override_with(&mut self.map.default_lat, "MAP_DEFAULT_LAT");
        override_with(&mut self.map.default_lng, "MAP_DEFAULT_LNG");
        override_with(&mut self.map.default_zoom, "MAP_DEFAULT_ZOOM");
        override_with(&mut self.map.poi_min_zoom, "MAP_POI_MIN_ZOOM");

        if let Ok(url) = env::var("POI_SERVICE_URL") {
            self.poi.base_url = url.trim().to_string();
        }
        if let Ok(type_name) = env::var("POI_TYPE_NAME") {
            self.poi.type_name = type_name;
        }
        override_with(&mut self.poi.max_features, "POI_MAX_FEATURES");
        override_with(&mut self.poi.bounds_precision, "POI_BOUNDS_PRECISION");

        if let Ok(password) = env::var("SHARED_PASSWORD") {
            self.security.shared_password = password;
        }
        if let Ok(secret) = env::var("SESSION_SECRET") {
            self.security.session_secret = secret;
        }
        if let Some(days) = parsed("SESSION_TTL_DAYS") {
            self.security.session_ttl_days = clamp_ttl_days(days);
        }
        override_with(&mut self.security.cookie_secure, "SESSION_COOKIE_SECURE");
        if let Ok(origins) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }

        self
    }

    /// Local defaults: in-memory store, fixed password and secret, no POI service.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_request_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            map: MapConfig {
                default_lat: 0.0,
                default_lng: 0.0,
                default_zoom: 2.0,
                poi_min_zoom: 14.0,
            },
            poi: PoiConfig {
                base_url: String::new(),
                type_name: "poi".to_string(),
                max_features: 1000,
                bounds_precision: 3,
            },
            security: SecurityConfig {
                shared_password: "fieldmap".to_string(),
                session_secret: "development-session-secret".to_string(),
                session_ttl_days: 7,
                cookie_secure: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    // Deployed profiles start without credentials; they must come from the environment.
    fn staging() -> Self {
        let base = Self::development();
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                ..base.database
            },
            security: SecurityConfig {
                shared_password: String::new(),
                session_secret: String::new(),
                cookie_secure: true,
                cors_origins: vec!["https://staging.fieldmap.example".to_string()],
                ..base.security
            },
            ..base
        }
    }

    fn production() -> Self {
        let staging = Self::staging();
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                enable_request_logging: false,
                ..staging.server
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                ..staging.database
            },
            security: SecurityConfig {
                cors_origins: vec!["https://fieldmap.example".to_string()],
                ..staging.security
            },
            ..staging
        }
    }

    /// Session cookie lifetime in seconds.
    pub fn session_max_age(&self) -> i64 {
        clamp_ttl_days(self.security.session_ttl_days) * 24 * 60 * 60
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn poi_enabled(&self) -> bool {
        !self.poi.base_url.is_empty()
    }
}

/// Keep a session lifetime between one day and `MAX_SESSION_TTL_DAYS`.
pub fn clamp_ttl_days(days: i64) -> i64 {
    days.clamp(1, MAX_SESSION_TTL_DAYS)
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Replace `target` when `key` is set and parses; otherwise keep the profile value.
fn override_with<T: FromStr>(target: &mut T, key: &str) {
    if let Some(value) = parsed(key) {
        *target = value;
    }
}

// Loaded on first access by the binaries
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.poi.max_features, 1000);
        assert_eq!(config.poi.bounds_precision, 3);
        assert_eq!(config.map.poi_min_zoom, 14.0);
        assert_eq!(config.security.session_ttl_days, 7);
        assert!(!config.security.cookie_secure);
        assert!(config.database.url.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn production_requires_credentials_from_env() {
        let config = AppConfig::production();
        assert!(config.is_production());
        assert!(config.security.cookie_secure);
        assert!(config.security.shared_password.is_empty());
        assert!(config.security.session_secret.is_empty());
        assert!(!config.server.enable_request_logging);
        assert_eq!(config.database.max_connections, 50);
    }

    #[test]
    fn environment_names() {
        assert_eq!(Environment::from_name("prod"), Environment::Production);
        assert_eq!(Environment::from_name("staging"), Environment::Staging);
        assert_eq!(Environment::from_name("anything"), Environment::Development);
        assert_eq!(AppConfig::for_environment(Environment::Staging).environment, Environment::Staging);
    }

    #[test]
    fn session_max_age_is_seven_days() {
        assert_eq!(AppConfig::development().session_max_age(), 604_800);
    }

    #[test]
    fn poi_overlay_disabled_without_base_url() {
        let mut config = AppConfig::development();
        assert!(!config.poi_enabled());
        config.poi.base_url = "http://localhost:8080/wfs".to_string();
        assert!(config.poi_enabled());
    }

    #[test]
    fn session_ttl_is_clamped() {
        assert_eq!(clamp_ttl_days(30), 30);
        assert_eq!(clamp_ttl_days(0), 1);
        assert_eq!(clamp_ttl_days(-5), 1);
        assert_eq!(clamp_ttl_days(i64::MAX), MAX_SESSION_TTL_DAYS);

        let mut config = AppConfig::development();
        config.security.session_ttl_days = i64::MAX;
        assert_eq!(config.session_max_age(), MAX_SESSION_TTL_DAYS * 86_400);
    }

    #[test]
    fn override_keeps_profile_value_when_unset() {
        let mut zoom = 14.0_f64;
        override_with(&mut zoom, "FIELDMAP_TEST_UNSET_VARIABLE");
        assert_eq!(zoom, 14.0);
    }
}
