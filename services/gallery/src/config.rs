//! Service configuration
//!
//! Values come from `GALLERY_*` environment variables on top of built-in
//! defaults, e.g. `GALLERY_BIND_ADDR=127.0.0.1:8080`.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Which media store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgreSQL, configured through `DATABASE_*`
    Postgres,
    /// In-process store, contents are lost on restart
    Memory,
}

/// HTTP service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,
    /// Origin of the public viewer, used as the base of share links
    pub public_origin: String,
    /// Upper bound for a single media store call
    pub store_timeout_ms: u64,
    /// Report denied reads as 404 instead of 403
    pub conceal_access_denied: bool,
    pub store_backend: StoreBackend,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

impl ApiConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_addr", "0.0.0.0:4000")?
            .set_default("public_origin", "http://localhost:3000")?
            .set_default("store_timeout_ms", 5000_i64)?
            .set_default("conceal_access_denied", true)?
            .set_default("store_backend", "postgres")?
            .set_default("max_upload_bytes", 25_i64 * 1024 * 1024)?
            .add_source(Environment::with_prefix("GALLERY").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4000".to_string(),
            public_origin: "http://localhost:3000".to_string(),
            store_timeout_ms: 5000,
            conceal_access_denied: true,
            store_backend: StoreBackend::Postgres,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 6] = [
        "GALLERY_BIND_ADDR",
        "GALLERY_PUBLIC_ORIGIN",
        "GALLERY_STORE_TIMEOUT_MS",
        "GALLERY_CONCEAL_ACCESS_DENIED",
        "GALLERY_STORE_BACKEND",
        "GALLERY_MAX_UPLOAD_BYTES",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = ApiConfig::from_env().unwrap();
        let default = ApiConfig::default();

        assert_eq!(config.bind_addr, default.bind_addr);
        assert_eq!(config.public_origin, default.public_origin);
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert!(config.conceal_access_denied);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            env::set_var("GALLERY_PUBLIC_ORIGIN", "https://gallery.example.com");
            env::set_var("GALLERY_STORE_TIMEOUT_MS", "250");
            env::set_var("GALLERY_CONCEAL_ACCESS_DENIED", "false");
            env::set_var("GALLERY_STORE_BACKEND", "memory");
        }

        let config = ApiConfig::from_env().unwrap();
        assert_eq!(config.public_origin, "https://gallery.example.com");
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        assert!(!config.conceal_access_denied);
        assert_eq!(config.store_backend, StoreBackend::Memory);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_backend_is_rejected() {
        clear_env();
        unsafe {
            env::set_var("GALLERY_STORE_BACKEND", "redis");
        }

        assert!(ApiConfig::from_env().is_err());

        clear_env();
    }
}
