//! Command-line and environment configuration
//!
//! Every setting can come from a flag or a `PORTAL_*` environment variable
//! (a `.env` file is loaded by the binaries before parsing).

use crate::server::{HttpSettings, PortalServerConfig};
use crate::storage::{DirectoryError, PostgresConfig};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address {0:?}")]
    InvalidBind(String),

    #[error("invalid trusted domain {0:?}: {1}")]
    InvalidTrustedDomain(String, url::ParseError),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("cookie name must not be empty")]
    EmptyCookieName,

    #[error("bootstrap admin must look like name:password")]
    InvalidBootstrapAdmin,

    #[error("invalid DATABASE_URL: {0}")]
    Database(#[from] DirectoryError),
}

/// Settings for running the portal server
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3333", env = "PORTAL_BIND")]
    pub bind: String,

    /// Origin of the portal's own pages
    #[arg(long, default_value = "http://localhost:3333", env = "PORTAL_TRUSTED_DOMAIN")]
    pub trusted_domain: String,

    /// Hosts accepted as origins during development (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "localhost", env = "PORTAL_DEV_HOSTS")]
    pub dev_hosts: Vec<String>,

    /// Session validity window in seconds
    #[arg(long, default_value_t = 7200, env = "PORTAL_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Seconds between sweeps of expired sessions
    #[arg(long, default_value_t = 7200, env = "PORTAL_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: u64,

    /// TOML file of `app_name = "secret"` pairs
    #[arg(long, default_value = "apps.toml", env = "PORTAL_APPS_FILE")]
    pub apps_file: PathBuf,

    /// Name of the session cookie
    #[arg(long, default_value = "portal_session", env = "PORTAL_COOKIE_NAME")]
    pub cookie_name: String,

    /// Send the session cookie without the Secure attribute (plain-HTTP development)
    #[arg(long, env = "PORTAL_INSECURE_COOKIES")]
    pub insecure_cookies: bool,

    /// Length of passwords generated by admin resets
    #[arg(long, default_value_t = 16, env = "PORTAL_RESET_PASSWORD_LENGTH")]
    pub reset_password_length: usize,

    /// Admin created at startup when running without a database, as name:password
    #[arg(long, env = "PORTAL_BOOTSTRAP_ADMIN")]
    pub bootstrap_admin: Option<String>,
}

/// Credentials for the admin seeded into an in-memory directory
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BootstrapAdmin {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.split_once(':') {
            Some((name, password)) if !name.trim().is_empty() && !password.is_empty() => Ok(Self {
                username: name.trim().to_string(),
                password: password.to_string(),
            }),
            _ => Err(ConfigError::InvalidBootstrapAdmin),
        }
    }
}

/// Validated configuration for one portal process
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub server: PortalServerConfig,
    pub apps_file: PathBuf,
    /// `None` runs with an in-memory directory
    pub database: Option<PostgresConfig>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ServeArgs {
    pub fn to_config(&self, database_url: Option<&str>) -> Result<PortalConfig, ConfigError> {
        let bind_addr: SocketAddr = self
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))?;

        Url::parse(&self.trusted_domain)
            .map_err(|e| ConfigError::InvalidTrustedDomain(self.trusted_domain.clone(), e))?;

        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Zero("session TTL"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero("sweep interval"));
        }
        if self.reset_password_length == 0 {
            return Err(ConfigError::Zero("reset password length"));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }

        let dev_hosts = self
            .dev_hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        let database = database_url.map(PostgresConfig::from_url).transpose()?;
        let bootstrap_admin = self
            .bootstrap_admin
            .as_deref()
            .map(BootstrapAdmin::parse)
            .transpose()?;

        Ok(PortalConfig {
            server: PortalServerConfig {
                bind_addr,
                http: HttpSettings {
                    trusted_domain: self.trusted_domain.clone(),
                    dev_hosts,
                    cookie_name: self.cookie_name.trim().to_string(),
                    secure_cookies: !self.insecure_cookies,
                    reset_password_length: self.reset_password_length,
                },
                session_ttl: Duration::from_secs(self.session_ttl_secs),
                sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            },
            apps_file: self.apps_file.clone(),
            database,
            bootstrap_admin,
        })
    }
}
