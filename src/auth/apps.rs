//! Registry of federated applications
//!
//! Third-party apps are registered by name with a shared secret. The registry
//! is loaded once at startup and is read-only afterwards.
//!
//! File format (TOML, one entry per app):
//!
//! ```toml
//! wiki = "s3cr3t-for-wiki"
//! tracker = "another-secret"
//! ```

use crate::auth::tokens::constant_time_eq;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read app registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed app registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Shared secret of a registered app
#[derive(Clone)]
pub struct AppSecret {
    secret: String,
}

impl AppSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Exact, constant-time match against a presented secret
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(presented, &self.secret)
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppSecret([REDACTED])")
    }
}

/// Federated app name → shared secret
#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
    apps: HashMap<String, AppSecret>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, secret)` pairs
    pub fn from_pairs<I, N, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let apps = pairs
            .into_iter()
            .map(|(name, secret)| (name.into(), AppSecret::new(secret)))
            .collect();
        Self { apps }
    }

    /// Parse the TOML registry format
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let pairs: HashMap<String, String> = toml::from_str(contents)?;
        Ok(Self::from_pairs(pairs))
    }

    /// Load the registry from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let registry = Self::parse(&contents).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), apps = registry.len(), "Loaded app registry");
        Ok(registry)
    }

    pub fn lookup(&self, name: &str) -> Option<&AppSecret> {
        self.apps.get(name)
    }

    /// Check presented app credentials.
    ///
    /// Unknown apps and wrong secrets give the same answer.
    pub fn verify(&self, name: &str, secret: &str) -> bool {
        match self.lookup(name) {
            Some(expected) => {
                let ok = expected.matches(secret);
                if !ok {
                    debug!(app = name, "Secret mismatch for registered app");
                }
                ok
            }
            None => {
                debug!(app = name, "Unknown app");
                false
            }
        }
    }

    /// Registered app names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.apps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
