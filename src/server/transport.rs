//! HTTP server lifecycle

use crate::auth::{
    AppRegistry, Clock, SessionStore, SystemClock, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL,
};
use crate::config::PortalConfig;
use crate::server::router::create_router;
use crate::server::state::{HttpSettings, PortalState};
use crate::storage::{
    CredentialVerifier, DirectoryError, InMemoryDirectory, PostgresDirectory, UserDirectory,
};

use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Portal server configuration
#[derive(Debug, Clone)]
pub struct PortalServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    pub http: HttpSettings,
    /// How long an issued session stays valid
    pub session_ttl: Duration,
    /// How often expired sessions are swept
    pub sweep_interval: Duration,
}

impl Default for PortalServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3333)),
            http: HttpSettings::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// The portal: session store, app registry and directory behind an HTTP router
pub struct PortalServer {
    config: PortalServerConfig,
    state: PortalState,
}

impl PortalServer {
    /// Server whose credential checks and user management share one directory
    pub fn new<D>(config: PortalServerConfig, apps: AppRegistry, directory: Arc<D>) -> Self
    where
        D: CredentialVerifier + UserDirectory + 'static,
    {
        Self::with_collaborators(
            config,
            apps,
            directory.clone(),
            directory,
            Arc::new(SystemClock),
        )
    }

    pub fn with_collaborators(
        config: PortalServerConfig,
        apps: AppRegistry,
        credentials: Arc<dyn CredentialVerifier>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::with_clock(config.session_ttl, clock));
        let state = PortalState::new(
            sessions,
            Arc::new(apps),
            credentials,
            directory,
            config.http.clone(),
        );

        Self { config, state }
    }

    /// Load the app registry, open the user directory and build the server.
    ///
    /// Without a database the directory lives in memory, seeded with the
    /// bootstrap admin when one is configured.
    pub async fn launch(config: PortalConfig) -> Result<Self> {
        let apps = AppRegistry::load(&config.apps_file)
            .with_context(|| format!("Failed to load apps from {}", config.apps_file.display()))?;
        info!(path = %config.apps_file.display(), apps = apps.len(), "App registry loaded");

        match config.database {
            Some(db) => {
                let directory = PostgresDirectory::connect(db)
                    .await
                    .context("Failed to connect to database")?;
                if config.bootstrap_admin.is_some() {
                    warn!("Bootstrap admin ignored when a database is configured");
                }
                Ok(Self::new(config.server, apps, Arc::new(directory)))
            }
            None => {
                warn!("No DATABASE_URL set, users are kept in memory");
                let directory = InMemoryDirectory::new();
                if let Some(admin) = &config.bootstrap_admin {
                    match directory.create_user(&admin.username, &admin.password, true).await {
                        Ok(identity) => info!(user_id = identity.id, "Bootstrap admin created"),
                        Err(DirectoryError::Conflict(_)) => {}
                        Err(e) => return Err(e).context("Failed to create bootstrap admin"),
                    }
                }
                Ok(Self::new(config.server, apps, Arc::new(directory)))
            }
        }
    }

    pub fn state(&self) -> &PortalState {
        &self.state
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.state.sessions.clone()
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Serve until the process is killed
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then stop the session sweep
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let reclaimer = self
            .state
            .sessions
            .spawn_reclaimer(self.config.sweep_interval, stop_rx);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind_addr))?;

        info!(
            addr = %self.config.bind_addr,
            trusted_domain = %self.config.http.trusted_domain,
            apps = self.state.apps.len(),
            "Portal server listening"
        );

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        let _ = stop_tx.send(true);
        if let Err(e) = reclaimer.await {
            warn!(error = %e, "Session reclaimer ended abnormally");
        }

        served.context("HTTP server failed")?;
        info!("Portal server stopped");
        Ok(())
    }
}
