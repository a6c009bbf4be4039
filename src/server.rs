//! Reusable smart charging server runtime.
//!
//! [`ServerHandle`] owns the whole lifecycle: storage backend selection
//! (with migrations for the database backend), the charging profile service,
//! the REST API, metrics and graceful shutdown.

use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::ChargingProfileService;
use crate::config::{AppConfig, LogFormat, StorageBackend};
use crate::domain::ChargingProfileRepository;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{
    init_database, DatabaseConfig, DocumentChargingProfileRepository,
    InMemoryChargingProfileRepository, SeaOrmChargingProfileRepository,
};
use crate::interfaces::http::{create_api_router, RouterOptions};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (database backend only).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

/// Storage selected from the configuration.
pub struct StorageHandle {
    pub repository: Arc<dyn ChargingProfileRepository>,
    /// Open connection when the database backend is in use.
    pub db: Option<DatabaseConnection>,
}

/// Construct the configured charging profile backend.
pub async fn build_repository(
    config: &AppConfig,
    auto_migrate: bool,
) -> Result<StorageHandle, Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("In-memory storage: profiles are lost on restart");
            Ok(StorageHandle {
                repository: Arc::new(InMemoryChargingProfileRepository::new()),
                db: None,
            })
        }
        StorageBackend::Document => {
            let repo =
                DocumentChargingProfileRepository::open(config.storage.document_root.clone())
                    .await?;
            Ok(StorageHandle {
                repository: Arc::new(repo),
                db: None,
            })
        }
        StorageBackend::Database => {
            let db_config = DatabaseConfig {
                url: config.database.connection_url(),
                pool: config.database.pool.clone(),
            };
            if config.database.url.is_none() {
                if let Some(parent) = config.database.sqlite_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let db = init_database(&db_config).await?;
            if auto_migrate {
                info!("Running database migrations...");
                Migrator::up(&db, None).await?;
                info!("Migrations completed");
            }
            Ok(StorageHandle {
                repository: Arc::new(SeaOrmChargingProfileRepository::new(db.clone())),
                db: Some(db),
            })
        }
    }
}

/// Install the Prometheus recorder once per process.
///
/// The global recorder cannot be replaced, so a restart within the same
/// process reuses the first handle. `None` if another recorder was installed.
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder unavailable, /metrics disabled: {}", e);
                None
            }
        })
        .clone()
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running smart charging server.
///
/// ```rust,no_run
/// use texnouz_smart_charging::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub service: Arc<ChargingProfileService>,
    pub config: AppConfig,
    /// Port the API is actually bound to (differs from config when it was 0).
    pub api_port: u16,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        info!(
            backend = app_cfg.storage.backend.as_str(),
            "Starting Texnouz smart charging service..."
        );

        let metrics = prometheus_handle();
        let storage = build_repository(&app_cfg, opts.auto_migrate).await?;
        let service = Arc::new(ChargingProfileService::new(
            storage.repository,
            app_cfg.profiles.clone(),
        ));

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let api_router = create_api_router(RouterOptions {
            service: Arc::clone(&service),
            backend: app_cfg.storage.backend.as_str(),
            metrics,
        });

        let api_addr = format!("{}:{}", app_cfg.server.api_host, app_cfg.server.api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API server listening on http://{}", local_addr);
        info!("OpenAPI document at http://{}/api-docs/openapi.json", local_addr);

        let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
            shutdown_signal.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            service,
            config: app_cfg,
            api_port: local_addr.port(),
            db: storage.db,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install SIGTERM/SIGINT listeners that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to stop after shutdown has been triggered, bounded
    /// by `server.shutdown_timeout`.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            api_task,
            ..
        } = self;

        let completed = shutdown
            .run_cleanup(async move {
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!("REST API server task panicked: {}", e),
                }
                if let Some(db) = db {
                    match db.close().await {
                        Ok(()) => info!("Database connection closed"),
                        Err(e) => warn!("Error closing database connection: {}", e),
                    }
                }
            })
            .await;

        if completed {
            info!("Smart charging service shutdown complete");
        }
    }

    pub async fn shutdown(self) {
        info!("Shutting down smart charging service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Initialize tracing from the application config.
///
/// Call once at process startup, before [`ServerHandle::start`]. `RUST_LOG`
/// takes precedence over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.server.api_host = "127.0.0.1".into();
        config.server.api_port = 0;
        config.server.shutdown_timeout = 5;
        config
    }

    #[tokio::test]
    async fn starts_and_stops_with_memory_backend() {
        let handle = ServerHandle::start(ServerOptions {
            config: memory_config(),
            auto_migrate: false,
        })
        .await
        .unwrap();

        assert_ne!(handle.api_port, 0);
        assert!(handle.is_running());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn database_backend_runs_migrations() {
        let mut config = memory_config();
        config.storage.backend = StorageBackend::Database;
        config.database.url = Some("sqlite::memory:".into());
        config.database.pool.max_connections = 1;

        let storage = build_repository(&config, true).await.unwrap();
        assert!(storage.db.is_some());
        let profiles = storage
            .repository
            .query("CP001", &Default::default())
            .await
            .unwrap();
        assert!(profiles.is_empty());
    }

    #[tokio::test]
    async fn document_backend_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.storage.backend = StorageBackend::Document;
        config.storage.document_root = dir.path().join("profiles");

        let storage = build_repository(&config, false).await.unwrap();
        assert!(storage.db.is_none());
        assert!(config.storage.document_root.is_dir());
    }
}
