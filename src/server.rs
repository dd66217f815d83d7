//! OCPI node runtime
//!
//! [`ServerHandle`] owns the whole lifecycle: database, repositories,
//! outbound transport, services, scheduler, HTTP surface and graceful
//! shutdown.

use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    create_event_bus, default_error_handler, CommandService, CredentialsService,
    PlatformClientRegistry, Scheduler, SharedEventBus, Synchronizers,
};
use crate::config::{AppConfig, RemoteConfig};
use crate::domain::{DomainResult, RepositoryProvider};
use crate::infrastructure::{init_database, run_migrations, ReqwestTransport, SeaOrmRepositoryProvider};
use crate::interfaces::http::{create_ocpi_router, AppState};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
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

/// Handle to a running node.
pub struct ServerHandle {
    pub event_bus: SharedEventBus,
    pub repos: Arc<dyn RepositoryProvider>,
    pub credentials: Arc<CredentialsService>,
    pub synchronizers: Arc<Synchronizers>,
    pub commands: Arc<CommandService>,
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
    scheduler_tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        info!(platform_id = %app_cfg.platform.id, "Starting Texnouz OCPI node...");

        // The global recorder can only be installed once per process.
        static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
        let prometheus_handle = PROM_HANDLE
            .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => {
                    info!("📊 Prometheus metrics recorder installed");
                    Some(handle)
                }
                Err(e) => {
                    warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
                    None
                }
            })
            .clone();

        // ── Database ───────────────────────────────────────────
        let db_config = app_cfg.database_config();
        info!("Database: {}", db_config.url);
        let db = init_database(&db_config).await?;
        if opts.auto_migrate {
            info!("Running database migrations...");
            run_migrations(&db).await?;
            info!("Migrations completed");
        }

        // ── Repositories, transport, registry ──────────────────
        let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let transport = Arc::new(ReqwestTransport::new(app_cfg.transport_settings())?);
        let registry = PlatformClientRegistry::shared(transport);
        let loaded = registry.load_from(repos.as_ref()).await?;
        info!(count = loaded, "Connected platforms loaded");

        // ── Services ───────────────────────────────────────────
        let event_bus = create_event_bus();
        let identity = Arc::new(app_cfg.identity());
        let on_error = default_error_handler(Some(event_bus.clone()));

        let credentials = Arc::new(
            CredentialsService::new(repos.clone(), registry.clone(), identity.clone())
                .with_event_bus(event_bus.clone()),
        );
        let synchronizers = Arc::new(Synchronizers::new(
            repos.clone(),
            registry.clone(),
            identity.clone(),
            on_error.clone(),
            app_cfg.scheduler.page_limit,
        ));
        let commands = Arc::new(
            CommandService::new(
                repos.clone(),
                registry,
                identity.clone(),
                on_error,
                app_cfg.commands.timeout_secs,
            )
            .with_event_bus(event_bus.clone()),
        );

        // ── Shutdown & scheduler ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let scheduler_tasks = Scheduler::new(
            synchronizers.clone(),
            commands.clone(),
            app_cfg.scheduler_settings(),
            shutdown_signal.clone(),
        )
        .start();

        // ── OCPI HTTP server ───────────────────────────────────
        let router = create_ocpi_router(
            AppState {
                repos: repos.clone(),
                identity,
                credentials: credentials.clone(),
                synchronizers: synchronizers.clone(),
                commands: commands.clone(),
            },
            prometheus_handle,
        );

        let addr = app_cfg.address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("OCPI server listening on http://{}", addr);
        info!("Versions endpoint: {}/ocpi/versions", app_cfg.platform.base_url.trim_end_matches('/'));

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(listener, router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 OCPI server received shutdown signal");
        });
        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("OCPI server error: {}", e);
            }
        });

        // Counterparts call back into /ocpi/versions during the handshake,
        // so this runs only once the listener is up.
        if !app_cfg.remotes.is_empty() {
            let credentials = credentials.clone();
            let repos = repos.clone();
            let remotes = app_cfg.remotes.clone();
            tokio::spawn(async move {
                for remote in &remotes {
                    if let Err(e) = bootstrap_remote(&credentials, repos.as_ref(), remote).await {
                        error!(platform_id = %remote.id, error = %e, "Remote bootstrap failed");
                    }
                }
            });
        }

        info!("🚀 OCPI node started.");

        Ok(Self {
            event_bus,
            repos,
            credentials,
            synchronizers,
            commands,
            config: app_cfg,
            db,
            shutdown,
            api_task,
            scheduler_tasks,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for every task to stop once shutdown has been triggered,
    /// bounded by the configured shutdown timeout.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");
        let Self {
            db,
            shutdown,
            api_task,
            scheduler_tasks,
            ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(|| async move {
                match api_task.await {
                    Ok(()) => info!("OCPI server stopped"),
                    Err(e) => error!("OCPI server task panicked: {}", e),
                }
                for task in scheduler_tasks {
                    if let Err(e) = task.await {
                        error!("Scheduler task panicked: {}", e);
                    }
                }
            })
            .await;
        if !completed {
            warn!("Some tasks did not stop in time");
        }

        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Texnouz OCPI node shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down OCPI node...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Register a configured counterpart and run the outbound handshake unless
/// it is already connected. The push capability flags always follow the
/// configuration.
async fn bootstrap_remote(
    credentials: &CredentialsService,
    repos: &dyn RepositoryProvider,
    remote: &RemoteConfig,
) -> DomainResult<()> {
    let existing = repos.platforms().find_by_id(&remote.id).await?;
    let mut platform = match existing {
        Some(p) if p.is_connected() => {
            info!(platform_id = %remote.id, "Remote already connected");
            p
        }
        _ => {
            credentials
                .register_platform(&remote.id, &remote.name, &remote.token_a, &remote.versions_url)
                .await?;
            let connected = credentials.establish_connection(&remote.id).await?;
            info!(
                platform_id = %remote.id,
                version = connected.current_version.as_deref().unwrap_or_default(),
                "Remote connected"
            );
            connected
        }
    };

    if platform.push_unsupported != remote.push_unsupported {
        platform.push_unsupported = remote.push_unsupported.clone();
        repos.platforms().save(platform).await?;
    }
    Ok(())
}

/// Initialize tracing from the application config.
///
/// `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
