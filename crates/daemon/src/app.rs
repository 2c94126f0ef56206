//! Composition root: builds adapters and services from `Settings`

use crate::settings::Settings;
use anyhow::{Context, Result};
use fieldops_api_rpc::{RateLimiter, RpcHandler, RpcServer, RpcServerConfig, ServerHandle};
use fieldops_core::application::distance::{
    AlwaysFallback, CachedDistanceProvider, FixedBackoff, MappingDistanceProvider,
    RetryStrategy, UnconfiguredMapping,
};
use fieldops_core::application::{
    shutdown_channel, AssignmentStateMachine, AvailabilityService, CacheMaintenanceScheduler,
    DispatchService, RecommendationEngine, ShutdownSender,
};
use fieldops_core::port::id_provider::UuidProvider;
use fieldops_core::port::time_provider::SystemTimeProvider;
use fieldops_core::port::{
    DistanceCache, EventPublisher, LogEventPublisher, MappingClient, TimeProvider,
};
use fieldops_infra_http::{HttpMappingClient, MappingClientConfig, WebhookEventPublisher};
use fieldops_infra_sqlite::{
    create_pool, run_migrations, SqliteAssignmentRepository, SqliteContractorRepository,
    SqliteDistanceCache, SqliteJobRepository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Running daemon
pub struct Daemon {
    pub rpc_addr: SocketAddr,
    rpc_handle: ServerHandle,
    shutdown: ShutdownSender,
    maintenance: JoinHandle<()>,
}

impl Daemon {
    pub async fn start(settings: &Settings) -> Result<Self> {
        if let Some(dir) = settings.database_dir() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let database_url = settings.database_url();
        info!(database_url = %database_url, "Initializing database");
        let pool = create_pool(&database_url)
            .await
            .context("DB pool creation failed")?;
        run_migrations(&pool).await.context("Migration failed")?;

        let engine_config = &settings.engine;
        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);

        let contractors = Arc::new(SqliteContractorRepository::new(pool.clone()));
        let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
        let assignments = Arc::new(SqliteAssignmentRepository::new(pool.clone()));
        let cache: Arc<dyn DistanceCache> =
            Arc::new(SqliteDistanceCache::new(pool.clone(), time_provider.clone()));

        let (mapping, retry) = mapping_client(settings)?;
        let distance = Arc::new(CachedDistanceProvider::new(
            Arc::new(MappingDistanceProvider::new(
                mapping,
                retry,
                &engine_config.distance,
            )),
            cache.clone(),
            &engine_config.distance,
        ));

        let availability = Arc::new(AvailabilityService::new(
            assignments.clone(),
            &engine_config.availability,
        ));
        let engine = Arc::new(RecommendationEngine::new(
            availability,
            distance,
            engine_config.scoring.clone(),
        ));
        let dispatch = Arc::new(DispatchService::new(
            jobs.clone(),
            contractors,
            engine,
        ));
        let state_machine = Arc::new(AssignmentStateMachine::new(
            assignments.clone(),
            assignments.clone(),
            event_publisher(settings)?,
            time_provider,
            Arc::new(UuidProvider),
            &engine_config.availability,
        ));

        let (shutdown, shutdown_token) = shutdown_channel();
        let scheduler = CacheMaintenanceScheduler::new(cache, settings.cache_purge_interval());
        let maintenance = tokio::spawn(scheduler.run(shutdown_token));

        let handler = RpcHandler::new(
            dispatch,
            state_machine,
            jobs,
            assignments,
            RateLimiter::new(settings.rate_limit_burst, settings.rate_limit_per_sec),
        );
        let rpc_config = RpcServerConfig {
            host: settings.rpc_host.clone(),
            port: settings.rpc_port,
        };
        let (rpc_handle, rpc_addr) = RpcServer::new(rpc_config, handler)
            .start()
            .await
            .context("RPC server start failed")?;

        Ok(Self {
            rpc_addr,
            rpc_handle,
            shutdown,
            maintenance,
        })
    }

    /// Stop the RPC server and background tasks
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.shutdown();
        self.rpc_handle.stop().context("RPC server stop failed")?;
        self.rpc_handle.stopped().await;

        if tokio::time::timeout(Duration::from_secs(5), self.maintenance)
            .await
            .is_err()
        {
            warn!("Cache maintenance task did not stop in time");
        }
        Ok(())
    }
}

fn mapping_client(
    settings: &Settings,
) -> Result<(Arc<dyn MappingClient>, Arc<dyn RetryStrategy>)> {
    let distance = &settings.engine.distance;
    match &settings.mapping_base_url {
        Some(base_url) => {
            let client = HttpMappingClient::new(MappingClientConfig {
                base_url: base_url.clone(),
                api_key: settings.mapping_api_key.clone(),
                timeout: distance.request_timeout(),
            })
            .context("Failed to build mapping client")?;
            info!(base_url = %base_url, "Mapping service configured");
            Ok((Arc::new(client), Arc::new(FixedBackoff::from_config(distance))))
        }
        None => {
            warn!("No mapping service configured, distances use great-circle estimates");
            Ok((Arc::new(UnconfiguredMapping), Arc::new(AlwaysFallback)))
        }
    }
}

fn event_publisher(settings: &Settings) -> Result<Arc<dyn EventPublisher>> {
    match &settings.webhook_url {
        Some(url) => {
            let publisher = WebhookEventPublisher::new(url.clone(), settings.webhook_timeout())
                .context("Failed to build webhook publisher")?;
            info!(url = %url, "Assignment events delivered by webhook");
            Ok(Arc::new(publisher))
        }
        None => Ok(Arc::new(LogEventPublisher)),
    }
}
