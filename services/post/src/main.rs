use anyhow::{Context, Result};
use post_service::api::{start_api_server, AppState};
use post_service::{
    ClusterQueryService, Config, ElasticsearchIndex, FaceAnnotator, GeoSearchService,
    IngestionCoordinator, JwtValidator, ObjectStore, S3ObjectStore, SchemaManager, SearchIndex,
    VisionAnnotator,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Around Post Service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Backend clients live for the whole process
    let index: Arc<dyn SearchIndex> = Arc::new(
        ElasticsearchIndex::new(&config.search.url, config.search_timeout())
            .context("Failed to initialize search index client")?,
    );

    let object_store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&config.object_store).await);

    let annotator: Arc<dyn FaceAnnotator> = Arc::new(
        VisionAnnotator::new(&config.annotation, config.annotation_timeout())
            .context("Failed to initialize annotation client")?,
    );

    // Geo queries need the mappings before the first write
    SchemaManager::new(
        index.clone(),
        &config.search.post_index,
        &config.search.user_index,
    )
    .ensure_schemas()
    .await
    .context("Failed to ensure index schemas")?;

    let state = AppState {
        ingest: Arc::new(IngestionCoordinator::new(
            object_store,
            annotator,
            index.clone(),
            &config.search.post_index,
        )),
        geo_search: Arc::new(GeoSearchService::new(
            index.clone(),
            &config.search.post_index,
            config.search.default_radius_km,
            config.search.max_results,
        )),
        cluster: Arc::new(ClusterQueryService::new(
            index.clone(),
            &config.search.post_index,
            config.search.cluster_threshold,
            config.search.max_results,
        )),
        index,
        jwt: Arc::new(JwtValidator::new(&config.auth)),
        require_media: config.api.require_media,
    };

    // Spawn API server task
    let api_config = config.api.clone();
    let mut api_handle =
        tokio::spawn(async move { start_api_server(state, &api_config).await });

    info!("Post service started successfully");

    // The API is the only workload; if it stops, the process stops with it
    tokio::select! {
        joined = &mut api_handle => {
            let result = joined
                .context("API server task panicked")
                .and_then(|served| served);
            if let Err(ref e) = result {
                error!(error = %e, "API server exited");
            }
            return result;
        }
        _ = shutdown_signal() => {}
    }

    info!("Shutting down post service");

    api_handle.abort();

    info!("Post service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
