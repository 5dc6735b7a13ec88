use crate::config::Config;
use crate::scanner::LeafScanner;
use crate::server::HttpServer;
use crate::storage::UploadStore;
use crate::telemetry::Metrics;

use leaf_detection::{ClassLabels, OrtModelService};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

/// Validates the configuration and wires the ONNX model, labels and upload
/// store into a scanner.
pub fn build_scanner(config: &Config) -> anyhow::Result<LeafScanner<OrtModelService>> {
    config.validate()?;

    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to initialize model service: {:?}", e);
            return Err(e.into());
        }
    };

    let labels = match ClassLabels::from_config(&config.labels) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Failed to load class labels: {:?}", e);
            return Err(e.into());
        }
    };

    Ok(LeafScanner::new(
        model_service,
        labels,
        UploadStore::new(&config.scan.upload_dir),
        config.scan.clone(),
        config.report.clone(),
    ))
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let scanner = Arc::new(build_scanner(&config)?);
    let metrics = Metrics::global()?;

    let server = HttpServer::new(scanner, metrics, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Err(e)) => tracing::error!("Server stopped with an error: {}", e),
        Err(e) => tracing::error!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
