//! `mock-server`: serves the resources and operations of a mock config file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mockgrid_server::storage::{CompositeObserver, MetricsObserver, Observer, TracingObserver};
use mockgrid_server::{MockConfig, NetworkModule};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mock-server")]
#[command(about = "Stateful multi-protocol API mock server")]
struct Args {
    /// Mock definition file (JSON).
    #[arg(short, long, env = "MOCKGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `server.host` from the config file.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port` from the config file.
    #[arg(long, env = "MOCKGRID_PORT")]
    port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Serve Prometheus metrics on this port.
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match &args.config {
        Some(path) => MockConfig::from_file(path)?,
        None => MockConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let mut observers: Vec<Arc<dyn Observer>> = vec![Arc::new(TracingObserver)];
    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        MetricsObserver::describe();
        observers.push(Arc::new(MetricsObserver));
        info!(%addr, "Prometheus metrics exporter listening");
    }

    let bridge = Arc::new(config.build_bridge()?);
    bridge
        .store()
        .set_observer(Arc::new(CompositeObserver::new(observers)));

    let mut network = NetworkModule::new(config.server.clone(), bridge);
    let port = network.start().await?;
    info!(port, admin = %config.server.admin_prefix(), "mock server started");

    network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
        })
        .await
}
