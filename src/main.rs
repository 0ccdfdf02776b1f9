mod cli;
mod metric_defs;
mod stubs;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli::LogFormat;
use colored::Colorize;
use kill_service::{EventBus, KillServiceConfig, KillServiceCore, SystemClock};
use lib::config::ConfigLoader;
use lib::netutils::parse_addr;
use lib::service::ServiceContext;
use lib::shutdown::Shutdown;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_util::MetricKindMask;
use stubs::{LoggingDriverHandle, LoggingStateOpProcessor};
use tokio::select;
use tracing::{debug, info, trace, warn, Subscriber};
use tracing_subscriber::FmtSubscriber;

fn setup_logging_subscriber(f: &LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "itsd=debug,kill_service=debug".into());

    let sub = FmtSubscriber::builder()
        .with_thread_names(true)
        .with_max_level(tracing::Level::INFO)
        .with_env_filter(env_filter);

    match f {
        | LogFormat::Pretty => Box::new(sub.pretty().finish()),
        | LogFormat::Compact => Box::new(sub.compact().finish()),
        | LogFormat::Json => Box::new(sub.json().finish()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = cli::CliOpts::parse();

    tracing::subscriber::set_global_default(setup_logging_subscriber(&opts.log_format))?;

    debug!("** {} **", "Instance Termination Service".magenta());
    trace!(config = opts.config, "Loading configuration");
    let config_loader = Arc::new(ConfigLoader::from_path(&Some(opts.config.clone())));
    let mut shutdown = Shutdown::default();
    let ctx = ServiceContext::new(
        "kill-service".to_string(),
        config_loader,
        shutdown.clone(),
    );
    let config = ctx.load_config();

    let prometheus_sockaddr =
        parse_addr(&config.main.prometheus_address, config.main.prometheus_port)?;
    let builder = PrometheusBuilder::new();
    info!("Prometheus HTTP listener on {:?}", prometheus_sockaddr);
    builder
        .idle_timeout(
            MetricKindMask::HISTOGRAM,
            // Remove a metric from registry if it was not updated for 2
            // minutes.
            Some(Duration::from_secs(120)),
        )
        .with_http_listener(prometheus_sockaddr)
        .install()
        .expect("failed to install Prometheus recorder");
    metric_defs::install_metrics();

    let bus = Arc::new(EventBus::default());
    let kill_service_config = KillServiceConfig {
        kill_chunk_size: config.kill_service.kill_chunk_size,
        kill_retry_timeout: Duration::from_secs(config.kill_service.kill_retry_timeout_s),
        kill_retry_max: config.kill_service.retry_max(),
    };

    info!(service = ctx.service_name(), "Starting kill-service core");
    let _handle = KillServiceCore::create_and_start(
        kill_service_config,
        Arc::new(SystemClock),
        Arc::new(LoggingDriverHandle),
        Arc::new(LoggingStateOpProcessor),
        bus,
        shutdown.subscribe(),
    );

    select! {
        _ = shutdown.recv() => {
            warn!("Received shutdown signal from downstream services!");
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+c signal (SIGINT)!");
            shutdown.broadcast_shutdown();
        }
    };

    info!("Bye!");

    Ok(())
}