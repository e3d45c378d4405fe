use anyhow::{Context, Result};
use resmon::{CancellationToken, MonitorConfig, ResourceMonitor};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = MonitorConfig::load().context("failed to load configuration")?;

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout only carries report lines.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting resmon");
    info!("Interval: {} ms", config.interval_ms);
    info!("Sink: {:?}", config.sink);
    info!("Output format: {:?}", config.output_format);

    let mut monitor = ResourceMonitor::from_config(&config)
        .await
        .context("failed to initialize resource monitor")?;

    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            return;
        }

        info!("Received shutdown signal, stopping...");
        shutdown.cancel();
    });

    monitor.start(cancel)?;
    monitor.wait().await.context("resource monitor terminated")?;

    Ok(())
}
