use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ffsvc")]
#[command(about = "HTTP front-end for FFmpeg media jobs", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_ansi(true)
        .init();

    info!("FFmpeg media service v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    info!("Loading configuration...");
    let mut config = match ffsvc_server::config::load_config(args.config.as_deref()) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    info!("Bind address: {}", config.bind_addr);
    info!("Temp root: {:?}", config.temp_root);
    info!("FFmpeg binary: {}", config.ffmpeg_bin);
    info!("FFprobe binary: {}", config.ffprobe_bin);
    info!(
        "Timeouts: single {}s, multi {}s, probe {}s",
        config.single_timeout_secs, config.multi_timeout_secs, config.probe_timeout_secs
    );
    info!("Output cleanup delay: {} seconds", config.output_cleanup_delay_secs);
    info!("Max concurrent jobs: {}", config.max_concurrent_jobs);
    info!(
        "Max upload size: {} bytes ({:.1} GB)",
        config.max_upload_bytes,
        config.max_upload_bytes as f64 / 1_073_741_824.0
    );

    info!("Checking FFmpeg version...");
    match ffsvc_server::health::check_tool_version(&config.ffmpeg_bin, config.health_timeout())
        .await
    {
        Ok(tool) => info!("FFmpeg version: {}", tool.version),
        Err(e) => warn!("FFmpeg is not available, jobs will fail until it is: {:#}", e),
    }

    if let Err(e) = ffsvc_server::serve(config, shutdown_signal()).await {
        error!("Server error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
    }
}
