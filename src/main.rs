//! live-media: serve a live camera to DLNA renderers
//!
//! Run with: live-media <INTERFACE> [OPTIONS]
//!
//! Examples:
//!   live-media eth0
//!   live-media wlan0 --video-device /dev/video1 --liveness-timeout 10
//!   RUST_LOG=live_media_rs=debug live-media eth0
//!
//! Then:
//!   curl http://<ip>:7070/dmrs
//!   curl -X POST 'http://<ip>:7070/stream?action=play&device=<usn>&endpoint=camera'
//!   printf 'status:9236\r\n' | nc <ip> 3221

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use live_media_rs::server::interface_ipv4;
use live_media_rs::{
    router, AppState, CoordinatorConfig, GstLaunchConfig, GstLaunchEngine, Reconciler, ServerConfig,
    SessionCoordinator, SsdpConfig, SsdpDiscovery, StatusServer,
};

#[derive(Debug, Parser)]
#[command(version, about = "Stream a live camera to DLNA media renderers")]
struct Cli {
    /// Network interface whose IPv4 address is advertised to renderers
    interface: String,

    /// Port of the HTTP control and streaming server
    #[arg(long, default_value_t = 7070)]
    http_port: u16,

    /// Port of the status protocol
    #[arg(long, default_value_t = 3221)]
    status_port: u16,

    /// Seconds between discovery passes (0 disables periodic discovery)
    #[arg(long, default_value_t = 60)]
    discovery_interval: u64,

    /// Tear down sessions without a status query for this many seconds
    #[arg(long)]
    liveness_timeout: Option<u64>,

    /// GStreamer launcher binary
    #[arg(long, default_value = "gst-launch-1.0")]
    gst_launch: PathBuf,

    /// V4L2 device of the camera
    #[arg(long)]
    video_device: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("live_media_rs=info".parse()?)
                .add_directive("live_media=info".parse()?),
        )
        .init();

    let host_ip = interface_ipv4(&cli.interface)
        .with_context(|| format!("Cannot stream on interface {}", cli.interface))?;
    tracing::info!(interface = %cli.interface, ip = %host_ip, "Streaming host resolved");

    let server_config = ServerConfig::default()
        .http_addr(SocketAddr::from(([0, 0, 0, 0], cli.http_port)))
        .status_addr(SocketAddr::from(([0, 0, 0, 0], cli.status_port)))
        .discovery_interval(Duration::from_secs(cli.discovery_interval));

    let status_listener = TcpListener::bind(server_config.status_addr)
        .await
        .with_context(|| format!("Failed to bind status port {}", server_config.status_addr))?;
    let http_listener = TcpListener::bind(server_config.http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", server_config.http_addr))?;

    let mut gst_config = GstLaunchConfig::default().program(cli.gst_launch);
    if let Some(device) = cli.video_device {
        gst_config = gst_config.video_device(device);
    }

    let mut coordinator_config =
        CoordinatorConfig::default().content_base(format!("http://{}:{}", host_ip, cli.http_port));
    if let Some(secs) = cli.liveness_timeout {
        coordinator_config = coordinator_config.liveness_timeout(Duration::from_secs(secs));
    }

    let coordinator = Arc::new(SessionCoordinator::with_config(
        GstLaunchEngine::new(gst_config),
        coordinator_config,
    ));

    let discovery = SsdpDiscovery::new(SsdpConfig::default().bind_ip(host_ip))
        .context("Failed to create discovery client")?;
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&coordinator), discovery));

    match reconciler.reconcile_once().await {
        Ok(devices) => tracing::info!(devices = devices.len(), "Initial discovery complete"),
        Err(e) => tracing::warn!(error = %e, "Initial discovery failed"),
    }

    let reconcile_task = server_config
        .discovery_interval
        .map(|interval| reconciler.spawn_reconcile_task(interval));
    let reaper_task = coordinator.spawn_reaper_task();

    let status_server = StatusServer::new(server_config.clone(), Arc::clone(&coordinator));
    let status_task = tokio::spawn(async move { status_server.serve(status_listener).await });

    let app = router(AppState {
        coordinator,
        reconciler,
        health_port: server_config.health_port(),
        stream_chunk_size: server_config.stream_chunk_size,
    });

    tracing::info!(addr = %server_config.http_addr, "HTTP server listening");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    status_task.abort();
    if let Some(task) = reconcile_task {
        task.abort();
    }
    if let Some(task) = reaper_task {
        task.abort();
    }

    Ok(())
}
