//! Geofence Sentry - a motion sentry armed by a remote geofence flag.
//!
//! Configuration is read from `SENTRY_*` environment variables (see
//! [`SentryConfig`]). The process runs until interrupted, then releases the
//! sensor line and the camera.
//!
//! Logging defaults to `geofence_sentry=info`, which reports each change of
//! idle state once. Set `RUST_LOG=geofence_sentry=debug` to see every tick.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use geofence_sentry::camera::{CaptureService, CommandCamera, StillConfig};
use geofence_sentry::cloud::{
    CloudStoragePublisher, PushDispatcher, ServiceAccountKey, ServiceAccountTokenSource,
    TokenSource,
};
use geofence_sentry::config::SentryConfig;
use geofence_sentry::pipeline::EventPipeline;
use geofence_sentry::probe::HttpStateProbe;
use geofence_sentry::sensor::{SysfsMotionSampler, resolve_line};
use geofence_sentry::sentry::SentryLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("geofence_sentry=info")),
        )
        .init();

    let config = SentryConfig::from_env()?;

    info!(
        state_url = %config.state_url,
        bucket = %config.bucket,
        topic = %config.topic,
        pin = config.sensor_pin,
        save_dir = %config.save_dir.display(),
        "Starting Geofence Sentry"
    );

    // Cloud collaborators
    let key = ServiceAccountKey::from_file(&config.credentials_path).await?;
    let project_id = key.project_id.clone();
    let tokens: Arc<dyn TokenSource> =
        Arc::new(ServiceAccountTokenSource::new(key)?.with_timeout(config.http_timeout));
    let publisher = Arc::new(
        CloudStoragePublisher::new(&config.bucket, tokens.clone())
            .with_timeout(config.http_timeout),
    );
    let dispatcher =
        Arc::new(PushDispatcher::new(&project_id, tokens).with_timeout(config.http_timeout));

    // Devices
    let capture = CaptureService::new(
        Box::new(CommandCamera::new(&config.camera_command)),
        &StillConfig::default(),
        config.save_dir.clone(),
        config.settle_delay,
    )
    .await?
    .with_capture_timeout(config.capture_timeout);
    let line = resolve_line(config.sensor_pin, config.pin_numbering, config.gpio_base)?;
    let sampler = SysfsMotionSampler::open(line)?;

    let pipeline = EventPipeline::new(
        capture,
        publisher,
        dispatcher,
        &config.topic,
        config.retention,
    );
    let probe = HttpStateProbe::new(&config.state_url, config.probe_timeout)?;

    let sentry = SentryLoop::new(
        Box::new(probe),
        Box::new(sampler),
        pipeline,
        config.timing(),
    );
    sentry.run(shutdown_signal(), config.drain_grace).await;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
