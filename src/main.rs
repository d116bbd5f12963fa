//! Demo binary: composite two test patterns picture-in-picture, record them
//! with FFmpeg and export the result.
//!
//! Usage: `celluloid [config.json] [seconds]`

use anyhow::{Context, Result};
use celluloid::compositor::{
    ContainerShape, FrameSource, IntervalScheduler, LayoutConfiguration, PatternSource, Resolution,
};
use celluloid::{Config, Studio};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    celluloid::init_tracing();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(Path::new(&path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::default(),
    };
    let seconds: u64 = match args.next() {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid recording length: {}", value))?,
        None => 3,
    };

    tracing::info!("Starting Celluloid v{}", env!("CARGO_PKG_VERSION"));

    let studio = Studio::new(config);
    let size = studio.config().compositor.resolution();
    let frame_rate = studio.config().compositor.frame_rate;

    let screen = Arc::new(PatternSource::gradient(
        "screen",
        size,
        [24, 32, 72],
        [96, 164, 224],
    ));
    let camera = Arc::new(PatternSource::solid(
        "camera",
        Resolution::new(640, 480),
        [232, 120, 64, 255],
    ));
    let scheduler = Arc::new(IntervalScheduler::from_frame_rate(frame_rate)?);

    let session = studio.compose(
        vec![screen as Arc<dyn FrameSource>, camera],
        Some(LayoutConfiguration::picture_in_picture(ContainerShape::Round)),
        scheduler,
    )?;

    let mut recorder = studio.recorder(Box::new(studio.capture_engine()))?;
    recorder.start(session.stream()).await?;
    tracing::info!("Recording {}s as {}", seconds, recorder.format());

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    let preview = studio.snapshot(&session.stream(), "preview")?;
    tracing::info!("Saved preview to {:?}", preview);

    let artifact = recorder.stop().await?;
    session.cancel();

    let stats = session.stats();
    tracing::info!(
        "Composited {} frames ({} render failures), recorded {} bytes in {} chunks",
        stats.frames_published,
        stats.render_failures,
        artifact.len(),
        artifact.chunks().len()
    );

    let path = studio.export(artifact, None)?;
    println!("{}", path.display());
    Ok(())
}
