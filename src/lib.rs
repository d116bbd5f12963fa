//! Celluloid - composite video sources and record the result.
//!
//! A [`compositor::FrameCompositor`] draws several live sources onto one
//! surface every frame, a [`recorder::Recorder`] turns the composited stream
//! into a single container artifact, and an [`export::FileExporter`] writes
//! that artifact to disk. [`Studio`] ties the three together.

pub mod capture;
pub mod compositor;
pub mod config;
pub mod export;
pub mod recorder;
pub mod studio;
pub mod utils;

pub use config::Config;
pub use studio::Studio;
pub use utils::error::{AppError, AppResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// Honours `RUST_LOG`, defaulting to `celluloid=debug`. Calling it twice is
/// harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "celluloid=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
