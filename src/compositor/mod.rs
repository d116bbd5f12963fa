//! Real-time frame compositing
//!
//! This module combines several live frame sources into one fixed-size
//! surface according to a layout, and republishes the surface as a stream:
//! - FrameSource / FrameSurface traits at the host boundary
//! - TickScheduler to drive the loop (timer, vsync or manual stepping)
//! - FrameCompositor and the running CompositeSession

pub mod geometry;
pub mod layout;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod stream;
pub mod surface;
pub mod types;

pub use geometry::{ClipShape, OverlayGeometry, Rect, Resolution};
pub use layout::{ContainerShape, LayoutConfiguration, LayoutType};
pub use pipeline::{CompositeSession, FrameCompositor};
pub use scheduler::{
    CancellationToken, IntervalScheduler, ManualScheduler, TickCallback, TickScheduler,
};
pub use source::{FrameSource, PatternSource, SharedFrameSource, VideoFrame};
pub use stream::{CompositeFrame, OutputStreamHandle};
pub use surface::{CpuSurface, FrameSurface};
pub use types::{CompositorError, CompositorStats, SurfaceError, TickReport};
