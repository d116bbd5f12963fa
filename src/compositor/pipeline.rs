//! Frame compositing pipeline
//!
//! [`FrameCompositor`] owns the output surface. [`FrameCompositor::compose`]
//! turns it into a running tick loop: on every tick the primary source is
//! drawn over the whole surface, each secondary source is drawn half-size in
//! the centre with the layout's clip, and a copy of the surface is published
//! on the output stream.

use super::geometry::{overlay_geometry, primary_rect, ClipShape, OverlayGeometry, Rect, Resolution};
use super::layout::LayoutConfiguration;
use super::scheduler::{CancellationToken, TickScheduler};
use super::source::FrameSource;
use super::stream::{CompositeFrame, OutputStreamHandle, StreamPublisher};
use super::surface::{CpuSurface, FrameSurface};
use super::types::{CompositorError, CompositorStats, TickReport};
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Compositor holding an allocated output surface
pub struct FrameCompositor {
    surface: Box<dyn FrameSurface>,
    scheduler: Arc<dyn TickScheduler>,
    frame_rate: u32,
}

impl FrameCompositor {
    /// Allocate a software surface of `size`
    pub fn new(
        size: Resolution,
        frame_rate: u32,
        scheduler: Arc<dyn TickScheduler>,
    ) -> Result<Self, CompositorError> {
        let surface = CpuSurface::new(size)?;
        Ok(Self::with_surface(Box::new(surface), frame_rate, scheduler))
    }

    /// Use an already allocated surface
    pub fn with_surface(
        surface: Box<dyn FrameSurface>,
        frame_rate: u32,
        scheduler: Arc<dyn TickScheduler>,
    ) -> Self {
        Self {
            surface,
            scheduler,
            frame_rate,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.surface.size()
    }

    /// Start compositing `sources` (index 0 is the primary) and return the
    /// running session
    ///
    /// The layout defaults to split/original and is fixed for the session.
    pub fn compose(
        self,
        sources: Vec<Arc<dyn FrameSource>>,
        layout: Option<LayoutConfiguration>,
    ) -> Result<CompositeSession, CompositorError> {
        if sources.is_empty() {
            return Err(CompositorError::NoSources);
        }

        let layout = layout.unwrap_or_default();
        let size = self.surface.size();
        let overlay = overlay_geometry(size, layout.container);
        let (publisher, stream) = OutputStreamHandle::channel(size, self.frame_rate);
        let ledger = Arc::new(Mutex::new(TickLedger::default()));
        let cancel = CancellationToken::new();

        tracing::info!(
            "Composing {} source(s) onto {}x{} @ {}fps, layout={:?}/{:?}",
            sources.len(),
            size.width,
            size.height,
            self.frame_rate,
            layout.kind,
            layout.container
        );

        let tick_loop = TickLoop {
            surface: self.surface,
            failing: vec![false; sources.len()],
            sources,
            primary: primary_rect(size),
            overlay,
            publisher,
            sequence: 0,
            ledger: ledger.clone(),
        };

        schedule_tick(
            Arc::new(Mutex::new(tick_loop)),
            self.scheduler,
            cancel.clone(),
        );

        Ok(CompositeSession {
            stream,
            cancel,
            ledger,
            layout,
            overlay,
        })
    }
}

/// Totals plus the most recent tick, shared between the loop and its session
#[derive(Default)]
struct TickLedger {
    stats: CompositorStats,
    last: Option<TickReport>,
}

impl TickLedger {
    fn record(&mut self, report: TickReport) {
        self.stats.record(&report);
        self.last = Some(report);
    }
}

/// A running compositing session
///
/// The tick loop runs until [`CompositeSession::cancel`] is called or the
/// session is dropped.
pub struct CompositeSession {
    stream: OutputStreamHandle,
    cancel: CancellationToken,
    ledger: Arc<Mutex<TickLedger>>,
    layout: LayoutConfiguration,
    overlay: OverlayGeometry,
}

impl CompositeSession {
    /// Handle over the composited stream
    pub fn stream(&self) -> OutputStreamHandle {
        self.stream.clone()
    }

    pub fn layout(&self) -> LayoutConfiguration {
        self.layout
    }

    /// Placement used for every secondary source
    pub fn overlay_geometry(&self) -> OverlayGeometry {
        self.overlay
    }

    pub fn stats(&self) -> CompositorStats {
        self.ledger.lock().stats
    }

    /// Report of the most recently completed tick
    pub fn last_tick(&self) -> Option<TickReport> {
        self.ledger.lock().last
    }

    /// Token checked at the top of every tick
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the tick loop; the next scheduled tick does nothing
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Cancelling compositing session");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for CompositeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSession")
            .field("resolution", &self.stream.resolution())
            .field("layout", &self.layout)
            .field("overlay", &self.overlay)
            .field("stats", &self.stats())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for CompositeSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State mutated by the tick loop, never shared outside it
struct TickLoop {
    surface: Box<dyn FrameSurface>,
    sources: Vec<Arc<dyn FrameSource>>,
    /// Whether the previous draw of each source failed, to avoid log floods
    failing: Vec<bool>,
    primary: Rect,
    overlay: OverlayGeometry,
    publisher: StreamPublisher,
    sequence: u64,
    ledger: Arc<Mutex<TickLedger>>,
}

impl TickLoop {
    fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            sequence: self.sequence,
            ..Default::default()
        };

        for (index, source) in self.sources.iter().enumerate() {
            let frame = if source.is_ready() {
                source.latest_frame()
            } else {
                None
            };

            let Some(frame) = frame else {
                tracing::debug!(
                    "Source {} ({}) not ready at tick {}",
                    index,
                    source.id(),
                    self.sequence
                );
                report.skipped += 1;
                continue;
            };

            let (dest, clip) = if index == 0 {
                (self.primary, ClipShape::None)
            } else {
                (self.overlay.dest, self.overlay.clip)
            };

            match self.surface.draw(&frame, dest, clip) {
                Ok(()) => {
                    if self.failing[index] {
                        tracing::info!("Source {} ({}) recovered", index, source.id());
                        self.failing[index] = false;
                    }
                    report.drawn += 1;
                }
                Err(e) => {
                    if !self.failing[index] {
                        tracing::warn!(
                            "Failed to draw source {} ({}) at tick {}: {}",
                            index,
                            source.id(),
                            self.sequence,
                            e
                        );
                        self.failing[index] = true;
                    } else {
                        tracing::debug!("Source {} still failing: {}", index, e);
                    }
                    report.failed += 1;
                }
            }
        }

        let size = self.surface.size();
        self.publisher.publish(CompositeFrame {
            sequence: self.sequence,
            captured_at: Utc::now(),
            width: size.width,
            height: size.height,
            pixels: Arc::from(self.surface.pixels()),
        });

        self.ledger.lock().record(report);
        self.sequence += 1;
        report
    }
}

fn schedule_tick(
    tick_loop: Arc<Mutex<TickLoop>>,
    scheduler: Arc<dyn TickScheduler>,
    cancel: CancellationToken,
) {
    let next = scheduler.clone();
    scheduler.request_tick(Box::new(move || {
        if cancel.is_cancelled() {
            tracing::debug!("Tick loop cancelled, not rescheduling");
            return;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| tick_loop.lock().tick()));
        if result.is_err() {
            tracing::error!("Tick panicked; continuing with next tick");
        }

        schedule_tick(tick_loop, next, cancel);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::layout::{ContainerShape, LayoutType};
    use crate::compositor::scheduler::ManualScheduler;
    use crate::compositor::source::{PatternSource, SharedFrameSource, VideoFrame};
    use crate::compositor::types::SurfaceError;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn compositor(size: Resolution) -> (FrameCompositor, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let compositor = FrameCompositor::new(size, 30, scheduler.clone()).unwrap();
        (compositor, scheduler)
    }

    #[test]
    fn test_picture_in_picture_round_full_hd() {
        let (compositor, scheduler) = compositor(Resolution::FULL_HD);
        let background: Arc<dyn FrameSource> =
            Arc::new(PatternSource::solid("screen", Resolution::FULL_HD, RED));
        let camera: Arc<dyn FrameSource> =
            Arc::new(PatternSource::solid("camera", Resolution::new(640, 480), BLUE));

        let session = compositor
            .compose(
                vec![background, camera],
                Some(LayoutConfiguration::picture_in_picture(ContainerShape::Round)),
            )
            .unwrap();

        let geometry = session.overlay_geometry();
        assert_eq!(geometry.dest.width, 960);
        assert_eq!(geometry.dest.height, 540);
        assert_eq!(geometry.radius(), Some(270));
        assert_eq!(geometry.dest.center(), (960.0, 540.0));

        assert_eq!(scheduler.run_pending(), 1);
        let frame = session.stream().latest().unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.pixel(960, 540), Some(BLUE));
        assert_eq!(frame.pixel(960, 540 - 265), Some(BLUE));
        // Corners of the scaled rectangle fall outside the circle
        assert_eq!(frame.pixel(480, 270), Some(RED));
        assert_eq!(frame.pixel(1439, 809), Some(RED));
        assert_eq!(frame.pixel(0, 0), Some(RED));
    }

    #[test]
    fn test_square_container_fills_rectangle() {
        let size = Resolution::new(40, 20);
        let (compositor, scheduler) = compositor(size);
        let sources: Vec<Arc<dyn FrameSource>> = vec![
            Arc::new(PatternSource::solid("a", size, RED)),
            Arc::new(PatternSource::solid("b", Resolution::new(4, 4), BLUE)),
        ];
        let session = compositor
            .compose(
                sources,
                Some(LayoutConfiguration::new(LayoutType::Split, ContainerShape::Square)),
            )
            .unwrap();

        scheduler.run_pending();
        let frame = session.stream().latest().unwrap();
        assert_eq!(frame.pixel(10, 5), Some(BLUE));
        assert_eq!(frame.pixel(29, 14), Some(BLUE));
        assert_eq!(frame.pixel(9, 5), Some(RED));
        assert_eq!(frame.pixel(30, 14), Some(RED));
    }

    #[test]
    fn test_unready_sources_are_skipped() {
        let size = Resolution::new(8, 8);
        for layout in [
            LayoutConfiguration::default(),
            LayoutConfiguration::picture_in_picture(ContainerShape::Round),
            LayoutConfiguration::new(LayoutType::Split, ContainerShape::Square),
        ] {
            let (compositor, scheduler) = compositor(size);
            let primary = Arc::new(SharedFrameSource::new("screen", size));
            let overlay = Arc::new(SharedFrameSource::new("camera", size));
            overlay.push_frame(VideoFrame::solid(8, 8, BLUE));

            let session = compositor
                .compose(vec![primary.clone() as Arc<dyn FrameSource>, overlay], Some(layout))
                .unwrap();

            scheduler.run_pending();
            let frame = session.stream().latest().unwrap();
            // Primary region left blank, overlay drawn
            assert_eq!(frame.pixel(0, 0), Some([0, 0, 0, 0]));
            assert_eq!(frame.pixel(4, 4), Some(BLUE));

            let stats = session.stats();
            assert_eq!(stats.frames_published, 1);
            assert_eq!(stats.sources_skipped, 1);
        }
    }

    #[test]
    fn test_stale_primary_is_kept() {
        let size = Resolution::new(4, 4);
        let (compositor, scheduler) = compositor(size);
        let primary = Arc::new(SharedFrameSource::new("screen", size));
        primary.push_frame(VideoFrame::solid(4, 4, RED));
        let session = compositor
            .compose(vec![primary.clone() as Arc<dyn FrameSource>], None)
            .unwrap();

        scheduler.run_pending();
        primary.clear();
        scheduler.run_pending();

        let frame = session.stream().latest().unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.pixel(2, 2), Some(RED));
    }

    #[test]
    fn test_last_tick_report() {
        let size = Resolution::new(8, 8);
        let (compositor, scheduler) = compositor(size);
        let primary = Arc::new(SharedFrameSource::new("screen", size));
        let overlay = Arc::new(SharedFrameSource::new("camera", size));
        overlay.push_frame(VideoFrame::solid(8, 8, BLUE));
        let session = compositor
            .compose(
                vec![primary.clone() as Arc<dyn FrameSource>, overlay.clone()],
                None,
            )
            .unwrap();
        assert_eq!(session.last_tick(), None);

        scheduler.run_pending();
        assert_eq!(
            session.last_tick(),
            Some(TickReport {
                sequence: 0,
                drawn: 1,
                skipped: 1,
                failed: 0,
            })
        );

        primary.push_frame(VideoFrame::new(8, 8, vec![0; 5]));
        scheduler.run_pending();
        assert_eq!(
            session.last_tick(),
            Some(TickReport {
                sequence: 1,
                drawn: 1,
                skipped: 0,
                failed: 1,
            })
        );
        assert_eq!(session.stats().ticks, 2);
    }

    #[test]
    fn test_bad_frame_does_not_stop_loop() {
        let size = Resolution::new(4, 4);
        let (compositor, scheduler) = compositor(size);
        let primary = Arc::new(SharedFrameSource::new("screen", size));
        primary.push_frame(VideoFrame::new(4, 4, vec![0; 3]));
        let session = compositor
            .compose(vec![primary.clone() as Arc<dyn FrameSource>], None)
            .unwrap();

        scheduler.run_pending();
        primary.push_frame(VideoFrame::solid(4, 4, RED));
        scheduler.run_pending();

        let stats = session.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.render_failures, 1);
        assert_eq!(session.stream().latest().unwrap().pixel(0, 0), Some(RED));
    }

    #[test]
    fn test_panicking_surface_does_not_stop_loop() {
        struct PanickingSurface;

        impl FrameSurface for PanickingSurface {
            fn size(&self) -> Resolution {
                Resolution::new(2, 2)
            }
            fn draw(&mut self, _: &VideoFrame, _: Rect, _: ClipShape) -> Result<(), SurfaceError> {
                panic!("driver fault");
            }
            fn pixels(&self) -> &[u8] {
                &[0; 16]
            }
        }

        let scheduler = Arc::new(ManualScheduler::new());
        let compositor =
            FrameCompositor::with_surface(Box::new(PanickingSurface), 30, scheduler.clone());
        let source: Arc<dyn FrameSource> =
            Arc::new(PatternSource::solid("screen", Resolution::new(2, 2), RED));
        let _session = compositor.compose(vec![source], None).unwrap();

        scheduler.run_pending();
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_cancel_stops_rescheduling() {
        let size = Resolution::new(4, 4);
        let (compositor, scheduler) = compositor(size);
        let source: Arc<dyn FrameSource> = Arc::new(PatternSource::solid("screen", size, RED));
        let session = compositor.compose(vec![source], None).unwrap();
        let stream = session.stream();

        scheduler.run_pending();
        scheduler.run_pending();
        assert_eq!(session.stats().ticks, 2);

        session.cancel();
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(session.stats().ticks, 2);
        // Loop state has been released with the last callback
        assert!(!stream.is_live());
    }

    #[test]
    fn test_drop_cancels_session() {
        let size = Resolution::new(4, 4);
        let (compositor, scheduler) = compositor(size);
        let source: Arc<dyn FrameSource> = Arc::new(PatternSource::solid("screen", size, RED));
        let session = compositor.compose(vec![source], None).unwrap();
        let token = session.cancellation_token();

        drop(session);
        assert!(token.is_cancelled());
        scheduler.run_pending();
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_geometry_identical_every_tick() {
        let (compositor, scheduler) = compositor(Resolution::FULL_HD);
        let sources: Vec<Arc<dyn FrameSource>> = vec![
            Arc::new(PatternSource::solid("a", Resolution::new(16, 9), RED)),
            Arc::new(PatternSource::solid("b", Resolution::new(640, 480), BLUE)),
        ];
        let layout = LayoutConfiguration::picture_in_picture(ContainerShape::Round);
        let session = compositor.compose(sources, Some(layout)).unwrap();

        let before = session.overlay_geometry();
        scheduler.run_pending();
        scheduler.run_pending();
        assert_eq!(session.overlay_geometry(), before);
        assert_eq!(before, overlay_geometry(Resolution::FULL_HD, ContainerShape::Round));
    }

    #[test]
    fn test_empty_sources_rejected() {
        let (compositor, _scheduler) = compositor(Resolution::new(4, 4));
        assert!(matches!(
            compositor.compose(vec![], None),
            Err(CompositorError::NoSources)
        ));
    }

    #[test]
    fn test_default_layout() {
        let (compositor, _scheduler) = compositor(Resolution::new(4, 4));
        let source: Arc<dyn FrameSource> =
            Arc::new(PatternSource::solid("a", Resolution::new(4, 4), RED));
        let session = compositor.compose(vec![source], None).unwrap();
        assert_eq!(session.layout(), LayoutConfiguration::default());
        assert_eq!(session.overlay_geometry().clip, ClipShape::None);
    }
}
