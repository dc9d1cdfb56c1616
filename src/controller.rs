use crate::config::ControllerConfig;
use crate::events::{EventBus, ScanEvent};
use crate::camera::FrameSource;
use crate::focus::FocusEstimator;
use crate::frame::CapturedFrame;
use crate::stability::StabilityTracker;
use crate::upload::{UploadOutcome, UploadPipeline};

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Controller states. `Busy` means an upload/queue cycle is in flight and
/// new frames are ignored entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Busy,
}

/// Polls the camera on a fixed cadence, scores previews, and hands the
/// full-resolution frame to the upload pipeline when the stability streak
/// reaches the trigger threshold.
///
/// The state machine serializes uploads: at most one frame is in flight to
/// the gateway at any time, and the `Busy` guard makes the loop explicitly
/// non-reentrant. Retries of failed submissions are the offline queue's
/// concern on a later flush, never the controller's.
pub struct CaptureController {
    config: ControllerConfig,
    doc_type: String,
    source: Arc<dyn FrameSource>,
    estimator: FocusEstimator,
    tracker: StabilityTracker,
    pipeline: Arc<UploadPipeline>,
    events: EventBus,
    state: CaptureState,
    camera_was_available: bool,
}

impl CaptureController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ControllerConfig,
        doc_type: String,
        source: Arc<dyn FrameSource>,
        estimator: FocusEstimator,
        tracker: StabilityTracker,
        pipeline: Arc<UploadPipeline>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            doc_type,
            source,
            estimator,
            tracker,
            pipeline,
            events,
            state: CaptureState::Idle,
            camera_was_available: true,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn streak(&self) -> u32 {
        self.tracker.streak()
    }

    /// Run one capture-and-score cycle.
    ///
    /// Returns the upload outcome when this tick triggered a submission.
    /// Camera trouble is a transient condition: it is logged and the next
    /// tick proceeds.
    pub async fn tick(&mut self) -> Option<UploadOutcome> {
        if self.state == CaptureState::Busy {
            return None;
        }

        let available = self.source.is_available().await;
        if available != self.camera_was_available {
            self.camera_was_available = available;
            self.events.publish(ScanEvent::CameraStatusChanged {
                available,
                timestamp: SystemTime::now(),
            });
        }
        if !available {
            debug!("Camera unavailable; skipping tick");
            return None;
        }

        let preview = match self.source.preview().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Preview capture failed ({}); next tick proceeds", e);
                return None;
            }
        };

        let score = self.estimator.score_preview(&preview);
        let stable = self.tracker.observe(score);
        self.events.publish(ScanEvent::ScoreObserved {
            score,
            stable,
            streak: self.tracker.streak(),
            timestamp: SystemTime::now(),
        });

        if self.tracker.streak() < self.config.trigger_streak {
            return None;
        }

        // The streak tripped the threshold: reset it and submit the
        // full-resolution capture, not the lightweight preview.
        self.tracker.reset_streak();

        let full = match self.source.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Full-resolution capture failed ({}); trigger abandoned", e);
                return None;
            }
        };

        self.events.publish(ScanEvent::CaptureTriggered {
            timestamp: SystemTime::now(),
        });

        self.state = CaptureState::Busy;
        let frame = CapturedFrame::from_camera(&full, self.doc_type.clone());
        let outcome = self.pipeline.submit(frame).await;
        // Unconditional on resolve, whatever the outcome was
        self.state = CaptureState::Idle;

        Some(outcome)
    }

    /// Drive the tick loop until the token is cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        // An upload outlasting the cadence must not be followed by a burst
        // of catch-up ticks
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Capture controller started ({} ms cadence, trigger streak {})",
            self.config.tick_interval_ms, self.config.trigger_streak
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Capture controller stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}
