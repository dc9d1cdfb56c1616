use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// Terminal classification of one upload attempt, as carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadVerdict {
    Verified,
    Queued,
    Failed,
}

/// Events emitted by the capture core for host UIs to observe.
///
/// Hosts subscribe to the bus instead of sharing mutable state with the
/// controller; every status string the reference client rendered can be
/// derived from these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A preview frame was scored and classified
    ScoreObserved {
        score: f64,
        stable: bool,
        streak: u32,
        timestamp: SystemTime,
    },
    /// The stability streak reached the trigger threshold
    CaptureTriggered { timestamp: SystemTime },
    /// An upload cycle resolved
    UploadCompleted {
        verdict: UploadVerdict,
        timestamp: SystemTime,
    },
    /// A frame was persisted to the offline queue
    FrameQueued {
        record_id: String,
        timestamp: SystemTime,
    },
    /// A queue flush finished
    QueueFlushed {
        attempted: usize,
        delivered: usize,
        dropped: usize,
        timestamp: SystemTime,
    },
    /// Camera availability changed
    CameraStatusChanged {
        available: bool,
        timestamp: SystemTime,
    },
}

impl ScanEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            ScanEvent::ScoreObserved { timestamp, .. } => *timestamp,
            ScanEvent::CaptureTriggered { timestamp } => *timestamp,
            ScanEvent::UploadCompleted { timestamp, .. } => *timestamp,
            ScanEvent::FrameQueued { timestamp, .. } => *timestamp,
            ScanEvent::QueueFlushed { timestamp, .. } => *timestamp,
            ScanEvent::CameraStatusChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::ScoreObserved { score, streak, .. } => {
                format!("Score {:.2} observed (streak {})", score, streak)
            }
            ScanEvent::CaptureTriggered { .. } => "Capture triggered".to_string(),
            ScanEvent::UploadCompleted { verdict, .. } => {
                format!("Upload completed: {:?}", verdict)
            }
            ScanEvent::FrameQueued { record_id, .. } => {
                format!("Frame queued: {}", record_id)
            }
            ScanEvent::QueueFlushed {
                attempted,
                delivered,
                dropped,
                ..
            } => {
                format!(
                    "Queue flushed: {} attempted, {} delivered, {} dropped",
                    attempted, delivered, dropped
                )
            }
            ScanEvent::CameraStatusChanged { available, .. } => {
                format!(
                    "Camera {}",
                    if *available { "available" } else { "unavailable" }
                )
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::ScoreObserved { .. } => "score_observed",
            ScanEvent::CaptureTriggered { .. } => "capture_triggered",
            ScanEvent::UploadCompleted { .. } => "upload_completed",
            ScanEvent::FrameQueued { .. } => "frame_queued",
            ScanEvent::QueueFlushed { .. } => "queue_flushed",
            ScanEvent::CameraStatusChanged { .. } => "camera_status_changed",
        }
    }
}

/// Broadcast event bus for host observation of the capture core.
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers the event reached. A bus with no
    /// subscribers swallows the event; the core never depends on a host
    /// listening.
    pub fn publish(&self, event: ScanEvent) -> usize {
        match &event {
            ScanEvent::CaptureTriggered { .. } => {
                info!("Capture triggered");
            }
            ScanEvent::UploadCompleted { verdict, .. } => {
                info!("Upload completed: {:?}", verdict);
            }
            ScanEvent::FrameQueued { record_id, .. } => {
                warn!("Frame queued for later retry: {}", record_id);
            }
            ScanEvent::QueueFlushed {
                attempted,
                delivered,
                dropped,
                ..
            } => {
                if *dropped > 0 {
                    error!(
                        "Queue flush dropped {} of {} frames ({} delivered)",
                        dropped, attempted, delivered
                    );
                } else {
                    info!("Queue flush delivered {}/{} frames", delivered, attempted);
                }
            }
            ScanEvent::CameraStatusChanged { available, .. } => {
                if *available {
                    info!("Camera available");
                } else {
                    warn!("Camera unavailable");
                }
            }
            ScanEvent::ScoreObserved { score, streak, .. } => {
                trace!("Score observed: {:.2} (streak {})", score, streak);
            }
        }

        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Event published with no subscribers");
                0
            }
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
