pub mod app;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod focus;
pub mod frame;
pub mod gateway;
pub mod history;
pub mod queue;
pub mod stability;
pub mod upload;

pub use app::ScanApp;
pub use camera::{FrameSource, ReplayCamera};
pub use config::{
    CameraConfig, ControllerConfig, FocusConfig, GatewayConfig, QueueConfig, StabilityConfig,
    SystemConfig, VeriscanConfig,
};
pub use controller::{CaptureController, CaptureState};
pub use error::{CameraError, QueueError, Result, UploadError, VeriscanError};
pub use events::{EventBus, ScanEvent, UploadVerdict};
pub use focus::FocusEstimator;
pub use frame::{CameraFrame, CapturedFrame, RgbaFrame};
pub use gateway::{
    AnalysisMetrics, AnalysisResult, AnalysisSummary, Finding, GatewayClient, QualityMetrics,
    SessionInfo, VerificationApi, VerifyResponse,
};
pub use history::{HistoryEntry, HistorySource, ScanHistory};
pub use queue::{OfflineQueue, QueuedFrame};
pub use stability::{ScoreWindow, StabilityTracker};
pub use upload::{FlushReport, UploadOutcome, UploadPipeline};
