use crate::camera::{FrameSource, ReplayCamera};
use crate::config::VeriscanConfig;
use crate::controller::CaptureController;
use crate::error::{Result, VeriscanError};
use crate::events::EventBus;
use crate::focus::FocusEstimator;
use crate::gateway::{GatewayClient, VerificationApi};
use crate::history::ScanHistory;
use crate::queue::OfflineQueue;
use crate::stability::StabilityTracker;
use crate::upload::{FlushReport, UploadPipeline};

use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wires the capture core together and drives it for the lifetime of the
/// process: build components from config, give queued frames from a previous
/// run their one retry, then poll the camera until shutdown.
pub struct ScanApp {
    config: VeriscanConfig,
    events: EventBus,
    history: Arc<Mutex<ScanHistory>>,
    queue: Arc<OfflineQueue>,
    pipeline: Arc<UploadPipeline>,
    controller: CaptureController,
    cancel: CancellationToken,
}

impl ScanApp {
    pub async fn new(config: VeriscanConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.system.event_bus_capacity);
        let history = Arc::new(Mutex::new(ScanHistory::new(config.system.history_capacity)));
        let queue = Arc::new(OfflineQueue::new(&config.queue).await?);

        let api: Arc<dyn VerificationApi> =
            Arc::new(GatewayClient::new(config.gateway.clone())?);
        let pipeline = Arc::new(UploadPipeline::new(
            api,
            Arc::clone(&queue),
            events.clone(),
            Arc::clone(&history),
            &config.gateway,
        ));

        let source: Arc<dyn FrameSource> = match config.camera.source.as_str() {
            "replay" => Arc::new(ReplayCamera::new(&config.camera).await?),
            other => {
                return Err(VeriscanError::system(format!(
                    "Unknown camera source '{}' (hosts with real hardware \
                     construct the controller directly with their own FrameSource)",
                    other
                )))
            }
        };

        let controller = CaptureController::new(
            config.controller.clone(),
            config.gateway.doc_type.clone(),
            source,
            FocusEstimator::new(config.focus.clone()),
            StabilityTracker::new(config.stability.clone()),
            Arc::clone(&pipeline),
            events.clone(),
        );

        Ok(Self {
            config,
            events,
            history,
            queue,
            pipeline,
            controller,
            cancel: CancellationToken::new(),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn history(&self) -> Arc<Mutex<ScanHistory>> {
        Arc::clone(&self.history)
    }

    pub fn queue(&self) -> Arc<OfflineQueue> {
        Arc::clone(&self.queue)
    }

    /// Handle for requesting shutdown from outside `run`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Retry every queued frame once and clear the queue (explicit request).
    pub async fn flush_queue(&self) -> FlushReport {
        self.pipeline.flush_queue().await
    }

    /// Run until ctrl-c or cancellation.
    pub async fn run(self) -> Result<()> {
        // Frames stranded by a previous run get their one retry at startup
        let report = self.pipeline.flush_queue().await;
        if report.attempted > 0 {
            info!(
                "Startup flush: {} attempted, {} delivered, {} dropped",
                report.attempted,
                report.delivered.len(),
                report.dropped.len()
            );
        }

        info!(
            "Scanning for {} documents against {}",
            self.config.gateway.doc_type, self.config.gateway.url
        );

        let cancel = self.cancel.clone();
        let controller_task = tokio::spawn(self.controller.run(cancel.clone()));

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received; shutting down");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {
                info!("Shutdown requested");
            }
        }

        if let Err(e) = controller_task.await {
            warn!("Capture controller task ended abnormally: {}", e);
        }

        info!("Scan app stopped");
        Ok(())
    }
}
