use crate::config::GatewayConfig;
use crate::error::{UploadError, VeriscanError};
use crate::events::{EventBus, ScanEvent, UploadVerdict};
use crate::frame::CapturedFrame;
use crate::gateway::{AnalysisSummary, Finding, VerificationApi, VerifyResponse};
use crate::history::{HistorySource, ScanHistory};
use crate::queue::{OfflineQueue, QueuedFrame};

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

/// File name attached to every multipart frame submission.
const FRAME_FILE_NAME: &str = "frame.jpg";

/// Terminal result of one submission cycle.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    /// The gateway verified the frame
    Verified {
        summary: AnalysisSummary,
        findings: Vec<Finding>,
        audit_id: String,
    },
    /// Submission failed and the frame was persisted for a later flush
    Queued,
    /// Submission failed and the frame could not be persisted either;
    /// the frame is lost (accepted data-loss edge case)
    Failed { reason: String },
}

impl UploadOutcome {
    pub fn verdict(&self) -> UploadVerdict {
        match self {
            UploadOutcome::Verified { .. } => UploadVerdict::Verified,
            UploadOutcome::Queued => UploadVerdict::Queued,
            UploadOutcome::Failed { .. } => UploadVerdict::Failed,
        }
    }
}

/// Summary of one queue flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Records read from the queue at flush start
    pub attempted: usize,
    /// Verification responses for records whose retry succeeded
    pub delivered: Vec<VerifyResponse>,
    /// Record ids whose retry failed; these are dropped, not re-queued
    pub dropped: Vec<String>,
}

/// Drives session-create and frame-submit against the remote gateway, with
/// the offline queue as the failure path.
///
/// Exactly one session-create and at most one frame-submit happen per
/// `submit` call; there is no internal retry. Every remote call runs under a
/// bounded deadline so a stalled request cannot wedge the capture loop.
pub struct UploadPipeline {
    api: Arc<dyn VerificationApi>,
    queue: Arc<OfflineQueue>,
    events: EventBus,
    history: Arc<Mutex<ScanHistory>>,
    deadline: Duration,
}

impl UploadPipeline {
    pub fn new(
        api: Arc<dyn VerificationApi>,
        queue: Arc<OfflineQueue>,
        events: EventBus,
        history: Arc<Mutex<ScanHistory>>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            api,
            queue,
            events,
            history,
            deadline: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn record_history(&self, summary: &AnalysisSummary, source: HistorySource) {
        if let Ok(mut history) = self.history.lock() {
            history.record(summary, source);
        }
    }

    /// Submit a triggered frame. Never returns an error: every failure mode
    /// resolves into one of the three outcomes.
    pub async fn submit(&self, frame: CapturedFrame) -> UploadOutcome {
        let outcome = match self.attempt(&frame.doc_type, &frame.jpeg).await {
            Ok(response) => {
                info!(
                    "Frame verified: match={:.1} tamper={:.1} band={}",
                    response.result.summary.match_score,
                    response.result.summary.tamper_risk_score,
                    response.result.summary.confidence_band
                );
                self.record_history(&response.result.summary, HistorySource::Live);
                UploadOutcome::Verified {
                    summary: response.result.summary,
                    findings: response.result.findings,
                    audit_id: response.audit_id,
                }
            }
            Err(e) => {
                warn!("Submission failed ({}); handing frame to offline queue", e);
                match self.queue.enqueue(&frame).await {
                    Ok(record) => {
                        self.events.publish(ScanEvent::FrameQueued {
                            record_id: record.id,
                            timestamp: SystemTime::now(),
                        });
                        UploadOutcome::Queued
                    }
                    Err(qe) => {
                        error!("Queue write failed after submission failure; frame is lost: {}", qe);
                        UploadOutcome::Failed {
                            reason: qe.to_string(),
                        }
                    }
                }
            }
        };

        self.events.publish(ScanEvent::UploadCompleted {
            verdict: outcome.verdict(),
            timestamp: SystemTime::now(),
        });
        outcome
    }

    /// Retry every queued frame once, in enqueue order, then clear the
    /// entire queue. A record whose retry fails is dropped, not re-queued:
    /// flush is at-most-one-retry-per-entry, not until-success.
    pub async fn flush_queue(&self) -> FlushReport {
        let records = self.queue.read_all().await;
        if records.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport {
            attempted: records.len(),
            ..Default::default()
        };

        info!("Flushing offline queue ({} records)", records.len());

        for record in &records {
            match self.retry_record(record).await {
                Ok(response) => {
                    self.record_history(&response.result.summary, HistorySource::Offline);
                    report.delivered.push(response);
                }
                Err(e) => {
                    warn!("Retry for queued frame {} failed ({}); dropping it", record.id, e);
                    report.dropped.push(record.id.clone());
                }
            }
        }

        // Every entry got its one retry; the queue is cleared regardless of
        // per-entry outcomes.
        if let Err(e) = self.queue.clear().await {
            error!("Failed to clear offline queue after flush: {}", e);
        }

        self.events.publish(ScanEvent::QueueFlushed {
            attempted: report.attempted,
            delivered: report.delivered.len(),
            dropped: report.dropped.len(),
            timestamp: SystemTime::now(),
        });

        report
    }

    async fn retry_record(
        &self,
        record: &QueuedFrame,
    ) -> std::result::Result<VerifyResponse, VeriscanError> {
        let jpeg = self.queue.load_image(record).await?;
        let response = self.attempt(&record.doc_type, &jpeg).await?;
        Ok(response)
    }

    /// One create-session + submit-frame pass. No retries at this level.
    async fn attempt(
        &self,
        doc_type: &str,
        jpeg: &[u8],
    ) -> std::result::Result<VerifyResponse, UploadError> {
        let session = self
            .with_deadline(self.api.create_session(doc_type))
            .await?;

        self.with_deadline(
            self.api
                .submit_frame(&session.id, jpeg, FRAME_FILE_NAME, doc_type),
        )
        .await
    }

    async fn with_deadline<T, F>(&self, fut: F) -> std::result::Result<T, UploadError>
    where
        F: Future<Output = std::result::Result<T, UploadError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Deadline {
                seconds: self.deadline.as_secs(),
            }),
        }
    }
}
