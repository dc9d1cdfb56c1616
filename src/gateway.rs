use crate::config::GatewayConfig;
use crate::error::{Result, UploadError, VeriscanError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Session handle returned by the gateway on create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub doc_type: Option<String>,
}

/// One localized issue reported by the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub severity: String,
    pub message: String,
    /// `[x, y, w, h]` in source-image pixels
    #[serde(default)]
    pub bbox: Vec<i32>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    #[serde(default)]
    pub doc_type_guess: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub match_score: f32,
    pub tamper_risk_score: f32,
    pub confidence_band: String,
    #[serde(default)]
    pub disclaimer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub blur_score: f32,
    pub glare_ratio: f32,
    pub acceptable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub template_match_score: f32,
    pub ocr_quality_score: f32,
    pub tamper_risk_score: f32,
    pub quality_metrics: QualityMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    #[serde(default)]
    pub metrics: Option<AnalysisMetrics>,
    #[serde(default)]
    pub extracted_fields: HashMap<String, String>,
    #[serde(default)]
    pub ocr_text: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

/// Response body of a frame submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub result: AnalysisResult,
    pub audit_id: String,
}

/// Remote verification API as the core consumes it.
///
/// Auth failures surface as ordinary [`UploadError`]s and feed the
/// offline-queue path like any other submission failure.
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// Request a new verification session.
    async fn create_session(
        &self,
        doc_type: &str,
    ) -> std::result::Result<SessionInfo, UploadError>;

    /// Submit a frame's JPEG bytes to an existing session as multipart.
    async fn submit_frame(
        &self,
        session_id: &str,
        image_jpeg: &[u8],
        file_name: &str,
        doc_type: &str,
    ) -> std::result::Result<VerifyResponse, UploadError>;
}

/// HTTP client for the verification gateway.
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VeriscanError::system(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { http, config })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/sessions", self.config.url.trim_end_matches('/'))
    }

    fn frame_url(&self, session_id: &str) -> String {
        format!(
            "{}/v1/sessions/{}/frame",
            self.config.url.trim_end_matches('/'),
            session_id
        )
    }
}

#[async_trait]
impl VerificationApi for GatewayClient {
    async fn create_session(
        &self,
        doc_type: &str,
    ) -> std::result::Result<SessionInfo, UploadError> {
        let response = self
            .http
            .post(self.sessions_url())
            .header("X-Api-Key", &self.config.api_key)
            .json(&serde_json::json!({ "docType": doc_type }))
            .send()
            .await
            .map_err(|e| UploadError::SessionCreate {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(UploadError::SessionCreate {
                details: format!("gateway returned status {}", response.status()),
            });
        }

        let session: SessionInfo =
            response
                .json()
                .await
                .map_err(|e| UploadError::InvalidResponse {
                    details: format!("session body: {}", e),
                })?;

        debug!("Created verification session {}", session.id);
        Ok(session)
    }

    async fn submit_frame(
        &self,
        session_id: &str,
        image_jpeg: &[u8],
        file_name: &str,
        doc_type: &str,
    ) -> std::result::Result<VerifyResponse, UploadError> {
        let part = reqwest::multipart::Part::bytes(image_jpeg.to_vec())
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| UploadError::Submit {
                details: format!("multipart build failed: {}", e),
            })?;

        let form = reqwest::multipart::Form::new()
            .text("doc_type", doc_type.to_string())
            .part("file", part);

        let response = self
            .http
            .post(self.frame_url(session_id))
            .header("X-Api-Key", &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Submit {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(UploadError::Submit {
                details: format!("gateway returned status {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse {
                details: format!("verify body: {}", e),
            })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Programmable in-process gateway for pipeline and controller tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub fn verify_response(match_score: f32, tamper: f32, band: &str) -> VerifyResponse {
        VerifyResponse {
            result: AnalysisResult {
                summary: AnalysisSummary {
                    doc_type_guess: None,
                    reference_id: None,
                    match_score,
                    tamper_risk_score: tamper,
                    confidence_band: band.to_string(),
                    disclaimer: "Advisory only".to_string(),
                },
                metrics: None,
                extracted_fields: HashMap::new(),
                ocr_text: String::new(),
                findings: Vec::new(),
            },
            audit_id: "audit-1".to_string(),
        }
    }

    /// Scripted gateway: each session-create pops the next planned outcome.
    pub struct ScriptedApi {
        plan: Mutex<Vec<PlannedCall>>,
        pub create_calls: AtomicUsize,
        pub submit_calls: AtomicUsize,
    }

    pub enum PlannedCall {
        /// Session create fails outright
        CreateFails,
        /// Session create never resolves (exercises the deadline)
        Hangs,
        /// Session create succeeds, frame submit fails
        SubmitFails,
        /// Both succeed with this response
        Succeeds(VerifyResponse),
    }

    impl ScriptedApi {
        pub fn new(plan: Vec<PlannedCall>) -> Self {
            Self {
                plan: Mutex::new(plan),
                create_calls: AtomicUsize::new(0),
                submit_calls: AtomicUsize::new(0),
            }
        }

        fn current(&self) -> Option<PlannedCall> {
            let mut plan = self.plan.lock().unwrap();
            if plan.is_empty() {
                None
            } else {
                Some(plan.remove(0))
            }
        }
    }

    #[async_trait]
    impl VerificationApi for ScriptedApi {
        async fn create_session(
            &self,
            doc_type: &str,
        ) -> std::result::Result<SessionInfo, UploadError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            match self.current() {
                Some(PlannedCall::CreateFails) | None => Err(UploadError::SessionCreate {
                    details: "scripted network failure".to_string(),
                }),
                Some(PlannedCall::Hangs) => {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Err(UploadError::SessionCreate {
                        details: "scripted stall elapsed".to_string(),
                    })
                }
                Some(PlannedCall::SubmitFails) => {
                    // Stash a marker session so the submit step can fail
                    Ok(SessionInfo {
                        id: "session-submit-fails".to_string(),
                        created_at: String::new(),
                        doc_type: Some(doc_type.to_string()),
                    })
                }
                Some(PlannedCall::Succeeds(response)) => {
                    let mut plan = self.plan.lock().unwrap();
                    plan.insert(0, PlannedCall::Succeeds(response));
                    Ok(SessionInfo {
                        id: "session-ok".to_string(),
                        created_at: String::new(),
                        doc_type: Some(doc_type.to_string()),
                    })
                }
            }
        }

        async fn submit_frame(
            &self,
            session_id: &str,
            _image_jpeg: &[u8],
            _file_name: &str,
            _doc_type: &str,
        ) -> std::result::Result<VerifyResponse, UploadError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if session_id == "session-submit-fails" {
                return Err(UploadError::Submit {
                    details: "scripted submit failure".to_string(),
                });
            }
            match self.current() {
                Some(PlannedCall::Succeeds(response)) => Ok(response),
                _ => Err(UploadError::Submit {
                    details: "scripted submit failure".to_string(),
                }),
            }
        }
    }
}
