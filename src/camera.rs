use crate::config::CameraConfig;
use crate::error::{CameraError, Result, VeriscanError};
use crate::frame::CameraFrame;

use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Seam between the capture core and whatever produces frames.
///
/// Hosts bring their own implementation for real hardware; the crate ships
/// [`ReplayCamera`] for demos and tests.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Whether the source currently has frames to offer. An unavailable
    /// camera is a transient condition and the controller skips the tick.
    async fn is_available(&self) -> bool;

    /// Acquire a lightweight preview frame for focus scoring. Previews are
    /// expected to be small; scoring cost is bounded by their resolution.
    async fn preview(&self) -> std::result::Result<CameraFrame, CameraError>;

    /// Acquire the full-resolution frame for submission. Called once per
    /// trigger, after the preview stream has classified stable.
    async fn capture(&self) -> std::result::Result<CameraFrame, CameraError>;
}

/// Frame source that serves JPEG files from a directory in a loop.
///
/// Stands in for a physical camera: `preview` serves a downscaled re-encode
/// of the next file, `capture` serves the original bytes of the file most
/// recently previewed.
pub struct ReplayCamera {
    files: Vec<PathBuf>,
    preview_max_width: u32,
    cursor: AtomicUsize,
    last_served: AtomicUsize,
    frame_counter: AtomicU64,
}

impl ReplayCamera {
    pub async fn new(config: &CameraConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.replay_dir);
        let mut files = Vec::new();

        match tokio::fs::read_dir(&dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await.map_err(VeriscanError::Io)? {
                    let path = entry.path();
                    match path.extension().and_then(|s| s.to_str()) {
                        Some("jpg") | Some("jpeg") => files.push(path),
                        _ => {}
                    }
                }
            }
            Err(e) => {
                warn!(
                    "Replay directory {} not readable ({}); camera will report unavailable",
                    dir.display(),
                    e
                );
            }
        }

        files.sort();
        info!(
            "Replay camera initialized with {} frames from {}",
            files.len(),
            dir.display()
        );

        Ok(Self {
            files,
            preview_max_width: config.preview_max_width,
            cursor: AtomicUsize::new(0),
            last_served: AtomicUsize::new(0),
            frame_counter: AtomicU64::new(0),
        })
    }

    async fn read_file(&self, index: usize) -> std::result::Result<Vec<u8>, CameraError> {
        let path = &self.files[index];
        tokio::fs::read(path)
            .await
            .map_err(|e| CameraError::CaptureFailed {
                details: format!("failed to read {}: {}", path.display(), e),
            })
    }

    fn next_frame_id(&self) -> u64 {
        self.frame_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Downscale to the preview width and re-encode, keeping per-tick
    /// scoring cost bounded regardless of the source resolution.
    fn make_preview(&self, bytes: &[u8]) -> std::result::Result<(Vec<u8>, u32, u32), CameraError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| CameraError::Decode {
            details: format!("replay frame decode failed: {}", e),
        })?;

        let resized = if decoded.width() > self.preview_max_width {
            decoded.resize(
                self.preview_max_width,
                u32::MAX,
                image::imageops::FilterType::Triangle,
            )
        } else {
            decoded
        };

        let (width, height) = (resized.width(), resized.height());
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 60)
            .encode_image(&resized)
            .map_err(|e| CameraError::Decode {
                details: format!("preview encode failed: {}", e),
            })?;

        Ok((jpeg, width, height))
    }
}

#[async_trait]
impl FrameSource for ReplayCamera {
    async fn is_available(&self) -> bool {
        !self.files.is_empty()
    }

    async fn preview(&self) -> std::result::Result<CameraFrame, CameraError> {
        if self.files.is_empty() {
            return Err(CameraError::Unavailable {
                details: "replay directory holds no frames".to_string(),
            });
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.files.len();
        self.last_served.store(index, Ordering::Relaxed);

        let bytes = self.read_file(index).await?;
        let (jpeg, width, height) = self.make_preview(&bytes)?;

        let frame = CameraFrame::new(self.next_frame_id(), SystemTime::now(), jpeg, width, height);
        debug!(
            "Replay preview frame {} served from slot {} ({}x{})",
            frame.id, index, width, height
        );
        Ok(frame)
    }

    async fn capture(&self) -> std::result::Result<CameraFrame, CameraError> {
        if self.files.is_empty() {
            return Err(CameraError::Unavailable {
                details: "replay directory holds no frames".to_string(),
            });
        }

        let index = self.last_served.load(Ordering::Relaxed);
        let bytes = self.read_file(index).await?;

        let (width, height) = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| CameraError::Decode {
                details: format!("capture format probe failed: {}", e),
            })?
            .into_dimensions()
            .map_err(|e| CameraError::Decode {
                details: format!("capture dimensions unreadable: {}", e),
            })?;

        Ok(CameraFrame::new(
            self.next_frame_id(),
            SystemTime::now(),
            bytes,
            width,
            height,
        ))
    }
}
