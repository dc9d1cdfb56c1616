use crate::error::CameraError;
use std::sync::Arc;
use std::time::SystemTime;

/// A JPEG frame as served by a camera source.
///
/// The same envelope carries the lightweight previews scored every tick and
/// the full-resolution capture selected at trigger time; previews are decoded
/// to [`RgbaFrame`] only for the duration of a single score pass.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Unique frame identifier assigned by the source
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// JPEG data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl CameraFrame {
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    /// Decode the JPEG payload into an RGBA pixel buffer for scoring.
    pub fn decode_rgba(&self) -> Result<RgbaFrame, CameraError> {
        let decoded = image::load_from_memory(&self.data).map_err(|e| CameraError::Decode {
            details: format!("JPEG decode failed for frame {}: {}", self.id, e),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(RgbaFrame {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Decoded pixel buffer, 4 bytes per pixel (RGBA), row-major.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbaFrame {
    /// Build from a raw buffer, validating the expected RGBA size.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }
}

/// Full-resolution frame selected for submission.
///
/// Created at trigger time and owned by the upload pipeline call in flight
/// until it is terminally consumed (verified, queued, or lost).
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Full-resolution JPEG data
    pub jpeg: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Target document-type tag submitted alongside the image
    pub doc_type: String,
}

impl CapturedFrame {
    pub fn new(
        timestamp: SystemTime,
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
        doc_type: String,
    ) -> Self {
        Self {
            timestamp,
            jpeg: Arc::new(jpeg),
            width,
            height,
            doc_type,
        }
    }

    /// Tag a full-resolution camera frame for submission (shares the payload).
    pub fn from_camera(frame: &CameraFrame, doc_type: String) -> Self {
        Self {
            timestamp: frame.timestamp,
            jpeg: Arc::clone(&frame.data),
            width: frame.width,
            height: frame.height,
            doc_type,
        }
    }
}
