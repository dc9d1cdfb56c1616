use crate::config::FocusConfig;
use crate::frame::{CameraFrame, RgbaFrame};

use tracing::debug;

/// Focus estimator producing a scalar sharpness score per frame.
///
/// The score is the variance of per-pixel luma edge energy over a strided
/// sample grid. Sharp, detailed content produces widely varying edge
/// energies; a blurred or blank frame yields a flat, low-variance response.
/// The estimator is stateless and deterministic for identical input.
pub struct FocusEstimator {
    config: FocusConfig,
}

impl FocusEstimator {
    pub fn new(config: FocusConfig) -> Self {
        Self { config }
    }

    /// Score a decoded RGBA frame.
    ///
    /// Degenerate input (zero-size frame, undersized buffer, no sample
    /// points) scores 0.0 rather than failing.
    pub fn score(&self, frame: &RgbaFrame) -> f64 {
        let width = frame.width as usize;
        let height = frame.height as usize;
        let stride = self.config.sample_stride.max(1) as usize;

        if width < 2 || height < 2 || frame.data.len() < width * height * 4 {
            return 0.0;
        }

        let data = &frame.data;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0u64;

        for y in (0..height - 1).step_by(stride) {
            for x in (0..width - 1).step_by(stride) {
                let idx = (y * width + x) * 4;
                let idx_right = (y * width + (x + 1)) * 4;
                let idx_down = ((y + 1) * width + x) * 4;

                let lum = luma(data[idx], data[idx + 1], data[idx + 2]);
                let lum_right = luma(data[idx_right], data[idx_right + 1], data[idx_right + 2]);
                let lum_down = luma(data[idx_down], data[idx_down + 1], data[idx_down + 2]);

                let edge = (lum - lum_right).abs() + (lum - lum_down).abs();
                sum += edge;
                sum_sq += edge * edge;
                count += 1;
            }
        }

        if count == 0 {
            return 0.0;
        }

        let mean = sum / count as f64;
        // Clamp float round-off; the score is non-negative by definition
        (sum_sq / count as f64 - mean * mean).max(0.0)
    }

    /// Score a JPEG preview frame, decoding it first.
    ///
    /// A frame that fails to decode scores 0.0; decode problems are a
    /// per-frame condition, not an error the capture loop should see.
    pub fn score_preview(&self, frame: &CameraFrame) -> f64 {
        match frame.decode_rgba() {
            Ok(rgba) => self.score(&rgba),
            Err(e) => {
                debug!("Preview frame {} not scoreable: {}", frame.id, e);
                0.0
            }
        }
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }
}

/// ITU-R BT.601 luma weighting
#[inline]
fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn estimator() -> FocusEstimator {
        FocusEstimator::new(FocusConfig { sample_stride: 2 })
    }

    fn flat_frame(width: u32, height: u32, rgb: [u8; 3]) -> RgbaFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        RgbaFrame::from_raw(data, width, height).unwrap()
    }

    fn textured_frame(width: u32, height: u32) -> RgbaFrame {
        // Wrapping ramp: neighbor deltas are mostly constant but spike at
        // every wrap, so edge energy varies and its variance is large
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = (((x * 37 + y * 71) % 97) * 2) as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        RgbaFrame::from_raw(data, width, height).unwrap()
    }

    #[test]
    fn test_flat_frame_scores_exactly_zero() {
        let est = estimator();
        assert_eq!(est.score(&flat_frame(64, 48, [128, 128, 128])), 0.0);
        assert_eq!(est.score(&flat_frame(64, 48, [0, 0, 0])), 0.0);
        assert_eq!(est.score(&flat_frame(64, 48, [255, 10, 40])), 0.0);
    }

    #[test]
    fn test_detail_scores_higher_than_soft_gradient() {
        let est = estimator();
        let sharp = est.score(&textured_frame(64, 48));

        // Gentle horizontal ramp: uniform small gradients, low variance
        let mut data = Vec::new();
        for _y in 0..48u32 {
            for x in 0..64u32 {
                let v = (x * 2) as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let soft = est.score(&RgbaFrame::from_raw(data, 64, 48).unwrap());

        assert!(sharp > soft);
        assert!(sharp > 0.0);
    }

    #[test]
    fn test_brightness_offset_invariance() {
        let est = estimator();

        let make = |offset: u8| {
            let mut data = Vec::new();
            for y in 0..32u32 {
                for x in 0..32u32 {
                    // Textured but safely below clipping after the offset
                    let v = (((x * 7 + y * 13) % 120) as u8).saturating_add(offset);
                    data.extend_from_slice(&[v, v, v, 255]);
                }
            }
            RgbaFrame::from_raw(data, 32, 32).unwrap()
        };

        let base = est.score(&make(0));
        let brighter = est.score(&make(60));
        assert!(
            (base - brighter).abs() < 1e-6,
            "offset changed score: {} vs {}",
            base,
            brighter
        );
    }

    #[test]
    fn test_degenerate_input_scores_zero() {
        let est = estimator();
        assert_eq!(
            est.score(&RgbaFrame {
                data: Vec::new(),
                width: 0,
                height: 0
            }),
            0.0
        );
        assert_eq!(
            est.score(&RgbaFrame {
                data: vec![0u8; 4],
                width: 1,
                height: 1
            }),
            0.0
        );
        // Buffer shorter than the claimed dimensions
        assert_eq!(
            est.score(&RgbaFrame {
                data: vec![0u8; 64],
                width: 100,
                height: 100
            }),
            0.0
        );
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let est = estimator();
        let frame = textured_frame(48, 32);
        assert_eq!(est.score(&frame), est.score(&frame));
    }

    #[test]
    fn test_undecodable_preview_scores_zero() {
        let est = estimator();
        let garbage = CameraFrame::new(1, SystemTime::now(), vec![0xDE, 0xAD], 320, 240);
        assert_eq!(est.score_preview(&garbage), 0.0);
    }
}
