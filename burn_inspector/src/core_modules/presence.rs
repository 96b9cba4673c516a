// THEORY:
// The `PresenceDetector` answers one question per cycle: is there anything on the
// stage that was not there in the empty reference scene? It is classic background
// subtraction, kept deliberately stateless.
//
// Algorithm:
// 1.  **Differencing**: per-channel absolute difference between the live frame and
//     the reference frame, collapsed to one intensity per pixel by taking the
//     largest channel difference. A change in any single channel counts in full,
//     so an object that differs from the background only in blue is still seen.
// 2.  **Thresholding**: pixels whose difference intensity exceeds
//     `difference_threshold` become foreground (255), everything else background (0).
//     This is the raw difference mask.
// 3.  **Cleaning**: a morphological opening (erode, then dilate) with a square
//     structuring element of odd side `morphological_kernel_size` removes isolated speckle from sensor noise while keeping
//     any blob at least as wide as the kernel intact. This is the cleaned mask.
// 4.  **Decision**: the object is present iff the number of surviving foreground
//     pixels reaches `minimum_foreground_area`.
//
// The detector holds only its settings; two calls with the same frames always
// produce the same result.

use crate::core_modules::frame::{Frame, ensure_same_shape};
use crate::error::Result;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use serde::{Deserialize, Serialize};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Tunable thresholds for background subtraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresenceSettings {
    /// Minimum difference intensity (0-255) for a pixel to count as changed.
    pub difference_threshold: u8,
    /// Noise floor: foreground pixels required, after cleaning, to report an object.
    pub minimum_foreground_area: usize,
    /// Side length of the square opening kernel; must be odd. 0 or 1 disables cleaning.
    pub morphological_kernel_size: u8,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            difference_threshold: 30,
            minimum_foreground_area: 500,
            morphological_kernel_size: 5,
        }
    }
}

/// Output of one presence check. The masks are cycle-scoped and dropped with it.
#[derive(Debug, Clone)]
pub struct PresenceResult {
    pub is_present: bool,
    /// Foreground pixels left in the cleaned mask.
    pub foreground_pixels: usize,
    pub difference_mask: GrayImage,
    pub cleaned_mask: GrayImage,
}

#[derive(Debug, Clone, Default)]
pub struct PresenceDetector {
    settings: PresenceSettings,
}

impl PresenceDetector {
    pub fn new(settings: PresenceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PresenceSettings {
        &self.settings
    }

    /// Compares `live` against `reference`. Fails only on a shape mismatch.
    pub fn detect_presence(&self, live: &Frame, reference: &Frame) -> Result<PresenceResult> {
        ensure_same_shape(live, reference)?;

        let difference = absolute_difference(live, reference);
        let difference_mask = threshold_mask(&difference, self.settings.difference_threshold);
        let cleaned_mask = clean_mask(&difference_mask, self.settings.morphological_kernel_size);

        let foreground_pixels = count_foreground(&cleaned_mask);
        let is_present = foreground_pixels >= self.settings.minimum_foreground_area;

        tracing::debug!(
            raw = count_foreground(&difference_mask),
            cleaned = foreground_pixels,
            noise_floor = self.settings.minimum_foreground_area,
            is_present,
            "presence check"
        );

        Ok(PresenceResult {
            is_present,
            foreground_pixels,
            difference_mask,
            cleaned_mask,
        })
    }
}

/// Free-function form of [`PresenceDetector::detect_presence`].
pub fn detect_presence(
    live: &Frame,
    reference: &Frame,
    settings: &PresenceSettings,
) -> Result<PresenceResult> {
    PresenceDetector::new(settings.clone()).detect_presence(live, reference)
}

/// Largest per-channel |live - reference| at each pixel.
fn absolute_difference(live: &Frame, reference: &Frame) -> GrayImage {
    GrayImage::from_fn(live.width(), live.height(), |x, y| {
        let a = live.get_pixel(x, y).0;
        let b = reference.get_pixel(x, y).0;
        let strongest = a.iter().zip(b.iter()).map(|(l, r)| l.abs_diff(*r)).max().unwrap_or(0);
        Luma([strongest])
    })
}

fn threshold_mask(difference: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(difference.width(), difference.height(), |x, y| {
        if difference.get_pixel(x, y).0[0] > threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

fn clean_mask(mask: &GrayImage, kernel_size: u8) -> GrayImage {
    let radius = kernel_size / 2;
    if radius == 0 {
        return mask.clone();
    }
    morphology::open(mask, Norm::LInf, radius)
}

pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] == FOREGROUND).count()
}
