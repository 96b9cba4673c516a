// THEORY:
// The `geometry` module gates a detected object on size and orientation before any
// colour analysis runs. Area is compared against an inclusive range. Orientation is
// undirected, so the angle range is read modulo 180 degrees and may wrap past 180.

use crate::core_modules::region::{RegionDescriptor, find_largest_region, normalize_angle};
use crate::error::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceRange {
    pub min: f64,
    pub max: f64,
}

impl AcceptanceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// True iff `angle` (degrees) falls inside `range` on the 180°-periodic circle of
/// undirected orientations. Ranges spanning 180° or more accept everything; ranges
/// may wrap past 180 (e.g. 170..190 accepts 5).
pub fn angle_in_range(angle: f64, range: &AcceptanceRange) -> bool {
    let span = range.max - range.min;
    if span >= 180.0 {
        return true;
    }
    if span < 0.0 {
        return false;
    }
    normalize_angle(angle - range.min) <= span
}

/// Checks a region's area and orientation against the accepted ranges.
pub fn is_area_and_angle_good(
    region: &RegionDescriptor,
    accepted_area: &AcceptanceRange,
    accepted_angle: &AcceptanceRange,
) -> bool {
    accepted_area.contains(region.area) && angle_in_range(region.angle_degrees, accepted_angle)
}

#[derive(Debug, Clone)]
pub struct GeometricValidator {
    pub area_range: AcceptanceRange,
    pub angle_range: AcceptanceRange,
    /// Physical area units per pixel; 1.0 keeps areas in pixels.
    pub area_scale: f64,
}

impl GeometricValidator {
    pub fn new(area_range: AcceptanceRange, angle_range: AcceptanceRange, area_scale: f64) -> Self {
        Self {
            area_range,
            angle_range,
            area_scale,
        }
    }

    pub fn is_area_and_angle_good(&self, region: &RegionDescriptor) -> bool {
        let good = is_area_and_angle_good(region, &self.area_range, &self.angle_range);
        tracing::debug!(
            area = region.area,
            angle = region.angle_degrees,
            good,
            "geometry check"
        );
        good
    }

    /// Describes the largest component of a cleaned mask and validates it.
    pub fn validate_mask(&self, cleaned_mask: &GrayImage) -> Result<(RegionDescriptor, bool)> {
        let region = find_largest_region(cleaned_mask)?;
        let descriptor = region.descriptor.scaled(self.area_scale);
        Ok((descriptor, self.is_area_and_angle_good(&descriptor)))
    }
}
