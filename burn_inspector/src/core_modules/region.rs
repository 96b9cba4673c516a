// THEORY:
// The `region` module turns the cleaned foreground mask into a single described
// object. It is the spatial grouping step between "some pixels changed" and "this is
// the item on the stage, this big, lying at this angle".
//
// Algorithm:
// 1.  **Labelling**: 8-connected component labelling of the cleaned mask. Each
//     label is one spatially coherent blob of foreground.
// 2.  **Aggregation**: a single raster pass accumulates, per label, the pixel count,
//     bounding box, and the raw first- and second-order moments.
// 3.  **Selection**: the largest component wins. Equal areas resolve to the lowest
//     label, i.e. the blob whose first pixel comes first in raster order.
// 4.  **Orientation**: the principal axis from central second-order moments,
//     θ = ½·atan2(2μ11, μ20 − μ02). Moments are accumulated as exact integers so a
//     symmetric blob reports exactly 0° instead of floating-point noise.
//
// Like the blob aggregation it replaces, this is stateless: one mask in, one region
// out, no memory of earlier frames.

use crate::error::{InspectionError, Result};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

/// A pixel coordinate in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Area and undirected orientation of a detected object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionDescriptor {
    /// Pixel count, or physical units once scaled. Never negative.
    pub area: f64,
    /// Principal-axis angle in degrees from the image x-axis, in [0, 180).
    pub angle_degrees: f64,
}

impl RegionDescriptor {
    pub fn new(area: f64, angle_degrees: f64) -> Self {
        Self {
            area: area.max(0.0),
            angle_degrees: normalize_angle(angle_degrees),
        }
    }

    /// Converts a pixel-count area into physical units.
    pub fn scaled(self, units_per_pixel: f64) -> Self {
        Self::new(self.area * units_per_pixel, self.angle_degrees)
    }
}

/// Maps any angle onto [0, 180); `a` and `a + 180` land on the same value.
pub fn normalize_angle(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(180.0);
    // rem_euclid can round up to exactly 180.0 for tiny negative inputs.
    if wrapped >= 180.0 { 0.0 } else { wrapped }
}

/// The largest connected foreground component of a mask.
#[derive(Debug, Clone)]
pub struct DetectedRegion {
    pub descriptor: RegionDescriptor,
    /// Top-left and bottom-right corners, inclusive.
    pub bounding_box: (Point, Point),
    pub centroid: (f64, f64),
    pub pixels: Vec<Point>,
}

impl DetectedRegion {
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }
}

pub mod region_finder {
    use super::*;

    /// Finds the largest 8-connected foreground component in `mask`. Any non-zero
    /// pixel is foreground. Fails with `NoRegionFound` on an empty mask.
    pub fn find_largest_region(mask: &GrayImage) -> Result<DetectedRegion> {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        // Index 0 is background and stays empty.
        let mut moments: Vec<RegionMoments> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if moments.len() <= label {
                moments.resize_with(label + 1, RegionMoments::default);
            }
            moments[label].add(x, y);
        }

        let (best_label, best) = moments
            .iter()
            .enumerate()
            .filter(|(_, m)| m.count > 0)
            // max_by_key keeps the last maximum; reversing keeps the lowest label.
            .rev()
            .max_by_key(|(_, m)| m.count)
            .ok_or(InspectionError::NoRegionFound)?;

        let pixels: Vec<Point> = labels
            .enumerate_pixels()
            .filter(|(_, _, label)| label.0[0] as usize == best_label)
            .map(|(x, y, _)| Point { x, y })
            .collect();

        tracing::debug!(
            components = moments.iter().filter(|m| m.count > 0).count(),
            area = best.count,
            angle = best.angle_degrees(),
            "largest region"
        );

        Ok(DetectedRegion {
            descriptor: RegionDescriptor::new(best.count as f64, best.angle_degrees()),
            bounding_box: (
                Point { x: best.min_x, y: best.min_y },
                Point { x: best.max_x, y: best.max_y },
            ),
            centroid: best.centroid(),
            pixels,
        })
    }

    /// Raw moments of one component, kept as integers until the final angle.
    #[derive(Debug, Clone)]
    struct RegionMoments {
        count: u64,
        sum_x: i128,
        sum_y: i128,
        sum_xx: i128,
        sum_yy: i128,
        sum_xy: i128,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    }

    impl Default for RegionMoments {
        fn default() -> Self {
            Self {
                count: 0,
                sum_x: 0,
                sum_y: 0,
                sum_xx: 0,
                sum_yy: 0,
                sum_xy: 0,
                min_x: u32::MAX,
                min_y: u32::MAX,
                max_x: 0,
                max_y: 0,
            }
        }
    }

    impl RegionMoments {
        fn add(&mut self, x: u32, y: u32) {
            let (xi, yi) = (x as i128, y as i128);
            self.count += 1;
            self.sum_x += xi;
            self.sum_y += yi;
            self.sum_xx += xi * xi;
            self.sum_yy += yi * yi;
            self.sum_xy += xi * yi;
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }

        fn centroid(&self) -> (f64, f64) {
            let n = self.count as f64;
            (self.sum_x as f64 / n, self.sum_y as f64 / n)
        }

        /// Principal-axis angle. Central moments scaled by n² stay exact:
        /// n²·μ20 = n·Σx² − (Σx)², and likewise for μ02 and μ11.
        fn angle_degrees(&self) -> f64 {
            let n = self.count as i128;
            let m20 = n * self.sum_xx - self.sum_x * self.sum_x;
            let m02 = n * self.sum_yy - self.sum_y * self.sum_y;
            let m11 = n * self.sum_xy - self.sum_x * self.sum_y;
            if m11 == 0 && m20 == m02 {
                return 0.0;
            }
            let theta = 0.5 * (2.0 * m11 as f64).atan2((m20 - m02) as f64);
            normalize_angle(theta.to_degrees())
        }
    }
}

pub use region_finder::find_largest_region;
