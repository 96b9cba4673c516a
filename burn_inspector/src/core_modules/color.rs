// THEORY:
// A `ColorDescriptor` is the summary of a region's colour: the per-channel mean over
// every pixel that belongs to it. Averaging is the core noise-reduction step of the
// classifier. Individual pixels on a burnt surface vary wildly (char flecks,
// specular highlights), but the mean of a few thousand of them is stable.
//
// Like `Frame`, this is a "dumb" data container. It knows how to build itself from
// pixels and how far it is from another descriptor; it knows nothing about burn
// states or thresholds.

use crate::core_modules::frame::Frame;
use crate::core_modules::region::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean colour of a region, each component in [0, 255].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorDescriptor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl ColorDescriptor {
    pub fn new(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red: red.clamp(0.0, 255.0),
            green: green.clamp(0.0, 255.0),
            blue: blue.clamp(0.0, 255.0),
        }
    }

    /// Per-channel mean over the whole image. An empty image is black.
    pub fn mean_of(frame: &Frame) -> Self {
        let mut sums = ChannelSums::default();
        for pixel in frame.pixels() {
            sums.add(pixel.0);
        }
        sums.mean()
    }

    /// Per-channel mean over the given pixel coordinates. Coordinates outside the
    /// frame are ignored; an empty selection is black.
    pub fn mean_over(frame: &Frame, pixels: &[Point]) -> Self {
        let mut sums = ChannelSums::default();
        for point in pixels {
            if let Some(pixel) = frame.get_pixel_checked(point.x, point.y) {
                sums.add(pixel.0);
            }
        }
        sums.mean()
    }

    /// Euclidean distance in RGB space.
    pub fn distance(&self, other: &ColorDescriptor) -> f64 {
        ((self.red - other.red).powi(2)
            + (self.green - other.green).powi(2)
            + (self.blue - other.blue).powi(2))
        .sqrt()
    }

    /// `r + g - 2b`: large for yellow, near zero for greys.
    pub fn yellow_signal(&self) -> f64 {
        self.red + self.green - 2.0 * self.blue
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }
}

impl From<[u8; 3]> for ColorDescriptor {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0] as f64, rgb[1] as f64, rgb[2] as f64)
    }
}

impl fmt::Display for ColorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.1}, {:.1}, {:.1}]", self.red, self.green, self.blue)
    }
}

#[derive(Default)]
struct ChannelSums {
    red: u64,
    green: u64,
    blue: u64,
    count: u64,
}

impl ChannelSums {
    fn add(&mut self, rgb: [u8; 3]) {
        self.red += rgb[0] as u64;
        self.green += rgb[1] as u64;
        self.blue += rgb[2] as u64;
        self.count += 1;
    }

    fn mean(&self) -> ColorDescriptor {
        if self.count == 0 {
            return ColorDescriptor::default();
        }
        let n = self.count as f64;
        ColorDescriptor::new(
            self.red as f64 / n,
            self.green as f64 / n,
            self.blue as f64 / n,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn mean_of_uniform_frame_is_that_colour() {
        let frame = Frame::from_pixel(5, 5, Rgb([255, 136, 48]));
        assert_eq!(
            ColorDescriptor::mean_of(&frame),
            ColorDescriptor::new(255.0, 136.0, 48.0)
        );
    }

    #[test]
    fn mean_is_fractional() {
        let frame = Frame::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([1, 3, 255]) });
        let mean = ColorDescriptor::mean_of(&frame);
        assert_eq!(mean.red, 0.5);
        assert_eq!(mean.green, 1.5);
        assert_eq!(mean.blue, 127.5);
    }

    #[test]
    fn mean_over_selected_pixels_only() {
        let frame = Frame::from_fn(4, 4, |x, _| if x < 2 { Rgb([10, 10, 10]) } else { Rgb([250, 0, 0]) });
        let right_half: Vec<Point> = (0..4)
            .flat_map(|y| (2..4).map(move |x| Point { x, y }))
            .collect();
        assert_eq!(
            ColorDescriptor::mean_over(&frame, &right_half),
            ColorDescriptor::new(250.0, 0.0, 0.0)
        );
    }

    #[test]
    fn empty_inputs_are_black() {
        assert_eq!(ColorDescriptor::mean_of(&Frame::new(0, 0)), ColorDescriptor::default());
        let frame = Frame::from_pixel(2, 2, Rgb([9, 9, 9]));
        assert_eq!(ColorDescriptor::mean_over(&frame, &[]), ColorDescriptor::default());
        assert_eq!(
            ColorDescriptor::mean_over(&frame, &[Point { x: 7, y: 7 }]),
            ColorDescriptor::default()
        );
    }

    #[test]
    fn components_are_clamped() {
        let c = ColorDescriptor::new(-4.0, 300.0, 12.0);
        assert_eq!(c.as_array(), [0.0, 255.0, 12.0]);
    }

    #[test]
    fn distance_and_yellow_signal() {
        let a = ColorDescriptor::new(0.0, 0.0, 0.0);
        let b = ColorDescriptor::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(ColorDescriptor::new(254.0, 238.0, 86.0).yellow_signal(), 320.0);
    }
}
