// THEORY:
// The `frame` module is the entry point for raw image data. Everything downstream
// works on a single representation: an 8-bit, 3-channel RGB grid. Whatever raster
// format the capture step wrote (PNG, JPEG, BMP, with or without alpha) is decoded
// and normalised to RGB exactly once, here.
//
// Two kinds of frame exist:
// 1.  **Live frames** are cycle-scoped. They are loaded at the start of an
//     inspection cycle, borrowed by each stage, and dropped when the cycle ends.
// 2.  **The reference frame** is process-scoped. It is the empty scene, loaded at
//     startup and shared behind an `Arc` for the lifetime of the run. Nothing
//     hands out a mutable reference to it.

use crate::error::{InspectionError, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// A captured image, RGB order, one byte per channel.
pub type Frame = RgbImage;

/// Decodes the image at `path` into an RGB frame.
pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|source| InspectionError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.to_rgb8())
}

/// Fails with `DimensionMismatch` unless both frames share width and height.
/// Channel layout is fixed by the `Frame` type itself.
pub fn ensure_same_shape(live: &Frame, reference: &Frame) -> Result<()> {
    if live.dimensions() != reference.dimensions() {
        return Err(InspectionError::DimensionMismatch {
            expected: reference.dimensions(),
            actual: live.dimensions(),
        });
    }
    Ok(())
}

/// The background (empty scene) frame every live frame is compared against.
#[derive(Debug, Clone)]
pub struct ReferenceFrame {
    frame: Frame,
    source: Option<PathBuf>,
}

impl ReferenceFrame {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            source: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let frame = load_frame(path)?;
        tracing::info!(
            path = %path.display(),
            width = frame.width(),
            height = frame.height(),
            "loaded reference frame"
        );
        Ok(Self {
            frame,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    /// Where the frame was loaded from, if it came from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
