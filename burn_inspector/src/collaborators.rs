// THEORY:
// Seams to the hardware around the inspection pipeline.
//
// The pipeline never touches a camera or a serial port. Frame acquisition and
// actuation are owned by whoever drives the line and are reached only through
// these two traits.

use crate::error::CollaboratorError;
use std::path::PathBuf;

/// Produces a fresh frame and persists it to disk, returning where it was written.
pub trait FrameSource {
    fn acquire(&mut self) -> Result<PathBuf, CollaboratorError>;
}

/// Physically removes (or lets through) the current item.
pub trait ActuatorDriver {
    /// Acts on `reject` and returns the decision that was carried out.
    fn actuate(&mut self, reject: bool) -> Result<bool, CollaboratorError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn acquire(&mut self) -> Result<PathBuf, CollaboratorError> {
        (**self).acquire()
    }
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for Box<T> {
    fn actuate(&mut self, reject: bool) -> Result<bool, CollaboratorError> {
        (**self).actuate(reject)
    }
}
