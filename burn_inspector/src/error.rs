use std::path::PathBuf;
use thiserror::Error;

/// Failures of the inspection pipeline itself.
#[derive(Error, Debug)]
pub enum InspectionError {
    /// The frame is missing on disk or could not be decoded.
    #[error("could not load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Live and reference frames differ in shape. Misconfiguration.
    #[error("frame is {actual:?} but the reference frame is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Presence was reported but no connected foreground region survived cleaning.
    #[error("no connected foreground region found in the cleaned mask")]
    NoRegionFound,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InspectionError {
    /// Configuration-class errors abort the run; everything else is converted
    /// into a reject verdict and the line keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InspectionError::DimensionMismatch { .. } | InspectionError::Config(_)
        )
    }
}

/// Failures reported by the frame acquisition and actuator collaborators.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} timed out after {seconds:.1}s")]
    Timeout { operation: &'static str, seconds: f64 },

    #[error("command failed: {0}")]
    Command(String),

    #[error("serial error: {0}")]
    Serial(String),
}

pub type Result<T> = std::result::Result<T, InspectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_is_fatal() {
        let err = InspectionError::DimensionMismatch {
            expected: (640, 480),
            actual: (320, 240),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("(320, 240)"));
    }

    #[test]
    fn config_errors_are_fatal() {
        assert!(InspectionError::Config("bad range".to_string()).is_fatal());
    }

    #[test]
    fn stage_errors_are_recoverable() {
        assert!(!InspectionError::NoRegionFound.is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: InspectionError = io.into();
        assert!(!err.is_fatal());
    }

    #[test]
    fn timeout_message_names_operation() {
        let err = CollaboratorError::Timeout {
            operation: "frame acquisition",
            seconds: 10.0,
        };
        assert_eq!(err.to_string(), "frame acquisition timed out after 10.0s");
    }
}
