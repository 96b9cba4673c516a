// THEORY:
// This file is the main entry point for the `burn_inspector` library crate.
// It exports the `InspectionPipeline` and its associated data structures
// (`InspectionConfig`, `CycleReport`, `Verdict`, etc.) as the high-level
// interface of the inspection engine. The individual detector stages live in
// `core_modules` and stay usable on their own, so each can be tested and
// calibrated in isolation.
//
// The crate never talks to hardware. Frame capture and the reject actuator are
// reached through the traits in `collaborators`, implemented by whoever drives
// the line.

pub mod collaborators;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use collaborators::{ActuatorDriver, FrameSource};
pub use config::InspectionConfig;
pub use core_modules::burn_state::{BurnState, BurnStateClassifier, Classification};
pub use core_modules::frame::{Frame, ReferenceFrame};
pub use error::{CollaboratorError, InspectionError};
pub use pipeline::{CycleReport, InspectionPipeline, PassReason, RejectReason, Verdict};
