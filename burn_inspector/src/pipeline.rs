// THEORY:
// The `pipeline` module is the top-level API of the inspection engine. It sequences
// the three detectors into exactly one pass/reject verdict per cycle, and it is the
// only place that decides what a stage failure means for the item on the line.
//
// A cycle is a small explicit state machine rather than nested conditionals:
//
//   Start -> PresenceChecked -> GeometryChecked -> StateClassified -> VerdictReady
//                  |                   |
//                  +-> VerdictReady    +-> Rejected -> VerdictReady
//                      (no object)         (bad geometry / no region)
//
// Every stage runs only if the previous stage's precondition holds, so a frame with
// no object never pays for region extraction or colour analysis. `step` performs one
// transition; `run_cycle` drives `step` until the verdict is ready.
//
// Error policy:
// - `DimensionMismatch` is a misconfiguration and is returned to the caller, which
//   should abort the run.
// - `NoRegionFound` (presence said yes, labelling found nothing) becomes a reject
//   and is logged for calibration review.
// - An unreadable frame becomes a reject: a failed measurement must never pass.

use crate::config::InspectionConfig;
use crate::core_modules::burn_state::{BurnState, BurnStateClassifier, Classification};
use crate::core_modules::frame::{Frame, ReferenceFrame, load_frame};
use crate::core_modules::geometry::GeometricValidator;
use crate::core_modules::presence::{PresenceDetector, PresenceResult};
use crate::core_modules::region::{DetectedRegion, RegionDescriptor, find_largest_region};
use crate::error::{InspectionError, Result};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Nothing on the stage, so nothing to remove.
    NoObject,
    GoodBurnState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    GeometryOutOfRange,
    BurnState(BurnState),
    /// Presence reported an object but no connected region survived cleaning.
    NoRegionFound,
    /// The frame could not be acquired or decoded.
    FrameUnreadable,
}

/// The single decision produced by a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass(PassReason),
    Reject(RejectReason),
}

impl Verdict {
    /// "Bad found": the actuator should remove the item.
    pub fn is_reject(&self) -> bool {
        matches!(self, Verdict::Reject(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass(PassReason::NoObject) => f.write_str("pass (no object)"),
            Verdict::Pass(PassReason::GoodBurnState) => f.write_str("pass (good)"),
            Verdict::Reject(RejectReason::GeometryOutOfRange) => f.write_str("reject (area/angle out of range)"),
            Verdict::Reject(RejectReason::BurnState(state)) => write!(f, "reject ({})", state),
            Verdict::Reject(RejectReason::NoRegionFound) => f.write_str("reject (no region found)"),
            Verdict::Reject(RejectReason::FrameUnreadable) => f.write_str("reject (frame unreadable)"),
        }
    }
}

/// What an executed stage observed.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Presence { is_present: bool, foreground_pixels: usize },
    Geometry { descriptor: RegionDescriptor, accepted: bool },
    RegionMissing,
    BurnState(Classification),
}

/// The states of one inspection cycle.
#[derive(Debug, Clone)]
pub enum CycleState {
    Start,
    PresenceChecked(PresenceResult),
    GeometryChecked(DetectedRegion),
    StateClassified(Classification),
    Rejected(RejectReason),
    VerdictReady(Verdict),
}

impl CycleState {
    pub fn name(&self) -> &'static str {
        match self {
            CycleState::Start => "Start",
            CycleState::PresenceChecked(_) => "PresenceChecked",
            CycleState::GeometryChecked(_) => "GeometryChecked",
            CycleState::StateClassified(_) => "StateClassified",
            CycleState::Rejected(_) => "Rejected",
            CycleState::VerdictReady(_) => "VerdictReady",
        }
    }
}

/// Result of one cycle: the verdict plus what each executed stage saw.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub verdict: Verdict,
    pub stages: Vec<StageOutcome>,
}

impl CycleReport {
    /// The report for a cycle whose frame never became available.
    pub fn unreadable() -> Self {
        Self {
            verdict: Verdict::Reject(RejectReason::FrameUnreadable),
            stages: Vec::new(),
        }
    }

    pub fn bad_found(&self) -> bool {
        self.verdict.is_reject()
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.stages.iter().find_map(|stage| match stage {
            StageOutcome::BurnState(c) => Some(c),
            _ => None,
        })
    }
}

/// The inspection engine. Holds only read-only data, so a single instance can serve
/// every cycle of a run.
#[derive(Debug, Clone)]
pub struct InspectionPipeline {
    reference: Arc<ReferenceFrame>,
    presence: PresenceDetector,
    geometry: GeometricValidator,
    classifier: BurnStateClassifier,
}

impl InspectionPipeline {
    pub fn new(config: &InspectionConfig, reference: Arc<ReferenceFrame>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reference,
            presence: PresenceDetector::new(config.presence.clone()),
            geometry: GeometricValidator::new(
                config.accepted_area_range,
                config.accepted_angle_range,
                config.area_scale,
            ),
            classifier: BurnStateClassifier::new(
                config.burn_state_rules.clone(),
                config.reference_color_table.clone(),
            )?,
        })
    }

    /// Loads the reference frame named by the config and builds the pipeline. A
    /// missing or undecodable reference frame is a `Config` error.
    pub fn from_config(config: &InspectionConfig) -> Result<Self> {
        let reference = ReferenceFrame::load(&config.reference_frame_path)
            .map_err(|e| InspectionError::Config(format!("reference frame: {}", e)))?;
        Self::new(config, Arc::new(reference))
    }

    pub fn reference(&self) -> &ReferenceFrame {
        &self.reference
    }

    pub fn classifier(&self) -> &BurnStateClassifier {
        &self.classifier
    }

    /// Performs one transition. `VerdictReady` is terminal and returned unchanged.
    pub fn step(
        &self,
        state: CycleState,
        live: &Frame,
        stages: &mut Vec<StageOutcome>,
    ) -> Result<CycleState> {
        let next = match state {
            CycleState::Start => {
                let result = self.presence.detect_presence(live, self.reference.frame())?;
                stages.push(StageOutcome::Presence {
                    is_present: result.is_present,
                    foreground_pixels: result.foreground_pixels,
                });
                CycleState::PresenceChecked(result)
            }
            CycleState::PresenceChecked(result) => {
                if !result.is_present {
                    CycleState::VerdictReady(Verdict::Pass(PassReason::NoObject))
                } else {
                    match find_largest_region(&result.cleaned_mask) {
                        Ok(region) => {
                            let descriptor = region.descriptor.scaled(self.geometry.area_scale);
                            let accepted = self.geometry.is_area_and_angle_good(&descriptor);
                            stages.push(StageOutcome::Geometry { descriptor, accepted });
                            if accepted {
                                CycleState::GeometryChecked(region)
                            } else {
                                CycleState::Rejected(RejectReason::GeometryOutOfRange)
                            }
                        }
                        Err(InspectionError::NoRegionFound) => {
                            tracing::warn!(
                                foreground_pixels = result.foreground_pixels,
                                "object reported present but no region survived cleaning; check calibration"
                            );
                            stages.push(StageOutcome::RegionMissing);
                            CycleState::Rejected(RejectReason::NoRegionFound)
                        }
                        Err(other) => return Err(other),
                    }
                }
            }
            CycleState::GeometryChecked(region) => {
                let classification = self.classifier.classify_region(live, &region);
                stages.push(StageOutcome::BurnState(classification));
                CycleState::StateClassified(classification)
            }
            CycleState::StateClassified(classification) => {
                if classification.state.is_good() {
                    CycleState::VerdictReady(Verdict::Pass(PassReason::GoodBurnState))
                } else {
                    CycleState::VerdictReady(Verdict::Reject(RejectReason::BurnState(classification.state)))
                }
            }
            CycleState::Rejected(reason) => CycleState::VerdictReady(Verdict::Reject(reason)),
            ready @ CycleState::VerdictReady(_) => ready,
        };
        Ok(next)
    }

    /// Runs a full cycle on an already-decoded frame.
    pub fn run_cycle(&self, live: &Frame) -> Result<CycleReport> {
        let mut stages = Vec::new();
        let mut state = CycleState::Start;
        let verdict = loop {
            state = self.step(state, live, &mut stages)?;
            if let CycleState::VerdictReady(verdict) = state {
                break verdict;
            }
        };
        tracing::info!(%verdict, "inspection verdict");
        Ok(CycleReport { verdict, stages })
    }

    /// Loads the frame at `path` and runs a cycle. An unreadable frame is a reject;
    /// only configuration-class errors come back as `Err`.
    pub fn inspect_path(&self, path: impl AsRef<Path>) -> Result<CycleReport> {
        match load_frame(path) {
            Ok(frame) => self.run_cycle(&frame),
            Err(err @ InspectionError::ImageLoad { .. }) => {
                tracing::error!(error = %err, "frame unreadable, rejecting item");
                Ok(CycleReport::unreadable())
            }
            Err(other) => Err(other),
        }
    }

    /// Convenience for callers that only need the actuator input.
    pub fn bad_found(&self, live: &Frame) -> Result<bool> {
        Ok(self.run_cycle(live)?.bad_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::AcceptanceRange;
    use crate::core_modules::presence::PresenceSettings;
    use image::Rgb;

    const BACKGROUND: Rgb<u8> = Rgb([200, 200, 200]);

    fn config() -> InspectionConfig {
        InspectionConfig {
            presence: PresenceSettings {
                difference_threshold: 30,
                minimum_foreground_area: 50,
                morphological_kernel_size: 3,
            },
            accepted_area_range: AcceptanceRange::new(100.0, 600.0),
            accepted_angle_range: AcceptanceRange::new(0.0, 180.0),
            ..InspectionConfig::default()
        }
    }

    fn pipeline(config: &InspectionConfig) -> InspectionPipeline {
        let reference = ReferenceFrame::new(Frame::from_pixel(40, 40, BACKGROUND));
        InspectionPipeline::new(config, Arc::new(reference)).unwrap()
    }

    /// A `w` x `h` block of `color` at (10, 10) on the background.
    fn item(w: u32, h: u32, color: [u8; 3]) -> Frame {
        Frame::from_fn(40, 40, |x, y| {
            if (10..10 + w).contains(&x) && (10..10 + h).contains(&y) { Rgb(color) } else { BACKGROUND }
        })
    }

    #[test]
    fn empty_stage_passes_without_later_stages() {
        let p = pipeline(&config());
        let report = p.run_cycle(&Frame::from_pixel(40, 40, BACKGROUND)).unwrap();
        assert_eq!(report.verdict, Verdict::Pass(PassReason::NoObject));
        assert_eq!(report.stages.len(), 1);
        assert!(!report.bad_found());
    }

    #[test]
    fn good_item_passes() {
        let p = pipeline(&config());
        let report = p.run_cycle(&item(20, 15, [255, 136, 48])).unwrap();
        assert_eq!(report.verdict, Verdict::Pass(PassReason::GoodBurnState));
        assert_eq!(report.classification().unwrap().state, BurnState::Good);
        assert_eq!(report.stages.len(), 3);
    }

    #[test]
    fn dark_item_is_rejected_as_over_burned() {
        let p = pipeline(&config());
        let report = p.run_cycle(&item(20, 15, [26, 27, 26])).unwrap();
        assert_eq!(report.verdict, Verdict::Reject(RejectReason::BurnState(BurnState::OverBurned)));
        assert!(report.bad_found());
    }

    #[test]
    fn oversized_item_is_rejected_before_colour_check() {
        let p = pipeline(&config());
        let report = p.run_cycle(&item(28, 28, [255, 136, 48])).unwrap();
        assert_eq!(report.verdict, Verdict::Reject(RejectReason::GeometryOutOfRange));
        assert!(report.classification().is_none());
    }

    #[test]
    fn wrongly_oriented_item_is_rejected() {
        let mut cfg = config();
        cfg.accepted_angle_range = AcceptanceRange::new(80.0, 100.0);
        let p = pipeline(&cfg);
        // Wide, short block lies at 0 degrees.
        let report = p.run_cycle(&item(25, 8, [255, 136, 48])).unwrap();
        assert_eq!(report.verdict, Verdict::Reject(RejectReason::GeometryOutOfRange));
        // Tall, narrow block lies at 90 degrees.
        let report = p.run_cycle(&item(8, 25, [255, 136, 48])).unwrap();
        assert_eq!(report.verdict, Verdict::Pass(PassReason::GoodBurnState));
    }

    #[test]
    fn mismatched_frame_is_an_error() {
        let p = pipeline(&config());
        let err = p.run_cycle(&Frame::new(20, 20)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn present_without_region_is_a_reject() {
        let p = pipeline(&config());
        let presence = PresenceResult {
            is_present: true,
            foreground_pixels: 0,
            difference_mask: image::GrayImage::new(40, 40),
            cleaned_mask: image::GrayImage::new(40, 40),
        };
        let mut stages = Vec::new();
        let live = Frame::from_pixel(40, 40, BACKGROUND);
        let next = p.step(CycleState::PresenceChecked(presence), &live, &mut stages).unwrap();
        assert!(matches!(next, CycleState::Rejected(RejectReason::NoRegionFound)));
        let done = p.step(next, &live, &mut stages).unwrap();
        assert!(matches!(done, CycleState::VerdictReady(Verdict::Reject(RejectReason::NoRegionFound))));
        assert_eq!(stages, vec![StageOutcome::RegionMissing]);
    }

    #[test]
    fn verdict_ready_is_terminal() {
        let p = pipeline(&config());
        let live = Frame::from_pixel(40, 40, BACKGROUND);
        let mut stages = Vec::new();
        let state = CycleState::VerdictReady(Verdict::Pass(PassReason::NoObject));
        let next = p.step(state, &live, &mut stages).unwrap();
        assert_eq!(next.name(), "VerdictReady");
        assert!(stages.is_empty());
    }

    #[test]
    fn unreadable_path_is_a_reject() {
        let p = pipeline(&config());
        let report = p.inspect_path("no/such/frame.png").unwrap();
        assert_eq!(report, CycleReport::unreadable());
        assert!(report.bad_found());
    }

    #[test]
    fn cycles_are_independent() {
        let p = pipeline(&config());
        let frame = item(20, 15, [26, 27, 26]);
        let first = p.run_cycle(&frame).unwrap();
        let _ = p.run_cycle(&item(20, 15, [255, 136, 48])).unwrap();
        assert_eq!(p.run_cycle(&frame).unwrap(), first);
    }

    #[test]
    fn missing_reference_frame_is_fatal() {
        let config = InspectionConfig {
            reference_frame_path: "no/such/no_object.png".into(),
            ..config()
        };
        let err = InspectionPipeline::from_config(&config).unwrap_err();
        assert!(matches!(err, InspectionError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn verdict_display_names_the_reason() {
        let v = Verdict::Reject(RejectReason::BurnState(BurnState::UnderBurned));
        assert_eq!(v.to_string(), "reject (underBurned)");
    }
}
