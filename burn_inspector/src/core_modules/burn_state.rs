// THEORY:
// The burn-state classifier maps the mean colour of the inspected surface onto one of
// four quality labels. It is two mechanisms kept deliberately apart:
//
// 1.  **Ordered rules**: a list of colour bands, each a predicate over the
//     `ColorDescriptor` paired with a label. Rules are evaluated in order and the
//     first match wins, so a descriptor that sits in two bands gets the earlier one.
//     The default bands, in priority order:
//     - near-neutral bright grey/white  -> unBurned
//     - yellow (r, g high and close, b low) -> underBurned
//     - orange/brown (r > g > b, red well above blue) -> good
//     - uniformly dark                  -> overBurned
// 2.  **Nearest reference**: when no band fires, the descriptor is compared against a
//     table of representative colours per label and the closest entry by Euclidean
//     distance decides. Equidistant entries resolve by label name, so the answer does
//     not depend on how the table happens to be ordered.
//
// Together they make classification total: a non-empty reference table always
// produces a label. Both the rules and the table are plain data, built once from
// configuration and never mutated.

use crate::core_modules::color::ColorDescriptor;
use crate::core_modules::frame::{Frame, load_frame};
use crate::core_modules::region::DetectedRegion;
use crate::error::{InspectionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Quality classification of the inspected surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BurnState {
    #[serde(rename = "unBurned")]
    UnBurned,
    #[serde(rename = "underBurned")]
    UnderBurned,
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "overBurned")]
    OverBurned,
}

impl BurnState {
    pub const ALL: [BurnState; 4] = [
        BurnState::UnBurned,
        BurnState::UnderBurned,
        BurnState::Good,
        BurnState::OverBurned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BurnState::UnBurned => "unBurned",
            BurnState::UnderBurned => "underBurned",
            BurnState::Good => "good",
            BurnState::OverBurned => "overBurned",
        }
    }

    pub fn is_good(&self) -> bool {
        *self == BurnState::Good
    }
}

impl fmt::Display for BurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BurnState {
    type Err = InspectionError;

    fn from_str(s: &str) -> Result<Self> {
        BurnState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| InspectionError::Config(format!("unknown burn state '{}'", s)))
    }
}

/// A colour band. Each variant carries its own thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RuleCondition {
    /// Bright and nearly grey: every channel above its floor, channels close together.
    #[serde(rename_all = "camelCase")]
    NearNeutral {
        min_red: f64,
        min_green: f64,
        min_blue: f64,
        max_red_green_gap: f64,
        max_red_blue_gap: f64,
    },
    /// Yellow: red and green high and close, blue low, strong `r + g - 2b`.
    #[serde(rename_all = "camelCase")]
    Yellow {
        min_red: f64,
        min_green: f64,
        max_blue: f64,
        min_yellow_signal: f64,
        min_green_to_red_ratio: f64,
    },
    /// Orange/brown: strictly r > g > b with blue low and red well above blue.
    #[serde(rename_all = "camelCase")]
    DescendingWarm {
        min_red: f64,
        min_green: f64,
        max_blue: f64,
        min_red_blue_gap: f64,
    },
    /// Every channel below `max_channel`.
    #[serde(rename_all = "camelCase")]
    Dark { max_channel: f64 },
}

impl RuleCondition {
    pub fn matches(&self, c: &ColorDescriptor) -> bool {
        let (r, g, b) = (c.red, c.green, c.blue);
        match *self {
            RuleCondition::NearNeutral {
                min_red,
                min_green,
                min_blue,
                max_red_green_gap,
                max_red_blue_gap,
            } => {
                r > min_red
                    && g > min_green
                    && b > min_blue
                    && (r - g).abs() < max_red_green_gap
                    && (r - b).abs() < max_red_blue_gap
            }
            RuleCondition::Yellow {
                min_red,
                min_green,
                max_blue,
                min_yellow_signal,
                min_green_to_red_ratio,
            } => {
                r > min_red
                    && g > min_green
                    && b < max_blue
                    && c.yellow_signal() > min_yellow_signal
                    && g >= r * min_green_to_red_ratio
            }
            RuleCondition::DescendingWarm {
                min_red,
                min_green,
                max_blue,
                min_red_blue_gap,
            } => r > min_red && g > min_green && b < max_blue && r > g && g > b && (r - b) > min_red_blue_gap,
            RuleCondition::Dark { max_channel } => r < max_channel && g < max_channel && b < max_channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRule {
    pub label: BurnState,
    pub condition: RuleCondition,
}

/// Ordered rule list; the first matching rule decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BurnRules(pub Vec<BurnRule>);

impl BurnRules {
    pub fn first_match(&self, descriptor: &ColorDescriptor) -> Option<BurnState> {
        self.0
            .iter()
            .find(|rule| rule.condition.matches(descriptor))
            .map(|rule| rule.label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for BurnRules {
    fn default() -> Self {
        BurnRules(vec![
            BurnRule {
                label: BurnState::UnBurned,
                condition: RuleCondition::NearNeutral {
                    min_red: 125.0,
                    min_green: 125.0,
                    min_blue: 120.0,
                    max_red_green_gap: 10.0,
                    max_red_blue_gap: 15.0,
                },
            },
            BurnRule {
                label: BurnState::UnderBurned,
                condition: RuleCondition::Yellow {
                    min_red: 120.0,
                    min_green: 110.0,
                    max_blue: 100.0,
                    min_yellow_signal: 60.0,
                    min_green_to_red_ratio: 0.8,
                },
            },
            BurnRule {
                label: BurnState::Good,
                condition: RuleCondition::DescendingWarm {
                    min_red: 90.0,
                    min_green: 70.0,
                    max_blue: 80.0,
                    min_red_blue_gap: 30.0,
                },
            },
            BurnRule {
                label: BurnState::OverBurned,
                condition: RuleCondition::Dark { max_channel: 90.0 },
            },
        ])
    }
}

/// Representative colours per label, used when no rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceColorTable(pub BTreeMap<BurnState, Vec<[u8; 3]>>);

impl ReferenceColorTable {
    /// Closest entry by Euclidean distance. Ties go to the lexicographically smallest
    /// label name. `None` only for a table without entries.
    pub fn nearest(&self, descriptor: &ColorDescriptor) -> Option<(BurnState, f64)> {
        self.0
            .iter()
            .flat_map(|(state, colors)| {
                colors
                    .iter()
                    .map(move |rgb| (*state, descriptor.distance(&ColorDescriptor::from(*rgb))))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())))
    }

    pub fn entry_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

impl Default for ReferenceColorTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(BurnState::UnBurned, vec![[254, 255, 254], [253, 255, 252], [254, 255, 254]]);
        table.insert(BurnState::UnderBurned, vec![[254, 238, 86], [254, 236, 92], [255, 255, 97]]);
        table.insert(BurnState::OverBurned, vec![[26, 27, 26], [107, 103, 98], [60, 60, 59]]);
        table.insert(BurnState::Good, vec![[254, 148, 61], [255, 181, 80], [255, 136, 48]]);
        ReferenceColorTable(table)
    }
}

/// How a label was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationMethod {
    RuleMatch,
    NearestReference { distance: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub state: BurnState,
    pub descriptor: ColorDescriptor,
    pub method: ClassificationMethod,
}

#[derive(Debug, Clone, Default)]
pub struct BurnStateClassifier {
    rules: BurnRules,
    table: ReferenceColorTable,
}

impl BurnStateClassifier {
    /// Fails if the reference table has no entries, since the fallback could then
    /// leave a descriptor unlabelled.
    pub fn new(rules: BurnRules, table: ReferenceColorTable) -> Result<Self> {
        if table.entry_count() == 0 {
            return Err(InspectionError::Config(
                "reference colour table must contain at least one colour".to_string(),
            ));
        }
        Ok(Self { rules, table })
    }

    pub fn rules(&self) -> &BurnRules {
        &self.rules
    }

    pub fn table(&self) -> &ReferenceColorTable {
        &self.table
    }

    pub fn classify_descriptor(&self, descriptor: ColorDescriptor) -> Classification {
        if let Some(state) = self.rules.first_match(&descriptor) {
            tracing::debug!(%descriptor, %state, "burn state from rule");
            return Classification {
                state,
                descriptor,
                method: ClassificationMethod::RuleMatch,
            };
        }

        // `new` guarantees a non-empty table; the fallback label only covers a
        // classifier assembled by hand around an empty table.
        let (state, distance) = self
            .table
            .nearest(&descriptor)
            .unwrap_or((BurnState::OverBurned, f64::INFINITY));
        tracing::debug!(%descriptor, %state, distance, "burn state from nearest reference");
        Classification {
            state,
            descriptor,
            method: ClassificationMethod::NearestReference { distance },
        }
    }

    /// Classifies the mean colour of the whole image, e.g. an already-cropped region.
    pub fn classify(&self, image: &Frame) -> Classification {
        self.classify_descriptor(ColorDescriptor::mean_of(image))
    }

    /// Classifies the mean colour over the pixels of a detected region.
    pub fn classify_region(&self, frame: &Frame, region: &DetectedRegion) -> Classification {
        self.classify_descriptor(ColorDescriptor::mean_over(frame, &region.pixels))
    }

    pub fn classify_path(&self, path: impl AsRef<Path>) -> Result<Classification> {
        let image = load_frame(path)?;
        Ok(self.classify(&image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn classify(r: f64, g: f64, b: f64) -> Classification {
        BurnStateClassifier::default().classify_descriptor(ColorDescriptor::new(r, g, b))
    }

    #[test]
    fn orange_is_good() {
        let c = classify(255.0, 136.0, 48.0);
        assert_eq!(c.state, BurnState::Good);
        assert_eq!(c.method, ClassificationMethod::RuleMatch);
    }

    #[test]
    fn near_black_is_over_burned() {
        assert_eq!(classify(26.0, 27.0, 26.0).state, BurnState::OverBurned);
    }

    #[test]
    fn near_white_is_un_burned() {
        assert_eq!(classify(254.0, 255.0, 254.0).state, BurnState::UnBurned);
    }

    #[test]
    fn mid_grey_is_un_burned() {
        assert_eq!(classify(130.0, 133.0, 128.0).state, BurnState::UnBurned);
    }

    #[test]
    fn yellow_is_under_burned() {
        assert_eq!(classify(254.0, 238.0, 86.0).state, BurnState::UnderBurned);
        assert_eq!(classify(255.0, 255.0, 97.0).state, BurnState::UnderBurned);
    }

    #[test]
    fn light_orange_references_stay_good() {
        assert_eq!(classify(254.0, 148.0, 61.0).state, BurnState::Good);
        assert_eq!(classify(255.0, 181.0, 80.0).state, BurnState::Good);
    }

    #[test]
    fn blue_falls_back_to_nearest_reference() {
        let c = classify(40.0, 60.0, 200.0);
        assert_eq!(c.state, BurnState::OverBurned);
        match c.method {
            ClassificationMethod::NearestReference { distance } => {
                // Closest entry is [107, 103, 98].
                let expected = (67.0f64.powi(2) + 43.0f64.powi(2) + 102.0f64.powi(2)).sqrt();
                assert!((distance - expected).abs() < 1e-9);
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = BurnRules(vec![
            BurnRule {
                label: BurnState::OverBurned,
                condition: RuleCondition::Dark { max_channel: 256.0 },
            },
            BurnRule {
                label: BurnState::UnBurned,
                condition: RuleCondition::Dark { max_channel: 256.0 },
            },
        ]);
        assert_eq!(
            rules.first_match(&ColorDescriptor::new(10.0, 10.0, 10.0)),
            Some(BurnState::OverBurned)
        );
        assert_eq!(BurnRules(Vec::new()).first_match(&ColorDescriptor::default()), None);
    }

    #[test]
    fn nearest_ties_break_by_label_name() {
        let mut map = BTreeMap::new();
        map.insert(BurnState::UnBurned, vec![[10, 0, 0]]);
        map.insert(BurnState::OverBurned, vec![[0, 10, 0]]);
        map.insert(BurnState::UnderBurned, vec![[0, 0, 10]]);
        let table = ReferenceColorTable(map);
        let (state, distance) = table.nearest(&ColorDescriptor::default()).unwrap();
        assert_eq!(state, BurnState::OverBurned);
        assert_eq!(distance, 10.0);
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = BurnStateClassifier::new(BurnRules::default(), ReferenceColorTable(BTreeMap::new()))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(ReferenceColorTable(BTreeMap::new()).nearest(&ColorDescriptor::default()).is_none());
    }

    #[test]
    fn every_descriptor_gets_a_label() {
        let classifier = BurnStateClassifier::default();
        for r in (0..=255).step_by(51) {
            for g in (0..=255).step_by(51) {
                for b in (0..=255).step_by(51) {
                    let c = classifier.classify_descriptor(ColorDescriptor::new(r as f64, g as f64, b as f64));
                    assert!(BurnState::ALL.contains(&c.state));
                }
            }
        }
    }

    #[test]
    fn classification_is_repeatable() {
        let frame = Frame::from_pixel(6, 6, Rgb([180, 120, 60]));
        let classifier = BurnStateClassifier::default();
        assert_eq!(classifier.classify(&frame), classifier.classify(&frame));
    }

    #[test]
    fn classify_path_reports_unreadable_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = BurnStateClassifier::default().classify_path(&path).unwrap_err();
        assert!(matches!(err, InspectionError::ImageLoad { .. }));
    }

    #[test]
    fn classify_path_reads_cropped_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cropped.png");
        Frame::from_pixel(8, 8, Rgb([255, 136, 48])).save(&path).unwrap();
        let c = BurnStateClassifier::default().classify_path(&path).unwrap();
        assert_eq!(c.state, BurnState::Good);
    }

    #[test]
    fn labels_round_trip_through_names() {
        for state in BurnState::ALL {
            assert_eq!(state.as_str().parse::<BurnState>().unwrap(), state);
        }
        assert!("charred".parse::<BurnState>().is_err());
        assert_eq!(serde_json::to_string(&BurnState::UnderBurned).unwrap(), "\"underBurned\"");
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let json = r#"[{"label":"overBurned","condition":{"kind":"dark","maxChannel":50.0}}]"#;
        let rules: BurnRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.first_match(&ColorDescriptor::new(49.0, 49.0, 49.0)), Some(BurnState::OverBurned));
        assert_eq!(rules.first_match(&ColorDescriptor::new(60.0, 49.0, 49.0)), None);
    }
}
