// THEORY:
// Configuration for the inspection pipeline. One immutable object, loaded from JSON
// at startup and handed to each component when it is constructed. Field names follow
// the camelCase keys of the config file.
//
// Anything wrong here is a startup failure: an unreadable file, bad JSON or an
// out-of-range value all surface as `InspectionError::Config`, which aborts the run.

use crate::core_modules::burn_state::{BurnRules, ReferenceColorTable};
use crate::core_modules::geometry::AcceptanceRange;
use crate::core_modules::presence::PresenceSettings;
use crate::error::{InspectionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InspectionConfig {
    /// The empty-scene frame live frames are compared against.
    pub reference_frame_path: PathBuf,
    #[serde(flatten)]
    pub presence: PresenceSettings,
    /// Physical area units per pixel. 1.0 keeps `acceptedAreaRange` in pixels.
    pub area_scale: f64,
    pub accepted_area_range: AcceptanceRange,
    /// Degrees; orientation is undirected so the range is read modulo 180.
    pub accepted_angle_range: AcceptanceRange,
    pub burn_state_rules: BurnRules,
    pub reference_color_table: ReferenceColorTable,
    pub max_cycles: u32,
    pub cycle_delay_seconds: f64,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            reference_frame_path: PathBuf::from("images/no_object.png"),
            presence: PresenceSettings::default(),
            area_scale: 1.0,
            accepted_area_range: AcceptanceRange::new(1_000.0, 1_000_000.0),
            accepted_angle_range: AcceptanceRange::new(0.0, 180.0),
            burn_state_rules: BurnRules::default(),
            reference_color_table: ReferenceColorTable::default(),
            max_cycles: 20,
            cycle_delay_seconds: 1.0,
        }
    }
}

impl InspectionConfig {
    /// Reads and validates a JSON config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| InspectionError::Config(format!("reading {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&text)
            .map_err(|e| InspectionError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded inspection config");
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| InspectionError::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| InspectionError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.accepted_area_range.is_ordered() || self.accepted_area_range.min < 0.0 {
            return Err(InspectionError::Config(format!(
                "acceptedAreaRange must satisfy 0 <= min <= max, got {:?}",
                self.accepted_area_range
            )));
        }
        if !self.accepted_angle_range.is_ordered() {
            return Err(InspectionError::Config(format!(
                "acceptedAngleRange must satisfy min <= max, got {:?}",
                self.accepted_angle_range
            )));
        }
        if !(self.area_scale.is_finite() && self.area_scale > 0.0) {
            return Err(InspectionError::Config(format!(
                "areaScale must be positive, got {}",
                self.area_scale
            )));
        }
        let kernel = self.presence.morphological_kernel_size;
        if kernel > 1 && kernel % 2 == 0 {
            return Err(InspectionError::Config(format!(
                "morphologicalKernelSize must be odd (or 0/1 to disable cleaning), got {}",
                kernel
            )));
        }
        if self.presence.minimum_foreground_area == 0 {
            return Err(InspectionError::Config(
                "minimumForegroundArea must be at least 1".to_string(),
            ));
        }
        if self.reference_color_table.entry_count() == 0 {
            return Err(InspectionError::Config(
                "referenceColorTable must contain at least one colour".to_string(),
            ));
        }
        if self.max_cycles == 0 {
            return Err(InspectionError::Config("maxCycles must be at least 1".to_string()));
        }
        if !(self.cycle_delay_seconds.is_finite() && self.cycle_delay_seconds >= 0.0) {
            return Err(InspectionError::Config(format!(
                "cycleDelaySeconds must be non-negative, got {}",
                self.cycle_delay_seconds
            )));
        }
        Ok(())
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs_f64(self.cycle_delay_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::burn_state::BurnState;

    #[test]
    fn default_config_is_valid() {
        assert!(InspectionConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_json_takes_defaults() {
        let config = InspectionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, InspectionConfig::default());
    }

    #[test]
    fn camel_case_keys_are_read() {
        let json = r#"{
            "referenceFramePath": "bg.png",
            "differenceThreshold": 45,
            "minimumForegroundArea": 1200,
            "morphologicalKernelSize": 7,
            "acceptedAreaRange": {"min": 10.0, "max": 20.0},
            "acceptedAngleRange": {"min": 80.0, "max": 100.0},
            "referenceColorTable": {"good": [[255, 136, 48]]},
            "maxCycles": 3,
            "cycleDelaySeconds": 0.5
        }"#;
        let config = InspectionConfig::from_json_str(json).unwrap();
        assert_eq!(config.reference_frame_path, PathBuf::from("bg.png"));
        assert_eq!(config.presence.difference_threshold, 45);
        assert_eq!(config.presence.minimum_foreground_area, 1200);
        assert_eq!(config.presence.morphological_kernel_size, 7);
        assert_eq!(config.accepted_area_range, AcceptanceRange::new(10.0, 20.0));
        assert_eq!(config.reference_color_table.entry_count(), 1);
        assert!(config.reference_color_table.0.contains_key(&BurnState::Good));
        assert_eq!(config.max_cycles, 3);
        assert_eq!(config.cycle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn round_trips_through_json() {
        let config = InspectionConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"differenceThreshold\""));
        assert!(json.contains("\"underBurned\""));
        assert_eq!(InspectionConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn inverted_area_range_is_rejected() {
        let mut config = InspectionConfig::default();
        config.accepted_area_range = AcceptanceRange::new(50.0, 10.0);
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn zero_cycles_and_empty_table_are_rejected() {
        let mut config = InspectionConfig::default();
        config.max_cycles = 0;
        assert!(config.validate().is_err());

        let json = r#"{"referenceColorTable": {}}"#;
        assert!(InspectionConfig::from_json_str(json).is_err());
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = InspectionConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, InspectionError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inspection.json");
        std::fs::write(&path, r#"{"maxCycles": 7}"#).unwrap();
        assert_eq!(InspectionConfig::load(&path).unwrap().max_cycles, 7);
    }

    #[test]
    fn missing_file_is_fatal_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InspectionConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, InspectionError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn even_kernel_size_is_rejected() {
        let mut config = InspectionConfig::default();
        config.presence.morphological_kernel_size = 4;
        assert!(matches!(config.validate(), Err(InspectionError::Config(_))));

        for size in [0, 1, 3, 7] {
            config.presence.morphological_kernel_size = size;
            assert!(config.validate().is_ok());
        }
    }
}
