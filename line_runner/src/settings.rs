// THEORY:
// Runner configuration: the inspection config plus the capture and actuator
// sections that only the line driver cares about. All in one JSON file.

use anyhow::{Context, Result, bail};
use burn_inspector::InspectionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    #[serde(flatten)]
    pub inspection: InspectionConfig,
    pub capture: CaptureSettings,
    pub actuator: ActuatorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    /// Where the freshly captured frame lands.
    pub frame_path: PathBuf,
    /// Program and arguments that capture a frame into `frame_path`. When absent,
    /// an external process is expected to keep `frame_path` fresh.
    pub command: Option<Vec<String>>,
    pub timeout_seconds: f64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_path: PathBuf::from("images/pra.png"),
            command: None,
            timeout_seconds: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActuatorSettings {
    /// Serial device, e.g. `/dev/ttyUSB0`. `None` runs without hardware.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Line sent when the item must be removed.
    pub reject_command: String,
    /// Line sent when the item may stay. Empty sends nothing.
    pub pass_command: String,
    /// Line the controller answers with once the move has finished. `None` skips waiting.
    pub ack_line: Option<String>,
    pub timeout_seconds: f64,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            port: Some("/dev/ttyUSB0".to_string()),
            baud_rate: 115_200,
            reject_command: "PICK".to_string(),
            pass_command: String::new(),
            ack_line: Some("DONE".to_string()),
            timeout_seconds: 30.0,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.inspection.validate()?;
        for (name, seconds) in [
            ("capture.timeoutSeconds", self.capture.timeout_seconds),
            ("actuator.timeoutSeconds", self.actuator.timeout_seconds),
        ] {
            if !(seconds.is_finite() && seconds > 0.0) {
                bail!("{} must be positive, got {}", name, seconds);
            }
        }
        if let Some(command) = &self.capture.command {
            if command.is_empty() {
                bail!("capture.command must name a program");
            }
        }
        if self.actuator.reject_command.is_empty() {
            bail!("actuator.rejectCommand must not be empty");
        }
        Ok(())
    }
}

impl CaptureSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

impl ActuatorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RunnerConfig::default().validate().is_ok());
    }

    #[test]
    fn sections_sit_beside_inspection_keys() {
        let json = r#"{
            "maxCycles": 4,
            "differenceThreshold": 40,
            "capture": {"framePath": "live.png", "command": ["fswebcam", "live.png"]},
            "actuator": {"port": null, "rejectCommand": "REJECT"}
        }"#;
        let config: RunnerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.inspection.max_cycles, 4);
        assert_eq!(config.inspection.presence.difference_threshold, 40);
        assert_eq!(config.capture.frame_path, PathBuf::from("live.png"));
        assert_eq!(config.capture.command.as_ref().unwrap()[0], "fswebcam");
        assert_eq!(config.capture.timeout(), Duration::from_secs(10));
        assert_eq!(config.actuator.port, None);
        assert_eq!(config.actuator.baud_rate, 115_200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_capture_command_is_rejected() {
        let mut config = RunnerConfig::default();
        config.capture.command = Some(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_timeout_is_rejected() {
        let mut config = RunnerConfig::default();
        config.actuator.timeout_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_round_trips_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.json");
        let config = RunnerConfig::default();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(RunnerConfig::load(&path).unwrap(), config);
    }
}
