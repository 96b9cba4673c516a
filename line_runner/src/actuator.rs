// THEORY:
// Actuator drivers: turn a reject decision into a pick-and-place move.
//
// The serial protocol is line based. One command line goes out per rejected item
// (and optionally per passed item); when an acknowledgement line is configured the
// driver waits for it before reporting the move as done.

use crate::settings::ActuatorSettings;
use burn_inspector::{ActuatorDriver, CollaboratorError};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Per-read timeout on the serial port; the overall deadline is `ActuatorSettings::timeout`.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Drives the pick-and-place controller over any byte stream, normally a serial port.
pub struct SerialActuator<P: Read + Write + Send> {
    port: P,
    settings: ActuatorSettings,
    name: String,
}

impl SerialActuator<Box<dyn serialport::SerialPort>> {
    /// Opens the configured serial device.
    pub fn open(settings: &ActuatorSettings) -> Result<Self, CollaboratorError> {
        let path = settings
            .port
            .clone()
            .ok_or_else(|| CollaboratorError::Serial("no serial port configured".to_string()))?;
        let port = serialport::new(&path, settings.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| CollaboratorError::Serial(format!("opening {}: {}", path, e)))?;
        tracing::info!(port = %path, baud = settings.baud_rate, "serial connection opened");
        Ok(Self::with_port(port, settings.clone(), path))
    }
}

impl<P: Read + Write + Send> SerialActuator<P> {
    pub fn with_port(port: P, settings: ActuatorSettings, name: String) -> Self {
        Self { port, settings, name }
    }

    fn send_line(&mut self, line: &str) -> Result<(), CollaboratorError> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Reads lines until `ack` arrives or the deadline passes. Other lines are logged
    /// and skipped.
    fn wait_for_ack(&mut self, ack: &str) -> Result<(), CollaboratorError> {
        let deadline = Instant::now() + self.settings.timeout();
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while Instant::now() < deadline {
            match self.port.read(&mut byte) {
                Ok(0) => {
                    return Err(CollaboratorError::Serial("connection closed while waiting for ack".to_string()));
                }
                Ok(_) if byte[0] == b'\n' => {
                    let received = String::from_utf8_lossy(&line).trim().to_string();
                    if received == ack {
                        return Ok(());
                    }
                    if !received.is_empty() {
                        tracing::debug!(line = %received, "ignoring controller output");
                    }
                    line.clear();
                }
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CollaboratorError::Timeout {
            operation: "actuator acknowledgement",
            seconds: self.settings.timeout_seconds,
        })
    }
}

impl<P: Read + Write + Send> ActuatorDriver for SerialActuator<P> {
    fn actuate(&mut self, reject: bool) -> Result<bool, CollaboratorError> {
        let command = if reject {
            self.settings.reject_command.clone()
        } else {
            self.settings.pass_command.clone()
        };
        if command.is_empty() {
            return Ok(reject);
        }

        self.send_line(&command)?;
        if let Some(ack) = self.settings.ack_line.clone() {
            self.wait_for_ack(&ack)?;
        }
        tracing::debug!(%command, reject, "actuator move completed");
        Ok(reject)
    }
}

impl<P: Read + Write + Send> Drop for SerialActuator<P> {
    fn drop(&mut self) {
        tracing::info!(port = %self.name, "serial connection closed");
    }
}

/// Logs decisions without moving anything; for bench runs without the controller.
#[derive(Debug, Default)]
pub struct DryRunActuator {
    pub rejected: u32,
    pub passed: u32,
}

impl ActuatorDriver for DryRunActuator {
    fn actuate(&mut self, reject: bool) -> Result<bool, CollaboratorError> {
        if reject {
            self.rejected += 1;
        } else {
            self.passed += 1;
        }
        tracing::info!(reject, "dry run: actuator not driven");
        Ok(reject)
    }
}

impl Drop for DryRunActuator {
    fn drop(&mut self) {
        tracing::info!(rejected = self.rejected, passed = self.passed, "dry run finished");
    }
}
