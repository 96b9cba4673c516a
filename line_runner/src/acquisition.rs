// THEORY:
// Frame acquisition collaborators.
//
// The inspection core only needs "a fresh frame on disk". These sources either
// trust an external capture process to keep the file fresh, or run a capture
// program themselves and wait for it with a hard deadline.

use burn_inspector::{CollaboratorError, FrameSource};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reads whatever an external process last wrote to `frame_path`.
pub struct FileFrameSource {
    frame_path: PathBuf,
}

impl FileFrameSource {
    pub fn new(frame_path: PathBuf) -> Self {
        Self { frame_path }
    }
}

impl FrameSource for FileFrameSource {
    fn acquire(&mut self) -> Result<PathBuf, CollaboratorError> {
        if !self.frame_path.is_file() {
            return Err(CollaboratorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no frame at {}", self.frame_path.display()),
            )));
        }
        Ok(self.frame_path.clone())
    }
}

/// Runs a capture program that writes `frame_path`, killing it past `timeout`.
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
    frame_path: PathBuf,
    timeout: Duration,
}

impl CommandFrameSource {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], frame_path: PathBuf, timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            frame_path,
            timeout,
        })
    }
}

impl FrameSource for CommandFrameSource {
    fn acquire(&mut self) -> Result<PathBuf, CollaboratorError> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()?;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CollaboratorError::Timeout {
                    operation: "frame capture",
                    seconds: self.timeout.as_secs_f64(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(CollaboratorError::Command(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        tracing::debug!(
            program = %self.program,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frame captured"
        );
        FileFrameSource::new(self.frame_path.clone()).acquire()
    }
}
