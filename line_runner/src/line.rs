// THEORY:
// The `line` module is the outer loop of the inspection station. One cycle is:
// acquire a frame, inspect it, drive the actuator with the verdict. The inspection
// engine itself is synchronous; this loop owns every source of waiting.
//
// Both collaborators are blocking (a capture program, a serial port), so each call
// runs on the blocking pool under a hard deadline. A cycle therefore always ends:
// a capture that fails or overruns becomes an unreadable frame (reject), and an
// actuator that fails or overruns is logged and counted while the line moves on.
// Only configuration-class inspection errors stop the run.
//
// Cancellation is cooperative. A stop request is honoured between cycles, never
// in the middle of one, so an item is never left half-handled.

use burn_inspector::{
    ActuatorDriver, CollaboratorError, CycleReport, FrameSource, InspectionError, InspectionPipeline,
    RejectReason, Verdict,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSettings {
    pub max_cycles: u32,
    pub cycle_delay: Duration,
    pub capture_timeout: Duration,
    pub actuation_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles_completed: u32,
    pub rejected: u32,
    /// Items the actuator reports as actually removed.
    pub removed: u32,
    pub unreadable_frames: u32,
    pub actuation_failures: u32,
    pub interrupted: bool,
}

pub struct InspectionLine<S, A> {
    pipeline: Arc<InspectionPipeline>,
    source: Arc<Mutex<S>>,
    actuator: Arc<Mutex<A>>,
    settings: LineSettings,
}

impl<S, A> InspectionLine<S, A>
where
    S: FrameSource + Send + 'static,
    A: ActuatorDriver + Send + 'static,
{
    pub fn new(pipeline: InspectionPipeline, source: S, actuator: A, settings: LineSettings) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            source: Arc::new(Mutex::new(source)),
            actuator: Arc::new(Mutex::new(actuator)),
            settings,
        }
    }

    /// Runs up to `max_cycles` cycles, stopping early when `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary, InspectionError> {
        let max = self.settings.max_cycles;
        let mut summary = RunSummary::default();
        tracing::info!(max_cycles = max, "inspection line started");

        for cycle in 1..=max {
            if *shutdown.borrow() {
                summary.interrupted = true;
                break;
            }

            let report = self.inspect_next_frame().await?;
            if report.verdict == Verdict::Reject(RejectReason::FrameUnreadable) {
                summary.unreadable_frames += 1;
            }
            let bad_found = report.bad_found();
            if bad_found {
                summary.rejected += 1;
            }

            // The cycle reports what the actuator says it did, not only the verdict.
            let carried_out = match self.actuate(bad_found).await {
                Ok(carried_out) => {
                    if carried_out != bad_found {
                        tracing::warn!(cycle, bad_found, carried_out, "actuator acted against the verdict");
                    }
                    carried_out
                }
                Err(err) => {
                    tracing::error!(error = %err, cycle, "actuator failed");
                    summary.actuation_failures += 1;
                    bad_found
                }
            };
            if carried_out {
                summary.removed += 1;
            }

            summary.cycles_completed = cycle;
            tracing::info!("cycle {}/{} completed, bad found: {}", cycle, max, carried_out);

            if cycle < max && wait_or_stop(self.settings.cycle_delay, &mut shutdown).await {
                summary.interrupted = true;
                break;
            }
        }

        if summary.interrupted {
            tracing::warn!(cycles = summary.cycles_completed, "stop requested, line halted between cycles");
        }
        tracing::info!(
            cycles = summary.cycles_completed,
            rejected = summary.rejected,
            removed = summary.removed,
            actuation_failures = summary.actuation_failures,
            "inspection line finished"
        );
        Ok(summary)
    }

    async fn inspect_next_frame(&self) -> Result<CycleReport, InspectionError> {
        let source = Arc::clone(&self.source);
        let acquired = run_blocking("frame capture", self.settings.capture_timeout, move || {
            lock(&source, "frame source")?.acquire()
        })
        .await;

        let path = match acquired {
            Ok(path) => path,
            Err(err) => {
                tracing::error!(error = %err, "frame acquisition failed, rejecting item");
                return Ok(CycleReport::unreadable());
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.inspect_path(&path))
            .await
            .map_err(|join| InspectionError::Io(std::io::Error::other(join.to_string())))?
    }

    async fn actuate(&self, reject: bool) -> Result<bool, CollaboratorError> {
        let actuator = Arc::clone(&self.actuator);
        run_blocking("actuation", self.settings.actuation_timeout, move || {
            lock(&actuator, "actuator")?.actuate(reject)
        })
        .await
    }
}

fn lock<'a, T>(
    shared: &'a Mutex<T>,
    what: &str,
) -> Result<std::sync::MutexGuard<'a, T>, CollaboratorError> {
    shared
        .lock()
        .map_err(|_| CollaboratorError::Io(std::io::Error::other(format!("{} poisoned by an earlier panic", what))))
}

/// Runs blocking collaborator work on the blocking pool with a deadline. An overrun
/// leaves the work running in the background; the shared lock keeps the next call
/// from overlapping it.
async fn run_blocking<T, F>(operation: &'static str, limit: Duration, work: F) -> Result<T, CollaboratorError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(CollaboratorError::Io(std::io::Error::other(format!(
            "{} task failed: {}",
            operation, join
        )))),
        Err(_) => Err(CollaboratorError::Timeout {
            operation,
            seconds: limit.as_secs_f64(),
        }),
    }
}

/// Sleeps for `delay`; returns true if a stop was requested meanwhile.
async fn wait_or_stop(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *shutdown.borrow(),
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            Err(_) => {
                // Nobody can request a stop any more.
                tokio::time::sleep(delay).await;
                false
            }
        },
    }
}
