//! The control loop.
//!
//! Every tick the loop asks whether the sentry is armed, samples the motion
//! sensor if it is, and offers a positive reading to the [`CooldownWindow`].
//! Admitted events are spawned onto their own task and the loop carries on
//! without waiting for them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cooldown::{Admission, CooldownWindow};
use crate::model::{ArmState, MotionEvent, PipelineOutcome};
use crate::pipeline::EventPipeline;
use crate::probe::StateProbe;
use crate::sensor::MotionSampler;

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not armed (or arm state unknown); the sensor was not read.
    Inactive(ArmState),
    NoMotion,
    /// The sensor could not be read; treated as no motion.
    SensorFault,
    /// A new event was admitted and handed to the pipeline.
    Admitted(MotionEvent),
    /// Motion seen while the cooldown window is still closed.
    Suppressed { remaining: Duration },
}

/// Timing for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub tick_interval: Duration,
    pub cooldown: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idle {
    Inactive(ArmState),
    NoMotion,
}

/// Tracks runs of identical idle ticks so only the first is logged at `info`.
#[derive(Debug, Default)]
struct IdleLog {
    last: Option<Idle>,
}

impl IdleLog {
    /// Record `idle`; true when it starts a new run.
    fn enter(&mut self, idle: Idle) -> bool {
        self.last.replace(idle) != Some(idle)
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// The long-lived control task.
///
/// Owns the sensor, the cooldown window and the set of in-flight pipeline
/// executions. The cooldown is only ever mutated from [`tick_at`].
///
/// [`tick_at`]: SentryLoop::tick_at
pub struct SentryLoop {
    probe: Box<dyn StateProbe>,
    sampler: Box<dyn MotionSampler>,
    pipeline: Arc<EventPipeline>,
    cooldown: CooldownWindow,
    tick_interval: Duration,
    in_flight: JoinSet<PipelineOutcome>,
    idle: IdleLog,
}

impl SentryLoop {
    pub fn new(
        probe: Box<dyn StateProbe>,
        sampler: Box<dyn MotionSampler>,
        pipeline: EventPipeline,
        timing: LoopTiming,
    ) -> Self {
        Self {
            probe,
            sampler,
            pipeline: Arc::new(pipeline),
            cooldown: CooldownWindow::new(timing.cooldown),
            tick_interval: timing.tick_interval,
            in_flight: JoinSet::new(),
            idle: IdleLog::default(),
        }
    }

    pub fn cooldown(&self) -> &CooldownWindow {
        &self.cooldown
    }

    /// Number of pipeline executions spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one tick at the current time.
    pub async fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now(), Local::now()).await
    }

    /// Run one tick as if it were `now`. `wall_clock` names the photo of an
    /// event admitted on this tick.
    pub async fn tick_at(&mut self, now: Instant, wall_clock: DateTime<Local>) -> TickOutcome {
        self.reap();

        let state = self.probe.arm_state().await;
        if !state.is_armed() {
            if self.idle.enter(Idle::Inactive(state)) {
                info!(state = ?state, "Geofence is inactive");
            } else {
                debug!(state = ?state, "Geofence is inactive");
            }
            return TickOutcome::Inactive(state);
        }

        match self.sampler.sample() {
            Ok(true) => self.idle.clear(),
            Ok(false) => {
                if self.idle.enter(Idle::NoMotion) {
                    info!("No motion");
                } else {
                    debug!("No motion");
                }
                return TickOutcome::NoMotion;
            }
            Err(e) => {
                self.idle.clear();
                warn!(error = %e, "Sensor read failed");
                return TickOutcome::SensorFault;
            }
        }

        match self.cooldown.try_admit(now) {
            Admission::Admitted => {
                let event = MotionEvent::new(now, wall_clock);
                info!(file = %event.file_name(), "Motion detected");
                self.dispatch(event.clone());
                TickOutcome::Admitted(event)
            }
            Admission::Suppressed { remaining } => {
                info!(
                    remaining_ms = remaining.as_millis() as u64,
                    "Motion detected, but still in cooldown"
                );
                TickOutcome::Suppressed { remaining }
            }
        }
    }

    fn dispatch(&mut self, event: MotionEvent) {
        let pipeline = self.pipeline.clone();
        self.in_flight
            .spawn(async move { pipeline.execute(event).await });
    }

    /// Collect executions that have already finished, without waiting.
    fn reap(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            log_join(result);
        }
    }

    /// Wait up to `grace` for in-flight executions, then abort the rest.
    /// Returns how many were abandoned.
    pub async fn drain(&mut self, grace: Duration) -> usize {
        let in_flight = &mut self.in_flight;
        let wait = async {
            while let Some(result) = in_flight.join_next().await {
                log_join(result);
            }
        };

        if tokio::time::timeout(grace, wait).await.is_ok() {
            return 0;
        }

        let abandoned = self.in_flight.len();
        self.in_flight.abort_all();
        while self.in_flight.join_next().await.is_some() {}
        warn!(abandoned, "Abandoned in-flight motion events at shutdown");
        abandoned
    }

    /// Release the sensor line and the camera.
    pub async fn release(&mut self) {
        self.sampler.release();
        self.pipeline.capture_service().close().await;
        info!("Sensor and camera released");
    }

    /// Tick until `shutdown` resolves, then drain in-flight executions for at
    /// most `drain_grace` and release the devices.
    pub async fn run<F>(mut self, shutdown: F, drain_grace: Duration)
    where
        F: Future<Output = ()>,
    {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            cooldown_ms = self.cooldown.duration().as_millis() as u64,
            "Sentry started. Monitoring..."
        );

        tokio::pin!(shutdown);
        let tick_interval = self.tick_interval;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopped by interrupt");
                    break;
                }
                _ = async {
                    self.tick().await;
                    tokio::time::sleep(tick_interval).await;
                } => {}
            }
        }

        self.drain(drain_grace).await;
        self.release().await;
    }
}

fn log_join(result: Result<PipelineOutcome, JoinError>) {
    match result {
        Ok(outcome) => debug!(outcome = ?outcome, "Pipeline execution finished"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "Pipeline execution panicked"),
    }
}
