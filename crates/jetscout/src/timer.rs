//! Stopwatch for timing a robot's autonomous routine.
//!
//! While running, a tokio task reports the elapsed seconds to a callback on
//! every tick (roughly every 16 ms by default). Nothing is persisted here; the
//! form writes each reading into the in-progress record.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Default interval between elapsed-time readings.
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Receives each elapsed-time reading, in seconds.
pub type TickFn = Arc<dyn Fn(f64) + Send + Sync>;

/// A start/stop/reset stopwatch that reports elapsed seconds as it runs.
pub struct AutoTimer {
    tick: Duration,
    running: Option<Running>,
}

struct Running {
    /// Instant that corresponds to an elapsed time of zero.
    origin: Instant,
    on_tick: TickFn,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for AutoTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTimer")
            .field("tick", &self.tick)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Default for AutoTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl AutoTimer {
    /// Create a stopped timer that ticks at the given interval once started.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            running: None,
        }
    }

    /// Interval between readings.
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Whether the timer is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Seconds elapsed so far, if running.
    #[must_use]
    pub fn elapsed(&self) -> Option<f64> {
        self.running
            .as_ref()
            .map(|r| r.origin.elapsed().as_secs_f64())
    }

    /// Start counting from `from` seconds. Does nothing if already running.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start<F>(&mut self, from: f64, on_tick: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        if self.running.is_some() {
            return;
        }

        let offset = Duration::try_from_secs_f64(from.max(0.0)).unwrap_or_default();
        let now = Instant::now();
        let origin = now.checked_sub(offset).unwrap_or(now);
        let on_tick: TickFn = Arc::new(on_tick);

        let tick = self.tick;
        let callback = Arc::clone(&on_tick);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback(origin.elapsed().as_secs_f64());
            }
        });

        trace!("Auto timer started at {from:.3}s");
        self.running = Some(Running {
            origin,
            on_tick,
            task,
        });
    }

    /// Stop ticking and report the final reading. Returns it, or `None` if the
    /// timer was not running.
    pub fn stop(&mut self) -> Option<f64> {
        let running = self.running.take()?;
        running.task.abort();
        let elapsed = running.origin.elapsed().as_secs_f64();
        (running.on_tick)(elapsed);
        trace!("Auto timer stopped at {elapsed:.3}s");
        Some(elapsed)
    }

    /// Stop ticking without reporting a final reading.
    pub fn reset(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

impl Drop for AutoTimer {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Format seconds as `MM:SS.mmm`.
#[must_use]
pub fn format_elapsed(seconds: f64) -> String {
    let total_ms = Duration::try_from_secs_f64(seconds.max(0.0))
        .unwrap_or_default()
        .as_millis();
    let mins = total_ms / 60_000;
    let secs = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;
    format!("{mins:02}:{secs:02}.{ms:03}")
}
