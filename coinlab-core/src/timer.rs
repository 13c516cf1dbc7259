//! Scoped operation timing.
//!
//! ```
//! use coinlab_core::timer::OperationTimer;
//!
//! let timer = OperationTimer::new();
//! {
//!     let _scope = timer.measure("fill_stage");
//!     // work...
//! } // "fill_stage completed in ..." logged here, even on early return
//! assert!(timer.last("fill_stage").is_some());
//! ```

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Records how long named operations took. Constructed explicitly and
/// passed to whatever needs it.
#[derive(Debug, Default)]
pub struct OperationTimer {
    timings: Mutex<Vec<(String, Duration)>>,
}

impl OperationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing `name`. Completion is logged and recorded when the
    /// returned guard drops.
    pub fn measure(&self, name: &str) -> TimedScope<'_> {
        info!(operation = name, "starting");
        TimedScope {
            timer: self,
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Most recent duration recorded for `name`.
    pub fn last(&self, name: &str) -> Option<Duration> {
        self.timings
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, d)| *d)
    }

    /// All recorded timings in completion order.
    pub fn timings(&self) -> Vec<(String, Duration)> {
        self.timings.lock().unwrap().clone()
    }

    fn record(&self, name: String, elapsed: Duration) {
        self.timings.lock().unwrap().push((name, elapsed));
    }
}

pub struct TimedScope<'a> {
    timer: &'a OperationTimer,
    name: String,
    start: Instant,
}

impl TimedScope<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimedScope<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!(
            operation = %self.name,
            "completed in {:.2}s",
            elapsed.as_secs_f64()
        );
        self.timer.record(std::mem::take(&mut self.name), elapsed);
    }
}
