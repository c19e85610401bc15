// SPDX-License-Identifier: GPL-3.0-only

//! Periodic process CPU usage sampler
//!
//! Runs as a tokio interval task owned by a [`CpuSampler`]. Each tick reads
//! the process's accumulated user and system time from `/proc/self/stat` and
//! converts the delta since the previous tick into a percentage of one core.
//! Readings are cached as strings for logging: the latest sample, and the
//! mean of the last complete window of samples.

use super::WindowedAverage;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const PROC_SELF_STAT: &str = "/proc/self/stat";

#[derive(Debug, Default)]
struct Readings {
    current: String,
    average: String,
}

/// Shared view of the sampler's latest values
#[derive(Debug, Clone, Default)]
pub struct CpuReadings {
    inner: Arc<Mutex<Readings>>,
}

impl CpuReadings {
    /// Latest sample, e.g. `"12.5"`; empty until the second tick
    pub fn current(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Mean of the last complete window as `"%.2f"`; empty until one completes
    pub fn average(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .average
            .clone()
    }

    fn set_current(&self, value: f64) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).current = format!("{:.1}", value);
    }

    fn set_average(&self, value: f64) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).average = format!("{:.2}", value);
    }
}

/// Extract utime + stime (clock ticks) from a `/proc/<pid>/stat` line
pub fn parse_stat_ticks(stat: &str) -> Option<u64> {
    // comm may contain spaces and parentheses; fields resume after the last ')'
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    // rest starts at field 3 (state); utime and stime are fields 14 and 15
    let utime: u64 = fields.nth(11)?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some(utime + stime)
}

fn clock_ticks_per_second() -> f64 {
    // SAFETY: sysconf has no preconditions
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as f64 } else { 100.0 }
}

/// Converts successive tick counts into CPU percentages
#[derive(Debug)]
struct ProcessClock {
    ticks_per_second: f64,
    previous: Option<(u64, Instant)>,
}

impl ProcessClock {
    fn new(ticks_per_second: f64) -> Self {
        Self {
            ticks_per_second,
            previous: None,
        }
    }

    /// Percent of one core used since the previous observation
    fn observe(&mut self, ticks: u64, at: Instant) -> Option<f64> {
        let previous = self.previous.replace((ticks, at));
        let (last_ticks, last_at) = previous?;
        let elapsed = at.duration_since(last_at).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let cpu_seconds = ticks.saturating_sub(last_ticks) as f64 / self.ticks_per_second;
        Some(cpu_seconds / elapsed * 100.0)
    }
}

/// Owned CPU sampling task with an explicit start/shutdown lifecycle
pub struct CpuSampler {
    readings: CpuReadings,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CpuSampler {
    /// Spawn the sampling task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(interval: Duration, average_window: usize) -> Self {
        Self::start_on(&tokio::runtime::Handle::current(), interval, average_window)
    }

    /// Spawn the sampling task on `runtime`
    pub fn start_on(runtime: &tokio::runtime::Handle, interval: Duration, average_window: usize) -> Self {
        let readings = CpuReadings::default();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let task_readings = readings.clone();
        let period = interval.max(Duration::from_millis(1));

        debug!(interval_ms = period.as_millis(), average_window, "Starting CPU sampler");

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut clock = ProcessClock::new(clock_ticks_per_second());
            let mut average = WindowedAverage::new(average_window);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                let stat = match tokio::fs::read_to_string(PROC_SELF_STAT).await {
                    Ok(stat) => stat,
                    Err(e) => {
                        warn!(error = %e, "CPU sampling unavailable");
                        break;
                    }
                };
                let Some(ticks) = parse_stat_ticks(&stat) else {
                    warn!("Unrecognized /proc/self/stat layout");
                    break;
                };

                if let Some(percent) = clock.observe(ticks, Instant::now()) {
                    task_readings.set_current(percent);
                    if let Some(mean) = average.push(percent) {
                        task_readings.set_average(mean);
                    }
                }
            }

            debug!("CPU sampler stopped");
        });

        Self {
            readings,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Handle for reading values from other threads
    pub fn readings(&self) -> CpuReadings {
        self.readings.clone()
    }

    pub fn current_usage_percent(&self) -> String {
        self.readings.current()
    }

    pub fn running_average_percent(&self) -> String {
        self.readings.average()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "CPU sampler task failed");
            }
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CpuSampler {
    fn drop(&mut self) {
        self.stop();
    }
}
