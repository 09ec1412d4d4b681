//! # Progress reporting
//!
//! The dispatch loop publishes a handful of counters into a shared
//! [`ProgressProbe`] after every event. A [`ProgressReporter`] samples the probe
//! from a background thread and logs one line per interval.
//!
//! ## Expectations:
//! - Lock-free writes on the hot path (relaxed atomics only)
//! - The reporter never touches simulation state
//! - Stopping the reporter joins its thread

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use tracing::{info, warn};

/// Snapshot of a running dispatch loop, written by the controller thread.
#[derive(Debug)]
pub struct ProgressProbe {
    sim_time: AtomicU64,
    end_time: AtomicU64,
    queue_len: AtomicU64,
    events: AtomicU64,
    running: AtomicBool,
}

impl ProgressProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sim_time: AtomicU64::new(0),
            end_time: AtomicU64::new(u64::MAX),
            queue_len: AtomicU64::new(0),
            events: AtomicU64::new(0),
            running: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn publish(&self, sim_time: u64, queue_len: usize, events: u64) {
        self.sim_time.store(sim_time, Ordering::Relaxed);
        self.queue_len.store(queue_len as u64, Ordering::Relaxed);
        self.events.store(events, Ordering::Relaxed);
    }

    pub fn set_end_time(&self, end_time: u64) {
        self.end_time.store(end_time, Ordering::Relaxed);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn sim_time(&self) -> u64 {
        self.sim_time.load(Ordering::Relaxed)
    }

    pub fn end_time(&self) -> u64 {
        self.end_time.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> u64 {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

/// Background thread that logs progress lines until stopped.
pub struct ProgressReporter {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Spawn the reporter. `ticks_per_unit` and `unit_label` only affect formatting.
    pub fn spawn(
        probe: Arc<ProgressProbe>,
        interval: Duration,
        ticks_per_unit: u64,
        unit_label: String,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = bounded::<()>(1);
        let started = Instant::now();
        let handle = std::thread::Builder::new()
            .name("kairos-progress".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !probe.is_running() {
                            continue;
                        }
                        if let Some(line) = progress_line(
                            &probe,
                            started.elapsed(),
                            ticks_per_unit.max(1),
                            &unit_label,
                        ) {
                            info!(target: "kairos::progress", "{line}");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("progress reporter thread panicked");
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Format one progress line, or `None` before the first event has advanced time.
pub fn progress_line(
    probe: &ProgressProbe,
    elapsed: Duration,
    ticks_per_unit: u64,
    unit_label: &str,
) -> Option<String> {
    let sim_time = probe.sim_time();
    let end_time = probe.end_time();
    if sim_time == 0 || sim_time > end_time {
        return None;
    }

    let mut line = format!("sim-time={}{}", sim_time / ticks_per_unit, unit_label);
    let bounded = end_time < u64::MAX - 1;
    let completed = sim_time as f64 / end_time as f64;
    if bounded {
        line.push_str(&format!(", {:.2}%", completed * 100.0));
    }
    line.push_str(&format!(
        " ev={} evQ={} t={}",
        probe.events(),
        probe.queue_len(),
        format_hms(elapsed.as_secs())
    ));
    if bounded && completed > 0.001 {
        let remaining = elapsed.as_secs_f64() / completed * (1.0 - completed);
        line.push_str(&format!(" ({})", format_hms(remaining as u64)));
    }
    Some(line)
}

/// Render whole seconds as `H:MM:SS`.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "0:00:00");
        assert_eq!(format_hms(61), "0:01:01");
        assert_eq!(format_hms(3600 * 5 + 7), "5:00:07");
    }

    #[test]
    fn no_line_before_time_moves() {
        let probe = ProgressProbe::new();
        assert!(progress_line(&probe, Duration::from_secs(1), 1, " ticks").is_none());
    }

    #[test]
    fn bounded_run_reports_percentage() {
        let probe = ProgressProbe::new();
        probe.set_end_time(1000);
        probe.publish(250, 12, 40);
        let line = progress_line(&probe, Duration::from_secs(10), 10, " ms").unwrap();
        assert!(line.starts_with("sim-time=25 ms, 25.00%"), "{line}");
        assert!(line.contains("evQ=12"));
        assert!(line.contains("(0:00:30)"), "{line}");
    }

    #[test]
    fn reporter_only_reads_and_joins_on_stop() {
        let probe = ProgressProbe::new();
        probe.publish(5, 1, 1);
        probe.set_running(true);
        let reporter =
            ProgressReporter::spawn(probe.clone(), Duration::from_millis(5), 1, " ticks".into())
                .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        reporter.stop();

        // only this thread holds the probe once the reporter has been joined
        assert_eq!(Arc::strong_count(&probe), 1);
        assert_eq!(probe.sim_time(), 5);
        assert_eq!(probe.events(), 1);
    }
}
