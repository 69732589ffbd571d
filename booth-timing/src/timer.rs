use std::time::{Duration, Instant};

/// Monotonic time source and blocking sleep used by every booth wait.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
}

/// Achieved sleep intervals measured by [`calibrate`].
#[derive(Debug, Clone)]
pub struct CalibrationStats {
    pub requested_ns: f64,
    pub average_sleep_ns: f64,
    pub jitter_ns: f64,
    pub min_sleep_ns: f64,
    pub max_sleep_ns: f64,
    pub effective_rate_hz: f64,
}

/// Sleeps `samples` times for `interval` and reports how long each sleep
/// actually took. Used at startup to confirm the poll interval is achievable.
pub fn calibrate<T: Timer<Timestamp = u64>>(
    timer: &T,
    interval: Duration,
    samples: usize,
) -> CalibrationStats {
    let times: Vec<f64> = (0..samples)
        .map(|_| {
            let start = timer.now();
            timer.sleep(interval);
            timer.elapsed(start).as_nanos() as f64
        })
        .collect();
    let requested_ns = interval.as_nanos() as f64;
    if times.is_empty() {
        return CalibrationStats {
            requested_ns,
            average_sleep_ns: 0.0,
            jitter_ns: 0.0,
            min_sleep_ns: 0.0,
            max_sleep_ns: 0.0,
            effective_rate_hz: 0.0,
        };
    }
    let avg = times.iter().sum::<f64>() / times.len() as f64;
    let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
    let min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    CalibrationStats {
        requested_ns,
        average_sleep_ns: avg,
        jitter_ns: var.sqrt(),
        min_sleep_ns: min,
        max_sleep_ns: max,
        effective_rate_hz: if avg > 0.0 { 1e9 / avg } else { 0.0 },
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    /// Restarts after signal delivery so a Ctrl-C never shortens a hold.
    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, EINTR, clock_nanosleep, timespec};

        let mut req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };
        let mut rem = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        loop {
            let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, &mut rem) };
            if rc != EINTR {
                break;
            }
            req = rem;
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}
