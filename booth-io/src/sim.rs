//! Simulated booth for tests and dry runs: a perch switch scripted against a
//! [`ManualTimer`], recorded output lines, and a player that only takes time.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use booth_core::{HardwareFault, PlaybackError};
use booth_timing::{ManualTimer, Timer};
use parking_lot::Mutex;

use crate::hardware::{DigitalIo, Level, Line, LinePolarity};
use crate::sound::SoundPlayer;

/// Intervals during which the perch switch is engaged, in session time.
#[derive(Debug, Clone, Default)]
pub struct SwitchScript {
    presses: Vec<(u64, u64)>,
}

impl SwitchScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage the switch at `start_s` for `hold_s` seconds.
    pub fn press(mut self, start_s: f64, hold_s: f64) -> Self {
        let start = secs_to_ns(start_s);
        self.presses.push((start, start + secs_to_ns(hold_s)));
        self
    }

    /// Engage the switch from `start_s` onwards.
    pub fn hold_from(mut self, start_s: f64) -> Self {
        self.presses.push((secs_to_ns(start_s), u64::MAX));
        self
    }

    pub fn is_engaged(&self, at_ns: u64) -> bool {
        self.presses
            .iter()
            .any(|&(start, end)| at_ns >= start && at_ns < end)
    }
}

fn secs_to_ns(s: f64) -> u64 {
    (s * 1e9).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEvent {
    pub at: Duration,
    pub line: Line,
    pub level: Level,
}

/// Read side of a [`SimulatedIo`], kept by tests after the IO moved into a
/// session.
#[derive(Debug, Clone, Default)]
pub struct IoRecorder {
    events: Arc<Mutex<Vec<OutputEvent>>>,
    reads: Arc<AtomicUsize>,
}

impl IoRecorder {
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn last_level(&self, line: Line) -> Option<Level> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|e| e.line == line)
            .map(|e| e.level)
    }

    /// Closed intervals during which `line` was active.
    pub fn active_intervals(&self, line: Line, polarity: LinePolarity) -> Vec<(Duration, Duration)> {
        let mut intervals = Vec::new();
        let mut since = None;
        for event in self.events.lock().iter().filter(|e| e.line == line) {
            let active = polarity.is_active(line, event.level);
            match (active, since) {
                (true, None) => since = Some(event.at),
                (false, Some(start)) => {
                    intervals.push((start, event.at));
                    since = None;
                }
                _ => {}
            }
        }
        intervals
    }
}

pub struct SimulatedIo {
    timer: ManualTimer,
    switch: SwitchScript,
    switch_active_low: bool,
    recorder: IoRecorder,
    failing: bool,
}

impl SimulatedIo {
    pub fn new(timer: ManualTimer, switch: SwitchScript) -> Self {
        Self {
            timer,
            switch,
            switch_active_low: true,
            recorder: IoRecorder::default(),
            failing: false,
        }
    }

    /// Every operation reports the backend as unavailable.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn recorder(&self) -> IoRecorder {
        self.recorder.clone()
    }

    fn check(&self, line: Line) -> Result<(), HardwareFault> {
        if self.failing {
            return Err(HardwareFault::Unavailable {
                line: line.name(),
                reason: "simulated fault".into(),
            });
        }
        Ok(())
    }
}

impl DigitalIo for SimulatedIo {
    fn set_output(&mut self, line: Line, level: Level) -> Result<(), HardwareFault> {
        self.check(line)?;
        self.recorder.events.lock().push(OutputEvent {
            at: Duration::from_nanos(self.timer.now()),
            line,
            level,
        });
        Ok(())
    }

    fn read_input(&mut self, line: Line) -> Result<Level, HardwareFault> {
        self.check(line)?;
        if line != Line::Switch {
            return Err(HardwareFault::Unavailable {
                line: line.name(),
                reason: "not an input".into(),
            });
        }
        self.recorder.reads.fetch_add(1, Ordering::SeqCst);
        let engaged = self.switch.is_engaged(self.timer.now());
        Ok(Level::from_high(engaged != self.switch_active_low))
    }
}

/// Shared record of what a [`SimulatedPlayer`] played, with start times.
#[derive(Debug, Clone, Default)]
pub struct PlayLog(Arc<Mutex<Vec<(Duration, PathBuf)>>>);

impl PlayLog {
    pub fn played(&self) -> Vec<PathBuf> {
        self.0.lock().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(Duration, PathBuf)> {
        self.0.lock().clone()
    }
}

/// Player whose clips last a fixed time on the manual clock.
pub struct SimulatedPlayer {
    timer: ManualTimer,
    clip: Duration,
    missing: HashSet<PathBuf>,
    failures: HashMap<PathBuf, usize>,
    log: PlayLog,
}

impl SimulatedPlayer {
    pub fn new(timer: ManualTimer, clip: Duration) -> Self {
        Self {
            timer,
            clip,
            missing: HashSet::new(),
            failures: HashMap::new(),
            log: PlayLog::default(),
        }
    }

    pub fn with_missing(mut self, asset: impl Into<PathBuf>) -> Self {
        self.missing.insert(asset.into());
        self
    }

    /// The next `times` plays of `asset` fail as corrupt. The asset still
    /// passes [`SoundPlayer::check`].
    pub fn with_failures(mut self, asset: impl Into<PathBuf>, times: usize) -> Self {
        self.failures.insert(asset.into(), times);
        self
    }

    pub fn log(&self) -> PlayLog {
        self.log.clone()
    }
}

impl SoundPlayer for SimulatedPlayer {
    fn play_blocking(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        self.check(asset)?;
        if let Some(left) = self.failures.get_mut(asset).filter(|left| **left > 0) {
            *left -= 1;
            return Err(PlaybackError::Corrupt {
                path: asset.to_path_buf(),
                reason: "simulated failure".into(),
            });
        }
        self.log
            .0
            .lock()
            .push((Duration::from_nanos(self.timer.now()), asset.to_path_buf()));
        self.timer.sleep(self.clip);
        Ok(())
    }

    fn check(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        if self.missing.contains(asset) {
            return Err(PlaybackError::Missing(asset.to_path_buf()));
        }
        Ok(())
    }
}
