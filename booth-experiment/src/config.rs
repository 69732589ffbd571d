use std::path::PathBuf;
use std::time::Duration;

use booth_core::ConfigError;
use serde::{Deserialize, Serialize};

use crate::trial::TrialTiming;

/// Session-wide timing defaults, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingParameters {
    pub reward_s: f64,
    /// Length of an air puff.
    pub punishment_s: f64,
    pub iti_range_s: (f64, f64),
    pub response_window_s: f64,
    /// Wait after a miss or a correct rejection.
    pub null_s: f64,
    /// Wait after a false alarm.
    pub punishment_null_s: f64,
    /// Gap between the end of the stimulus and the response window.
    pub delay_s: f64,
}

impl Default for TimingParameters {
    fn default() -> Self {
        Self {
            reward_s: 6.0,
            punishment_s: 1.0,
            iti_range_s: (30.0, 60.0),
            response_window_s: 2.0,
            null_s: 6.0,
            punishment_null_s: 16.0,
            delay_s: 0.0,
        }
    }
}

/// Per-invocation overrides; `None` keeps the session default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingOverrides {
    pub reward_s: Option<f64>,
    pub punishment_s: Option<f64>,
    pub iti_range_s: Option<(f64, f64)>,
    pub response_window_s: Option<f64>,
    pub null_s: Option<f64>,
    pub punishment_null_s: Option<f64>,
    pub delay_s: Option<f64>,
}

impl TimingParameters {
    pub fn with(&self, o: &TimingOverrides) -> TimingParameters {
        TimingParameters {
            reward_s: o.reward_s.unwrap_or(self.reward_s),
            punishment_s: o.punishment_s.unwrap_or(self.punishment_s),
            iti_range_s: o.iti_range_s.unwrap_or(self.iti_range_s),
            response_window_s: o.response_window_s.unwrap_or(self.response_window_s),
            null_s: o.null_s.unwrap_or(self.null_s),
            punishment_null_s: o.punishment_null_s.unwrap_or(self.punishment_null_s),
            delay_s: o.delay_s.unwrap_or(self.delay_s),
        }
    }

    pub fn resolve(&self) -> Result<TrialTiming, ConfigError> {
        let (lo, hi) = self.iti_range_s;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi) {
            return Err(ConfigError::ItiRange { min: lo, max: hi });
        }
        Ok(TrialTiming {
            reward: secs("reward_s", self.reward_s)?,
            punishment: secs("punishment_s", self.punishment_s)?,
            iti: (Duration::from_secs_f64(lo), Duration::from_secs_f64(hi)),
            response_window: secs("response_window_s", self.response_window_s)?,
            null: secs("null_s", self.null_s)?,
            punishment_null: secs("punishment_null_s", self.punishment_null_s)?,
            delay: secs("delay_s", self.delay_s)?,
        })
    }
}

/// Converts a configured number of seconds, rejecting negative or non-finite
/// values.
pub fn secs(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(ConfigError::Duration { name, value })
    }
}

/// Consequence of a false alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Punishment {
    /// Air puff for the punishment time.
    AirPuff,
    /// Air puff held while white noise plays.
    #[default]
    AirPuffWithNoise,
    /// White noise and darkness, the puffer never fires.
    NoiseOnly,
}

/// What to do when a stimulus fails to play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPolicy {
    /// Propagate the error and end the session.
    #[default]
    Abort,
    /// Drop the trial without scoring it and wait for the next initiation.
    SkipTrial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundDefaults {
    pub go: PathBuf,
    pub nogo: PathBuf,
    pub white_noise: PathBuf,
}

impl Default for SoundDefaults {
    fn default() -> Self {
        Self {
            go: PathBuf::from("GO.wav"),
            nogo: PathBuf::from("NOGO.wav"),
            white_noise: PathBuf::from("GNG_WN.wav"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timing: TimingParameters,
    pub sounds: SoundDefaults,
    /// Switch sampling interval.
    pub poll_interval_ms: u64,
    /// How long the perch must stay free before a new trial can start.
    pub step_out_window_ms: u64,
    /// Granularity at which long waits notice an interrupt.
    pub interrupt_check_ms: u64,
    /// Check every asset a protocol will play before it starts.
    pub verify_assets: bool,
    pub playback_policy: PlaybackPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timing: TimingParameters::default(),
            sounds: SoundDefaults::default(),
            poll_interval_ms: 1,
            step_out_window_ms: 1000,
            interrupt_check_ms: 100,
            verify_assets: true,
            playback_policy: PlaybackPolicy::Abort,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<TrialTiming, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::NonPositive("poll_interval_ms"));
        }
        if self.step_out_window_ms == 0 {
            return Err(ConfigError::NonPositive("step_out_window_ms"));
        }
        if self.interrupt_check_ms == 0 {
            return Err(ConfigError::NonPositive("interrupt_check_ms"));
        }
        self.timing.resolve()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_out_window(&self) -> Duration {
        Duration::from_millis(self.step_out_window_ms)
    }

    pub fn interrupt_check(&self) -> Duration {
        Duration::from_millis(self.interrupt_check_ms)
    }
}
