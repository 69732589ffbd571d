//! The seven booth protocols: parameters, validation and the assets each one
//! plays. The trial loops live in the submodules as `Session` methods.

mod classical;
mod go_nogo;
mod introduction;
mod scene;
mod shaping;

use std::path::{Path, PathBuf};
use std::time::Duration;

use booth_core::{ConfigError, SceneAsset};
use serde::{Deserialize, Serialize};

use crate::config::{Punishment, SessionConfig, TimingOverrides, secs};
use crate::scheduler::{check_probability as probability, go_count};
use crate::trial::TrialTiming;

/// A strictly positive number of seconds.
pub(crate) fn session_length(value: f64) -> Result<Duration, ConfigError> {
    let d = secs("duration_s", value)?;
    if d.is_zero() {
        return Err(ConfigError::NonPositive("duration_s"));
    }
    Ok(d)
}

fn positive_count(name: &'static str, n: usize) -> Result<(), ConfigError> {
    if n == 0 {
        Err(ConfigError::NonPositive(name))
    } else {
        Ok(())
    }
}

/// Rewards on a random timer, independent of the animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroductionParams {
    pub duration_s: f64,
    pub timing: TimingOverrides,
}

impl Default for IntroductionParams {
    fn default() -> Self {
        Self {
            duration_s: 14_400.0,
            timing: TimingOverrides::default(),
        }
    }
}

/// Every peck is rewarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingParams {
    pub duration_s: f64,
    pub timing: TimingOverrides,
}

impl Default for ShapingParams {
    fn default() -> Self {
        Self {
            duration_s: 14_400.0,
            timing: TimingOverrides::default(),
        }
    }
}

/// Two pecks separated by a fixed gap earn one reward. `TimedShapingParams`
/// additionally bounds the second peck by the response window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoPeckParams {
    pub duration_s: f64,
    /// Enforced pause between the first peck and the second prompt, roughly
    /// one song.
    pub gap_s: f64,
    pub timing: TimingOverrides,
}

impl Default for TwoPeckParams {
    fn default() -> Self {
        Self {
            duration_s: 14_400.0,
            gap_s: 2.0,
            timing: TimingOverrides::default(),
        }
    }
}

pub type TimedShapingParams = TwoPeckParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoNoGoParams {
    /// Session go sound when `None`.
    pub go_sound: Option<PathBuf>,
    pub nogo_sound: Option<PathBuf>,
    pub noise: Option<PathBuf>,
    /// Chance that a trial is a go trial, drawn independently per trial.
    pub probability: f64,
    pub duration_s: f64,
    pub punishment: Punishment,
    pub timing: TimingOverrides,
}

impl Default for GoNoGoParams {
    fn default() -> Self {
        Self {
            go_sound: None,
            nogo_sound: None,
            noise: None,
            probability: 0.5,
            duration_s: 39_600.0,
            punishment: Punishment::default(),
            timing: TimingOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    pub go_assets: Vec<SceneAsset>,
    pub nogo_assets: Vec<SceneAsset>,
    pub noise: Option<PathBuf>,
    pub block_size: usize,
    /// Go share of each block.
    pub probability: f64,
    pub duration_s: f64,
    /// Stop after this many scored trials.
    pub trial_cap: Option<usize>,
    pub punishment: Punishment,
    pub timing: TimingOverrides,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            go_assets: Vec::new(),
            nogo_assets: Vec::new(),
            noise: None,
            block_size: 60,
            probability: 0.5,
            duration_s: 14_400.0,
            trial_cap: None,
            punishment: Punishment::default(),
            timing: TimingOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassicalOperantParams {
    pub go_sound: Option<PathBuf>,
    pub nogo_sound: Option<PathBuf>,
    pub noise: Option<PathBuf>,
    pub classical_probability: f64,
    pub operant_probability: f64,
    pub classical_trial_cap: usize,
    pub operant_trial_cap: usize,
    /// Bound on both phases together, from session start.
    pub duration_s: f64,
    pub punishment: Punishment,
    pub timing: TimingOverrides,
}

impl Default for ClassicalOperantParams {
    fn default() -> Self {
        Self {
            go_sound: None,
            nogo_sound: None,
            noise: None,
            classical_probability: 0.5,
            operant_probability: 0.5,
            classical_trial_cap: 30,
            operant_trial_cap: 100,
            duration_s: 14_400.0,
            punishment: Punishment::default(),
            timing: TimingOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum Protocol {
    Introduction(IntroductionParams),
    Shaping(ShapingParams),
    ShapingTwoPecks(TwoPeckParams),
    ShapingTimed(TimedShapingParams),
    #[serde(rename = "go_nogo")]
    GoNoGo(GoNoGoParams),
    #[serde(rename = "scene_discrimination")]
    Scene(SceneParams),
    #[serde(rename = "classical_to_operant")]
    ClassicalOperant(ClassicalOperantParams),
}

fn or_default(sound: &Option<PathBuf>, default: &Path) -> PathBuf {
    sound.clone().unwrap_or_else(|| default.to_path_buf())
}

fn noise_if_played(punishment: Punishment, noise: &Option<PathBuf>, config: &SessionConfig) -> Option<PathBuf> {
    match punishment {
        Punishment::AirPuff => None,
        Punishment::AirPuffWithNoise | Punishment::NoiseOnly => {
            Some(or_default(noise, &config.sounds.white_noise))
        }
    }
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Introduction(_) => "introduction",
            Protocol::Shaping(_) => "shaping",
            Protocol::ShapingTwoPecks(_) => "shaping_two_pecks",
            Protocol::ShapingTimed(_) => "shaping_timed",
            Protocol::GoNoGo(_) => "go_nogo",
            Protocol::Scene(_) => "scene_discrimination",
            Protocol::ClassicalOperant(_) => "classical_to_operant",
        }
    }

    /// Log stream of a run in session `session_id`. Classical-to-operant
    /// returns the prefix its two phase streams share.
    pub fn stream(&self, session_id: &str, config: &SessionConfig) -> String {
        let tag = match self {
            Protocol::Introduction(_) => "introduction",
            Protocol::Shaping(_) => "shaping",
            Protocol::ShapingTwoPecks(_) => "shaping_two_pecks",
            Protocol::ShapingTimed(_) => "shaping_timed",
            Protocol::GoNoGo(_) => "go_nogo",
            Protocol::Scene(_) => "scene",
            Protocol::ClassicalOperant(p) => {
                return classical::stream_prefix(session_id, p, config);
            }
        };
        format!("{session_id}_{tag}")
    }

    /// Wall-clock bound of the run.
    pub fn duration_s(&self) -> f64 {
        match self {
            Protocol::Introduction(p) => p.duration_s,
            Protocol::Shaping(p) => p.duration_s,
            Protocol::ShapingTwoPecks(p) | Protocol::ShapingTimed(p) => p.duration_s,
            Protocol::GoNoGo(p) => p.duration_s,
            Protocol::Scene(p) => p.duration_s,
            Protocol::ClassicalOperant(p) => p.duration_s,
        }
    }

    fn overrides(&self) -> &TimingOverrides {
        match self {
            Protocol::Introduction(p) => &p.timing,
            Protocol::Shaping(p) => &p.timing,
            Protocol::ShapingTwoPecks(p) | Protocol::ShapingTimed(p) => &p.timing,
            Protocol::GoNoGo(p) => &p.timing,
            Protocol::Scene(p) => &p.timing,
            Protocol::ClassicalOperant(p) => &p.timing,
        }
    }

    /// Checks every parameter and resolves the timing of this run against the
    /// session defaults.
    pub fn validate(&self, config: &SessionConfig) -> Result<TrialTiming, ConfigError> {
        let timing = config.timing.with(self.overrides()).resolve()?;
        session_length(self.duration_s())?;
        match self {
            Protocol::Introduction(_) | Protocol::Shaping(_) => {}
            Protocol::ShapingTwoPecks(p) | Protocol::ShapingTimed(p) => {
                secs("gap_s", p.gap_s)?;
            }
            Protocol::GoNoGo(p) => probability(p.probability)?,
            Protocol::Scene(p) => {
                probability(p.probability)?;
                positive_count("block_size", p.block_size)?;
                if let Some(cap) = p.trial_cap {
                    positive_count("trial_cap", cap)?;
                }
                let go = go_count(p.block_size, p.probability);
                if go > 0 && p.go_assets.is_empty() {
                    return Err(ConfigError::NoAssets("go"));
                }
                if go < p.block_size && p.nogo_assets.is_empty() {
                    return Err(ConfigError::NoAssets("no-go"));
                }
            }
            Protocol::ClassicalOperant(p) => {
                probability(p.classical_probability)?;
                probability(p.operant_probability)?;
                positive_count("classical_trial_cap", p.classical_trial_cap)?;
                positive_count("operant_trial_cap", p.operant_trial_cap)?;
            }
        }
        Ok(timing)
    }

    /// Every sound file this run may play.
    pub fn assets(&self, config: &SessionConfig) -> Vec<PathBuf> {
        let sounds = &config.sounds;
        match self {
            Protocol::Introduction(_)
            | Protocol::Shaping(_)
            | Protocol::ShapingTwoPecks(_)
            | Protocol::ShapingTimed(_) => Vec::new(),
            Protocol::GoNoGo(p) => [
                Some(or_default(&p.go_sound, &sounds.go)),
                Some(or_default(&p.nogo_sound, &sounds.nogo)),
                noise_if_played(p.punishment, &p.noise, config),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Protocol::Scene(p) => {
                let mut assets: Vec<PathBuf> = p
                    .go_assets
                    .iter()
                    .chain(&p.nogo_assets)
                    .map(|a| a.path.clone())
                    .collect();
                assets.extend(noise_if_played(p.punishment, &p.noise, config));
                assets
            }
            Protocol::ClassicalOperant(p) => [
                Some(or_default(&p.go_sound, &sounds.go)),
                Some(or_default(&p.nogo_sound, &sounds.nogo)),
                noise_if_played(p.punishment, &p.noise, config),
            ]
            .into_iter()
            .flatten()
            .collect(),
        }
    }
}
