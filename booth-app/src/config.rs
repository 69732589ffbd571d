use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use booth_experiment::SessionConfig;
use booth_io::{CommandPlayer, LinePolarity, PinMap};
use serde::{Deserialize, Serialize};

/// Where the digital lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Kernel GPIO through `/sys/class/gpio`.
    #[default]
    Sysfs,
    /// Dry run on a manual clock with a switch that is never pecked.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let player = CommandPlayer::default();
        Self {
            program: player.program,
            args: player.args,
        }
    }
}

impl PlayerConfig {
    pub fn player(&self) -> CommandPlayer {
        CommandPlayer::new(self.program.clone(), self.args.clone())
    }
}

/// Everything the booth binary reads at startup. Every field defaults, so an
/// empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    pub session: SessionConfig,
    pub pins: PinMap,
    pub polarity: LinePolarity,
    pub backend: Backend,
    pub log_dir: PathBuf,
    pub player: PlayerConfig,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            pins: PinMap::default(),
            polarity: LinePolarity::default(),
            backend: Backend::default(),
            log_dir: PathBuf::from("logs"),
            player: PlayerConfig::default(),
        }
    }
}

impl BoothConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// The file at `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
