use std::path::PathBuf;

use thiserror::Error;

/// Failure of the digital I/O capability. Always fatal to the session.
#[derive(Debug, Error)]
pub enum HardwareFault {
    #[error("line {line} unavailable: {reason}")]
    Unavailable { line: &'static str, reason: String },
    #[error("i/o error on line {line}: {source}")]
    Io {
        line: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// A stimulus asset could not be played.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sound asset not found: {0}")]
    Missing(PathBuf),
    #[error("sound asset {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("player failed on {path}: {reason}")]
    Player { path: PathBuf, reason: String },
}

impl PlaybackError {
    pub fn path(&self) -> &PathBuf {
        match self {
            PlaybackError::Missing(path) => path,
            PlaybackError::Corrupt { path, .. } | PlaybackError::Player { path, .. } => path,
        }
    }
}

/// Protocol parameters rejected before the session touches any hardware.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("probability {0} is outside [0, 1]")]
    Probability(f64),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("ITI range {min}..{max} s is invalid")]
    ItiRange { min: f64, max: f64 },
    #[error("{name} must be a finite, non-negative number of seconds (got {value})")]
    Duration { name: &'static str, value: f64 },
    #[error("no {0} assets supplied")]
    NoAssets(&'static str),
}

#[derive(Debug, Error)]
pub enum BoothError {
    #[error(transparent)]
    Hardware(#[from] HardwareFault),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("trial log {stream}: {source}")]
    Log {
        stream: String,
        #[source]
        source: std::io::Error,
    },
    #[error("session interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, BoothError>;
