use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::Command;

use booth_core::PlaybackError;

/// Blocking stimulus playback.
pub trait SoundPlayer: Send {
    /// Plays `asset` to the end. Fails before any sound is produced when the
    /// asset is missing or unreadable.
    fn play_blocking(&mut self, asset: &Path) -> Result<(), PlaybackError>;

    /// Verifies that `asset` would play, without playing it.
    fn check(&mut self, asset: &Path) -> Result<(), PlaybackError>;
}

impl<T: SoundPlayer + ?Sized> SoundPlayer for Box<T> {
    fn play_blocking(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        (**self).play_blocking(asset)
    }

    fn check(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        (**self).check(asset)
    }
}

/// Checks that `path` exists and carries a RIFF/WAVE header.
pub fn verify_wav(path: &Path) -> Result<(), PlaybackError> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PlaybackError::Missing(path.to_path_buf()),
        _ => PlaybackError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;
    let mut header = [0u8; 12];
    file.read_exact(&mut header)
        .map_err(|_| PlaybackError::Corrupt {
            path: path.to_path_buf(),
            reason: "shorter than a WAV header".into(),
        })?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(PlaybackError::Corrupt {
            path: path.to_path_buf(),
            reason: "missing RIFF/WAVE header".into(),
        });
    }
    Ok(())
}

/// Plays through an external command-line player (`aplay` by default).
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self {
            program: "aplay".into(),
            args: vec!["-q".into()],
        }
    }
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SoundPlayer for CommandPlayer {
    fn play_blocking(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        verify_wav(asset)?;
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(asset)
            .status()
            .map_err(|e| PlaybackError::Player {
                path: asset.to_path_buf(),
                reason: format!("{}: {e}", self.program),
            })?;
        if !status.success() {
            return Err(PlaybackError::Corrupt {
                path: asset.to_path_buf(),
                reason: format!("{} exited with {status}", self.program),
            });
        }
        Ok(())
    }

    fn check(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        verify_wav(asset)
    }
}
