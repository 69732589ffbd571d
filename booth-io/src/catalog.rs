use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use booth_core::{Category, SceneAsset};
use regex::Regex;

/// Supplies scene-discrimination assets with their metadata.
pub trait AssetCatalog {
    fn list(&self, dir: &Path, category: Category) -> io::Result<Vec<SceneAsset>>;
}

/// Every `*.wav` in a directory, sorted by path. Scene files are named
/// `Song1Pk43(-4)5snr.wav`: the SNR is the first signed integer after the
/// closing parenthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDirectoryCatalog;

static SNR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+").expect("static regex"));

impl WavDirectoryCatalog {
    pub fn parse_snr(file_name: &str) -> Option<i32> {
        let tail = file_name.split(')').nth(1)?;
        SNR.find(tail)?.as_str().parse().ok()
    }
}

impl AssetCatalog for WavDirectoryCatalog {
    fn list(&self, dir: &Path, category: Category) -> io::Result<Vec<SceneAsset>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_wav = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
            if is_wav && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths
            .into_iter()
            .map(|path| {
                let snr_db = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(Self::parse_snr);
                if snr_db.is_none() {
                    tracing::warn!("no SNR in scene asset name {}", path.display());
                }
                SceneAsset {
                    path,
                    category,
                    snr_db,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn snr_follows_the_closing_parenthesis() {
        assert_eq!(WavDirectoryCatalog::parse_snr("Song1Pk43(-4)5snr.wav"), Some(5));
        assert_eq!(WavDirectoryCatalog::parse_snr("Song2Pk10(3)-10snr.wav"), Some(-10));
        assert_eq!(WavDirectoryCatalog::parse_snr("plain.wav"), None);
    }

    #[test]
    fn lists_only_wav_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b(0)10snr.wav", "a(0)-5snr.WAV", "notes.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let assets = WavDirectoryCatalog
            .list(dir.path(), Category::NoGo)
            .unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].snr_db, Some(-5));
        assert_eq!(assets[1].snr_db, Some(10));
        assert!(assets.iter().all(|a| a.category == Category::NoGo));
    }
}
