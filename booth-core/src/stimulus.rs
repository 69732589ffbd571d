use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Go stimuli should elicit a peck, no-go stimuli should not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Go,
    NoGo,
}

impl Category {
    /// Trial type as written to the trial log.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Go => "GO",
            Category::NoGo => "NOGO",
        }
    }
}

/// Anything the booth can present as a trial stimulus.
pub trait Stimulus: Clone + Send + Sync + std::fmt::Debug {
    fn category(&self) -> Category;
    fn asset(&self) -> &Path;
    /// Identifier written to the trial log.
    fn identifier(&self) -> String;
    fn snr_db(&self) -> Option<i32> {
        None
    }
}

/// A single sound file standing for a whole category (go/no-go protocols).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundStimulus {
    pub category: Category,
    pub path: PathBuf,
}

impl SoundStimulus {
    pub fn new(category: Category, path: impl Into<PathBuf>) -> Self {
        Self {
            category,
            path: path.into(),
        }
    }
}

impl Stimulus for SoundStimulus {
    fn category(&self) -> Category {
        self.category
    }

    fn asset(&self) -> &Path {
        &self.path
    }

    fn identifier(&self) -> String {
        self.path.display().to_string()
    }
}

/// A catalogued scene-discrimination asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAsset {
    pub path: PathBuf,
    pub category: Category,
    pub snr_db: Option<i32>,
}

impl Stimulus for SceneAsset {
    fn category(&self) -> Category {
        self.category
    }

    fn asset(&self) -> &Path {
        &self.path
    }

    fn identifier(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn snr_db(&self) -> Option<i32> {
        self.snr_db
    }
}
