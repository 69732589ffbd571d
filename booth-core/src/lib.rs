pub mod error;
pub mod interrupt;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use error::{BoothError, ConfigError, HardwareFault, PlaybackError, Result};
pub use interrupt::Interrupt;
pub use phase::ConditioningPhase;
pub use stimulus::{Category, SceneAsset, SoundStimulus, Stimulus};
pub use trial::{Outcome, SessionSummary, TrialRecord};
