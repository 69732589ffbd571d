//! Trial-protocol engine of the booth: sessions, the peck monitor, outcome
//! consequences, stimulus scheduling, trial logs and the seven protocols.

pub mod config;
pub mod logger;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod trial;

pub use config::{
    PlaybackPolicy, Punishment, SessionConfig, SoundDefaults, TimingOverrides, TimingParameters,
};
pub use logger::{CsvTrialLog, MemoryTrialLog, RowFormat, TrialLog};
pub use protocol::{
    ClassicalOperantParams, GoNoGoParams, IntroductionParams, Protocol, SceneParams,
    ShapingParams, TimedShapingParams, TwoPeckParams,
};
pub use scheduler::{IndependentDraw, StratifiedBlock, go_count, scene_block};
pub use session::Session;
pub use trial::TrialTiming;
