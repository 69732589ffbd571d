pub mod manual;
pub mod timer;

pub use manual::ManualTimer;
pub use timer::{CalibrationStats, HighPrecisionTimer, Timer, calibrate};
