//! Hardware-facing capabilities of the booth: digital lines, sound playback,
//! the scene asset catalog, and simulated stand-ins for tests.

pub mod catalog;
pub mod hardware;
pub mod sim;
pub mod sound;
pub mod sysfs;

pub use catalog::{AssetCatalog, WavDirectoryCatalog};
pub use hardware::{DigitalIo, HardwareHandle, Level, Line, LinePolarity};
pub use sim::{IoRecorder, OutputEvent, PlayLog, SimulatedIo, SimulatedPlayer, SwitchScript};
pub use sound::{CommandPlayer, SoundPlayer, verify_wav};
pub use sysfs::{PinMap, SysfsGpio};
