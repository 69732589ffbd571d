use std::fs;
use std::path::{Path, PathBuf};

use booth_core::HardwareFault;
use serde::{Deserialize, Serialize};

use crate::hardware::{DigitalIo, Level, Line};

/// BCM GPIO numbers of each line. Defaults follow the booth wiring
/// (BOARD pins 19, 11, 16 and 15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub reward: u32,
    pub punisher: u32,
    pub led: u32,
    pub switch: u32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            reward: 10,
            punisher: 17,
            led: 23,
            switch: 22,
        }
    }
}

impl PinMap {
    pub fn pin(&self, line: Line) -> u32 {
        match line {
            Line::Reward => self.reward,
            Line::Punisher => self.punisher,
            Line::Led => self.led,
            Line::Switch => self.switch,
        }
    }
}

/// Digital I/O through the kernel sysfs GPIO interface. The switch pull-up
/// must be configured outside this process (device tree or `raspi-gpio`).
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    pins: PinMap,
}

impl SysfsGpio {
    pub const DEFAULT_ROOT: &'static str = "/sys/class/gpio";

    pub fn open(pins: PinMap) -> Result<Self, HardwareFault> {
        Self::open_at(Self::DEFAULT_ROOT, pins)
    }

    /// Exports every pin under `root` and sets its direction.
    pub fn open_at(root: impl Into<PathBuf>, pins: PinMap) -> Result<Self, HardwareFault> {
        let gpio = Self {
            root: root.into(),
            pins,
        };
        for line in Line::OUTPUTS {
            gpio.export(line, "out")?;
        }
        gpio.export(Line::Switch, "in")?;
        Ok(gpio)
    }

    fn pin_dir(&self, line: Line) -> PathBuf {
        self.root.join(format!("gpio{}", self.pins.pin(line)))
    }

    fn export(&self, line: Line, direction: &str) -> Result<(), HardwareFault> {
        let dir = self.pin_dir(line);
        if !dir.exists() {
            write(line, &self.root.join("export"), &self.pins.pin(line).to_string())?;
        }
        write(line, &dir.join("direction"), direction)
    }
}

fn write(line: Line, path: &Path, value: &str) -> Result<(), HardwareFault> {
    fs::write(path, value).map_err(|source| HardwareFault::Io {
        line: line.name(),
        source,
    })
}

impl DigitalIo for SysfsGpio {
    fn set_output(&mut self, line: Line, level: Level) -> Result<(), HardwareFault> {
        let value = if level.is_high() { "1" } else { "0" };
        write(line, &self.pin_dir(line).join("value"), value)
    }

    fn read_input(&mut self, line: Line) -> Result<Level, HardwareFault> {
        let raw = fs::read_to_string(self.pin_dir(line).join("value"))
            .map_err(|source| HardwareFault::Io {
                line: line.name(),
                source,
            })?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(HardwareFault::Unavailable {
                line: line.name(),
                reason: format!("unexpected value {other:?}"),
            }),
        }
    }
}
