use booth_core::HardwareFault;
use serde::{Deserialize, Serialize};

/// The four digital lines of a booth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    Reward,
    Punisher,
    Led,
    Switch,
}

impl Line {
    pub const OUTPUTS: [Line; 3] = [Line::Reward, Line::Punisher, Line::Led];

    pub fn name(&self) -> &'static str {
        match self {
            Line::Reward => "reward",
            Line::Punisher => "punisher",
            Line::Led => "led",
            Line::Switch => "switch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn from_high(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Level::High)
    }
}

/// Raw digital I/O capability. Writes are fire-and-forget; an `Err` means the
/// backend is gone and the session must abort.
pub trait DigitalIo: Send {
    fn set_output(&mut self, line: Line, level: Level) -> Result<(), HardwareFault>;
    fn read_input(&mut self, line: Line) -> Result<Level, HardwareFault>;
}

impl<T: DigitalIo + ?Sized> DigitalIo for Box<T> {
    fn set_output(&mut self, line: Line, level: Level) -> Result<(), HardwareFault> {
        (**self).set_output(line, level)
    }

    fn read_input(&mut self, line: Line) -> Result<Level, HardwareFault> {
        (**self).read_input(line)
    }
}

/// Which lines are wired active-low. Defaults match the booth relay board:
/// reward and puffer relays pull low, the LED drives high, and the switch
/// reads 0 while the perch is engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinePolarity {
    pub reward_active_low: bool,
    pub punisher_active_low: bool,
    pub led_active_low: bool,
    pub switch_active_low: bool,
}

impl Default for LinePolarity {
    fn default() -> Self {
        Self {
            reward_active_low: true,
            punisher_active_low: true,
            led_active_low: false,
            switch_active_low: true,
        }
    }
}

impl LinePolarity {
    pub fn active_low(&self, line: Line) -> bool {
        match line {
            Line::Reward => self.reward_active_low,
            Line::Punisher => self.punisher_active_low,
            Line::Led => self.led_active_low,
            Line::Switch => self.switch_active_low,
        }
    }

    pub fn level_for(&self, line: Line, active: bool) -> Level {
        Level::from_high(active != self.active_low(line))
    }

    pub fn is_active(&self, line: Line, level: Level) -> bool {
        level.is_high() != self.active_low(line)
    }
}

/// Exclusive owner of the booth lines for one session. Dropping the handle
/// forces every actuator off; construction touches no line.
pub struct HardwareHandle<D: DigitalIo> {
    io: D,
    polarity: LinePolarity,
}

impl<D: DigitalIo> HardwareHandle<D> {
    pub fn new(io: D, polarity: LinePolarity) -> Self {
        Self { io, polarity }
    }

    pub fn polarity(&self) -> LinePolarity {
        self.polarity
    }

    pub fn set(&mut self, line: Line, active: bool) -> Result<(), HardwareFault> {
        let level = self.polarity.level_for(line, active);
        self.io.set_output(line, level)
    }

    pub fn reward(&mut self, on: bool) -> Result<(), HardwareFault> {
        self.set(Line::Reward, on)
    }

    pub fn punisher(&mut self, on: bool) -> Result<(), HardwareFault> {
        self.set(Line::Punisher, on)
    }

    pub fn led(&mut self, on: bool) -> Result<(), HardwareFault> {
        self.set(Line::Led, on)
    }

    pub fn switch_engaged(&mut self) -> Result<bool, HardwareFault> {
        let level = self.io.read_input(Line::Switch)?;
        Ok(self.polarity.is_active(Line::Switch, level))
    }

    /// Reward off, punisher off, LED off. Attempts every line even when one
    /// write fails and reports the first failure.
    pub fn idle(&mut self) -> Result<(), HardwareFault> {
        let mut first = None;
        for line in Line::OUTPUTS {
            if let Err(e) = self.set(line, false) {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<D: DigitalIo> Drop for HardwareHandle<D> {
    fn drop(&mut self) {
        if let Err(e) = self.idle() {
            tracing::error!("failed to idle booth hardware on release: {e}");
        }
    }
}
