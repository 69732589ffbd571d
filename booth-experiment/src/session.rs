//! A booth session: exclusive owner of the hardware for one protocol run, and
//! the polling and consequence primitives every protocol is built from.

use std::path::Path;
use std::time::Duration;

use booth_core::{
    BoothError, ConfigError, Interrupt, Outcome, PlaybackError, Result, SessionSummary, Stimulus,
    TrialRecord,
};
use booth_io::{DigitalIo, HardwareHandle, SoundPlayer};
use booth_timing::Timer;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{PlaybackPolicy, Punishment, SessionConfig};
use crate::logger::{RowFormat, TrialLog};
use crate::protocol::Protocol;
use crate::trial::TrialTiming;

/// How long the switch may stay engaged after a peck before the switch test
/// reports it as stuck.
const STUCK_CHECK: Duration = Duration::from_millis(50);

pub struct Session<D, S, T, R, L>
where
    D: DigitalIo,
    S: SoundPlayer,
    T: Timer<Timestamp = u64>,
    R: Rng,
    L: TrialLog,
{
    pub(crate) id: String,
    pub(crate) config: SessionConfig,
    pub(crate) defaults: TrialTiming,
    pub(crate) hardware: HardwareHandle<D>,
    pub(crate) player: S,
    pub(crate) timer: T,
    pub(crate) rng: R,
    pub(crate) log: L,
    pub(crate) interrupt: Interrupt,
    pub(crate) started_at: u64,
    pub(crate) summary: SessionSummary,
}

/// Everything a scored trial needs besides its stimulus.
pub(crate) struct Discrimination<'a> {
    pub timing: &'a TrialTiming,
    pub punishment: Punishment,
    pub noise: &'a Path,
    pub stream: &'a str,
    pub format: RowFormat,
}

impl<D, S, T, R, L> Session<D, S, T, R, L>
where
    D: DigitalIo,
    S: SoundPlayer,
    T: Timer<Timestamp = u64>,
    R: Rng,
    L: TrialLog,
{
    /// Validates `config` before anything else; no line is driven here.
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        hardware: HardwareHandle<D>,
        player: S,
        timer: T,
        rng: R,
        log: L,
    ) -> std::result::Result<Self, ConfigError> {
        let defaults = config.validate()?;
        let started_at = timer.now();
        Ok(Self {
            id: id.into(),
            config,
            defaults,
            hardware,
            player,
            timer,
            rng,
            log,
            interrupt: Interrupt::new(),
            started_at,
            summary: SessionSummary::default(),
        })
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Tallies of the current or most recent run, including an interrupted one.
    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Time since the current run started.
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed(self.started_at)
    }

    /// Time left before `duration`, or `None` once it has passed.
    pub(crate) fn time_left(&self, duration: Duration) -> Option<Duration> {
        duration.checked_sub(self.elapsed()).filter(|d| !d.is_zero())
    }

    /// Runs `protocol` to completion. Parameters and assets are checked before
    /// any line is driven or stream created; the hardware is idle on every
    /// exit path.
    pub fn run(&mut self, protocol: &Protocol) -> Result<SessionSummary> {
        let timing = protocol.validate(&self.config)?;
        if self.config.verify_assets {
            for asset in protocol.assets(&self.config) {
                self.player.check(&asset)?;
            }
        }

        info!(session = %self.id, protocol = protocol.name(), "starting protocol");
        self.summary = SessionSummary::default();
        self.started_at = self.timer.now();

        let result = self
            .hardware
            .idle()
            .map_err(BoothError::from)
            .and_then(|()| self.dispatch(protocol, &timing));
        let released = self.hardware.idle();
        self.summary.elapsed_s = self.elapsed().as_secs_f64();

        match &result {
            Ok(()) => info!(
                session = %self.id,
                protocol = protocol.name(),
                trials = self.summary.trials,
                rewards = self.summary.rewards,
                elapsed_s = self.summary.elapsed_s,
                "protocol finished"
            ),
            Err(BoothError::Interrupted) => warn!(
                session = %self.id,
                trials = self.summary.trials,
                "protocol interrupted"
            ),
            Err(e) => warn!(session = %self.id, "protocol aborted: {e}"),
        }
        result?;
        released?;
        Ok(self.summary.clone())
    }

    fn dispatch(&mut self, protocol: &Protocol, timing: &TrialTiming) -> Result<()> {
        let stream = self.stream(protocol);
        match protocol {
            Protocol::Introduction(p) => self.run_introduction(p, timing, &stream),
            Protocol::Shaping(p) => self.run_shaping(p, timing, &stream),
            Protocol::ShapingTwoPecks(p) => self.run_shaping_two_pecks(p, timing, &stream),
            Protocol::ShapingTimed(p) => self.run_shaping_timed(p, timing, &stream),
            Protocol::GoNoGo(p) => self.run_go_nogo(p, timing, &stream),
            Protocol::Scene(p) => self.run_scene(p, timing, &stream),
            Protocol::ClassicalOperant(p) => self.run_classical_operant(p, timing, &stream),
        }
    }

    /// Log stream of `protocol` in this session; the classical-to-operant
    /// phases append their own suffixes to it.
    pub fn stream(&self, protocol: &Protocol) -> String {
        protocol.stream(&self.id, &self.config)
    }

    pub(crate) fn check_interrupt(&self) -> Result<()> {
        if self.interrupt.is_triggered() {
            Err(BoothError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Polls the switch until it reads engaged or `deadline` passes. `None`
    /// waits forever. Leaves the LED alone.
    fn poll_switch(&mut self, deadline: Option<Duration>) -> Result<Option<Duration>> {
        if deadline == Some(Duration::ZERO) {
            return Ok(None);
        }
        let poll = self.config.poll_interval();
        let start = self.timer.now();
        loop {
            let waited = self.timer.elapsed(start);
            if deadline.is_some_and(|d| waited >= d) {
                return Ok(None);
            }
            if self.hardware.switch_engaged()? {
                return Ok(Some(waited));
            }
            self.check_interrupt()?;
            let nap = deadline.map_or(poll, |d| poll.min(d - waited));
            self.timer.sleep(nap);
        }
    }

    /// Lights the cue LED and waits for a peck. Returns the time from the call
    /// to the peck, or `None` when `deadline` passed first. A zero deadline
    /// returns `None` without touching any line.
    pub fn await_peck(&mut self, deadline: Option<Duration>) -> Result<Option<Duration>> {
        if deadline == Some(Duration::ZERO) {
            return Ok(None);
        }
        self.hardware.led(true)?;
        self.poll_switch(deadline)
    }

    /// Blocks until the switch stays free for a whole step-out window.
    pub fn apply_step_out_prompt(&mut self) -> Result<()> {
        let window = self.config.step_out_window();
        while self.poll_switch(Some(window))?.is_some() {
            self.hardware.led(false)?;
            self.check_interrupt()?;
            self.timer.sleep(self.config.poll_interval());
        }
        Ok(())
    }

    /// Interruptible wait with no actuator engaged.
    pub(crate) fn wait(&mut self, d: Duration) -> Result<()> {
        let slice = self.config.interrupt_check();
        let start = self.timer.now();
        loop {
            self.check_interrupt()?;
            let waited = self.timer.elapsed(start);
            if waited >= d {
                return Ok(());
            }
            self.timer.sleep(slice.min(d - waited));
        }
    }

    /// Random inter-trial interval drawn from `timing.iti`.
    pub(crate) fn wait_iti(&mut self, timing: &TrialTiming) -> Result<()> {
        let (lo, hi) = timing.iti;
        let iti = if lo < hi {
            Duration::from_secs_f64(self.rng.random_range(lo.as_secs_f64()..=hi.as_secs_f64()))
        } else {
            lo
        };
        self.wait(iti)
    }

    /// Reward on for `duration` (session default when `None`). Never cut short.
    pub fn apply_reward(&mut self, duration: Option<Duration>) -> Result<()> {
        let duration = duration.unwrap_or(self.defaults.reward);
        self.hardware.led(false)?;
        self.hardware.reward(true)?;
        self.timer.sleep(duration);
        self.hardware.reward(false)?;
        Ok(())
    }

    /// Air puff for `duration` measured from activation. With `noise`, the
    /// noise plays while the puffer is held and the puffer is released once
    /// both are done. A playback failure is reported after the puffer is off.
    pub fn apply_punishment(&mut self, duration: Option<Duration>, noise: Option<&Path>) -> Result<()> {
        let duration = duration.unwrap_or(self.defaults.punishment);
        self.hardware.led(false)?;
        let start = self.timer.now();
        self.hardware.punisher(true)?;
        let played = noise.map_or(Ok(()), |n| self.player.play_blocking(n));
        let held = self.timer.elapsed(start);
        if held < duration {
            self.timer.sleep(duration - held);
        }
        self.hardware.punisher(false)?;
        played.map_err(|e| self.playback_error(e))
    }

    /// Puffer held until the animal leaves the switch. Not a scored punishment.
    pub fn apply_step_out_punishment(&mut self) -> Result<()> {
        self.hardware.punisher(true)?;
        let stepped_out = self.apply_step_out_prompt();
        self.hardware.punisher(false)?;
        stepped_out
    }

    /// Darkness and white noise, then `duration` of stillness. The puffer never
    /// fires.
    pub fn apply_sleep_punishment(&mut self, duration: Option<Duration>, noise: &Path) -> Result<()> {
        let duration = duration.unwrap_or(self.defaults.punishment);
        self.hardware.led(false)?;
        let played = self.player.play_blocking(noise);
        self.timer.sleep(duration);
        played.map_err(|e| self.playback_error(e))
    }

    /// LED off, then wait `duration` (session null time when `None`).
    pub fn apply_null_time(&mut self, duration: Option<Duration>) -> Result<()> {
        let duration = duration.unwrap_or(self.defaults.null);
        self.hardware.led(false)?;
        self.wait(duration)
    }

    pub(crate) fn punish(&mut self, punishment: Punishment, duration: Duration, noise: &Path) -> Result<()> {
        match punishment {
            Punishment::AirPuff => self.apply_punishment(Some(duration), None),
            Punishment::AirPuffWithNoise => self.apply_punishment(Some(duration), Some(noise)),
            Punishment::NoiseOnly => self.apply_sleep_punishment(Some(duration), noise),
        }
    }

    /// A clip cut short by Ctrl-C is an interrupt, not a bad asset.
    fn playback_error(&self, e: PlaybackError) -> BoothError {
        if self.interrupt.is_triggered() {
            BoothError::Interrupted
        } else {
            e.into()
        }
    }

    /// Playback failures inside a consequence are forgiven under
    /// [`PlaybackPolicy::SkipTrial`]; the trial has already been scored.
    fn tolerate_playback(&self, result: Result<()>) -> Result<()> {
        match (result, self.config.playback_policy) {
            (Err(BoothError::Playback(e)), PlaybackPolicy::SkipTrial) => {
                warn!(session = %self.id, "consequence sound failed: {e}");
                Ok(())
            }
            (result, _) => result,
        }
    }

    /// Plays a trial stimulus. `Ok(false)` means the trial was dropped under
    /// [`PlaybackPolicy::SkipTrial`]: nothing is scored and the caller moves
    /// on to the next initiation.
    pub(crate) fn present(&mut self, asset: &Path) -> Result<bool> {
        let Err(e) = self.player.play_blocking(asset) else {
            return Ok(true);
        };
        self.check_interrupt()?;
        match self.config.playback_policy {
            PlaybackPolicy::Abort => Err(e.into()),
            PlaybackPolicy::SkipTrial => {
                warn!(session = %self.id, "skipping trial: {e}");
                self.summary.skipped += 1;
                self.hardware.led(false)?;
                Ok(false)
            }
        }
    }

    pub(crate) fn create_stream(&mut self, stream: &str, header: &[&str]) -> Result<()> {
        self.log
            .create_stream(stream, header)
            .map_err(|source| BoothError::Log {
                stream: stream.to_string(),
                source,
            })
    }

    pub(crate) fn append(&mut self, stream: &str, fields: &[String]) -> Result<()> {
        self.log
            .append_row(stream, fields)
            .map_err(|source| BoothError::Log {
                stream: stream.to_string(),
                source,
            })
    }

    /// One peck-initiated, scored trial after initiation: stimulus, optional
    /// delay, response window, row, consequence, step-out. Returns `None` when
    /// the stimulus failed and the trial was skipped.
    pub(crate) fn discrimination_trial<St: Stimulus>(
        &mut self,
        plan: &Discrimination<'_>,
        index: usize,
        stimulus: &St,
    ) -> Result<Option<TrialRecord>> {
        if !self.present(stimulus.asset())? {
            self.apply_step_out_prompt()?;
            return Ok(None);
        }
        self.wait(plan.timing.delay)?;

        let elapsed = self.elapsed();
        let latency = self.await_peck(Some(plan.timing.response_window))?;
        let outcome = Outcome::classify(stimulus.category(), latency.is_some());
        let record = TrialRecord {
            index,
            category: stimulus.category(),
            latency,
            outcome,
            elapsed,
            stimulus: stimulus.identifier(),
            snr_db: stimulus.snr_db(),
        };
        self.append(plan.stream, &plan.format.fields(&record))?;
        self.summary.record(&record);
        debug!(session = %self.id, index, ?outcome, ?latency, "trial scored");

        match outcome {
            Outcome::Hit => self.apply_reward(Some(plan.timing.reward))?,
            Outcome::Miss | Outcome::Reject => self.apply_null_time(Some(plan.timing.null))?,
            Outcome::FalseAlarm => {
                let punished = self.punish(plan.punishment, plan.timing.punishment, plan.noise);
                self.tolerate_playback(punished)?;
                self.wait(plan.timing.punishment_null)?;
            }
        }
        self.apply_step_out_prompt()?;
        Ok(Some(record))
    }

    /// Switch diagnostic: waits for pecks, warns when the switch is still
    /// engaged shortly after one, and requires a step-out in between. Runs
    /// until `max_pecks` pecks or an interrupt; returns the pecks seen.
    pub fn switch_test(&mut self, max_pecks: Option<usize>) -> Result<usize> {
        self.hardware.idle()?;
        let mut pecks = 0;
        let result = self.count_pecks(max_pecks, &mut pecks);
        self.hardware.idle()?;
        result.map(|()| pecks)
    }

    fn count_pecks(&mut self, max_pecks: Option<usize>, pecks: &mut usize) -> Result<()> {
        while max_pecks.is_none_or(|max| *pecks < max) {
            info!("switch free, waiting for a peck");
            self.await_peck(None)?;
            *pecks += 1;
            self.timer.sleep(STUCK_CHECK);
            if self.hardware.switch_engaged()? {
                warn!(pecks = *pecks, "switch still engaged after {STUCK_CHECK:?}, stuck?");
            } else {
                info!(pecks = *pecks, "peck");
            }
            self.hardware.led(false)?;
            self.apply_step_out_prompt()?;
        }
        Ok(())
    }
}
