use booth_core::Result;
use booth_io::{DigitalIo, SoundPlayer};
use booth_timing::Timer;
use rand::Rng;
use tracing::debug;

use super::{ShapingParams, TwoPeckParams, session_length};
use crate::config::secs;
use crate::logger::{SHAPING_HEADER, TIMED_HEADER, TWO_PECKS_HEADER, TrialLog, seconds};
use crate::session::Session;
use crate::trial::TrialTiming;

impl<D, S, T, R, L> Session<D, S, T, R, L>
where
    D: DigitalIo,
    S: SoundPlayer,
    T: Timer<Timestamp = u64>,
    R: Rng,
    L: TrialLog,
{
    /// Every peck is rewarded, followed by a step-out and a null wait.
    pub(crate) fn run_shaping(
        &mut self,
        params: &ShapingParams,
        timing: &TrialTiming,
        stream: &str,
    ) -> Result<()> {
        self.create_stream(stream, SHAPING_HEADER)?;
        let duration = session_length(params.duration_s)?;

        let mut trial = 0usize;
        loop {
            self.check_interrupt()?;
            let Some(remaining) = self.time_left(duration) else {
                break;
            };
            if self.await_peck(Some(remaining))?.is_none() {
                break;
            }
            trial += 1;
            let at = self.elapsed();
            self.append(stream, &[trial.to_string(), seconds(at)])?;
            self.summary.record_unscored(true);
            debug!(session = %self.id, trial, at_s = at.as_secs_f64(), "peck rewarded");

            self.apply_reward(Some(timing.reward))?;
            self.apply_step_out_prompt()?;
            self.apply_null_time(Some(timing.null))?;
        }
        self.hardware.led(false)?;
        Ok(())
    }

    /// A first peck, a fixed gap, then a second peck at any time before the
    /// session ends. Only the pair is rewarded.
    pub(crate) fn run_shaping_two_pecks(
        &mut self,
        params: &TwoPeckParams,
        timing: &TrialTiming,
        stream: &str,
    ) -> Result<()> {
        self.create_stream(stream, TWO_PECKS_HEADER)?;
        let duration = session_length(params.duration_s)?;
        let gap = secs("gap_s", params.gap_s)?;

        let mut trial = 0usize;
        loop {
            self.check_interrupt()?;
            let Some(remaining) = self.time_left(duration) else {
                break;
            };
            if self.await_peck(Some(remaining))?.is_none() {
                break;
            }
            let first = self.elapsed();
            trial += 1;
            self.wait(gap)?;

            let remaining = self.time_left(duration).unwrap_or_default();
            if self.await_peck(Some(remaining))?.is_none() {
                self.append(stream, &[trial.to_string(), seconds(first), "NA".into()])?;
                self.summary.record_unscored(false);
                break;
            }
            let second = self.elapsed();
            self.append(stream, &[trial.to_string(), seconds(first), seconds(second)])?;
            self.summary.record_unscored(true);
            debug!(session = %self.id, trial, "second peck rewarded");

            self.apply_reward(Some(timing.reward))?;
            self.apply_step_out_prompt()?;
            self.apply_null_time(Some(timing.null))?;
        }
        self.hardware.led(false)?;
        Ok(())
    }

    /// As two-peck shaping, but the second peck must come within the response
    /// window to be rewarded.
    pub(crate) fn run_shaping_timed(
        &mut self,
        params: &TwoPeckParams,
        timing: &TrialTiming,
        stream: &str,
    ) -> Result<()> {
        self.create_stream(stream, TIMED_HEADER)?;
        let duration = session_length(params.duration_s)?;
        let gap = secs("gap_s", params.gap_s)?;

        let mut trial = 0usize;
        loop {
            self.check_interrupt()?;
            let Some(remaining) = self.time_left(duration) else {
                break;
            };
            if self.await_peck(Some(remaining))?.is_none() {
                break;
            }
            let first = self.elapsed();
            trial += 1;
            self.wait(gap)?;

            match self.await_peck(Some(timing.response_window))? {
                Some(_) => {
                    let second = self.elapsed();
                    self.append(
                        stream,
                        &[trial.to_string(), seconds(first), seconds(second), "YES".into()],
                    )?;
                    self.summary.record_unscored(true);
                    self.apply_reward(Some(timing.reward))?;
                    self.apply_step_out_prompt()?;
                    self.apply_null_time(Some(timing.null))?;
                }
                None => {
                    self.append(
                        stream,
                        &[trial.to_string(), seconds(first), "NA".into(), "NO".into()],
                    )?;
                    self.summary.record_unscored(false);
                    self.hardware.led(false)?;
                    self.apply_step_out_prompt()?;
                }
            }
            debug!(session = %self.id, trial, "timed pair resolved");
        }
        self.hardware.led(false)?;
        Ok(())
    }
}
