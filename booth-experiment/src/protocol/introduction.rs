use booth_core::Result;
use booth_io::{DigitalIo, SoundPlayer};
use booth_timing::Timer;
use rand::Rng;
use tracing::debug;

use super::{IntroductionParams, session_length};
use crate::logger::{INTRODUCTION_HEADER, TrialLog, seconds};
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
    /// Habituation: a reward after every random ITI until `duration_s` has
    /// passed. The animal does nothing to earn it.
    pub(crate) fn run_introduction(
        &mut self,
        params: &IntroductionParams,
        timing: &TrialTiming,
        stream: &str,
    ) -> Result<()> {
        self.create_stream(stream, INTRODUCTION_HEADER)?;
        let duration = session_length(params.duration_s)?;

        let mut trial = 1usize;
        while self.elapsed() < duration {
            self.check_interrupt()?;
            self.wait_iti(timing)?;
            self.apply_reward(Some(timing.reward))?;
            let at = self.elapsed();
            self.append(stream, &[trial.to_string(), seconds(at)])?;
            self.summary.record_unscored(true);
            debug!(session = %self.id, trial, at_s = at.as_secs_f64(), "reward delivered");
            trial += 1;
        }
        Ok(())
    }
}
