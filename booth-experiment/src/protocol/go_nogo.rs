use booth_core::{Category, Result, SoundStimulus};
use booth_io::{DigitalIo, SoundPlayer};
use booth_timing::Timer;
use rand::Rng;

use super::{GoNoGoParams, or_default, session_length};
use crate::logger::{RowFormat, TrialLog};
use crate::scheduler::IndependentDraw;
use crate::session::{Discrimination, Session};
use crate::trial::TrialTiming;

impl<D, S, T, R, L> Session<D, S, T, R, L>
where
    D: DigitalIo,
    S: SoundPlayer,
    T: Timer<Timestamp = u64>,
    R: Rng,
    L: TrialLog,
{
    /// Peck-initiated go/no-go with an independent draw per trial.
    pub(crate) fn run_go_nogo(
        &mut self,
        params: &GoNoGoParams,
        timing: &TrialTiming,
        stream: &str,
    ) -> Result<()> {
        self.create_stream(stream, RowFormat::GoNoGo.header())?;
        let duration = session_length(params.duration_s)?;
        let draw = IndependentDraw::new(params.probability)?;

        let sounds = &self.config.sounds;
        let go = SoundStimulus::new(Category::Go, or_default(&params.go_sound, &sounds.go));
        let nogo = SoundStimulus::new(Category::NoGo, or_default(&params.nogo_sound, &sounds.nogo));
        let noise = or_default(&params.noise, &sounds.white_noise);
        let plan = Discrimination {
            timing,
            punishment: params.punishment,
            noise: &noise,
            stream,
            format: RowFormat::GoNoGo,
        };

        let mut index = 1;
        loop {
            self.check_interrupt()?;
            let Some(remaining) = self.time_left(duration) else {
                break;
            };
            if self.await_peck(Some(remaining))?.is_none() {
                break;
            }
            let stimulus = match draw.draw(&mut self.rng) {
                Category::Go => &go,
                Category::NoGo => &nogo,
            };
            if self.discrimination_trial(&plan, index, stimulus)?.is_some() {
                index += 1;
            }
        }
        self.hardware.led(false)?;
        Ok(())
    }
}
