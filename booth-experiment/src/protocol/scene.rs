use booth_core::Result;
use booth_io::{DigitalIo, SoundPlayer};
use booth_timing::Timer;
use rand::Rng;
use tracing::debug;

use super::{SceneParams, or_default, session_length};
use crate::logger::{RowFormat, TrialLog};
use crate::scheduler::scene_block;
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
    /// Go/no-go over a catalogue of SNR-tagged scenes, presented in stratified
    /// blocks. A fresh permutation is drawn whenever a block runs out.
    pub(crate) fn run_scene(
        &mut self,
        params: &SceneParams,
        timing: &TrialTiming,
        stream: &str,
    ) -> Result<()> {
        self.create_stream(stream, RowFormat::Scene.header())?;
        let duration = session_length(params.duration_s)?;
        let mut block = scene_block(
            &params.go_assets,
            &params.nogo_assets,
            params.block_size,
            params.probability,
            &mut self.rng,
        )?;

        let noise = or_default(&params.noise, &self.config.sounds.white_noise);
        let plan = Discrimination {
            timing,
            punishment: params.punishment,
            noise: &noise,
            stream,
            format: RowFormat::Scene,
        };

        let mut index = 1;
        let mut blocks = 1;
        loop {
            self.check_interrupt()?;
            if params.trial_cap.is_some_and(|cap| index > cap) {
                break;
            }
            let Some(remaining) = self.time_left(duration) else {
                break;
            };
            if block.is_exhausted() {
                block.regenerate(&mut self.rng);
                blocks += 1;
                debug!(session = %self.id, blocks, "new stimulus block");
            }
            if self.await_peck(Some(remaining))?.is_none() {
                break;
            }
            let Some(asset) = block.peek().cloned() else {
                break;
            };
            if self.discrimination_trial(&plan, index, &asset)?.is_some() {
                block.commit();
                index += 1;
            }
        }
        self.hardware.led(false)?;
        Ok(())
    }
}
