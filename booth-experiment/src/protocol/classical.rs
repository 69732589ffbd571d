use std::path::Path;

use booth_core::{Category, ConditioningPhase, Result, SoundStimulus, Stimulus};
use booth_io::{DigitalIo, SoundPlayer};
use booth_timing::Timer;
use rand::Rng;
use tracing::{debug, info};

use super::{ClassicalOperantParams, or_default, session_length};
use crate::config::SessionConfig;
use crate::logger::{CLASSICAL_HEADER, RowFormat, TrialLog, seconds};
use crate::scheduler::StratifiedBlock;
use crate::session::{Discrimination, Session};
use crate::trial::TrialTiming;

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `{session}_go{stem}_nogo{stem}`, shared by both phase streams.
pub(super) fn stream_prefix(
    session_id: &str,
    params: &ClassicalOperantParams,
    config: &SessionConfig,
) -> String {
    let go = or_default(&params.go_sound, &config.sounds.go);
    let nogo = or_default(&params.nogo_sound, &config.sounds.nogo);
    format!("{session_id}_go{}_nogo{}", stem(&go), stem(&nogo))
}

/// Sounds and streams shared by both conditioning phases.
struct Transfer<'a> {
    params: &'a ClassicalOperantParams,
    timing: &'a TrialTiming,
    go: SoundStimulus,
    nogo: SoundStimulus,
    prefix: String,
}

impl Transfer<'_> {
    fn stimulus(&self, category: Category) -> &SoundStimulus {
        match category {
            Category::Go => &self.go,
            Category::NoGo => &self.nogo,
        }
    }

    fn probability(&self, phase: ConditioningPhase) -> f64 {
        match phase {
            ConditioningPhase::Classical => self.params.classical_probability,
            ConditioningPhase::Operant => self.params.operant_probability,
        }
    }

    fn trial_cap(&self, phase: ConditioningPhase) -> usize {
        match phase {
            ConditioningPhase::Classical => self.params.classical_trial_cap,
            ConditioningPhase::Operant => self.params.operant_trial_cap,
        }
    }

    /// `{session}_go{stem}_nogo{stem}_prob{percent}_{phase}`.
    fn stream(&self, phase: ConditioningPhase) -> String {
        format!(
            "{}_prob{:.1}_{}",
            self.prefix,
            self.probability(phase) * 100.0,
            phase.stream_suffix()
        )
    }
}

impl<D, S, T, R, L> Session<D, S, T, R, L>
where
    D: DigitalIo,
    S: SoundPlayer,
    T: Timer<Timestamp = u64>,
    R: Rng,
    L: TrialLog,
{
    /// Classical pre-exposure followed by operant testing. Each phase draws
    /// one stratified block sized by its trial cap; `duration_s` bounds both
    /// phases together.
    pub(crate) fn run_classical_operant(
        &mut self,
        params: &ClassicalOperantParams,
        timing: &TrialTiming,
        prefix: &str,
    ) -> Result<()> {
        let sounds = &self.config.sounds;
        let go = or_default(&params.go_sound, &sounds.go);
        let nogo = or_default(&params.nogo_sound, &sounds.nogo);
        let transfer = Transfer {
            params,
            timing,
            prefix: prefix.to_string(),
            go: SoundStimulus::new(Category::Go, go),
            nogo: SoundStimulus::new(Category::NoGo, nogo),
        };
        let classical = ConditioningPhase::default();
        let mut phase = Some(classical);
        while let Some(current) = phase {
            self.create_stream(&transfer.stream(current), phase_header(current))?;
            phase = current.next();
        }

        let duration = session_length(params.duration_s)?;
        let mut phase = Some(classical);
        while let Some(current) = phase {
            info!(session = %self.id, phase = ?current, "conditioning phase");
            let mut block = StratifiedBlock::go_nogo(
                transfer.trial_cap(current),
                transfer.probability(current),
                &mut self.rng,
            )?;
            let finished = if current.allows_input() {
                self.operant_phase(&transfer, &mut block, duration)?
            } else {
                self.classical_phase(&transfer, &mut block, duration)?
            };
            if !finished {
                break;
            }
            phase = current.next();
        }
        self.hardware.led(false)?;
        Ok(())
    }

    /// Timer-driven trials: go is always rewarded, no-go is followed by an
    /// equally long pause. Returns `false` when the session ran out of time.
    fn classical_phase(
        &mut self,
        transfer: &Transfer<'_>,
        block: &mut StratifiedBlock<Category>,
        duration: std::time::Duration,
    ) -> Result<bool> {
        let stream = transfer.stream(ConditioningPhase::Classical);
        let timing = transfer.timing;
        let mut index = 1;
        while let Some(&category) = block.peek() {
            self.check_interrupt()?;
            if self.time_left(duration).is_none() {
                return Ok(false);
            }
            self.wait_iti(timing)?;
            let stimulus = transfer.stimulus(category);
            if !self.present(stimulus.asset())? {
                continue;
            }
            let at = self.elapsed();
            self.append(
                &stream,
                &[
                    index.to_string(),
                    category.label().to_string(),
                    seconds(at),
                    stimulus.identifier(),
                ],
            )?;
            debug!(session = %self.id, index, ?category, "classical trial");
            match category {
                Category::Go => {
                    self.summary.record_unscored(true);
                    self.apply_reward(Some(timing.reward))?;
                }
                Category::NoGo => {
                    self.summary.record_unscored(false);
                    self.wait(timing.reward)?;
                }
            }
            block.commit();
            index += 1;
        }
        Ok(true)
    }

    /// Peck-initiated, scored trials in the order of `block`.
    fn operant_phase(
        &mut self,
        transfer: &Transfer<'_>,
        block: &mut StratifiedBlock<Category>,
        duration: std::time::Duration,
    ) -> Result<bool> {
        let stream = transfer.stream(ConditioningPhase::Operant);
        let noise = or_default(&transfer.params.noise, &self.config.sounds.white_noise);
        let plan = Discrimination {
            timing: transfer.timing,
            punishment: transfer.params.punishment,
            noise: &noise,
            stream: &stream,
            format: RowFormat::GoNoGo,
        };
        let mut index = 1;
        while let Some(&category) = block.peek() {
            self.check_interrupt()?;
            let Some(remaining) = self.time_left(duration) else {
                return Ok(false);
            };
            if self.await_peck(Some(remaining))?.is_none() {
                return Ok(false);
            }
            if self
                .discrimination_trial(&plan, index, transfer.stimulus(category))?
                .is_some()
            {
                block.commit();
                index += 1;
            }
        }
        Ok(true)
    }
}

fn phase_header(phase: ConditioningPhase) -> &'static [&'static str] {
    if phase.allows_input() {
        RowFormat::GoNoGo.header()
    } else {
        CLASSICAL_HEADER
    }
}
