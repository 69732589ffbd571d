#![allow(dead_code)]

use std::time::Duration;

use booth_experiment::{MemoryTrialLog, Session, SessionConfig, TrialLog};
use booth_io::{
    HardwareHandle, IoRecorder, LinePolarity, PlayLog, SimulatedIo, SimulatedPlayer, SwitchScript,
};
use booth_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Every simulated sound lasts this long.
pub const CLIP: Duration = Duration::from_millis(500);

pub type SimSession<L = MemoryTrialLog> =
    Session<SimulatedIo, SimulatedPlayer, ManualTimer, StdRng, L>;

/// Handles kept by a test after the simulated booth moved into a session.
pub struct Booth {
    pub timer: ManualTimer,
    pub recorder: IoRecorder,
    pub plays: PlayLog,
    pub polarity: LinePolarity,
}

pub fn session(script: SwitchScript, config: SessionConfig, log: MemoryTrialLog) -> (SimSession, Booth) {
    session_with(script, config, |player| player, log)
}

pub fn session_with<L: TrialLog>(
    script: SwitchScript,
    config: SessionConfig,
    player: impl FnOnce(SimulatedPlayer) -> SimulatedPlayer,
    log: L,
) -> (SimSession<L>, Booth) {
    let timer = ManualTimer::new();
    let io = SimulatedIo::new(timer.clone(), script);
    let recorder = io.recorder();
    let player = player(SimulatedPlayer::new(timer.clone(), CLIP));
    let plays = player.log();
    let polarity = LinePolarity::default();
    let session = Session::new(
        "bird",
        config,
        HardwareHandle::new(io, polarity),
        player,
        timer.clone(),
        StdRng::seed_from_u64(17),
        log,
    )
    .unwrap();
    (
        session,
        Booth {
            timer,
            recorder,
            plays,
            polarity,
        },
    )
}

/// A 100 ms initiation press at each start, and optionally a response press
/// `respond_after` seconds later.
pub fn trials(starts: &[f64], respond_after: Option<f64>) -> SwitchScript {
    starts.iter().fold(SwitchScript::new(), |script, &start| {
        let script = script.press(start, 0.1);
        match respond_after {
            Some(after) => script.press(start + after, 0.1),
            None => script,
        }
    })
}

pub fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

pub fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
