mod common;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use booth_core::{BoothError, Category, ConfigError, Interrupt, PlaybackError, SceneAsset};
use booth_experiment::{
    ClassicalOperantParams, CsvTrialLog, GoNoGoParams, IntroductionParams, MemoryTrialLog,
    PlaybackPolicy, Protocol, SceneParams, Session, SessionConfig, ShapingParams,
    TimingOverrides, TrialLog, TwoPeckParams,
};
use booth_io::{
    HardwareHandle, Line, LinePolarity, SimulatedIo, SimulatedPlayer, SoundPlayer, SwitchScript,
};
use booth_timing::{ManualTimer, Timer};
use rand::SeedableRng;
use rand::rngs::StdRng;

use common::{CLIP, Booth, row, secs, session, session_with, trials};

fn go_nogo(probability: f64, duration_s: f64) -> Protocol {
    Protocol::GoNoGo(GoNoGoParams {
        probability,
        duration_s,
        ..Default::default()
    })
}

fn assert_idle(booth: &Booth) {
    for line in Line::OUTPUTS {
        assert_eq!(
            booth.recorder.last_level(line),
            Some(booth.polarity.level_for(line, false)),
            "{} left active",
            line.name()
        );
    }
}

#[test]
fn all_go_session_scores_three_hits() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(
        trials(&[1.0, 10.0, 18.5], Some(1.0)),
        SessionConfig::default(),
        log.clone(),
    );
    let summary = session.run(&go_nogo(1.0, 20.0)).unwrap();

    assert_eq!(
        log.rows("bird_go_nogo"),
        vec![
            row(&["1", "GO", "0.500", "1", "0", "0", "0", "1.500", "GO.wav"]),
            row(&["2", "GO", "0.500", "1", "0", "0", "0", "10.500", "GO.wav"]),
            row(&["3", "GO", "0.500", "1", "0", "0", "0", "19.000", "GO.wav"]),
        ]
    );
    assert_eq!(
        booth.recorder.active_intervals(Line::Reward, booth.polarity),
        vec![
            (secs(2.0), secs(8.0)),
            (secs(11.0), secs(17.0)),
            (secs(19.5), secs(25.5)),
        ]
    );
    assert_eq!((summary.trials, summary.hits, summary.rewards), (3, 3, 3));
    assert_eq!(summary.hit_rate(), Some(1.0));
    assert!((summary.elapsed_s - 26.5).abs() < 1e-9);
    assert_idle(&booth);
}

#[test]
fn all_nogo_session_punishes_false_alarms() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(
        trials(&[1.0, 21.0], Some(1.0)),
        SessionConfig::default(),
        log.clone(),
    );
    let summary = session.run(&go_nogo(0.0, 30.0)).unwrap();

    assert_eq!(
        log.rows("bird_go_nogo"),
        vec![
            row(&["1", "NOGO", "0.500", "0", "0", "0", "1", "1.500", "NOGO.wav"]),
            row(&["2", "NOGO", "0.500", "0", "0", "0", "1", "21.500", "NOGO.wav"]),
        ]
    );
    assert_eq!(
        booth.recorder.active_intervals(Line::Punisher, booth.polarity),
        vec![(secs(2.0), secs(3.0)), (secs(22.0), secs(23.0))]
    );
    assert!(booth.recorder.active_intervals(Line::Reward, booth.polarity).is_empty());
    assert_eq!(
        booth.plays.entries(),
        vec![
            (secs(1.0), PathBuf::from("NOGO.wav")),
            (secs(2.0), PathBuf::from("GNG_WN.wav")),
            (secs(21.0), PathBuf::from("NOGO.wav")),
            (secs(22.0), PathBuf::from("GNG_WN.wav")),
        ]
    );
    assert_eq!(summary.false_alarms, 2);
    assert_eq!(summary.false_alarm_rate(), Some(1.0));
}

#[test]
fn every_resolved_trial_writes_one_csv_row() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvTrialLog::new(dir.path());
    let (mut session, _booth) = session_with(
        trials(&[1.0, 26.0, 51.0, 76.0, 101.0], Some(1.0)),
        SessionConfig::default(),
        |player| player,
        log.clone(),
    );
    let summary = session.run(&go_nogo(0.5, 120.0)).unwrap();

    let text = fs::read_to_string(log.path("bird_go_nogo")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Trial_number,Trial_type,Response_time_s,Hit,Miss,Reject,False_alarm,Time_from_start,Stimulus"
    );
    assert_eq!(lines.len() - 1, 5);
    assert_eq!(summary.trials, 5);
    assert_eq!(summary.hits + summary.false_alarms, 5);
    for (i, line) in lines[1..].iter().enumerate() {
        assert!(line.starts_with(&format!("{},", i + 1)), "{line}");
    }
}

/// Raises the interrupt as soon as the first row is durable.
#[derive(Clone)]
struct InterruptAfterFirstRow {
    inner: MemoryTrialLog,
    interrupt: Interrupt,
}

impl TrialLog for InterruptAfterFirstRow {
    fn create_stream(&mut self, stream: &str, header: &[&str]) -> io::Result<()> {
        self.inner.create_stream(stream, header)
    }

    fn append_row(&mut self, stream: &str, fields: &[String]) -> io::Result<()> {
        self.inner.append_row(stream, fields)?;
        self.interrupt.trigger();
        Ok(())
    }
}

#[test]
fn interrupt_completes_the_reward_and_leaves_the_booth_idle() {
    let interrupt = Interrupt::new();
    let log = InterruptAfterFirstRow {
        inner: MemoryTrialLog::new(),
        interrupt: interrupt.clone(),
    };
    let (session, booth) = session_with(
        trials(&[1.0, 10.0], Some(1.0)),
        SessionConfig::default(),
        |player| player,
        log.clone(),
    );
    let mut session = session.with_interrupt(interrupt);

    let err = session.run(&go_nogo(1.0, 60.0)).unwrap_err();
    assert!(matches!(err, BoothError::Interrupted));
    assert_eq!(log.inner.rows("bird_go_nogo").len(), 1);
    assert_eq!(
        booth.recorder.active_intervals(Line::Reward, booth.polarity),
        vec![(secs(2.0), secs(8.0))]
    );
    assert_eq!(session.summary().trials, 1);
    assert_idle(&booth);
}

/// Stands in for aplay killed by the same Ctrl-C that raised the flag.
struct CutShortBySigint {
    inner: SimulatedPlayer,
    interrupt: Interrupt,
    on: PathBuf,
}

impl SoundPlayer for CutShortBySigint {
    fn play_blocking(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        if asset != self.on {
            return self.inner.play_blocking(asset);
        }
        self.interrupt.trigger();
        Err(PlaybackError::Corrupt {
            path: asset.to_path_buf(),
            reason: "aplay exited with signal: 2 (SIGINT)".into(),
        })
    }

    fn check(&mut self, asset: &Path) -> Result<(), PlaybackError> {
        self.inner.check(asset)
    }
}

fn sigint_session(
    script: SwitchScript,
    policy: PlaybackPolicy,
    on: &str,
    log: MemoryTrialLog,
) -> (
    Session<SimulatedIo, CutShortBySigint, ManualTimer, StdRng, MemoryTrialLog>,
    Booth,
) {
    let timer = ManualTimer::new();
    let io = SimulatedIo::new(timer.clone(), script);
    let recorder = io.recorder();
    let inner = SimulatedPlayer::new(timer.clone(), CLIP);
    let plays = inner.log();
    let interrupt = Interrupt::new();
    let player = CutShortBySigint {
        inner,
        interrupt: interrupt.clone(),
        on: PathBuf::from(on),
    };
    let polarity = LinePolarity::default();
    let config = SessionConfig {
        playback_policy: policy,
        ..Default::default()
    };
    let session = Session::new(
        "bird",
        config,
        HardwareHandle::new(io, polarity),
        player,
        timer.clone(),
        StdRng::seed_from_u64(17),
        log,
    )
    .unwrap()
    .with_interrupt(interrupt);
    let booth = Booth {
        timer,
        recorder,
        plays,
        polarity,
    };
    (session, booth)
}

#[test]
fn stimulus_cut_short_by_ctrl_c_is_an_interrupt() {
    for policy in [PlaybackPolicy::Abort, PlaybackPolicy::SkipTrial] {
        let log = MemoryTrialLog::new();
        let (mut session, booth) =
            sigint_session(trials(&[1.0], None), policy, "NOGO.wav", log.clone());
        let err = session.run(&go_nogo(0.0, 30.0)).unwrap_err();
        assert!(matches!(err, BoothError::Interrupted), "{policy:?}: {err}");
        assert_eq!(session.summary().skipped, 0);
        assert!(log.rows("bird_go_nogo").is_empty());
        assert_idle(&booth);
    }
}

#[test]
fn punishment_noise_cut_short_by_ctrl_c_is_an_interrupt() {
    for policy in [PlaybackPolicy::Abort, PlaybackPolicy::SkipTrial] {
        let log = MemoryTrialLog::new();
        let (mut session, booth) =
            sigint_session(trials(&[1.0], Some(1.0)), policy, "GNG_WN.wav", log.clone());
        let err = session.run(&go_nogo(0.0, 30.0)).unwrap_err();
        assert!(matches!(err, BoothError::Interrupted), "{policy:?}: {err}");
        assert_eq!(
            log.rows("bird_go_nogo"),
            vec![row(&["1", "NOGO", "0.500", "0", "0", "0", "1", "1.500", "NOGO.wav"])]
        );
        assert_eq!(
            booth.recorder.active_intervals(Line::Punisher, booth.polarity),
            vec![(secs(2.0), secs(3.0))]
        );
        assert_eq!(session.summary().false_alarms, 1);
        assert_idle(&booth);
    }
}

#[test]
fn malformed_protocol_is_rejected_before_any_io() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(
        SwitchScript::new(),
        SessionConfig::default(),
        log.clone(),
    );
    let err = session.run(&go_nogo(1.5, 60.0)).unwrap_err();
    assert!(matches!(err, BoothError::Config(ConfigError::Probability(p)) if p == 1.5));
    assert!(booth.recorder.events().is_empty());
    assert_eq!(booth.recorder.reads(), 0);
    assert!(log.streams().is_empty());
}

#[test]
fn malformed_session_config_never_activates_a_line() {
    let timer = ManualTimer::new();
    let io = SimulatedIo::new(timer.clone(), SwitchScript::new());
    let recorder = io.recorder();
    let polarity = LinePolarity::default();
    let config = SessionConfig {
        step_out_window_ms: 0,
        ..Default::default()
    };
    let err = Session::new(
        "bird",
        config,
        HardwareHandle::new(io, polarity),
        SimulatedPlayer::new(timer.clone(), CLIP),
        timer,
        StdRng::seed_from_u64(1),
        MemoryTrialLog::new(),
    )
    .err()
    .unwrap();
    assert_eq!(err, ConfigError::NonPositive("step_out_window_ms"));
    assert!(
        recorder
            .events()
            .iter()
            .all(|e| !polarity.is_active(e.line, e.level))
    );
}

#[test]
fn missing_stimulus_aborts_before_actuation_when_verified() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session_with(
        trials(&[1.0], Some(1.0)),
        SessionConfig::default(),
        |player| player.with_missing("GO.wav"),
        log.clone(),
    );
    let err = session.run(&go_nogo(1.0, 10.0)).unwrap_err();
    assert!(matches!(err, BoothError::Playback(PlaybackError::Missing(_))));
    assert!(booth.recorder.events().is_empty());
    assert!(log.streams().is_empty());
}

#[test]
fn playback_failure_mid_session_follows_policy() {
    for policy in [PlaybackPolicy::Abort, PlaybackPolicy::SkipTrial] {
        let log = MemoryTrialLog::new();
        let config = SessionConfig {
            verify_assets: false,
            playback_policy: policy,
            ..Default::default()
        };
        let (mut session, booth) = session_with(
            trials(&[1.0], None),
            config,
            |player| player.with_missing("GO.wav"),
            log.clone(),
        );
        let result = session.run(&go_nogo(1.0, 5.0));
        match policy {
            PlaybackPolicy::Abort => {
                assert!(matches!(result, Err(BoothError::Playback(_))));
            }
            PlaybackPolicy::SkipTrial => {
                let summary = result.unwrap();
                assert_eq!((summary.trials, summary.skipped), (0, 1));
                assert_eq!(booth.timer.now(), 5_000_000_000);
            }
        }
        assert!(log.rows("bird_go_nogo").is_empty());
        assert!(log.header("bird_go_nogo").is_some());
        assert_idle(&booth);
    }
}

#[test]
fn hardware_fault_aborts_the_session() {
    let log = MemoryTrialLog::new();
    let timer = ManualTimer::new();
    let io = SimulatedIo::new(timer.clone(), SwitchScript::new()).failing();
    let mut session = Session::new(
        "bird",
        SessionConfig::default(),
        HardwareHandle::new(io, LinePolarity::default()),
        SimulatedPlayer::new(timer.clone(), CLIP),
        timer,
        StdRng::seed_from_u64(1),
        log.clone(),
    )
    .unwrap();
    let err = session
        .run(&Protocol::Shaping(ShapingParams::default()))
        .unwrap_err();
    assert!(matches!(err, BoothError::Hardware(_)));
    assert!(log.streams().is_empty());
}

fn scene_assets(category: Category, prefix: &str) -> Vec<SceneAsset> {
    [-4, 5]
        .into_iter()
        .map(|snr| SceneAsset {
            path: PathBuf::from(format!("/stimuli/{prefix}/Song1Pk43({snr}){snr}snr.wav")),
            category,
            snr_db: Some(snr),
        })
        .collect()
}

fn scene(block_size: usize, trial_cap: Option<usize>, duration_s: f64) -> Protocol {
    Protocol::Scene(SceneParams {
        go_assets: scene_assets(Category::Go, "go"),
        nogo_assets: scene_assets(Category::NoGo, "nogo"),
        block_size,
        trial_cap,
        duration_s,
        ..Default::default()
    })
}

#[test]
fn scene_block_is_balanced_and_capped() {
    let log = MemoryTrialLog::new();
    let (mut session, _booth) = session(
        trials(&[1.0, 11.0, 21.0, 31.0, 41.0], None),
        SessionConfig::default(),
        log.clone(),
    );
    let summary = session.run(&scene(4, Some(4), 100.0)).unwrap();

    let rows = log.rows("bird_scene");
    assert_eq!(rows.len(), 4);
    assert_eq!(rows.iter().filter(|r| r[1] == "GO").count(), 2);
    for (r, elapsed) in rows.iter().zip(["1.500", "11.500", "21.500", "31.500"]) {
        assert!(r[2].starts_with("Song1Pk43("), "{r:?}");
        assert!(r[3] == "-4" || r[3] == "5");
        assert_eq!(r[4], "NA");
        let expected = if r[1] == "GO" { ["0", "1", "0", "0"] } else { ["0", "0", "1", "0"] };
        assert_eq!(r[5..9], expected);
        assert_eq!(r[9], elapsed);
    }
    assert_eq!((summary.misses, summary.rejects), (2, 2));
    assert_eq!(
        log.header("bird_scene").unwrap()[3],
        "Trial SNR/dB".to_string()
    );
}

#[test]
fn scene_blocks_regenerate_when_exhausted() {
    let log = MemoryTrialLog::new();
    let (mut session, _booth) = session(
        trials(&[1.0, 11.0, 21.0], None),
        SessionConfig::default(),
        log.clone(),
    );
    session.run(&scene(2, None, 35.0)).unwrap();
    let rows = log.rows("bird_scene");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[..2].iter().filter(|r| r[1] == "GO").count(), 1);
    assert_eq!(rows[2][0], "3");
}

#[test]
fn classical_phase_precedes_scored_operant_trials() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(
        trials(&[10.0, 20.0], Some(1.0)),
        SessionConfig::default(),
        log.clone(),
    );
    let protocol = Protocol::ClassicalOperant(ClassicalOperantParams {
        classical_probability: 0.5,
        operant_probability: 1.0,
        classical_trial_cap: 2,
        operant_trial_cap: 2,
        duration_s: 100.0,
        timing: TimingOverrides {
            iti_range_s: Some((1.0, 1.0)),
            reward_s: Some(2.0),
            ..Default::default()
        },
        ..Default::default()
    });
    let summary = session.run(&protocol).unwrap();

    let classical = log.rows("bird_goGO_nogoNOGO_prob50.0_classical_conditioning");
    assert_eq!(classical.len(), 2);
    assert_eq!(classical.iter().filter(|r| r[1] == "GO").count(), 1);
    assert_eq!(classical[0][2], "1.500");
    assert_eq!(classical[1][2], "5.000");
    assert_eq!(classical[0][3], format!("{}.wav", classical[0][1]));

    assert_eq!(
        log.rows("bird_goGO_nogoNOGO_prob100.0_operant_conditioning"),
        vec![
            row(&["1", "GO", "0.500", "1", "0", "0", "0", "10.500", "GO.wav"]),
            row(&["2", "GO", "0.500", "1", "0", "0", "0", "20.500", "GO.wav"]),
        ]
    );
    assert_eq!(
        booth.recorder.active_intervals(Line::Reward, booth.polarity).len(),
        3
    );
    assert_eq!((summary.trials, summary.rewards, summary.hits), (4, 3, 2));
}

fn skip_failed_plays() -> SessionConfig {
    SessionConfig {
        playback_policy: PlaybackPolicy::SkipTrial,
        ..Default::default()
    }
}

#[test]
fn skipped_scene_trial_keeps_the_block_balanced() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session_with(
        trials(&[1.0, 11.0, 21.0, 31.0, 41.0], None),
        skip_failed_plays(),
        |player| player.with_failures("/stimuli/go/Song1Pk43(-4)-4snr.wav", 1),
        log.clone(),
    );
    let summary = session.run(&scene(4, Some(4), 100.0)).unwrap();

    let rows = log.rows("bird_scene");
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows.iter().map(|r| r[0].as_str()).collect::<Vec<_>>(),
        ["1", "2", "3", "4"]
    );
    let mut go_snrs: Vec<&str> = rows
        .iter()
        .filter(|r| r[1] == "GO")
        .map(|r| r[3].as_str())
        .collect();
    go_snrs.sort_unstable();
    assert_eq!(go_snrs, ["-4", "5"]);
    assert_eq!((summary.trials, summary.skipped), (4, 1));
    assert_eq!(booth.plays.played().len(), 4);
}

#[test]
fn skipped_operant_trial_keeps_the_block_balanced() {
    let log = MemoryTrialLog::new();
    let (mut session, _booth) = session_with(
        trials(&[10.0, 20.0, 30.0, 40.0, 50.0], None),
        skip_failed_plays(),
        |player| player.with_failures("GO.wav", 1),
        log.clone(),
    );
    let protocol = Protocol::ClassicalOperant(ClassicalOperantParams {
        classical_probability: 0.0,
        operant_probability: 0.5,
        classical_trial_cap: 2,
        operant_trial_cap: 4,
        duration_s: 100.0,
        timing: TimingOverrides {
            iti_range_s: Some((1.0, 1.0)),
            reward_s: Some(2.0),
            ..Default::default()
        },
        ..Default::default()
    });
    let summary = session.run(&protocol).unwrap();

    assert_eq!(
        log.rows("bird_goGO_nogoNOGO_prob0.0_classical_conditioning").len(),
        2
    );
    let operant = log.rows("bird_goGO_nogoNOGO_prob50.0_operant_conditioning");
    assert_eq!(operant.len(), 4);
    assert_eq!(operant.iter().filter(|r| r[1] == "GO").count(), 2);
    assert_eq!(operant[3][0], "4");
    assert_eq!((summary.trials, summary.skipped), (6, 1));
}

#[test]
fn introduction_rewards_on_every_interval() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(SwitchScript::new(), SessionConfig::default(), log.clone());
    let protocol = Protocol::Introduction(IntroductionParams {
        duration_s: 10.0,
        timing: TimingOverrides {
            iti_range_s: Some((1.0, 1.0)),
            reward_s: Some(2.0),
            ..Default::default()
        },
    });
    session.run(&protocol).unwrap();
    assert_eq!(
        log.rows("bird_introduction"),
        vec![
            row(&["1", "3.000"]),
            row(&["2", "6.000"]),
            row(&["3", "9.000"]),
            row(&["4", "12.000"]),
        ]
    );
    assert_eq!(
        log.header("bird_introduction").unwrap(),
        row(&["Number_of_trials", "Time.from_start"])
    );
    assert_eq!(
        booth.recorder.active_intervals(Line::Reward, booth.polarity)[0],
        (secs(1.0), secs(3.0))
    );
}

#[test]
fn shaping_rewards_each_peck_until_time_runs_out() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(trials(&[1.0, 20.0], None), SessionConfig::default(), log.clone());
    let summary = session
        .run(&Protocol::Shaping(ShapingParams {
            duration_s: 15.0,
            ..Default::default()
        }))
        .unwrap();
    assert_eq!(log.rows("bird_shaping"), vec![row(&["1", "1.000"])]);
    assert_eq!(summary.rewards, 1);
    assert_eq!(booth.timer.now(), 15_000_000_000);
}

#[test]
fn two_peck_shaping_rewards_the_pair() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(
        SwitchScript::new().press(1.0, 0.1).press(5.0, 0.1),
        SessionConfig::default(),
        log.clone(),
    );
    session
        .run(&Protocol::ShapingTwoPecks(TwoPeckParams {
            duration_s: 20.0,
            ..Default::default()
        }))
        .unwrap();
    assert_eq!(
        log.rows("bird_shaping_two_pecks"),
        vec![row(&["1", "1.000", "5.000"])]
    );
    assert_eq!(
        booth.recorder.active_intervals(Line::Reward, booth.polarity),
        vec![(secs(5.0), secs(11.0))]
    );
}

#[test]
fn timed_shaping_requires_the_second_peck_in_the_window() {
    let log = MemoryTrialLog::new();
    let (mut session, booth) = session(
        SwitchScript::new()
            .press(1.0, 0.1)
            .press(3.5, 0.1)
            .press(20.0, 0.1),
        SessionConfig::default(),
        log.clone(),
    );
    let summary = session
        .run(&Protocol::ShapingTimed(TwoPeckParams {
            duration_s: 26.0,
            ..Default::default()
        }))
        .unwrap();
    assert_eq!(
        log.rows("bird_shaping_timed"),
        vec![
            row(&["1", "1.000", "3.500", "YES"]),
            row(&["2", "20.000", "NA", "NO"]),
        ]
    );
    assert_eq!((summary.trials, summary.rewards), (2, 1));
    assert_eq!(
        booth.recorder.active_intervals(Line::Reward, booth.polarity),
        vec![(secs(3.5), secs(9.5))]
    );
    assert_eq!(Duration::from_nanos(booth.timer.now()), secs(26.0));
}
