use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use booth_core::{Category, SceneAsset};
use booth_experiment::{
    ClassicalOperantParams, GoNoGoParams, IntroductionParams, Protocol, Punishment, SceneParams,
    ShapingParams, TimingOverrides, TwoPeckParams,
};
use booth_io::AssetCatalog;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "booth")]
#[command(about = "Operant conditioning booth controller", long_about = None)]
pub struct Cli {
    /// Booth configuration (JSON); built-in defaults when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report every peck and flag a stuck switch, until Ctrl-C
    SwitchTest {
        /// Stop after this many pecks
        #[arg(long)]
        pecks: Option<usize>,
    },

    /// Measure how closely the poll interval is achieved
    Calibrate {
        #[arg(short, long, default_value_t = 1000)]
        samples: usize,
    },

    /// Verify sound files; the configured go, no-go and noise sounds by default
    CheckSounds { sounds: Vec<PathBuf> },

    /// List scene files with their SNR and verify each one
    CheckScene {
        go_dir: PathBuf,
        nogo_dir: Option<PathBuf>,
    },

    /// Run a protocol
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Subject and date, `subject_YYMMDD` for daily repetitions
    #[arg(long)]
    pub session_id: String,

    /// Seconds to wait before the first session starts
    #[arg(long, default_value_t = 0.0)]
    pub delay: f64,

    /// Rerun at the same time every day, rolling the date in the session id
    #[arg(long)]
    pub repeat_daily: bool,

    /// Seed for trial ordering; fresh entropy when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub timing: TimingArgs,

    #[command(subcommand)]
    pub protocol: ProtocolCommand,
}

/// Per-run timing overrides, in seconds. Ignored by `from-file`.
#[derive(Args, Default)]
pub struct TimingArgs {
    #[arg(long)]
    pub reward: Option<f64>,
    /// Air puff length
    #[arg(long)]
    pub punishment_time: Option<f64>,
    #[arg(long)]
    pub response_window: Option<f64>,
    #[arg(long)]
    pub null: Option<f64>,
    #[arg(long)]
    pub punishment_null: Option<f64>,
    /// Gap between stimulus end and the response window
    #[arg(long)]
    pub stimulus_delay: Option<f64>,
    #[arg(long, requires = "iti_max")]
    pub iti_min: Option<f64>,
    #[arg(long, requires = "iti_min")]
    pub iti_max: Option<f64>,
}

impl TimingArgs {
    pub fn overrides(&self) -> TimingOverrides {
        TimingOverrides {
            reward_s: self.reward,
            punishment_s: self.punishment_time,
            iti_range_s: self.iti_min.zip(self.iti_max),
            response_window_s: self.response_window,
            null_s: self.null,
            punishment_null_s: self.punishment_null,
            delay_s: self.stimulus_delay,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum PunishmentArg {
    AirPuff,
    #[default]
    AirPuffWithNoise,
    NoiseOnly,
}

impl From<PunishmentArg> for Punishment {
    fn from(arg: PunishmentArg) -> Self {
        match arg {
            PunishmentArg::AirPuff => Punishment::AirPuff,
            PunishmentArg::AirPuffWithNoise => Punishment::AirPuffWithNoise,
            PunishmentArg::NoiseOnly => Punishment::NoiseOnly,
        }
    }
}

#[derive(Subcommand)]
pub enum ProtocolCommand {
    /// Rewards on a random timer
    Introduction {
        #[arg(long, default_value_t = 14_400.0)]
        duration: f64,
    },

    /// Every peck is rewarded
    Shaping {
        #[arg(long, default_value_t = 14_400.0)]
        duration: f64,
    },

    /// Two pecks separated by a gap earn one reward
    ShapingTwoPecks {
        #[arg(long, default_value_t = 14_400.0)]
        duration: f64,
        #[arg(long, default_value_t = 2.0)]
        gap: f64,
    },

    /// Like shaping-two-pecks, with the second peck bounded by the response window
    ShapingTimed {
        #[arg(long, default_value_t = 14_400.0)]
        duration: f64,
        #[arg(long, default_value_t = 2.0)]
        gap: f64,
    },

    /// Go/no-go with an independent draw per trial
    GoNogo {
        #[arg(long)]
        go: Option<PathBuf>,
        #[arg(long)]
        nogo: Option<PathBuf>,
        #[arg(long)]
        noise: Option<PathBuf>,
        /// Chance of a go trial, 0-1
        #[arg(short, long, default_value_t = 0.5)]
        probability: f64,
        #[arg(long, default_value_t = 39_600.0)]
        duration: f64,
        #[arg(long, value_enum, default_value_t)]
        punishment: PunishmentArg,
    },

    /// Go/no-go over directories of scene files in stratified blocks
    Scene {
        go_dir: PathBuf,
        nogo_dir: Option<PathBuf>,
        #[arg(long)]
        noise: Option<PathBuf>,
        #[arg(long, default_value_t = 60)]
        block_size: usize,
        #[arg(short, long, default_value_t = 0.5)]
        probability: f64,
        #[arg(long, default_value_t = 14_400.0)]
        duration: f64,
        /// Stop after this many scored trials
        #[arg(long)]
        trial_cap: Option<usize>,
        #[arg(long, value_enum, default_value_t)]
        punishment: PunishmentArg,
    },

    /// Classical conditioning followed by operant go/no-go
    ClassicalOperant {
        #[arg(long)]
        go: Option<PathBuf>,
        #[arg(long)]
        nogo: Option<PathBuf>,
        #[arg(long)]
        noise: Option<PathBuf>,
        #[arg(long, default_value_t = 0.5)]
        classical_probability: f64,
        #[arg(long, default_value_t = 0.5)]
        operant_probability: f64,
        #[arg(long, default_value_t = 30)]
        classical_trials: usize,
        #[arg(long, default_value_t = 100)]
        operant_trials: usize,
        /// Bound on both phases together
        #[arg(long, default_value_t = 14_400.0)]
        duration: f64,
        #[arg(long, value_enum, default_value_t)]
        punishment: PunishmentArg,
    },

    /// Protocol described in a JSON file
    FromFile { path: PathBuf },
}

fn scene_assets(
    catalog: &impl AssetCatalog,
    dir: Option<&Path>,
    category: Category,
) -> Result<Vec<SceneAsset>> {
    match dir {
        Some(dir) => catalog
            .list(dir, category)
            .with_context(|| format!("listing scene files in {}", dir.display())),
        None => Ok(Vec::new()),
    }
}

impl ProtocolCommand {
    pub fn into_protocol(
        self,
        timing: TimingOverrides,
        catalog: &impl AssetCatalog,
    ) -> Result<Protocol> {
        let protocol = match self {
            ProtocolCommand::Introduction { duration } => {
                Protocol::Introduction(IntroductionParams {
                    duration_s: duration,
                    timing,
                })
            }
            ProtocolCommand::Shaping { duration } => Protocol::Shaping(ShapingParams {
                duration_s: duration,
                timing,
            }),
            ProtocolCommand::ShapingTwoPecks { duration, gap } => {
                Protocol::ShapingTwoPecks(TwoPeckParams {
                    duration_s: duration,
                    gap_s: gap,
                    timing,
                })
            }
            ProtocolCommand::ShapingTimed { duration, gap } => {
                Protocol::ShapingTimed(TwoPeckParams {
                    duration_s: duration,
                    gap_s: gap,
                    timing,
                })
            }
            ProtocolCommand::GoNogo {
                go,
                nogo,
                noise,
                probability,
                duration,
                punishment,
            } => Protocol::GoNoGo(GoNoGoParams {
                go_sound: go,
                nogo_sound: nogo,
                noise,
                probability,
                duration_s: duration,
                punishment: punishment.into(),
                timing,
            }),
            ProtocolCommand::Scene {
                go_dir,
                nogo_dir,
                noise,
                block_size,
                probability,
                duration,
                trial_cap,
                punishment,
            } => {
                let go_assets = scene_assets(catalog, Some(&go_dir), Category::Go)?;
                let nogo_assets = scene_assets(catalog, nogo_dir.as_deref(), Category::NoGo)?;
                if go_assets.is_empty() && nogo_assets.is_empty() {
                    bail!("no scene files in {}", go_dir.display());
                }
                Protocol::Scene(SceneParams {
                    go_assets,
                    nogo_assets,
                    noise,
                    block_size,
                    probability,
                    duration_s: duration,
                    trial_cap,
                    punishment: punishment.into(),
                    timing,
                })
            }
            ProtocolCommand::ClassicalOperant {
                go,
                nogo,
                noise,
                classical_probability,
                operant_probability,
                classical_trials,
                operant_trials,
                duration,
                punishment,
            } => Protocol::ClassicalOperant(ClassicalOperantParams {
                go_sound: go,
                nogo_sound: nogo,
                noise,
                classical_probability,
                operant_probability,
                classical_trial_cap: classical_trials,
                operant_trial_cap: operant_trials,
                duration_s: duration,
                punishment: punishment.into(),
                timing,
            }),
            ProtocolCommand::FromFile { path } => {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("reading protocol {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing protocol {}", path.display()))?
            }
        };
        Ok(protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io;

    struct FixedCatalog;

    impl AssetCatalog for FixedCatalog {
        fn list(&self, dir: &Path, category: Category) -> io::Result<Vec<SceneAsset>> {
            Ok(vec![SceneAsset {
                path: dir.join("Song1(-4)snr.wav"),
                category,
                snr_db: Some(-4),
            }])
        }
    }

    fn protocol(args: &[&str]) -> Protocol {
        let cli = Cli::try_parse_from(args).unwrap();
        let Commands::Run(run) = cli.command else {
            panic!("not a run command");
        };
        let timing = run.timing.overrides();
        run.protocol.into_protocol(timing, &FixedCatalog).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn go_nogo_flags_become_params() {
        let p = protocol(&[
            "booth", "run", "--session-id", "bird_240301", "--reward", "4",
            "go-nogo", "--go", "a.wav", "-p", "0.8", "--punishment", "noise-only",
        ]);
        let Protocol::GoNoGo(params) = p else {
            panic!("expected go/no-go");
        };
        assert_eq!(params.go_sound, Some(PathBuf::from("a.wav")));
        assert_eq!(params.nogo_sound, None);
        assert_eq!(params.probability, 0.8);
        assert_eq!(params.duration_s, 39_600.0);
        assert_eq!(params.punishment, Punishment::NoiseOnly);
        assert_eq!(params.timing.reward_s, Some(4.0));
        assert_eq!(params.timing.null_s, None);
    }

    #[test]
    fn scene_lists_both_directories() {
        let p = protocol(&[
            "booth", "run", "--session-id", "bird", "scene", "go", "nogo", "--trial-cap", "20",
        ]);
        let Protocol::Scene(params) = p else {
            panic!("expected scene");
        };
        assert_eq!(params.go_assets[0].category, Category::Go);
        assert_eq!(params.nogo_assets[0].path, PathBuf::from("nogo/Song1(-4)snr.wav"));
        assert_eq!(params.trial_cap, Some(20));
        assert_eq!(params.block_size, 60);
    }

    #[test]
    fn iti_bounds_come_in_pairs() {
        let run = |extra: &[&str]| {
            let mut args = vec!["booth", "run", "--session-id", "bird"];
            args.extend_from_slice(extra);
            args.push("shaping");
            Cli::try_parse_from(args)
        };
        assert!(run(&["--iti-min", "10"]).is_err());
        let cli = run(&["--iti-min", "10", "--iti-max", "20"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("not a run command");
        };
        assert_eq!(args.timing.overrides().iti_range_s, Some((10.0, 20.0)));
    }

    #[test]
    fn protocol_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, r#"{"protocol": "shaping_two_pecks", "gap_s": 3.0}"#).unwrap();
        let p = protocol(&["booth", "run", "--session-id", "bird", "from-file", path.to_str().unwrap()]);
        let Protocol::ShapingTwoPecks(params) = p else {
            panic!("expected two-peck shaping");
        };
        assert_eq!(params.gap_s, 3.0);
        assert_eq!(params.duration_s, 14_400.0);
    }
}
