mod app;
mod cli;
mod config;
mod session_id;

use std::time::Duration;

use anyhow::{Context, Result};
use booth_experiment::config::secs;
use booth_io::WavDirectoryCatalog;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, RunPlan};
use cli::{Cli, Commands};
use config::BoothConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(fmt::layer().with_target(false))
        .init();

    let config = BoothConfig::load_or_default(cli.config.as_deref())?;
    let app = App::new(config);
    app.install_interrupt_handler()?;

    match cli.command {
        Commands::SwitchTest { pecks } => app.switch_test(pecks)?,
        Commands::Calibrate { samples } => {
            app.calibrate(samples);
        }
        Commands::CheckSounds { sounds } => app.check_sounds(&sounds)?,
        Commands::CheckScene { go_dir, nogo_dir } => {
            app.check_scene(&go_dir, nogo_dir.as_deref())?
        }
        Commands::Run(args) => {
            let delay: Duration = secs("delay", args.delay).context("--delay")?;
            let timing = args.timing.overrides();
            let protocol = args.protocol.into_protocol(timing, &WavDirectoryCatalog)?;
            app.run(RunPlan {
                session_id: args.session_id,
                delay,
                repeat_daily: args.repeat_daily,
                seed: args.seed,
                protocol,
            })?;
        }
    }

    Ok(())
}
