use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use booth_core::{BoothError, Category, Interrupt, SessionSummary};
use booth_experiment::{CsvTrialLog, Protocol, Session};
use booth_io::{
    AssetCatalog, DigitalIo, HardwareHandle, SimulatedIo, SimulatedPlayer, SoundPlayer,
    SwitchScript, SysfsGpio, WavDirectoryCatalog, verify_wav,
};
use booth_timing::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer, calibrate};
use chrono::Local;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::config::{Backend, BoothConfig};
use crate::session_id::next_session_id;

const DAY: Duration = Duration::from_secs(86_400);
/// Clip length assumed by the simulated player.
const DRY_RUN_CLIP: Duration = Duration::from_millis(500);

/// The real clock on hardware, a manual one for dry runs.
#[derive(Debug, Clone)]
pub enum Clock {
    Real(HighPrecisionTimer),
    Manual(ManualTimer),
}

impl Timer for Clock {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        match self {
            Clock::Real(t) => t.now(),
            Clock::Manual(t) => t.now(),
        }
    }
    fn elapsed(&self, ts: u64) -> Duration {
        match self {
            Clock::Real(t) => t.elapsed(ts),
            Clock::Manual(t) => t.elapsed(ts),
        }
    }
    fn sleep(&self, d: Duration) {
        match self {
            Clock::Real(t) => t.sleep(d),
            Clock::Manual(t) => t.sleep(d),
        }
    }
}

type BoothSession =
    Session<Box<dyn DigitalIo>, Box<dyn SoundPlayer>, Clock, StdRng, CsvTrialLog>;

/// One `run` invocation.
pub struct RunPlan {
    pub session_id: String,
    pub delay: Duration,
    pub repeat_daily: bool,
    pub seed: Option<u64>,
    pub protocol: Protocol,
}

pub struct App {
    config: BoothConfig,
    clock: Clock,
    interrupt: Interrupt,
}

impl App {
    pub fn new(config: BoothConfig) -> Self {
        let clock = match config.backend {
            Backend::Sysfs => Clock::Real(HighPrecisionTimer::new()),
            Backend::Simulated => Clock::Manual(ManualTimer::new()),
        };
        Self {
            config,
            clock,
            interrupt: Interrupt::new(),
        }
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Routes Ctrl-C to the session interrupt. Holds in progress finish first.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let interrupt = self.interrupt();
        ctrlc::set_handler(move || {
            interrupt.trigger();
        })
        .context("failed to set Ctrl-C handler")
    }

    fn open_hardware(&self) -> Result<HardwareHandle<Box<dyn DigitalIo>>> {
        let io: Box<dyn DigitalIo> = match (&self.config.backend, &self.clock) {
            (Backend::Simulated, Clock::Manual(timer)) => {
                Box::new(SimulatedIo::new(timer.clone(), SwitchScript::new()))
            }
            _ => Box::new(SysfsGpio::open(self.config.pins).context("opening GPIO lines")?),
        };
        Ok(HardwareHandle::new(io, self.config.polarity))
    }

    fn player(&self) -> Box<dyn SoundPlayer> {
        match &self.clock {
            Clock::Manual(timer) => Box::new(SimulatedPlayer::new(timer.clone(), DRY_RUN_CLIP)),
            Clock::Real(_) => Box::new(self.config.player.player()),
        }
    }

    fn session(&self, id: &str, seed: Option<u64>) -> Result<BoothSession> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let session = Session::new(
            id,
            self.config.session.clone(),
            self.open_hardware()?,
            self.player(),
            self.clock.clone(),
            rng,
            CsvTrialLog::new(&self.config.log_dir),
        )?;
        Ok(session.with_interrupt(self.interrupt.clone()))
    }

    pub fn switch_test(&self, pecks: Option<usize>) -> Result<()> {
        let mut session = self.session("switch_test", None)?;
        info!("switch test running, Ctrl-C to stop");
        match session.switch_test(pecks) {
            Ok(n) => info!(pecks = n, "switch test finished"),
            Err(BoothError::Interrupted) => info!("switch test stopped"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Always measured on the real clock.
    pub fn calibrate(&self, samples: usize) -> CalibrationStats {
        let interval = self.config.session.poll_interval();
        let stats = calibrate(&HighPrecisionTimer::new(), interval, samples);
        info!(
            requested_us = stats.requested_ns / 1e3,
            average_us = stats.average_sleep_ns / 1e3,
            jitter_us = stats.jitter_ns / 1e3,
            min_us = stats.min_sleep_ns / 1e3,
            max_us = stats.max_sleep_ns / 1e3,
            "poll interval calibration over {samples} samples"
        );
        if stats.average_sleep_ns > 2.0 * stats.requested_ns {
            warn!("achieved poll interval is more than twice the configured one");
        }
        stats
    }

    /// Verifies `sounds`, or the configured session sounds when empty.
    pub fn check_sounds(&self, sounds: &[PathBuf]) -> Result<()> {
        let defaults = &self.config.session.sounds;
        let sounds: Vec<&Path> = if sounds.is_empty() {
            vec![
                defaults.go.as_path(),
                defaults.nogo.as_path(),
                defaults.white_noise.as_path(),
            ]
        } else {
            sounds.iter().map(PathBuf::as_path).collect()
        };
        let failed = sounds.iter().filter(|s| !report_sound(s)).count();
        if failed > 0 {
            bail!("{failed} of {} sound files failed", sounds.len());
        }
        Ok(())
    }

    pub fn check_scene(&self, go_dir: &Path, nogo_dir: Option<&Path>) -> Result<()> {
        let catalog = WavDirectoryCatalog;
        let mut failed = 0;
        let mut total = 0;
        let dirs = [(Some(go_dir), Category::Go), (nogo_dir, Category::NoGo)];
        for (dir, category) in dirs {
            let Some(dir) = dir else { continue };
            let assets = catalog
                .list(dir, category)
                .with_context(|| format!("listing scene files in {}", dir.display()))?;
            info!("{} {} files in {}", assets.len(), category.label(), dir.display());
            for asset in &assets {
                match asset.snr_db {
                    Some(snr) => info!("  {} SNR {snr} dB", asset.path.display()),
                    None => info!("  {} SNR unknown", asset.path.display()),
                }
                total += 1;
                if !report_sound(&asset.path) {
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {total} scene files failed");
        }
        Ok(())
    }

    /// Sleeps in one-second slices. Returns false when interrupted.
    fn pause(&self, total: Duration, what: &str) -> bool {
        let step = Duration::from_secs(1);
        let start = self.clock.now();
        let mut last_tick = None;
        info!("{what} in {:.0} s", total.as_secs_f64());
        loop {
            if self.interrupt.is_triggered() {
                return false;
            }
            let Some(left) = total.checked_sub(self.clock.elapsed(start)) else {
                return true;
            };
            if left.is_zero() {
                return true;
            }
            let secs = left.as_secs_f64().ceil() as u64;
            if secs <= 10 && last_tick != Some(secs) {
                info!("{secs}");
                last_tick = Some(secs);
            }
            self.clock.sleep(left.min(step));
        }
    }

    fn run_session(&self, id: &str, plan: &RunPlan) -> Result<Option<SessionSummary>> {
        let mut session = self.session(id, plan.seed)?;
        let stream = session.stream(&plan.protocol);
        let (summary, interrupted) = match session.run(&plan.protocol) {
            Ok(summary) => (summary, false),
            Err(BoothError::Interrupted) => (session.summary().clone(), true),
            Err(e) => {
                return Err(e).with_context(|| format!("session {id} failed"));
            }
        };
        let path = session
            .log()
            .write_summary(&stream, &summary)
            .with_context(|| format!("writing summary of {stream}"))?;
        info!(
            trials = summary.trials,
            hit_rate = ?summary.hit_rate(),
            false_alarm_rate = ?summary.false_alarm_rate(),
            "summary written to {}",
            path.display()
        );
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok((!interrupted).then_some(summary))
    }

    /// Runs the plan, once or every day until interrupted. The next daily
    /// session starts 24 h after the previous one started.
    pub fn run(&self, plan: RunPlan) -> Result<()> {
        plan.protocol.validate(&self.config.session)?;
        if !self.pause(plan.delay, "session starts") {
            info!("cancelled before start");
            return Ok(());
        }
        let mut id = plan.session_id.clone();
        loop {
            let started = self.clock.now();
            info!(session = %id, protocol = plan.protocol.name(), "starting");
            if self.run_session(&id, &plan)?.is_none() {
                info!(session = %id, "interrupted");
                return Ok(());
            }
            if !plan.repeat_daily {
                return Ok(());
            }
            let wait = DAY.saturating_sub(self.clock.elapsed(started));
            if !self.pause(wait, "next session") {
                info!("daily repetition stopped");
                return Ok(());
            }
            id = next_session_id(&id, Local::now().date_naive());
        }
    }
}

fn report_sound(path: &Path) -> bool {
    match verify_wav(path) {
        Ok(()) => {
            info!("ok      {}", path.display());
            true
        }
        Err(e) => {
            warn!("failed  {e}");
            false
        }
    }
}
