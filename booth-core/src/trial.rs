use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stimulus::Category;

/// Signal-detection classification of a scored trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Hit,
    Miss,
    Reject,
    FalseAlarm,
}

impl Outcome {
    pub fn classify(category: Category, responded: bool) -> Self {
        match (category, responded) {
            (Category::Go, true) => Outcome::Hit,
            (Category::Go, false) => Outcome::Miss,
            (Category::NoGo, false) => Outcome::Reject,
            (Category::NoGo, true) => Outcome::FalseAlarm,
        }
    }

    /// One-hot Hit, Miss, Reject, False_alarm columns.
    pub fn flags(&self) -> [u8; 4] {
        match self {
            Outcome::Hit => [1, 0, 0, 0],
            Outcome::Miss => [0, 1, 0, 0],
            Outcome::Reject => [0, 0, 1, 0],
            Outcome::FalseAlarm => [0, 0, 0, 1],
        }
    }
}

/// Recorded result of one scored trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 1-based, monotonic within a log stream.
    pub index: usize,
    pub category: Category,
    /// `None` when the animal did not respond within the window.
    pub latency: Option<Duration>,
    pub outcome: Outcome,
    /// Session time at which the response window opened.
    pub elapsed: Duration,
    pub stimulus: String,
    pub snr_db: Option<i32>,
}

/// Per-run tallies reported when a protocol finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub trials: usize,
    pub rewards: usize,
    pub hits: usize,
    pub misses: usize,
    pub rejects: usize,
    pub false_alarms: usize,
    pub skipped: usize,
    pub elapsed_s: f64,
}

impl SessionSummary {
    pub fn record(&mut self, record: &TrialRecord) {
        self.trials += 1;
        match record.outcome {
            Outcome::Hit => {
                self.hits += 1;
                self.rewards += 1;
            }
            Outcome::Miss => self.misses += 1,
            Outcome::Reject => self.rejects += 1,
            Outcome::FalseAlarm => self.false_alarms += 1,
        }
    }

    /// Counts a trial of an unscored protocol (introduction, shaping).
    pub fn record_unscored(&mut self, rewarded: bool) {
        self.trials += 1;
        if rewarded {
            self.rewards += 1;
        }
    }

    pub fn hit_rate(&self) -> Option<f64> {
        let go = self.hits + self.misses;
        (go > 0).then(|| self.hits as f64 / go as f64)
    }

    pub fn false_alarm_rate(&self) -> Option<f64> {
        let nogo = self.false_alarms + self.rejects;
        (nogo > 0).then(|| self.false_alarms as f64 / nogo as f64)
    }
}
