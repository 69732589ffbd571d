/// Phases of the classical-to-operant transfer protocol.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum ConditioningPhase {
    /// Non-contingent exposure: stimuli arrive on a timer.
    Classical,
    /// The animal initiates every trial and its response is scored.
    Operant,
}

impl Default for ConditioningPhase {
    fn default() -> Self {
        ConditioningPhase::Classical
    }
}

impl ConditioningPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::Operant)
    }

    pub fn next(&self) -> Option<Self> {
        use ConditioningPhase::*;
        Some(match self {
            Classical => Operant,
            Operant => return None,
        })
    }

    /// Suffix of the log stream written during this phase.
    pub fn stream_suffix(&self) -> &'static str {
        match self {
            Self::Classical => "classical_conditioning",
            Self::Operant => "operant_conditioning",
        }
    }
}
