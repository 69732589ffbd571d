use std::time::Duration;

/// Timing windows of one protocol invocation, resolved from session defaults
/// and overrides. Immutable for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialTiming {
    pub reward: Duration,
    pub punishment: Duration,
    pub iti: (Duration, Duration),
    pub response_window: Duration,
    pub null: Duration,
    pub punishment_null: Duration,
    pub delay: Duration,
}
