use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ask the shell to call back once, after the given delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerOperation {
    pub delay_ms: u64,
}

/// Completion of a delay. `now_ms` carries the shell's wall clock at the
/// moment the timer fired, in Unix milliseconds. The core has no clock of
/// its own, so every timer settlement doubles as a time signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerElapsed {
    pub now_ms: u64,
}

impl Operation for TimerOperation {
    type Output = TimerElapsed;
}

#[derive(crux_core::macros::Capability)]
pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Clone for Timer<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Timer<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    /// Request a single callback after `delay`. There is no cancellation;
    /// callers discard stale completions by tagging the event with a
    /// generation counter.
    pub fn after<F>(&self, delay: Duration, make_event: F)
    where
        F: FnOnce(TimerElapsed) -> Ev + Send + 'static,
    {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let context = self.context.clone();
        self.context.spawn(async move {
            let elapsed = context
                .request_from_shell(TimerOperation { delay_ms })
                .await;
            context.update_app(make_event(elapsed));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_round_trips_through_serde() {
        let op = TimerOperation { delay_ms: 30_000 };
        let json = serde_json::to_string(&op).unwrap();
        let back: TimerOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }

    #[test]
    fn elapsed_carries_shell_clock() {
        let out = TimerElapsed { now_ms: 1_700_000_000_000 };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("1700000000000"));
    }
}
