use std::time::Duration;

use gobox_contracts::DEFAULT_CANCEL_POLL_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// How often `cancel()` checks whether the guest has gone away.
    pub cancel_poll_interval: Duration,
    /// Fuel a guest may burn between two yields to the executor.
    pub yield_interval_fuel: u64,
    /// Pause before a run starts executing.
    pub readiness_delay: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            cancel_poll_interval: Duration::from_millis(DEFAULT_CANCEL_POLL_MS),
            yield_interval_fuel: 10_000,
            readiness_delay: Duration::ZERO,
        }
    }
}
