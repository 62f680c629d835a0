//! Configuration for [`RequestLifecycle`](crate::RequestLifecycle).

use observable_rust_core::DEFAULT_SUCCESS_STATUS;

/// How settlements of overlapping requests are applied to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RacePolicy {
    /// Every settlement is published; whichever request settles last wins,
    /// even if it was started first.
    #[default]
    LastSettled,

    /// Only the most recently started request may publish its settlement.
    /// Settlements of superseded requests are discarded from the state (their
    /// handles still resolve normally).
    LatestStarted,
}

/// Request lifecycle configuration
///
/// # Example
///
/// ```ignore
/// let config = LifecycleConfig::default()
///     .with_success_status(204)
///     .with_race_policy(RacePolicy::LatestStarted);
///
/// let lifecycle = RequestLifecycle::with_config(transport, config);
/// ```
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Status code treated as success; any other status is a failure
    pub success_status: u16,
    /// How overlapping requests are resolved
    pub race_policy: RacePolicy,
}

impl LifecycleConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(success_status: u16, race_policy: RacePolicy) -> Self {
        Self {
            success_status,
            race_policy,
        }
    }

    /// Set the success status code
    #[must_use]
    pub const fn with_success_status(mut self, status: u16) -> Self {
        self.success_status = status;
        self
    }

    /// Set the race policy
    #[must_use]
    pub const fn with_race_policy(mut self, policy: RacePolicy) -> Self {
        self.race_policy = policy;
        self
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            success_status: DEFAULT_SUCCESS_STATUS,
            race_policy: RacePolicy::default(),
        }
    }
}
