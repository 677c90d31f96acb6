//! De-duplication of low-level alerts.
//!
//! An *episode* is a run of consecutive aggregates at or below the
//! threshold. At most one alert is delivered per episode: the guard is
//! armed while `notified` is false and disarmed by [`AlertGuard::mark_notified`]
//! after a confirmed delivery. A failed delivery leaves it armed, so the next
//! qualifying window retries.
//!
//! How an episode ends is governed by [`ResetPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

/// When a delivered alert is forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Re-arm once an aggregate rises above the threshold.
    #[default]
    OnRecovery,
    /// Never re-arm: one alert for the lifetime of the process.
    Never,
}

impl FromStr for ResetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-recovery" => Ok(ResetPolicy::OnRecovery),
            "never" => Ok(ResetPolicy::Never),
            other => Err(format!(
                "unknown reset policy '{}', expected 'on-recovery' or 'never'",
                other
            )),
        }
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetPolicy::OnRecovery => write!(f, "on-recovery"),
            ResetPolicy::Never => write!(f, "never"),
        }
    }
}

/// Tracks whether the current episode has already been alerted.
#[derive(Debug, Clone, Default)]
pub struct AlertGuard {
    notified: bool,
    policy: ResetPolicy,
}

impl AlertGuard {
    pub fn new(policy: ResetPolicy) -> Self {
        Self {
            notified: false,
            policy,
        }
    }

    /// True iff `value <= threshold` and no alert has been delivered yet.
    pub fn should_notify(&self, value: f64, threshold: f64) -> bool {
        value <= threshold && !self.notified
    }

    /// Record a confirmed delivery.
    pub fn mark_notified(&mut self) {
        self.notified = true;
    }

    pub fn is_notified(&self) -> bool {
        self.notified
    }

    pub fn policy(&self) -> ResetPolicy {
        self.policy
    }

    /// Feed an aggregate so the guard can detect the end of an episode.
    ///
    /// Returns true if this call re-armed the guard.
    pub fn observe(&mut self, value: f64, threshold: f64) -> bool {
        let recovered = self.notified && value > threshold && self.policy == ResetPolicy::OnRecovery;
        if recovered {
            info!(value, threshold, "Value recovered above threshold, alerts re-armed");
            self.notified = false;
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_below_or_at_threshold() {
        let guard = AlertGuard::default();
        assert!(guard.should_notify(40.0, 50.0));
        assert!(guard.should_notify(50.0, 50.0));
        assert!(!guard.should_notify(50.1, 50.0));
    }

    #[test]
    fn test_notified_suppresses_everything() {
        let mut guard = AlertGuard::default();
        guard.mark_notified();
        for (v, t) in [(0.0, 50.0), (-10.0, 0.0), (50.0, 50.0), (1e9, 1e10)] {
            assert!(!guard.should_notify(v, t));
        }
    }

    #[test]
    fn test_single_alert_per_episode() {
        let mut guard = AlertGuard::default();

        assert!(!guard.observe(40.0, 50.0));
        assert!(guard.should_notify(40.0, 50.0));
        guard.mark_notified();

        assert!(!guard.observe(30.0, 50.0));
        assert!(!guard.should_notify(30.0, 50.0));
    }

    #[test]
    fn test_recovery_rearms() {
        let mut guard = AlertGuard::new(ResetPolicy::OnRecovery);
        guard.mark_notified();

        assert!(guard.observe(60.0, 50.0));
        assert!(!guard.is_notified());
        assert!(guard.should_notify(45.0, 50.0));
    }

    #[test]
    fn test_never_policy_stays_disarmed() {
        let mut guard = AlertGuard::new(ResetPolicy::Never);
        guard.mark_notified();

        assert!(!guard.observe(60.0, 50.0));
        assert!(guard.is_notified());
        assert!(!guard.should_notify(45.0, 50.0));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("never".parse::<ResetPolicy>(), Ok(ResetPolicy::Never));
        assert_eq!("on-recovery".parse::<ResetPolicy>(), Ok(ResetPolicy::OnRecovery));
        assert!("sometimes".parse::<ResetPolicy>().is_err());
        assert_eq!(ResetPolicy::default().to_string(), "on-recovery");
    }
}
