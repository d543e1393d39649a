//! Tunable settings and fixed protocol constants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{PickupError, Result};

/// Candidate cache lifetime.
pub const SNAPSHOT_TTL: Duration = Duration::from_millis(500);
/// Hover registration delay after a pointer move.
pub const SETTLE_DELAY: Duration = Duration::from_millis(2);
/// Extra verification wait when a portal sits next to the target.
pub const PORTAL_VERIFY_DELAY: Duration = Duration::from_millis(25);
/// Continuous inactivity before the driver counts as fully idle.
pub const IDLE_PROMOTION: Duration = Duration::from_millis(300);

/// Pixels trimmed from every side of the game window for click targets.
pub const WINDOW_MARGIN: f32 = 36.0;
/// Pixels added to every side of portal and target labels before overlap tests.
pub const PORTAL_MARGIN: f32 = 100.0;

pub const MAX_ATTEMPTS: u8 = 3;
pub const MAX_CONFIRM_POLLS: u8 = 6;

/// Transient marker objects that are always picked, whatever their label state.
pub const MARKER_PATH: &str =
    "Metadata/MiscellaneousObjects/Metamorphosis/MetamorphosisMonsterMarker";
/// Metadata fragment identifying the interactive portal.
pub const PORTAL_METADATA: &str = "Metadata/MiscellaneousObjects/MultiplexPortal";

const MAX_EXTRA_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    /// Candidates at or beyond this distance (grid units) are never selected.
    pub pickup_range: f32,
    /// Wait between two pickup passes.
    pub extra_delay_ms: u64,
    /// Seed rules for the weight table, keyed by object path.
    pub weights: HashMap<String, i32>,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            pickup_range: 600.0,
            extra_delay_ms: 0,
            weights: HashMap::new(),
        }
    }
}

impl PickupConfig {
    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: PickupConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !self.pickup_range.is_finite() || self.pickup_range <= 0.0 {
            errors.push(format!("pickup_range must be positive, got {}", self.pickup_range));
        }
        errors.extend(extra_delay_problem(self.extra_delay_ms));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PickupError::InvalidConfig(errors.join("; ")))
        }
    }

    /// Bound shared by config loading and runtime updates.
    pub fn check_extra_delay(ms: u64) -> Result<()> {
        match extra_delay_problem(ms) {
            Some(msg) => Err(PickupError::InvalidConfig(msg)),
            None => Ok(()),
        }
    }

    pub fn extra_delay(&self) -> Duration {
        Duration::from_millis(self.extra_delay_ms)
    }
}

fn extra_delay_problem(ms: u64) -> Option<String> {
    (ms > MAX_EXTRA_DELAY_MS)
        .then(|| format!("extra_delay_ms out of range: {ms} (max {MAX_EXTRA_DELAY_MS})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let raw = r#"{"pickup_range": 80.5, "weights": {"Metadata/Items/Currency/Orb": 5}}"#;
        let config = PickupConfig::from_json(raw).unwrap();
        assert_eq!(config.pickup_range, 80.5);
        assert_eq!(config.extra_delay_ms, 0);
        assert_eq!(config.weights.get("Metadata/Items/Currency/Orb"), Some(&5));
    }

    #[test]
    fn test_invalid_values_are_reported_together() {
        let raw = r#"{"pickup_range": -1.0, "extra_delay_ms": 99999}"#;
        let err = PickupConfig::from_json(raw).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pickup_range"));
        assert!(msg.contains("extra_delay_ms"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PickupConfig::from_json("{pickup_range"),
            Err(PickupError::Json(_))
        ));
    }
}
