//! Configuration for the owned-series service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{InstanceId, Zone};

/// Default cadence of the reconciliation loop.
pub const DEFAULT_RECONCILIATION_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Configuration for the owned-series service of one ingester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedSeriesConfig {
    /// This ingester's instance id in the ring.
    pub instance_id: InstanceId,

    /// This ingester's zone.
    pub zone: Zone,

    /// How often the background loop reconciles all tenants.
    pub reconciliation_period: Duration,

    /// Use the owned-series shard snapshot as the denominator of local
    /// series limits. When false, the limiter falls back to the ring
    /// instance count.
    pub use_owned_for_limits: bool,

    /// Whether shard selection and limit arithmetic are zone aware.
    pub zone_awareness_enabled: bool,
}

impl Default for OwnedSeriesConfig {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            zone: String::new(),
            reconciliation_period: DEFAULT_RECONCILIATION_PERIOD,
            use_owned_for_limits: true,
            zone_awareness_enabled: false,
        }
    }
}

impl OwnedSeriesConfig {
    /// Create a configuration for the given instance.
    pub fn new(instance_id: impl Into<InstanceId>, zone: impl Into<Zone>) -> Self {
        Self {
            instance_id: instance_id.into(),
            zone: zone.into(),
            ..Default::default()
        }
    }

    /// Set the reconciliation period.
    pub fn with_reconciliation_period(mut self, period: Duration) -> Self {
        self.reconciliation_period = period;
        self
    }

    /// Enable or disable owned-series-based local limits.
    pub fn with_use_owned_for_limits(mut self, enabled: bool) -> Self {
        self.use_owned_for_limits = enabled;
        self
    }

    /// Enable or disable zone awareness.
    pub fn with_zone_awareness(mut self, enabled: bool) -> Self {
        self.zone_awareness_enabled = enabled;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.instance_id.is_empty() {
            return Err("instance_id must not be empty".to_string());
        }
        if self.zone_awareness_enabled && self.zone.is_empty() {
            return Err("zone must be set when zone awareness is enabled".to_string());
        }
        if self.reconciliation_period.is_zero() {
            return Err("reconciliation_period must be positive".to_string());
        }
        Ok(())
    }
}
