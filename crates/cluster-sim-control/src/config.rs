//! Cluster configuration.

use std::time::Duration;

use cluster_sim_scheduler::Policy;
use serde::Deserialize;
use tracing::warn;

use crate::error::{ControlError, Result};

/// Configuration for the cluster store, health monitor and daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Listen address for the probe endpoints (e.g., "0.0.0.0:8080").
    #[serde(default = "ClusterConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Seconds between health sweeps.
    #[serde(default = "ClusterConfig::default_health_interval")]
    pub health_interval_secs: u64,

    /// Upper bound on a single liveness inspection, in seconds.
    #[serde(default = "ClusterConfig::default_inspect_timeout")]
    pub inspect_timeout_secs: u64,

    /// Pause between stop and start while restarting a node, in milliseconds.
    #[serde(default = "ClusterConfig::default_restart_settle")]
    pub restart_settle_ms: u64,

    /// Pause after a restart before confirming liveness, in milliseconds.
    #[serde(default = "ClusterConfig::default_post_restart_grace")]
    pub post_restart_grace_ms: u64,

    /// Largest CPU capacity accepted for a single node.
    #[serde(default = "ClusterConfig::default_max_node_cpus")]
    pub max_node_cpus: u32,

    /// Policy used when a caller does not name one.
    #[serde(default)]
    pub default_policy: Policy,
}

impl ClusterConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_health_interval() -> u64 {
        10
    }

    const fn default_inspect_timeout() -> u64 {
        5
    }

    const fn default_restart_settle() -> u64 {
        2_000
    }

    const fn default_post_restart_grace() -> u64 {
        5_000
    }

    const fn default_max_node_cpus() -> u32 {
        256
    }

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `CLUSTER_SIM_LISTEN_ADDR`: probe endpoint listen address
    /// - `CLUSTER_SIM_HEALTH_INTERVAL_SECS`: seconds between health sweeps
    /// - `CLUSTER_SIM_INSPECT_TIMEOUT_SECS`: per-node inspection timeout
    /// - `CLUSTER_SIM_RESTART_SETTLE_MS`: pause between stop and start
    /// - `CLUSTER_SIM_POST_RESTART_GRACE_MS`: pause before the post-restart check
    /// - `CLUSTER_SIM_MAX_NODE_CPUS`: largest accepted node capacity
    /// - `CLUSTER_SIM_DEFAULT_POLICY`: `first_fit`, `best_fit` or `worst_fit`
    ///
    /// Unparseable numbers keep the default, as does zero for the sweep
    /// interval, the inspection timeout and the node capacity limit.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CLUSTER_SIM_LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Some(n) = env_positive("CLUSTER_SIM_HEALTH_INTERVAL_SECS") {
            config.health_interval_secs = n;
        }
        if let Some(n) = env_positive("CLUSTER_SIM_INSPECT_TIMEOUT_SECS") {
            config.inspect_timeout_secs = n;
        }
        if let Some(n) = env_number("CLUSTER_SIM_RESTART_SETTLE_MS") {
            config.restart_settle_ms = n;
        }
        if let Some(n) = env_number("CLUSTER_SIM_POST_RESTART_GRACE_MS") {
            config.post_restart_grace_ms = n;
        }
        if let Some(n) = env_positive("CLUSTER_SIM_MAX_NODE_CPUS") {
            config.max_node_cpus = n;
        }
        if let Ok(val) = std::env::var("CLUSTER_SIM_DEFAULT_POLICY") {
            config.default_policy = Policy::from_name(&val);
        }

        config
    }

    /// Configuration with every wait set to zero, for tests and simulations.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            restart_settle_ms: 0,
            post_restart_grace_ms: 0,
            ..Self::default()
        }
    }

    /// Get the health sweep interval as a `Duration`, at least one second.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    /// Get the inspection timeout as a `Duration`, at least one second.
    #[must_use]
    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs.max(1))
    }

    /// Get the stop-to-start pause as a `Duration`.
    #[must_use]
    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    /// Get the post-restart pause as a `Duration`.
    #[must_use]
    pub fn post_restart_grace(&self) -> Duration {
        Duration::from_millis(self.post_restart_grace_ms)
    }

    /// Validate a CPU amount for a node or pod.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if `cpus` is zero or exceeds
    /// `max_node_cpus`.
    pub fn validate_cpus(&self, cpus: u32) -> Result<()> {
        if cpus == 0 {
            return Err(ControlError::Validation(
                "CPU amount must be positive".to_string(),
            ));
        }
        if cpus > self.max_node_cpus {
            return Err(ControlError::Validation(format!(
                "CPU amount {cpus} exceeds maximum {}",
                self.max_node_cpus
            )));
        }
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            health_interval_secs: Self::default_health_interval(),
            inspect_timeout_secs: Self::default_inspect_timeout(),
            restart_settle_ms: Self::default_restart_settle(),
            post_restart_grace_ms: Self::default_post_restart_grace(),
            max_node_cpus: Self::default_max_node_cpus(),
            default_policy: Policy::default(),
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_positive<T: std::str::FromStr + PartialEq + Default>(key: &str) -> Option<T> {
    let n = env_number::<T>(key)?;
    if n == T::default() {
        warn!(key, "Zero is not allowed here, keeping the default");
        return None;
    }
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClusterConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.health_interval(), Duration::from_secs(10));
        assert_eq!(config.inspect_timeout(), Duration::from_secs(5));
        assert_eq!(config.restart_settle(), Duration::from_secs(2));
        assert_eq!(config.post_restart_grace(), Duration::from_secs(5));
        assert_eq!(config.default_policy, Policy::FirstFit);
    }

    #[test]
    fn immediate_config_has_no_waits() {
        let config = ClusterConfig::immediate();
        assert_eq!(config.restart_settle(), Duration::ZERO);
        assert_eq!(config.post_restart_grace(), Duration::ZERO);
        assert_eq!(config.health_interval(), Duration::from_secs(10));
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: ClusterConfig =
            serde_json::from_str(r#"{"health_interval_secs": 3, "default_policy": "worst_fit"}"#)
                .unwrap();
        assert_eq!(config.health_interval_secs, 3);
        assert_eq!(config.default_policy, Policy::WorstFit);
        assert_eq!(config.max_node_cpus, 256);
    }

    #[test]
    fn zero_durations_are_floored() {
        let config = ClusterConfig {
            health_interval_secs: 0,
            inspect_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.health_interval(), Duration::from_secs(1));
        assert_eq!(config.inspect_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn from_env_keeps_defaults_for_zero() {
        let vars = [
            ("CLUSTER_SIM_HEALTH_INTERVAL_SECS", "0"),
            ("CLUSTER_SIM_INSPECT_TIMEOUT_SECS", "0"),
            ("CLUSTER_SIM_MAX_NODE_CPUS", "64"),
            ("CLUSTER_SIM_RESTART_SETTLE_MS", "0"),
            ("CLUSTER_SIM_DEFAULT_POLICY", "best-fit"),
        ];
        for (key, val) in vars {
            std::env::set_var(key, val);
        }

        let config = ClusterConfig::from_env();

        for (key, _) in vars {
            std::env::remove_var(key);
        }
        assert_eq!(config.health_interval_secs, 10);
        assert_eq!(config.inspect_timeout_secs, 5);
        assert_eq!(config.max_node_cpus, 64);
        assert_eq!(config.restart_settle_ms, 0);
        assert_eq!(config.default_policy, Policy::BestFit);
    }

    #[test]
    fn validate_cpus() {
        let config = ClusterConfig {
            max_node_cpus: 16,
            ..Default::default()
        };

        assert!(config.validate_cpus(1).is_ok());
        assert!(config.validate_cpus(16).is_ok());
        assert!(matches!(
            config.validate_cpus(0),
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            config.validate_cpus(17),
            Err(ControlError::Validation(_))
        ));
    }
}
