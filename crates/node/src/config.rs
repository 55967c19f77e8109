//! Figment-based configuration loading.
//!
//! Sources, lowest priority first:
//! 1. Command line flags, including their defaults
//! 2. Environment variables (`PUBSUB_SHADOW_` prefix, `__` between sections)
//! 3. Config file (TOML)

use crate::{FaultArgs, NodeError, PublishArgs, SimulationArgs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pubsub_shadow_discovery::BootstrapConfig;
use pubsub_shadow_overlay::{OverlayArgs, OverlayConfig};
use pubsub_shadow_primitives::NodeIndex;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Prefix of environment variables overriding configuration.
pub const ENV_PREFIX: &str = "PUBSUB_SHADOW_";

/// Complete node configuration. Built once at startup and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub simulation: SimulationArgs,
    pub overlay: OverlayArgs,
    pub publish: PublishArgs,
    pub fault: FaultArgs,
}

impl NodeConfig {
    /// Layers environment variables and an optional TOML file over `self`, then validates
    /// the result.
    pub fn load(self, config_path: Option<&Path>) -> Result<Self, NodeError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(self))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(NodeError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Self = figment
            .extract()
            .map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        let sim = &self.simulation;
        if sim.universe_size == 0 {
            return Err(NodeError::Config("node count must be positive".into()));
        }
        if sim.target_peers as u64 >= sim.universe_size {
            return Err(NodeError::Config(format!(
                "target peers ({}) must be below the node count ({})",
                sim.target_peers, sim.universe_size
            )));
        }
        if self.fault.percent > 100 {
            return Err(NodeError::Config(format!(
                "fault percentage {} exceeds 100",
                self.fault.percent
            )));
        }
        if self.publish.size == 0 {
            return Err(NodeError::Config("payload size must be positive".into()));
        }
        OverlayConfig::from_args(&self.overlay)
            .validate()
            .map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig::from_args(&self.overlay)
    }

    pub fn bootstrap_config(&self, local: NodeIndex) -> BootstrapConfig {
        BootstrapConfig {
            local,
            universe_size: self.simulation.universe_size,
            target_peers: self.simulation.target_peers,
            port: self.overlay.port,
            policy: self.simulation.policy,
        }
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.simulation.startup_delay_ms)
    }

    pub fn stabilization_delay(&self) -> Duration {
        Duration::from_millis(self.simulation.stabilization_delay_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.fault.grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElectionPolicy, PayloadKind};
    use assert_matches::assert_matches;
    use pubsub_shadow_discovery::TerminationPolicy;
    use pubsub_shadow_tracer::FaultTrigger;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.simulation.universe_size, 5000);
        assert_eq!(config.simulation.target_peers, 70);
        assert_eq!(config.overlay.mesh_degree, 8);
        assert_eq!(config.overlay.announce_degree, 8);
        assert_eq!(config.overlay.port, 9000);
        assert_eq!(config.publish.size, 32);
        assert_eq!(config.publish.count, 1);
        assert_eq!(config.fault.percent, 0);
        assert_eq!(config.startup_delay(), Duration::from_secs(1));
        assert_eq!(config.stabilization_delay(), Duration::from_secs(10));
        assert_eq!(config.grace_period(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_overrides_base() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(
            &path,
            r#"
[simulation]
universe_size = 20
target_peers = 10
policy = "live-connections"

[overlay]
mesh_degree = 4
mesh_degree_low = 3

[publish]
election = "random"
payload = "greeting"
seed = 99

[fault]
percent = 100
trigger = "grafted"
"#,
        )
        .unwrap();

        let config = NodeConfig::default().load(Some(&path)).unwrap();
        assert_eq!(config.simulation.universe_size, 20);
        assert_eq!(config.simulation.target_peers, 10);
        assert_eq!(config.simulation.policy, TerminationPolicy::LiveConnections);
        assert_eq!(config.overlay.mesh_degree, 4);
        assert_eq!(config.overlay.mesh_degree_high, 12);
        assert_eq!(config.publish.election, ElectionPolicy::Random);
        assert_eq!(config.publish.payload, PayloadKind::Greeting);
        assert_eq!(config.publish.seed, 99);
        assert_eq!(config.fault.percent, 100);
        assert_eq!(config.fault.trigger, FaultTrigger::Grafted);
    }

    #[test]
    fn base_values_survive_without_file() {
        let mut base = NodeConfig::default();
        base.simulation.target_peers = 3;
        base.simulation.hostname = Some("node7".into());

        let config = base.clone().load(None).unwrap();
        assert_eq!(config.simulation.target_peers, 3);
        assert_eq!(config.simulation.hostname.as_deref(), Some("node7"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let res = NodeConfig::default().load(Some(&dir.path().join("missing.toml")));
        assert_matches!(res, Err(NodeError::Config(_)));
    }

    #[test]
    fn rejects_target_at_universe_size() {
        let mut config = NodeConfig::default();
        config.simulation.universe_size = 10;
        config.simulation.target_peers = 10;
        assert_matches!(config.validate(), Err(NodeError::Config(_)));
    }

    #[test]
    fn rejects_bad_mesh_bounds() {
        let mut config = NodeConfig::default();
        config.overlay.mesh_degree_low = 9;
        assert_matches!(config.validate(), Err(NodeError::Config(_)));
    }

    #[test]
    fn bootstrap_config_uses_overlay_port() {
        let mut config = NodeConfig::default();
        config.overlay.port = 4001;
        let bootstrap = config.bootstrap_config(NodeIndex::new(3));
        assert_eq!(bootstrap.port, 4001);
        assert_eq!(bootstrap.local, NodeIndex::new(3));
        assert_eq!(bootstrap.universe_size, 5000);
    }
}
