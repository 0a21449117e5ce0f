//! Node configuration: the recognized options surface of spec.md §6, plus
//! the handful of ambient settings (listen address, data directory, roster
//! and key material paths) every subsystem config is built from.
//!
//! Mirrors `container::config::NodeConfig`'s per-section `Default` grouping:
//! one flat, serde-friendly struct per subsystem, loaded from an optional
//! JSON file and overridden by `QC_*` environment variables, then converted
//! into each domain crate's own config type by the `*_config` accessors
//! below (those types aren't themselves `Deserialize` — they carry
//! `std::time::Duration`, which this struct stores as plain seconds/millis
//! so the file format stays boring JSON).

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NodeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: u64,
    pub listen_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub roster_path: PathBuf,
    pub keypair_seed_path: Option<PathBuf>,
    pub reconnect: ReconnectSettings,
    pub gossip: GossipSettings,
    pub shadow_graph: ShadowGraphSettings,
    pub state: StateSettings,
    pub tipset: TipsetSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            listen_addr: "0.0.0.0:30303".parse().unwrap(),
            data_dir: PathBuf::from("./data"),
            roster_path: PathBuf::from("./roster.json"),
            keypair_seed_path: None,
            reconnect: ReconnectSettings::default(),
            gossip: GossipSettings::default(),
            shadow_graph: ShadowGraphSettings::default(),
            state: StateSettings::default(),
            tipset: TipsetSettings::default(),
        }
    }
}

/// spec.md §6 `reconnect.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub max_parallel_subtrees: usize,
    pub async_stream_timeout_ms: u64,
    pub async_stream_buffer_size: usize,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let d = qc_reconnect::ReconnectConfig::default();
        Self {
            max_parallel_subtrees: d.max_parallel_subtrees,
            async_stream_timeout_ms: d.async_stream_timeout.as_millis() as u64,
            async_stream_buffer_size: d.async_stream_buffer_size,
        }
    }
}

/// spec.md §6 `gossip.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipSettings {
    pub max_outstanding_events: usize,
    pub session_deadline_secs: u64,
    pub redial_initial_backoff_ms: u64,
    pub redial_max_backoff_ms: u64,
}

impl Default for GossipSettings {
    fn default() -> Self {
        let d = qc_gossip::GossipConfig::default();
        Self {
            max_outstanding_events: d.max_outstanding_events,
            session_deadline_secs: d.session_deadline.as_secs(),
            redial_initial_backoff_ms: d.redial_initial_backoff.as_millis() as u64,
            redial_max_backoff_ms: d.redial_max_backoff.as_millis() as u64,
        }
    }
}

/// spec.md §6 `shadow_graph.ancient_window`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowGraphSettings {
    pub ancient_window: u64,
    /// How often the pruning loop recomputes and advances the threshold.
    pub prune_interval_ms: u64,
}

impl Default for ShadowGraphSettings {
    fn default() -> Self {
        Self {
            ancient_window: 26,
            prune_interval_ms: 1_000,
        }
    }
}

/// spec.md §6 `state.retention_window`, `state.sentinel_leak_ttl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub retention_window: u64,
    pub signature_threshold_numerator: u64,
    pub signature_threshold_denominator: u64,
    pub sentinel_leak_ttl_secs: u64,
    pub sentinel_sweep_interval_secs: u64,
    pub release_queue_capacity: usize,
}

impl Default for StateSettings {
    fn default() -> Self {
        let d = qc_state_manager::StateManagerConfig::default();
        Self {
            retention_window: d.retention_window,
            signature_threshold_numerator: d.signature_threshold_numerator,
            signature_threshold_denominator: d.signature_threshold_denominator,
            sentinel_leak_ttl_secs: d.sentinel_leak_ttl.as_secs(),
            sentinel_sweep_interval_secs: d.sentinel_sweep_interval.as_secs(),
            release_queue_capacity: d.release_queue_capacity,
        }
    }
}

/// spec.md §6 `tipset.zero_weight_bias`, realized on `EventCreatorConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TipsetSettings {
    pub zero_weight_bias: f64,
    pub min_tick_interval_ms: u64,
}

impl Default for TipsetSettings {
    fn default() -> Self {
        let d = qc_event_creator::EventCreatorConfig::default();
        Self {
            zero_weight_bias: d.zero_weight_bias,
            min_tick_interval_ms: d.min_tick_interval.as_millis() as u64,
        }
    }
}

impl NodeConfig {
    /// Loads `path` if present (overlaying its fields onto the defaults
    /// above), then applies `QC_*` environment overrides for the handful of
    /// per-deployment settings that don't belong in a checked-in file.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| NodeError::Config(format!("reading {}: {e}", path.display())))?;
                serde_json::from_str(&text)
                    .map_err(|e| NodeError::Config(format!("parsing {}: {e}", path.display())))?
            }
            _ => NodeConfig::default(),
        };

        if let Ok(node_id) = env::var("QC_NODE_ID") {
            config.node_id = node_id
                .parse()
                .map_err(|_| NodeError::Config("QC_NODE_ID must be a u64".into()))?;
        }
        if let Ok(addr) = env::var("QC_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .map_err(|_| NodeError::Config(format!("QC_LISTEN_ADDR {addr:?} is not a socket address")))?;
        }
        if let Ok(dir) = env::var("QC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(roster) = env::var("QC_ROSTER_PATH") {
            config.roster_path = PathBuf::from(roster);
        }

        Ok(config)
    }

    pub fn reconnect_config(&self) -> qc_reconnect::ReconnectConfig {
        qc_reconnect::ReconnectConfig {
            max_parallel_subtrees: self.reconnect.max_parallel_subtrees,
            async_stream_timeout: Duration::from_millis(self.reconnect.async_stream_timeout_ms),
            async_stream_buffer_size: self.reconnect.async_stream_buffer_size,
        }
    }

    pub fn gossip_config(&self) -> qc_gossip::GossipConfig {
        qc_gossip::GossipConfig {
            max_outstanding_events: self.gossip.max_outstanding_events,
            session_deadline: Duration::from_secs(self.gossip.session_deadline_secs),
            redial_initial_backoff: Duration::from_millis(self.gossip.redial_initial_backoff_ms),
            redial_max_backoff: Duration::from_millis(self.gossip.redial_max_backoff_ms),
        }
    }

    pub fn state_manager_config(&self) -> qc_state_manager::StateManagerConfig {
        qc_state_manager::StateManagerConfig {
            retention_window: self.state.retention_window,
            signature_threshold_numerator: self.state.signature_threshold_numerator,
            signature_threshold_denominator: self.state.signature_threshold_denominator,
            sentinel_leak_ttl: Duration::from_secs(self.state.sentinel_leak_ttl_secs),
            sentinel_sweep_interval: Duration::from_secs(self.state.sentinel_sweep_interval_secs),
            release_queue_capacity: self.state.release_queue_capacity,
        }
    }

    pub fn event_creator_config(&self) -> qc_event_creator::EventCreatorConfig {
        qc_event_creator::EventCreatorConfig {
            min_tick_interval: Duration::from_millis(self.tipset.min_tick_interval_ms),
            zero_weight_bias: self.tipset.zero_weight_bias,
            limits: qc_event_core::EventLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = NodeConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let parsed: NodeConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.state.retention_window, config.state.retention_window);
        assert_eq!(parsed.tipset.zero_weight_bias, config.tipset.zero_weight_bias);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_missing() {
        let config = NodeConfig::load(Some(Path::new("/nonexistent/qc-node-config.json"))).unwrap();
        assert_eq!(config.listen_addr, NodeConfig::default().listen_addr);
    }
}
