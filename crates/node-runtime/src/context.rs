//! `PlatformContext`: the bag of ambient dependencies (config, crypto, time,
//! cancellation) that `wiring` threads into every subsystem constructor,
//! instead of reaching for a module-level singleton (spec.md §9 "Global
//! mutable state").

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_bus::CancellationToken;
use shared_crypto::{Ed25519KeyPair, Hasher, Sha384Hasher};
use shared_types::{NodeId, Roster, SystemTimeSource, TimeSource};

use crate::config::NodeConfig;
use crate::error::NodeError;

#[derive(serde::Serialize, serde::Deserialize)]
struct RosterFile {
    epoch: u64,
    entries: Vec<shared_types::RosterEntry>,
}

/// Carries everything a subsystem constructor needs that isn't its own
/// narrow state: configuration, the current roster snapshot, time, hashing
/// and signing primitives, and the process-wide cancellation token. One
/// instance is built in `main` and cloned (cheaply — everything inside is
/// an `Arc`) into each wiring step.
#[derive(Clone)]
pub struct PlatformContext {
    pub config: Arc<NodeConfig>,
    pub own_node_id: NodeId,
    roster: Arc<RwLock<Arc<Roster>>>,
    pub time_source: Arc<dyn TimeSource>,
    pub hasher: Arc<dyn Hasher>,
    pub keypair: Arc<Ed25519KeyPair>,
    pub cancellation: CancellationToken,
}

impl PlatformContext {
    pub fn bootstrap(config: NodeConfig) -> Result<Self, NodeError> {
        let own_node_id = NodeId::new(config.node_id);
        let roster = Self::load_roster(&config.roster_path)?;
        if !roster.contains(own_node_id) {
            return Err(NodeError::Config(format!(
                "roster at {} has no entry for this node's id {}",
                config.roster_path.display(),
                config.node_id
            )));
        }

        let keypair = match &config.keypair_seed_path {
            Some(path) if path.exists() => {
                let bytes = std::fs::read(path)
                    .map_err(|e| NodeError::Config(format!("reading {}: {e}", path.display())))?;
                let seed: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| NodeError::Config(format!("{} must contain exactly 32 bytes", path.display())))?;
                Ed25519KeyPair::from_seed(seed)
            }
            _ => Ed25519KeyPair::generate(),
        };

        Ok(Self {
            config: Arc::new(config),
            own_node_id,
            roster: Arc::new(RwLock::new(Arc::new(roster))),
            time_source: Arc::new(SystemTimeSource),
            hasher: Arc::new(Sha384Hasher),
            keypair: Arc::new(keypair),
            cancellation: CancellationToken::new(),
        })
    }

    fn load_roster(path: &Path) -> Result<Roster, NodeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("reading roster {}: {e}", path.display())))?;
        let file: RosterFile = serde_json::from_str(&text)
            .map_err(|e| NodeError::Config(format!("parsing roster {}: {e}", path.display())))?;
        Ok(Roster::new(file.epoch, file.entries))
    }

    /// Current roster snapshot. Components that need to react to roster
    /// changes (tipset tracker, trust store) hold their own `Arc<Roster>`
    /// swap cell and are updated explicitly by [`PlatformContext::swap_roster`];
    /// this getter is for one-shot construction-time reads.
    pub fn roster(&self) -> Arc<Roster> {
        self.roster.read().clone()
    }

    /// Publishes a new roster snapshot, e.g. after a roster-transition round
    /// completes. Callers that also own a `TipsetTracker`/`TrustStore` must
    /// call their own `set_roster`/`refresh` too — this only updates the
    /// context's own view for future wiring reads.
    pub fn swap_roster(&self, roster: Arc<Roster>) {
        *self.roster.write() = roster;
    }
}
