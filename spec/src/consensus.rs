//! Consensus-critical parameters of a braid chain and the entry points for
//! querying soft fork deployment state.

use crate::versionbits::{
    Deployment, DeploymentPos, ThresholdState, ThresholdStats, Versionbits,
    VersionbitsCache, VersionbitsConditionChecker, VersionbitsIndexer, VERSIONBITS_NUM_BITS,
    VERSIONBITS_TOP_BITS,
};
use braid_types::core::{BlockNumber, HeaderView, Version};
use std::collections::HashMap;

/// Consensus parameters.
///
/// Owns the soft fork deployment table together with the per-deployment
/// state caches. A `Consensus` is cheap to clone; clones share their caches.
#[derive(Clone, Debug)]
pub struct Consensus {
    /// Chain identifier.
    pub id: String,
    /// Soft fork deployments, keyed by position.
    pub deployments: HashMap<DeploymentPos, Deployment>,
    versionbits_caches: VersionbitsCache,
}

impl Default for Consensus {
    fn default() -> Self {
        ConsensusBuilder::default().build()
    }
}

/// Builder for [`Consensus`].
///
/// `build` is where the fatal parameter invariants are enforced: a malformed
/// deployment table is a programmer error, not a recoverable condition.
#[derive(Clone, Debug)]
pub struct ConsensusBuilder {
    id: String,
    deployments: HashMap<DeploymentPos, Deployment>,
}

impl Default for ConsensusBuilder {
    fn default() -> Self {
        ConsensusBuilder {
            id: "main".to_owned(),
            deployments: HashMap::new(),
        }
    }
}

impl ConsensusBuilder {
    pub fn id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub fn softfork_deployments(
        mut self,
        deployments: HashMap<DeploymentPos, Deployment>,
    ) -> Self {
        self.deployments = deployments;
        self
    }

    pub fn build(self) -> Consensus {
        for (pos, deployment) in &self.deployments {
            assert!(
                deployment.period > 0,
                "deployment {pos:?} must have a positive period"
            );
            assert!(
                deployment.threshold <= deployment.period,
                "deployment {pos:?} threshold must not exceed its period"
            );
            assert!(
                u32::from(deployment.bit) < VERSIONBITS_NUM_BITS,
                "deployment {pos:?} signal bit is out of range"
            );
        }

        Consensus {
            id: self.id,
            versionbits_caches: VersionbitsCache::new(self.deployments.keys()),
            deployments: self.deployments,
        }
    }
}

impl Consensus {
    /// The soft fork deployment table.
    pub fn softfork_deployments(&self) -> &HashMap<DeploymentPos, Deployment> {
        &self.deployments
    }

    /// Returns the deployment state applicable to the block whose parent is
    /// `tip` (`None` denotes the parent of genesis).
    pub fn versionbits_state<I: VersionbitsIndexer>(
        &self,
        pos: DeploymentPos,
        tip: Option<&HeaderView>,
        indexer: &I,
    ) -> Option<ThresholdState> {
        let cache = self.versionbits_caches.cache(&pos)?;
        Versionbits::new(pos, self).get_state(tip, cache, indexer)
    }

    /// Returns the height of the first block the current state applies to.
    pub fn versionbits_state_since_height<I: VersionbitsIndexer>(
        &self,
        pos: DeploymentPos,
        tip: Option<&HeaderView>,
        indexer: &I,
    ) -> Option<BlockNumber> {
        let cache = self.versionbits_caches.cache(&pos)?;
        Versionbits::new(pos, self).get_state_since_height(tip, cache, indexer)
    }

    /// Returns the signalling statistics of the period containing `block`.
    pub fn versionbits_statistics<I: VersionbitsIndexer>(
        &self,
        pos: DeploymentPos,
        block: Option<&HeaderView>,
        indexer: &I,
    ) -> Option<ThresholdStats> {
        if !self.deployments.contains_key(&pos) {
            return None;
        }
        Versionbits::new(pos, self).get_statistics(block, indexer)
    }

    /// Returns the version mask of a deployment.
    pub fn versionbits_mask(&self, pos: DeploymentPos) -> Option<Version> {
        if !self.deployments.contains_key(&pos) {
            return None;
        }
        Some(Versionbits::new(pos, self).mask())
    }

    /// Computes the version word a miner should place in a block mined on
    /// top of `parent`: the top bits plus the mask of every deployment that
    /// is currently signalling.
    pub fn compute_versionbits<I: VersionbitsIndexer>(
        &self,
        parent: Option<&HeaderView>,
        indexer: &I,
    ) -> Option<Version> {
        let mut version = VERSIONBITS_TOP_BITS;

        for pos in self.deployments.keys() {
            let versionbits = Versionbits::new(*pos, self);
            let cache = self.versionbits_caches.cache(pos)?;
            let state = versionbits.get_state(parent, cache, indexer)?;
            match state {
                ThresholdState::Started
                | ThresholdState::MustSignal
                | ThresholdState::LockedIn => {
                    version |= versionbits.mask();
                }
                ThresholdState::Defined | ThresholdState::Active | ThresholdState::Failed => {}
            }
        }

        Some(version)
    }

    #[cfg(test)]
    pub(crate) fn versionbits_caches(&self) -> &VersionbitsCache {
        &self.versionbits_caches
    }
}
