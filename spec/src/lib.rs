//! # The Chain Specification
//!
//! A `ChainSpec` describes the consensus-relevant parameters of a braid
//! chain, in particular which soft fork deployments exist and how they are
//! signalled. Specs are plain serde structures, so operators can keep them
//! in TOML files next to the rest of the node configuration.
//!
//! [`ChainSpec::build_consensus`] validates the deployment table and turns
//! it into a [`consensus::Consensus`], the handle the rest of the system
//! queries deployment state through.

pub mod consensus;
pub mod versionbits;

mod error;

#[cfg(test)]
mod tests;

pub use error::SpecError;

use crate::consensus::{Consensus, ConsensusBuilder};
use crate::versionbits::{Deployment, DeploymentPos, VERSIONBITS_NUM_BITS};
use braid_logger::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The chain specification.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Chain name, carried into [`Consensus::id`].
    pub name: String,
    /// Consensus parameters.
    #[serde(default)]
    pub params: Params,
}

/// Tunable consensus parameters.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Params {
    /// Soft fork deployments, keyed by position.
    #[serde(default)]
    pub deployments: HashMap<DeploymentPos, Deployment>,
}

impl ChainSpec {
    /// Builds the consensus parameters described by this spec.
    pub fn build_consensus(&self) -> Result<Consensus, SpecError> {
        self.verify_deployments()?;

        let consensus = ConsensusBuilder::default()
            .id(self.name.clone())
            .softfork_deployments(self.params.deployments.clone())
            .build();
        debug!(
            "chain spec {} wired {} soft fork deployment(s)",
            consensus.id,
            consensus.deployments.len()
        );
        Ok(consensus)
    }

    fn verify_deployments(&self) -> Result<(), SpecError> {
        let mut bits = HashSet::new();
        for (pos, deployment) in &self.params.deployments {
            if u32::from(deployment.bit) >= VERSIONBITS_NUM_BITS {
                return Err(SpecError::InvalidDeploymentBit {
                    pos: *pos,
                    bit: deployment.bit,
                });
            }
            if !bits.insert(deployment.bit) {
                return Err(SpecError::DuplicateDeploymentBit {
                    bit: deployment.bit,
                });
            }
            if deployment.period == 0 {
                return Err(SpecError::InvalidDeploymentPeriod { pos: *pos });
            }
            if deployment.threshold > deployment.period {
                return Err(SpecError::InvalidDeploymentThreshold {
                    pos: *pos,
                    threshold: deployment.threshold,
                    period: deployment.period,
                });
            }
        }
        Ok(())
    }
}
