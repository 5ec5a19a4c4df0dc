use crate::versionbits::DeploymentPos;
use braid_types::core::BlockNumber;
use thiserror::Error;

/// Errors raised while validating a chain specification.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SpecError {
    /// The deployment claims a signal bit outside the versionbits range.
    #[error("deployment {pos:?} uses invalid signal bit {bit}")]
    InvalidDeploymentBit {
        /// Offending deployment.
        pos: DeploymentPos,
        /// The out-of-range bit.
        bit: u8,
    },

    /// Two deployments claim the same signal bit.
    #[error("signal bit {bit} is claimed by more than one deployment")]
    DuplicateDeploymentBit {
        /// The contested bit.
        bit: u8,
    },

    /// The deployment declares an empty signalling period.
    #[error("deployment {pos:?} has a zero-length signalling period")]
    InvalidDeploymentPeriod {
        /// Offending deployment.
        pos: DeploymentPos,
    },

    /// The deployment threshold can never be met.
    #[error("deployment {pos:?} threshold {threshold} exceeds its period {period}")]
    InvalidDeploymentThreshold {
        /// Offending deployment.
        pos: DeploymentPos,
        /// Declared threshold.
        threshold: BlockNumber,
        /// Declared period.
        period: BlockNumber,
    },
}
