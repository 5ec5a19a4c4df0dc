//! Versionbits defines a finite-state-machine to deploy a soft fork in
//! multiple stages, driven by miner signalling counted over fixed-length
//! windows of blocks.
//!

use crate::consensus::Consensus;
use braid_types::{
    core::{BlockNumber, HeaderView, Version},
    Byte32,
};
use braid_util::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{hash_map, HashMap};
use std::sync::Arc;

/// What bits to set in version for versionbits blocks.
pub const VERSIONBITS_TOP_BITS: Version = 0x2000_0000;
/// What bitmask determines whether versionbits is in use.
pub const VERSIONBITS_TOP_MASK: Version = 0xE000_0000;
/// Total bits available for versionbits.
pub const VERSIONBITS_NUM_BITS: u32 = 29;

/// State transitions happen at period boundaries if conditions are met.
/// Without a transition, state is inherited between periods. All blocks of a
/// period share the same state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ThresholdState {
    /// First state that each softfork starts.
    /// The genesis block is by definition in this state for each deployment.
    Defined,
    /// For periods past the `start` height.
    Started,
    /// For the one period immediately before the timeout, if `Started` and
    /// `lock_in_on_timeout` is set. Blocks of this period must signal.
    MustSignal,
    /// For one period after the first `Started`/`MustSignal` period with at
    /// least `threshold` blocks having the associated bit set in version.
    LockedIn,
    /// For all periods after the `LockedIn` period, once the minimum
    /// activation height is reached (final state).
    Active,
    /// For all periods past the timeout, if `LockedIn` was not reached
    /// (final state).
    Failed,
}

/// Degenerate deployment modes.
///
/// `Always` and `Never` bypass the signalling machinery entirely. This is
/// useful for testing, as it means tests don't need to deal with the
/// activation process.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveMode {
    /// Indicating that the deployment follows the normal signalling life
    /// cycle.
    #[default]
    Normal,
    /// Indicating that the deployment is always active.
    Always,
    /// Indicating that the deployment is never active.
    Never,
}

/// Soft fork deployment positions.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPos {
    /// Dummy
    Testdummy,
    /// Light client protocol
    LightClient,
}

/// Struct for each individual consensus rule change using a soft fork.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Deployment {
    /// Determines which bit in the `version` field of the block is to be used
    /// to signal the softfork lock-in and activation. It is chosen from the
    /// set {0,1,2,...,28}.
    pub bit: u8,
    /// Specifies the height of the first block at which the bit gains
    /// meaning.
    pub start: BlockNumber,
    /// Specifies the height at which the miner signalling ends. Once this
    /// height has been reached, if the softfork has not yet locked in
    /// (excluding the current period's signalling), the deployment is
    /// considered failed on all descendants of the block.
    pub timeout: BlockNumber,
    /// Specifies the height at which the softfork is allowed to become
    /// active.
    #[serde(default)]
    pub min_activation_height: BlockNumber,
    /// Specifies the length in blocks of the signalling period.
    pub period: BlockNumber,
    /// Specifies the minimum number of signalling blocks per period which
    /// locks the softfork in.
    pub threshold: BlockNumber,
    /// Degenerate mode override, `Normal` for real deployments.
    #[serde(default)]
    pub active_mode: ActiveMode,
    /// If true, the final period before the timeout transitions to
    /// `MustSignal` instead of failing.
    #[serde(default)]
    pub lock_in_on_timeout: bool,
}

/// Signalling statistics for one period.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ThresholdStats {
    /// Length of the signalling period.
    pub period: BlockNumber,
    /// Number of signalling blocks required to lock in.
    pub threshold: BlockNumber,
    /// Blocks of the current period mined so far, including the query block.
    pub elapsed: BlockNumber,
    /// Signalling blocks among the elapsed ones.
    pub count: BlockNumber,
    /// Whether the threshold is still reachable before the period ends.
    pub possible: bool,
}

/// The chain-index collaborator: immutable block metadata by hash.
pub trait VersionbitsIndexer {
    /// Gets the block header named by `hash`.
    fn block_header(&self, hash: &Byte32) -> Option<HeaderView>;

    /// Gets the ancestor of `base` at height `number`.
    ///
    /// The provided implementation walks parent pointers one block at a
    /// time. Indexes that maintain a height table or skip list should
    /// override it with an O(log n) lookup.
    fn ancestor(&self, base: &Byte32, number: BlockNumber) -> Option<HeaderView> {
        let mut header = self.block_header(base)?;
        if header.number() < number {
            return None;
        }
        while header.number() > number {
            header = self.block_header(&header.parent_hash())?;
        }
        Some(header)
    }
}

type Cache = Mutex<HashMap<Byte32, ThresholdState>>;

/// Soft forks are deployed in parallel; we cache per-period state for every
/// one of them, keyed by the identity of the period's representative block.
/// `Byte32::zero()` keys the parent of genesis.
///
/// Entries are append-only: once a representative has a state it is never
/// rewritten, so entries stay valid across chain reorganisations.
#[derive(Clone, Debug, Default)]
pub struct VersionbitsCache {
    caches: Arc<HashMap<DeploymentPos, Cache>>,
}

impl VersionbitsCache {
    /// Construct a new cache instance holding one map per deployment.
    pub fn new<'a>(deployments: impl Iterator<Item = &'a DeploymentPos>) -> Self {
        let caches: HashMap<_, _> = deployments
            .map(|pos| (*pos, Mutex::new(HashMap::new())))
            .collect();
        VersionbitsCache {
            caches: Arc::new(caches),
        }
    }

    /// Returns a reference to the cache corresponding to the deployment.
    pub fn cache(&self, pos: &DeploymentPos) -> Option<&Cache> {
        self.caches.get(pos)
    }

    /// Drops all cached states, e.g. after a parameter reload.
    pub fn clear(&self) {
        for cache in self.caches.values() {
            cache.lock().clear();
        }
    }
}

/// Implements the versionbits threshold logic for one deployment, reading
/// its parameters out of [`Consensus`].
pub struct Versionbits<'a> {
    id: DeploymentPos,
    consensus: &'a Consensus,
}

/// Trait that implements versionbits threshold logic, and caches results.
pub trait VersionbitsConditionChecker {
    /// Height of the first block at which the deployment bit gains meaning.
    fn start(&self) -> BlockNumber;
    /// Height at which miner signalling ends.
    fn timeout(&self) -> BlockNumber;
    /// Height at which the softfork is allowed to become active.
    fn min_activation_height(&self) -> BlockNumber;
    /// The period over which signals are counted.
    fn period(&self) -> BlockNumber;
    /// The number of signalling blocks per period that locks the softfork in.
    fn threshold(&self) -> BlockNumber;
    /// Whether the final period before the timeout forces signalling.
    fn lock_in_on_timeout(&self) -> bool;
    /// Degenerate mode override.
    fn active_mode(&self) -> ActiveMode;
    /// Determines whether the block signals for the deployment.
    fn condition(&self, header: &HeaderView) -> bool;

    /// Returns the state applicable to the block whose parent is `tip`
    /// (`None` denotes the parent of genesis). Applies any state transitions
    /// that became due, caching one state per period representative.
    fn get_state<I: VersionbitsIndexer>(
        &self,
        tip: Option<&HeaderView>,
        cache: &Cache,
        indexer: &I,
    ) -> Option<ThresholdState> {
        let start = self.start();
        let timeout = self.timeout();
        let period = self.period();
        let threshold = self.threshold();
        let min_activation_height = self.min_activation_height();
        let lock_in_on_timeout = self.lock_in_on_timeout();

        debug_assert!(period > 0);
        debug_assert!(threshold <= period);

        match self.active_mode() {
            ActiveMode::Always => return Some(ThresholdState::Active),
            ActiveMode::Never => return Some(ThresholdState::Defined),
            ActiveMode::Normal => {}
        }

        // A block's state equals the state of the representative of its
        // period: the ancestor whose height is one less than a multiple of
        // `period`. Blocks below the first boundary are represented by the
        // parent of genesis.
        let mut current = match tip {
            Some(tip) => match tip.number().checked_sub((tip.number() + 1) % period) {
                Some(target) => Some(indexer.ancestor(&tip.hash(), target)?),
                None => None,
            },
            None => None,
        };

        // Walk backwards in steps of `period` until a representative with a
        // known state is found.
        let mut g_cache = cache.lock();
        let mut to_compute = Vec::new();
        let mut state = loop {
            let key = current
                .as_ref()
                .map(HeaderView::hash)
                .unwrap_or_else(Byte32::zero);
            match g_cache.entry(key) {
                hash_map::Entry::Occupied(entry) => {
                    break *entry.get();
                }
                hash_map::Entry::Vacant(entry) => match current.take() {
                    None => {
                        // The genesis block is by definition defined.
                        entry.insert(ThresholdState::Defined);
                        break ThresholdState::Defined;
                    }
                    Some(rep) => {
                        // State is tracked by the parent block, so the height
                        // to compare against is one past the representative.
                        if rep.number() + 1 < start {
                            // No earlier period can have left Defined.
                            entry.insert(ThresholdState::Defined);
                            break ThresholdState::Defined;
                        }
                        current = match rep.number().checked_sub(period) {
                            Some(target) => Some(indexer.ancestor(&rep.hash(), target)?),
                            None => None,
                        };
                        to_compute.push(rep);
                    }
                },
            }
        };

        // Now walk forward and compute the state of the descendant periods.
        while let Some(rep) = to_compute.pop() {
            let mut next_state = state;
            let height = rep.number() + 1;

            match state {
                ThresholdState::Defined => {
                    if height >= start {
                        next_state = ThresholdState::Started;
                    }
                }
                ThresholdState::Started => {
                    // We need to count
                    debug_assert!(rep.number() + 1 >= period);

                    let mut count = 0;
                    let mut cursor = rep.clone();
                    for remaining in (1..=period).rev() {
                        if self.condition(&cursor) {
                            count += 1;
                        }
                        if remaining > 1 {
                            cursor = indexer.block_header(&cursor.parent_hash())?;
                        }
                    }

                    // The order of these checks is consensus-critical.
                    if count >= threshold {
                        next_state = ThresholdState::LockedIn;
                    } else if lock_in_on_timeout && height.saturating_add(period) >= timeout {
                        next_state = ThresholdState::MustSignal;
                    } else if height >= timeout {
                        next_state = ThresholdState::Failed;
                    }
                }
                ThresholdState::MustSignal => {
                    // Always progresses into LockedIn.
                    next_state = ThresholdState::LockedIn;
                }
                ThresholdState::LockedIn => {
                    if height >= min_activation_height {
                        next_state = ThresholdState::Active;
                    }
                }
                ThresholdState::Failed | ThresholdState::Active => {
                    // Nothing happens, these are terminal states.
                }
            }

            state = next_state;
            let replaced = g_cache.insert(rep.hash(), state);
            debug_assert!(replaced.is_none() || replaced == Some(state));
        }

        Some(state)
    }

    /// Returns the height of the first block to which the current state
    /// applies.
    fn get_state_since_height<I: VersionbitsIndexer>(
        &self,
        tip: Option<&HeaderView>,
        cache: &Cache,
        indexer: &I,
    ) -> Option<BlockNumber> {
        if self.active_mode() == ActiveMode::Always {
            return Some(0);
        }

        let init_state = self.get_state(tip, cache, indexer)?;
        if init_state == ThresholdState::Defined {
            return Some(0);
        }

        let period = self.period();

        // A non-Defined state implies the chain has passed at least one
        // period boundary, so a real representative exists below the tip.
        let tip = tip?;
        let target = tip.number() - ((tip.number() + 1) % period);
        let mut rep = indexer.ancestor(&tip.hash(), target)?;

        // Walk backwards over period boundaries as long as the previous
        // period carried the same state.
        while let Some(prev_target) = rep.number().checked_sub(period) {
            let prev = indexer.ancestor(&rep.hash(), prev_target)?;
            if self.get_state(Some(&prev), cache, indexer)? != init_state {
                break;
            }
            rep = prev;
        }

        Some(rep.number() + 1)
    }

    /// Returns the signalling statistics for the period containing `block`
    /// (the block itself, not the parent of the block being considered).
    ///
    /// The result is mechanically computed in every state; it only carries
    /// meaning while the state is `Started` or `MustSignal`. On the last
    /// block of a period the reference point shifts to the new window, so
    /// `elapsed` and `count` are 0 and `possible` is true.
    fn get_statistics<I: VersionbitsIndexer>(
        &self,
        block: Option<&HeaderView>,
        indexer: &I,
    ) -> Option<ThresholdStats> {
        let period = self.period();
        let threshold = self.threshold();

        debug_assert!(period > 0);
        debug_assert!(threshold <= period);

        let mut stats = ThresholdStats {
            period,
            threshold,
            elapsed: 0,
            count: 0,
            possible: false,
        };

        let block = match block {
            Some(block) => block,
            None => return Some(stats),
        };

        // Blocks elapsed since the end of the previous period. Inside the
        // genesis period the reference point is the parent of genesis.
        let elapsed = (block.number() + 1) % period;

        let mut count = 0;
        let mut cursor = block.clone();
        for walked in 1..=elapsed {
            if self.condition(&cursor) {
                count += 1;
            }
            if walked < elapsed {
                cursor = indexer.block_header(&cursor.parent_hash())?;
            }
        }

        stats.elapsed = elapsed;
        stats.count = count;
        stats.possible = (period - threshold) >= (elapsed - count);

        Some(stats)
    }
}

impl<'a> Versionbits<'a> {
    /// Construct a new checker for the deployment at `id`.
    pub fn new(id: DeploymentPos, consensus: &'a Consensus) -> Self {
        Versionbits { id, consensus }
    }

    fn deployment(&self) -> &Deployment {
        &self.consensus.deployments[&self.id]
    }

    /// Return the bit mask of the corresponding deployment.
    pub fn mask(&self) -> Version {
        let bit = u32::from(self.deployment().bit);
        debug_assert!(bit < VERSIONBITS_NUM_BITS);
        1u32 << bit
    }
}

impl<'a> VersionbitsConditionChecker for Versionbits<'a> {
    fn start(&self) -> BlockNumber {
        self.deployment().start
    }

    fn timeout(&self) -> BlockNumber {
        self.deployment().timeout
    }

    fn min_activation_height(&self) -> BlockNumber {
        self.deployment().min_activation_height
    }

    fn period(&self) -> BlockNumber {
        self.deployment().period
    }

    fn threshold(&self) -> BlockNumber {
        self.deployment().threshold
    }

    fn lock_in_on_timeout(&self) -> bool {
        self.deployment().lock_in_on_timeout
    }

    fn active_mode(&self) -> ActiveMode {
        self.deployment().active_mode
    }

    fn condition(&self, header: &HeaderView) -> bool {
        let version = header.version();
        ((version & VERSIONBITS_TOP_MASK) == VERSIONBITS_TOP_BITS)
            && (version & self.mask()) != 0
    }
}
