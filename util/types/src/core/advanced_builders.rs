//! Builders for the view types.

use crate::core::{BlockNumber, HeaderView, Version};
use crate::Byte32;
use braid_hash::new_blake2b;

/// Assembles a [`HeaderView`], deriving its hash from the other fields.
#[derive(Clone, Debug, Default)]
pub struct HeaderBuilder {
    number: BlockNumber,
    version: Version,
    parent_hash: Byte32,
}

impl HeaderBuilder {
    pub fn number(mut self, number: BlockNumber) -> Self {
        self.number = number;
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn parent_hash(mut self, parent_hash: Byte32) -> Self {
        self.parent_hash = parent_hash;
        self
    }

    pub fn build(self) -> HeaderView {
        let HeaderBuilder {
            number,
            version,
            parent_hash,
        } = self;

        let mut hasher = new_blake2b();
        hasher.update(&number.to_le_bytes());
        hasher.update(&version.to_le_bytes());
        hasher.update(parent_hash.as_slice());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        HeaderView {
            hash: Byte32::new(hash),
            number,
            version,
            parent_hash,
        }
    }
}
