use crate::core::{BlockNumber, Version};
use crate::Byte32;

/// An immutable view of a block header.
///
/// The hash is sealed over the remaining fields by [`HeaderBuilder::build`],
/// so two views with the same hash carry the same metadata.
///
/// [`HeaderBuilder::build`]: crate::core::HeaderBuilder::build
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderView {
    pub(crate) hash: Byte32,
    pub(crate) number: BlockNumber,
    pub(crate) version: Version,
    pub(crate) parent_hash: Byte32,
}

impl HeaderView {
    pub fn hash(&self) -> Byte32 {
        self.hash.clone()
    }

    pub fn number(&self) -> BlockNumber {
        self.number
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn parent_hash(&self) -> Byte32 {
        self.parent_hash.clone()
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::core::HeaderBuilder;
    use crate::Byte32;

    #[test]
    fn builder_seals_hash_over_fields() {
        let header = HeaderBuilder::default().number(7).version(1).build();
        let same = HeaderBuilder::default().number(7).version(1).build();
        let other = HeaderBuilder::default().number(7).version(2).build();

        assert_eq!(header, same);
        assert_eq!(header.hash(), same.hash());
        assert_ne!(header.hash(), other.hash());
    }

    #[test]
    fn genesis_has_zero_parent() {
        let genesis = HeaderBuilder::default().build();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.parent_hash(), Byte32::zero());

        let child = HeaderBuilder::default()
            .number(1)
            .parent_hash(genesis.hash())
            .build();
        assert!(!child.is_genesis());
        assert_eq!(child.parent_hash(), genesis.hash());
    }
}
