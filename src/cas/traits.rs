use super::hash::Hash;
use crate::error::Result;

/// Content Addressible Storage
///
/// When bytes are stored in this structure, their contents are hashed and the hash is returned.
/// The bytes can later be retrieved by that hash.  Objects are write-once: nothing is ever
/// updated in place or deleted.
pub trait CAS {
    /// Store a value into the storage pool, returning its hash.
    ///
    /// Inserting the same value twice will result in the same Hash (and no additional use of
    /// space).
    fn store(&self, content: &[u8]) -> Result<Hash>;

    /// Retrieve a value by hash, failing with `ObjectNotFound` if it is not present.
    fn retrieve(&self, hash: &Hash) -> Result<Vec<u8>>;

    /// Check whether an object is present, without reading it.
    fn contains(&self, hash: &Hash) -> bool;
}
