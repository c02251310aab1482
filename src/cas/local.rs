use super::hash::Hash;
use super::traits::CAS;
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// LocalStorage provides an in-memory content-addressible storage pool, used in tests of the
/// components that sit above the store.
#[derive(Debug, Default)]
pub struct LocalStorage {
    map: RefCell<HashMap<Hash, Vec<u8>>>,
}

impl LocalStorage {
    pub fn new() -> LocalStorage {
        LocalStorage {
            map: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct objects stored
    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }
}

impl CAS for LocalStorage {
    fn store(&self, content: &[u8]) -> Result<Hash> {
        let hash = Hash::for_bytes(content);
        // note that we assume no hash collisions, since this is not a security-sensitive context
        self.map
            .borrow_mut()
            .entry(hash.clone())
            .or_insert_with(|| content.to_vec());
        Ok(hash)
    }

    fn retrieve(&self, hash: &Hash) -> Result<Vec<u8>> {
        match self.map.borrow().get(hash) {
            None => Err(Error::ObjectNotFound(hash.clone())),
            Some(content) => Ok(content.clone()),
        }
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.map.borrow().contains_key(hash)
    }
}
