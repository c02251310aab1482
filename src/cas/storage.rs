use super::hash::Hash;
use super::traits::CAS;
use crate::error::{io_err, Error, Result};
use crate::util::write_atomically;
use log::trace;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Type Storage is the on-disk object store.  Each object lives at
/// `objects/<first 2 hex chars>/<remaining 38 hex chars>` below the store's root.
///
/// Writes go to a uniquely-named temporary file in the shard directory and are renamed into
/// place, so concurrent writers of the same content never observe a partially-written object.
#[derive(Debug, Clone)]
pub struct Storage {
    objects: PathBuf,
}

impl Storage {
    /// Create a storage pool rooted at the given `objects` directory.
    pub fn new<P: Into<PathBuf>>(objects: P) -> Storage {
        Storage {
            objects: objects.into(),
        }
    }

    /// The sharded path at which the object with the given hash is stored.
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash.to_hex();
        let (prefix, suffix) = hex.split_at(2);
        self.objects.join(prefix).join(suffix)
    }
}

impl CAS for Storage {
    fn store(&self, content: &[u8]) -> Result<Hash> {
        let hash = Hash::for_bytes(content);
        let path = self.object_path(&hash);
        if path.exists() {
            trace!("object {} already stored", hash);
            return Ok(hash);
        }
        write_atomically(&path, content)?;
        trace!("stored object {} ({} bytes)", hash, content.len());
        Ok(hash)
    }

    fn retrieve(&self, hash: &Hash) -> Result<Vec<u8>> {
        let path = self.object_path(hash);
        match fs::read(&path) {
            Ok(content) => Ok(content),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::ObjectNotFound(hash.clone()))
            }
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.object_path(hash).is_file()
    }
}
