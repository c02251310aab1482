//! `cas` -- a content-addressible object store.  Every object is an immutable byte payload keyed
//! by the SHA-1 of its exact contents.  Blobs, trees, commits, and deltas all share the store and
//! are distinguished only by the grammar of their content.
//!
//! The API is in the `CAS` trait.
//!
//! # Examples
//!
//! ```
//! use gotit::cas::{Storage, CAS};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let storage = Storage::new(dir.path().join("objects"));
//!
//! let hash = storage.store(b"hello").unwrap();
//! assert_eq!(hash.to_hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
//! assert_eq!(storage.retrieve(&hash).unwrap(), b"hello".to_vec());
//! ```

mod hash;
mod local;
mod storage;
mod traits;

pub use self::hash::{Hash, HEX_LEN};
pub use self::local::LocalStorage;
pub use self::storage::Storage;
pub use self::traits::CAS;
