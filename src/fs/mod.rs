//! A Git-like versioned filesystem, based on `cas`.  This includes the idea of a "commit" with a
//! parent commit and a nested tree structure associated with each commit.  Files are stored
//! either as full blobs or as deltas against the same path in the parent commit.
//!
//! # Examples
//!
//! ```
//! use gotit::cas::{LocalStorage, CAS};
//! use gotit::fs::{lookup, Leaf, Mode, TreeBuilder};
//! use std::collections::BTreeMap;
//!
//! let storage = LocalStorage::new();
//! let hash = storage.store(b"hello").unwrap();
//!
//! let mut leaves = BTreeMap::new();
//! leaves.insert("dir/a.txt".to_string(), Leaf::blob(hash.clone(), Mode::Regular));
//! let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();
//!
//! let entry = lookup(&storage, &root, "dir/a.txt").unwrap().unwrap();
//! assert_eq!(entry.hash, hash);
//! ```

mod commit;
pub mod history;
mod object;
mod refs;
mod tree;

pub use self::commit::{CommitData, Signature};
pub use self::history::LogEntry;
pub use self::object::{EntryKind, Mode, TreeEntry};
pub use self::refs::Refs;
pub use self::tree::{lookup, parse_tree, read_tree, Leaf, TreeBuilder};
