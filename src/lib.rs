//! `gotit` is a small version-control engine modeled on Git's object model.
//!
//! Files are staged into an index, snapshotted into nested tree objects, and chained into
//! commits through parent links.  A file that changes between commits may be stored as a delta
//! against its previous version rather than in full; reading it back walks the commit history
//! until a full copy is found and replays the deltas on top of it.
//!
//! # Examples
//!
//! ```
//! use gotit::config::{Config, IdentityOverrides};
//! use gotit::repo::Repository;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let repo = Repository::init(dir.path(), Config::default()).unwrap();
//!
//! std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
//! repo.add(&["a.txt"]).unwrap();
//! repo.commit("first", &IdentityOverrides::new()).unwrap();
//!
//! std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
//! repo.add(&["a.txt"]).unwrap();
//! repo.commit("second", &IdentityOverrides::new()).unwrap();
//!
//! assert_eq!(repo.show("a.txt", None).unwrap(), b"hello world".to_vec());
//! assert_eq!(repo.log().unwrap().len(), 2);
//! ```

pub mod cas;
pub mod config;
pub mod delta;
pub mod error;
pub mod fs;
pub mod lock;
pub mod repo;
pub mod stage;
pub mod util;

pub use crate::error::{Error, Result};
pub use crate::repo::{CommitRecord, Repository, StageReport};
