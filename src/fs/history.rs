use super::commit::CommitData;
use super::object::EntryKind;
use super::tree;
use crate::cas::{Hash, CAS};
use crate::delta;
use crate::error::{Error, Result};
use log::trace;
use std::collections::HashSet;

/// One commit in a history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub hash: Hash,
    pub commit: CommitData,
}

/// Load and parse the commit with the given hash.
pub fn read_commit<ST: CAS>(storage: &ST, hash: &Hash) -> Result<CommitData> {
    CommitData::parse(&storage.retrieve(hash)?)
}

/// Walk from `start` back through parent links to the root commit, newest first.
pub fn log<ST: CAS>(storage: &ST, start: &Hash) -> Result<Vec<LogEntry>> {
    let mut entries = vec![];
    let mut seen = HashSet::new();
    let mut next = Some(start.clone());
    while let Some(hash) = next {
        if !seen.insert(hash.clone()) {
            return Err(Error::malformed(
                "commit",
                format!("parent cycle through {}", hash),
            ));
        }
        let commit = read_commit(storage, &hash)?;
        next = commit.parent.clone();
        entries.push(LogEntry { hash, commit });
    }
    Ok(entries)
}

/// Reconstruct the content of `path` as of commit `start`.
///
/// Walking back from `start`, each commit's tree is searched for `path`.  A `blob` entry ends the
/// walk; a `delta` entry is remembered and the walk continues at the parent commit.  Once a blob
/// is found, the remembered deltas are applied to it oldest first.
pub fn reconstruct<ST: CAS>(storage: &ST, start: &Hash, path: &str) -> Result<Vec<u8>> {
    let mut pending: Vec<Hash> = vec![];
    let mut seen = HashSet::new();
    let mut current = start.clone();

    let base = loop {
        let broken = || Error::BrokenDeltaChain {
            path: path.to_string(),
            commit: start.clone(),
        };
        if !seen.insert(current.clone()) {
            return Err(broken());
        }

        let commit = read_commit(storage, &current)?;
        let entry = match tree::lookup(storage, &commit.tree, path)? {
            Some(entry) => entry,
            None if pending.is_empty() => {
                return Err(Error::PathNotFound {
                    path: path.to_string(),
                    commit: current,
                })
            }
            // the file is absent from an ancestor its delta depends on
            None => return Err(broken()),
        };

        match entry.kind {
            EntryKind::Blob => break storage.retrieve(&entry.hash)?,
            EntryKind::Delta => {
                trace!("{} at {}: delta {}", path, current, entry.hash);
                pending.push(entry.hash);
                current = match commit.parent {
                    Some(parent) => parent,
                    None => return Err(broken()),
                };
            }
            EntryKind::Tree => {
                return Err(Error::malformed(
                    "tree",
                    format!("{} resolved to a directory", path),
                ))
            }
        }
    };

    let mut content = base;
    for hash in pending.iter().rev() {
        content = delta::apply(&storage.retrieve(hash)?, &content)?;
    }
    Ok(content)
}
