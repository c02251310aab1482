use super::object::{EntryKind, Mode, TreeEntry};
use crate::cas::{Hash, CAS};
use crate::error::{Error, Result};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::str;

/// What a staged path contributes to its directory's tree: the object its line points to, and
/// the mode of the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub kind: EntryKind,
    pub hash: Hash,
    pub mode: Mode,
}

impl Leaf {
    pub fn blob(hash: Hash, mode: Mode) -> Leaf {
        Leaf {
            kind: EntryKind::Blob,
            hash,
            mode,
        }
    }

    pub fn delta(hash: Hash, mode: Mode) -> Leaf {
        Leaf {
            kind: EntryKind::Delta,
            hash,
            mode,
        }
    }
}

/// A TreeBuilder converts a flat mapping of paths to leaves into nested tree objects, one per
/// directory level, writing each to storage before the tree that refers to it.
///
/// Each directory's serialized form lists its files (sorted by name) and then its
/// subdirectories (sorted by name).  Every subdirectory line is followed inline by the full
/// serialized text of that subdirectory, which is also stored as an object in its own right, so
/// the same input always produces the same root hash.
pub struct TreeBuilder<'a, ST: 'a + CAS> {
    storage: &'a ST,
}

impl<'a, ST> TreeBuilder<'a, ST>
where
    ST: 'a + CAS,
{
    pub fn new(storage: &'a ST) -> TreeBuilder<'a, ST> {
        TreeBuilder { storage }
    }

    /// Build and store the trees for `leaves`, returning the hash of the root tree.  Paths are
    /// `/`-separated; `root_prefix` is stripped from each path before it is split.
    pub fn build(&self, leaves: &BTreeMap<String, Leaf>, root_prefix: &str) -> Result<Hash> {
        let entries: Vec<(&str, &Leaf)> = leaves
            .iter()
            .map(|(path, leaf)| {
                let rel = path.strip_prefix(root_prefix).unwrap_or(path);
                (rel.trim_start_matches('/'), leaf)
            })
            .collect();
        let (_, hash) = self.build_level("", &entries)?;
        debug!("built tree {} from {} entries", hash, leaves.len());
        Ok(hash)
    }

    /// Serialize and store one directory level, returning its text and hash.
    fn build_level(&self, dir: &str, entries: &[(&str, &Leaf)]) -> Result<(String, Hash)> {
        let mut files: BTreeMap<&str, &Leaf> = BTreeMap::new();
        let mut dirs: BTreeMap<&str, Vec<(&str, &Leaf)>> = BTreeMap::new();
        for &(path, leaf) in entries {
            match path.find('/') {
                None => {
                    files.insert(path, leaf);
                }
                Some(i) => dirs
                    .entry(&path[..i])
                    .or_insert_with(Vec::new)
                    .push((&path[i + 1..], leaf)),
            }
        }

        let mut text = String::new();
        for (name, leaf) in files {
            // writing to a String cannot fail
            let _ = writeln!(text, "{} {} {}\t{}", leaf.mode, leaf.kind, leaf.hash, name);
        }
        for (name, children) in dirs {
            let subdir = if dir.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", dir, name)
            };
            let (subtext, subhash) = self.build_level(&subdir, &children)?;
            let _ = writeln!(
                text,
                "{} {} {}\t{}",
                Mode::Directory,
                EntryKind::Tree,
                subhash,
                name
            );
            text.push_str(&subtext);
        }

        let hash = self
            .storage
            .store(text.as_bytes())
            .map_err(|e| Error::TreeBuildFailed {
                dir: dir.to_string(),
                reason: e.to_string(),
            })?;
        trace!("stored tree {} for {:?}", hash, dir);
        Ok((text, hash))
    }
}

/// Parse a stored tree object into its direct entries.  The inline copy of each subtree is
/// skipped using the length of that subtree's own stored object, after checking that the two are
/// byte-identical.
pub fn parse_tree<ST: CAS>(storage: &ST, content: &[u8]) -> Result<Vec<TreeEntry>> {
    let text = str::from_utf8(content).map_err(|_| Error::malformed("tree", "not UTF-8"))?;
    let mut entries = vec![];
    let mut pos = 0;
    while pos < text.len() {
        let end = match text[pos..].find('\n') {
            Some(i) => pos + i,
            None => return Err(Error::malformed("tree", "unterminated entry")),
        };
        let entry = TreeEntry::parse(&text[pos..end])?;
        pos = end + 1;
        if entry.kind == EntryKind::Tree {
            let subtree = storage.retrieve(&entry.hash)?;
            if !content[pos..].starts_with(&subtree) {
                return Err(Error::malformed(
                    "tree",
                    format!("inline content of {:?} does not match {}", entry.name, entry.hash),
                ));
            }
            pos += subtree.len();
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Retrieve and parse the tree with the given hash.
pub fn read_tree<ST: CAS>(storage: &ST, hash: &Hash) -> Result<Vec<TreeEntry>> {
    parse_tree(storage, &storage.retrieve(hash)?)
}

/// Find the entry for a `/`-separated file path below the given root tree, descending through
/// `tree` entries for every segment but the last.  Returns `None` if the path does not name a
/// file in the tree.
pub fn lookup<ST: CAS>(storage: &ST, root: &Hash, path: &str) -> Result<Option<TreeEntry>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut current = root.clone();
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        let found = read_tree(storage, &current)?.into_iter().find(|e| {
            e.name == *segment && ((e.kind == EntryKind::Tree) != last)
        });
        match found {
            None => return Ok(None),
            Some(entry) if last => return Ok(Some(entry)),
            Some(entry) => current = entry.hash,
        }
    }
    Ok(None)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cas::LocalStorage;
    use proptest::prelude::*;

    fn blob(storage: &LocalStorage, content: &str) -> Leaf {
        Leaf::blob(storage.store(content.as_bytes()).unwrap(), Mode::Regular)
    }

    fn make_leaves(storage: &LocalStorage) -> BTreeMap<String, Leaf> {
        let mut leaves = BTreeMap::new();
        leaves.insert("a.txt".to_string(), blob(storage, "a"));
        leaves.insert("dir1/dir2/b.txt".to_string(), blob(storage, "b"));
        leaves.insert("dir1/c.txt".to_string(), blob(storage, "c"));
        leaves.insert("dir3/d.txt".to_string(), blob(storage, "d"));
        leaves
    }

    #[test]
    fn single_file() {
        let storage = LocalStorage::new();
        let mut leaves = BTreeMap::new();
        leaves.insert("a.txt".to_string(), blob(&storage, "hello"));

        let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();
        assert_eq!(
            storage.retrieve(&root).unwrap(),
            b"100644 blob aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d\ta.txt\n".to_vec()
        );
    }

    #[test]
    fn empty_tree() {
        let storage = LocalStorage::new();
        let root = TreeBuilder::new(&storage)
            .build(&BTreeMap::new(), "")
            .unwrap();
        assert_eq!(root, Hash::for_bytes(b""));
        assert!(read_tree(&storage, &root).unwrap().is_empty());
    }

    #[test]
    fn nested_trees_are_stored_and_inlined() {
        let storage = LocalStorage::new();
        let leaves = make_leaves(&storage);
        let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();

        let root_text = String::from_utf8(storage.retrieve(&root).unwrap()).unwrap();
        let entries = read_tree(&storage, &root).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "dir1", "dir3"]);

        // the dir1 object is independently stored and also appears inline in the root
        let dir1 = &entries[1];
        assert_eq!(dir1.kind, EntryKind::Tree);
        assert_eq!(dir1.mode, Mode::Directory);
        let dir1_text = String::from_utf8(storage.retrieve(&dir1.hash).unwrap()).unwrap();
        assert!(root_text.contains(&format!("{}\n{}", dir1, dir1_text)));

        let dir1_entries = read_tree(&storage, &dir1.hash).unwrap();
        let names: Vec<&str> = dir1_entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["c.txt", "dir2"]);

        let dir2_entries = read_tree(&storage, &dir1_entries[1].hash).unwrap();
        assert_eq!(dir2_entries.len(), 1);
        assert_eq!(dir2_entries[0].name, "b.txt");
        assert_eq!(dir2_entries[0].kind, EntryKind::Blob);
        assert_eq!(dir2_entries[0].hash, Hash::for_bytes(b"b"));
    }

    #[test]
    fn deterministic() {
        let storage = LocalStorage::new();
        let leaves = make_leaves(&storage);
        let builder = TreeBuilder::new(&storage);
        let first = builder.build(&leaves, "").unwrap();
        let second = builder.build(&leaves.clone(), "").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn root_prefix_is_stripped() {
        let storage = LocalStorage::new();
        let mut plain = BTreeMap::new();
        let mut prefixed = BTreeMap::new();
        plain.insert("x/y.txt".to_string(), blob(&storage, "y"));
        prefixed.insert("/work/repo/x/y.txt".to_string(), blob(&storage, "y"));

        let builder = TreeBuilder::new(&storage);
        assert_eq!(
            builder.build(&plain, "").unwrap(),
            builder.build(&prefixed, "/work/repo/").unwrap()
        );
    }

    #[test]
    fn lookup_paths() {
        let storage = LocalStorage::new();
        let leaves = make_leaves(&storage);
        let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();

        let b = lookup(&storage, &root, "dir1/dir2/b.txt").unwrap().unwrap();
        assert_eq!(b.hash, Hash::for_bytes(b"b"));
        let a = lookup(&storage, &root, "a.txt").unwrap().unwrap();
        assert_eq!(a.hash, Hash::for_bytes(b"a"));

        // directories, missing files, and files used as directories are not found
        assert!(lookup(&storage, &root, "dir1").unwrap().is_none());
        assert!(lookup(&storage, &root, "dir1/nope.txt").unwrap().is_none());
        assert!(lookup(&storage, &root, "a.txt/b.txt").unwrap().is_none());
        assert!(lookup(&storage, &root, "").unwrap().is_none());
    }

    #[test]
    fn parse_rejects_bad_inline_content() {
        let storage = LocalStorage::new();
        let leaves = make_leaves(&storage);
        let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();
        let mut text = String::from_utf8(storage.retrieve(&root).unwrap()).unwrap();
        text = text.replace("\tb.txt", "\tX.txt");
        assert!(parse_tree(&storage, text.as_bytes()).is_err());
    }

    #[test]
    fn parse_rejects_missing_subtree() {
        let storage = LocalStorage::new();
        let leaves = make_leaves(&storage);
        let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();
        let text = storage.retrieve(&root).unwrap();

        match parse_tree(&LocalStorage::new(), &text) {
            Err(Error::ObjectNotFound(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wide_directory() {
        let storage = LocalStorage::new();
        let mut leaves = BTreeMap::new();
        for i in 0..5000 {
            leaves.insert(format!("src/file{:05}.rs", i), blob(&storage, &i.to_string()));
        }
        leaves.insert("top.txt".to_string(), blob(&storage, "top"));
        let root = TreeBuilder::new(&storage).build(&leaves, "").unwrap();

        let entries = read_tree(&storage, &root).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["top.txt", "src"]);
        assert_eq!(read_tree(&storage, &entries[1].hash).unwrap().len(), 5000);

        let found = lookup(&storage, &root, "src/file04999.rs").unwrap().unwrap();
        assert_eq!(found.hash, Hash::for_bytes(b"4999"));
    }

    fn arb_path() -> impl Strategy<Value = String> {
        let segment = proptest::sample::select(vec!["a", "b", "c", "d.txt"]);
        proptest::collection::vec(segment, 1..4)
            .prop_map(|segments| segments.join("/"))
    }

    proptest! {
        #[test]
        fn build_is_deterministic_and_findable(
            files in proptest::collection::btree_map(arb_path(), "[a-z]{0,8}", 0..20),
        ) {
            // a path cannot be both a file and a directory
            let files: BTreeMap<String, String> = files
                .iter()
                .filter(|(path, _)| {
                    !files.keys().any(|other| other.starts_with(&format!("{}/", path)))
                })
                .map(|(path, content)| (path.clone(), content.clone()))
                .collect();

            let first = LocalStorage::new();
            let second = LocalStorage::new();
            let leaves_in = |storage: &LocalStorage| -> BTreeMap<String, Leaf> {
                files.iter().map(|(path, content)| (path.clone(), blob(storage, content))).collect()
            };
            let root = TreeBuilder::new(&first).build(&leaves_in(&first), "").unwrap();
            let again = TreeBuilder::new(&second).build(&leaves_in(&second), "").unwrap();
            prop_assert_eq!(&root, &again);

            for (path, content) in &files {
                let entry = lookup(&first, &root, path).unwrap().unwrap();
                prop_assert_eq!(entry.hash, Hash::for_bytes(content.as_bytes()));
            }
        }
    }
}
