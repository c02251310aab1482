use crate::cas::Hash;
use crate::error::{io_err, Error, Result};
use crate::fs::Mode;
use crate::util::write_atomically;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A staged file: its repository-relative path, the hash of its content, the mode it had when
/// staged, and, when it was staged as a change against the last commit, the delta object
/// recording that change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: String,
    pub hash: Hash,
    pub delta: Option<Hash>,
    pub mode: Mode,
}

impl IndexEntry {
    pub fn new<S: Into<String>>(path: S, hash: Hash, delta: Option<Hash>) -> IndexEntry {
        IndexEntry {
            path: path.into(),
            hash,
            delta,
            mode: Mode::Regular,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> IndexEntry {
        self.mode = mode;
        self
    }

    /// Parse `<path> <hash> [<delta>] [<mode>]`.  Paths may contain spaces, so the other fields
    /// are taken from the end of the line.  A missing mode is `100644`.
    fn parse(line: &str) -> Result<IndexEntry> {
        let bad = || Error::malformed("index", format!("bad line {:?}", line));

        let (rest, mode) = match line.rfind(' ') {
            Some(i) => match Mode::parse(&line[i + 1..]) {
                Ok(mode @ Mode::Regular) | Ok(mode @ Mode::Executable) => (&line[..i], mode),
                _ => (line, Mode::Regular),
            },
            None => return Err(bad()),
        };

        let fields: Vec<&str> = rest.rsplitn(3, ' ').collect();
        if fields.len() == 3 && Hash::is_hex(fields[0]) && Hash::is_hex(fields[1]) {
            return Ok(IndexEntry {
                path: fields[2].to_string(),
                hash: Hash::from_hex(fields[1])?,
                delta: Some(Hash::from_hex(fields[0])?),
                mode,
            });
        }

        let mut fields = rest.rsplitn(2, ' ');
        let hash = fields.next().filter(|h| Hash::is_hex(h)).ok_or_else(bad)?;
        let path = fields.next().filter(|p| !p.is_empty()).ok_or_else(bad)?;
        Ok(IndexEntry {
            path: path.to_string(),
            hash: Hash::from_hex(hash)?,
            delta: None,
            mode,
        })
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.path, self.hash)?;
        if let Some(ref delta) = self.delta {
            write!(f, " {}", delta)?;
        }
        if self.mode != Mode::Regular {
            write!(f, " {}", self.mode)?;
        }
        Ok(())
    }
}

/// Paths are stored one per line, so a path containing a line break cannot be staged.
pub fn check_path(path: &str) -> Result<()> {
    if path.is_empty() || path.contains(|c: char| c == '\n' || c == '\r') {
        return Err(Error::InvalidInput(format!("cannot stage path {:?}", path)));
    }
    Ok(())
}

/// How a file on disk relates to its staged version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// not staged before
    New,
    /// staged with the same content
    Unchanged,
    /// staged with different content
    Changed,
}

/// StagingIndex is the persisted path -> hash mapping of files staged for the next commit.
#[derive(Debug)]
pub struct StagingIndex {
    path: PathBuf,
    entries: BTreeMap<String, IndexEntry>,
}

impl StagingIndex {
    /// Load the index file.  An absent file is an empty index; any other read failure is
    /// `IndexUnreadable`.  When a path appears on more than one line, the last line wins.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<StagingIndex> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(cause) => {
                return Err(Error::IndexUnreadable {
                    path: path.display().to_string(),
                    cause,
                })
            }
        };

        let mut entries = BTreeMap::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let entry = IndexEntry::parse(line)?;
            entries.insert(entry.path.clone(), entry);
        }
        trace!("loaded {} index entries from {}", entries.len(), path.display());
        Ok(StagingIndex { path, entries })
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// All entries, ordered by path.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare the current content hash of `path` against its staged hash.
    pub fn classify(&self, path: &str, hash: &Hash) -> Status {
        match self.entries.get(path) {
            None => Status::New,
            Some(entry) if entry.hash == *hash => Status::Unchanged,
            Some(_) => Status::Changed,
        }
    }

    /// Add a brand-new entry by appending one line to the index file.
    pub fn append(&mut self, entry: IndexEntry) -> Result<()> {
        check_path(&entry.path)?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err(&self.path))?;
        writeln!(file, "{}", entry).map_err(io_err(&self.path))?;
        debug!("staged new file {}", entry.path);
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    /// Replace the line for `path` with one carrying the new hashes and mode.  The whole file is
    /// rewritten to a temporary file and renamed over the index file.
    pub fn update_hash(
        &mut self,
        path: &str,
        hash: Hash,
        delta: Option<Hash>,
        mode: Mode,
    ) -> Result<()> {
        check_path(path)?;
        let entry = IndexEntry::new(path, hash, delta).with_mode(mode);
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(&self.path)(e)),
        };

        let mut replaced = false;
        let mut lines = vec![];
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if IndexEntry::parse(line)?.path == path {
                if !replaced {
                    lines.push(entry.to_string());
                    replaced = true;
                }
            } else {
                lines.push(line.to_string());
            }
        }
        if !replaced {
            lines.push(entry.to_string());
        }

        self.write_lines(&lines)?;
        debug!("restaged {}", path);
        self.entries.insert(path.to_string(), entry);
        Ok(())
    }

    /// Forget the delta recorded for every entry, so that the next round of changes is
    /// measured against the newly committed versions.
    pub fn clear_deltas(&mut self) -> Result<()> {
        if self.entries.values().all(|e| e.delta.is_none()) {
            return Ok(());
        }
        for entry in self.entries.values_mut() {
            entry.delta = None;
        }
        let lines: Vec<String> = self.entries.values().map(|e| e.to_string()).collect();
        self.write_lines(&lines)
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        write_atomically(&self.path, content.as_bytes())
    }

    /// The location of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
