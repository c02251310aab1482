use crate::cas::Hash;
use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// The type of object a tree entry points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    /// A full copy of a file's content
    Blob,
    /// A nested directory
    Tree,
    /// A patch against the same path in the parent commit
    Delta,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Blob => "blob",
            EntryKind::Tree => "tree",
            EntryKind::Delta => "delta",
        }
    }

    pub fn parse(s: &str) -> Result<EntryKind> {
        match s {
            "blob" => Ok(EntryKind::Blob),
            "tree" => Ok(EntryKind::Tree),
            "delta" => Ok(EntryKind::Delta),
            _ => Err(Error::malformed("tree", format!("unknown entry type {:?}", s))),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POSIX-style mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Regular,
    Executable,
    Directory,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Regular => "100644",
            Mode::Executable => "100755",
            Mode::Directory => "40000",
        }
    }

    pub fn parse(s: &str) -> Result<Mode> {
        match s {
            "100644" => Ok(Mode::Regular),
            "100755" => Ok(Mode::Executable),
            "40000" => Ok(Mode::Directory),
            _ => Err(Error::malformed("tree", format!("unknown mode {:?}", s))),
        }
    }

    /// The mode of a file on disk: executable if any of the owner, group, or other execute bits
    /// is set.
    #[cfg(unix)]
    pub fn of_file(path: &Path) -> Option<Mode> {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(path).ok()?;
        if meta.is_dir() {
            Some(Mode::Directory)
        } else if meta.permissions().mode() & 0o111 != 0 {
            Some(Mode::Executable)
        } else {
            Some(Mode::Regular)
        }
    }

    #[cfg(not(unix))]
    pub fn of_file(path: &Path) -> Option<Mode> {
        let meta = fs::metadata(path).ok()?;
        if meta.is_dir() {
            Some(Mode::Directory)
        } else {
            Some(Mode::Regular)
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a tree object: `<mode> <type> <hash>\t<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: Mode,
    pub kind: EntryKind,
    pub hash: Hash,
    pub name: String,
}

impl TreeEntry {
    /// Parse a single entry line (without its trailing newline).
    pub fn parse(line: &str) -> Result<TreeEntry> {
        let mut halves = line.splitn(2, '\t');
        let header = halves.next().unwrap_or("");
        let name = halves
            .next()
            .ok_or_else(|| Error::malformed("tree", format!("entry without a name: {:?}", line)))?;

        let fields: Vec<&str> = header.split(' ').collect();
        if fields.len() != 3 {
            return Err(Error::malformed("tree", format!("bad entry {:?}", line)));
        }
        Ok(TreeEntry {
            mode: Mode::parse(fields[0])?,
            kind: EntryKind::parse(fields[1])?,
            hash: Hash::from_hex(fields[2])
                .map_err(|_| Error::malformed("tree", format!("bad hash in {:?}", line)))?,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for TreeEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}\t{}", self.mode, self.kind, self.hash, self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    #[test]
    fn entry_format() {
        let entry = TreeEntry {
            mode: Mode::Regular,
            kind: EntryKind::Blob,
            hash: Hash::from_hex(HELLO).unwrap(),
            name: "a.txt".to_string(),
        };
        assert_eq!(format!("{}", entry), format!("100644 blob {}\ta.txt", HELLO));
    }

    #[test]
    fn entry_parse() {
        let entry = TreeEntry::parse(&format!("40000 tree {}\tmy dir", HELLO)).unwrap();
        assert_eq!(entry.mode, Mode::Directory);
        assert_eq!(entry.kind, EntryKind::Tree);
        assert_eq!(entry.name, "my dir");
    }

    #[test]
    fn entry_parse_errors() {
        assert!(TreeEntry::parse(&format!("100644 blob {} a.txt", HELLO)).is_err());
        assert!(TreeEntry::parse(&format!("100644 link {}\ta.txt", HELLO)).is_err());
        assert!(TreeEntry::parse(&format!("100600 blob {}\ta.txt", HELLO)).is_err());
        assert!(TreeEntry::parse("100644 blob 1234\ta.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn mode_of_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        let script = dir.path().join("script");
        fs::write(&plain, "x").unwrap();
        fs::write(&script, "#!/bin/sh").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

        assert_eq!(Mode::of_file(&plain), Some(Mode::Regular));
        assert_eq!(Mode::of_file(&script), Some(Mode::Executable));
        assert_eq!(Mode::of_file(dir.path()), Some(Mode::Directory));
        assert_eq!(Mode::of_file(&dir.path().join("missing")), None);
    }
}
