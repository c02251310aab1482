use crate::cas::Hash;
use crate::error::{io_err, Error, Result};
use crate::util::write_atomically;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const REF_PREFIX: &str = "ref: ";

/// Refs resolves HEAD and the branch refs below a repository's metadata directory.
#[derive(Debug, Clone)]
pub struct Refs {
    got_dir: PathBuf,
}

impl Refs {
    pub fn new<P: Into<PathBuf>>(got_dir: P) -> Refs {
        Refs {
            got_dir: got_dir.into(),
        }
    }

    fn head_path(&self) -> PathBuf {
        self.got_dir.join("HEAD")
    }

    /// Point HEAD at `refs/heads/<branch>`.
    pub fn set_head(&self, branch: &str) -> Result<()> {
        let content = format!("{}refs/heads/{}\n", REF_PREFIX, branch);
        write_atomically(&self.head_path(), content.as_bytes())
    }

    /// Read HEAD and return the path of the ref file it points to.
    pub fn read_head(&self) -> Result<PathBuf> {
        let path = self.head_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::RefNotFound("HEAD".to_string()))
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        let content = content.trim();
        match content.strip_prefix(REF_PREFIX) {
            Some(target) if !target.trim().is_empty() => Ok(self.got_dir.join(target.trim())),
            _ => Err(Error::MalformedHead(content.to_string())),
        }
    }

    /// Resolve HEAD to the current branch's latest commit.  A ref file that is missing or empty
    /// is the "no commits yet" state and yields `None`.
    pub fn current_commit(&self) -> Result<(Option<Hash>, String)> {
        let ref_path = self.read_head()?;
        let branch = branch_name(&ref_path);
        let content = match fs::read_to_string(&ref_path) {
            Ok(content) => content,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok((None, branch)),
            Err(e) => return Err(io_err(&ref_path)(e)),
        };
        let content = content.trim();
        if content.is_empty() {
            return Ok((None, branch));
        }
        Ok((Some(Hash::from_hex(content)?), branch))
    }

    /// Point the ref that HEAD names at `commit`, creating the ref file if necessary.  Returns
    /// the branch name.
    pub fn update(&self, commit: &Hash) -> Result<String> {
        let ref_path = self.read_head()?;
        write_atomically(&ref_path, commit.to_hex().as_bytes())?;
        let branch = branch_name(&ref_path);
        debug!("{} -> {}", branch, commit);
        Ok(branch)
    }
}

fn branch_name(ref_path: &Path) -> String {
    ref_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
