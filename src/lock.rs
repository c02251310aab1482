use crate::error::{io_err, Error, Result};
use log::{trace, warn};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// RepoLock is an exclusive advisory lock on a repository, held from `acquire` until the value
/// is dropped.  Only one `add` or `commit` may run against a repository at a time; a second
/// attempt fails immediately with `Locked` rather than waiting.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
    path: PathBuf,
}

impl RepoLock {
    /// Take the lock on `<got_dir>/lock`.
    pub fn acquire(got_dir: &Path) -> Result<RepoLock> {
        let path = got_dir.join("lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(io_err(&path))?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(e) if e.as_errno() == Some(Errno::EAGAIN) => {
                return Err(Error::Locked(path.display().to_string()))
            }
            Err(e) => {
                return Err(io_err(&path)(io::Error::new(
                    io::ErrorKind::Other,
                    e.to_string(),
                )))
            }
        }

        trace!("locked {}", path.display());
        Ok(RepoLock { file, path })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = flock(self.file.as_raw_fd(), FlockArg::Unlock) {
            warn!("failed to unlock {}: {}", self.path.display(), e);
        }
        trace!("unlocked {}", self.path.display());
    }
}
