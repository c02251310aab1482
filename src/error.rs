use crate::cas::Hash;
use failure::Fail;
use std::io;
use std::path::Path;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "object {} not found", _0)]
    ObjectNotFound(Hash),

    #[fail(display = "ref {} not found", _0)]
    RefNotFound(String),

    #[fail(display = "path {} not found in commit {}", path, commit)]
    PathNotFound { path: String, commit: Hash },

    #[fail(display = "malformed HEAD: {:?}", _0)]
    MalformedHead(String),

    #[fail(display = "malformed {} object: {}", kind, reason)]
    MalformedObject { kind: &'static str, reason: String },

    #[fail(display = "invalid hash {:?}", _0)]
    InvalidHash(String),

    #[fail(
        display = "delta chain for {} at commit {} never reaches a blob",
        path, commit
    )]
    BrokenDeltaChain { path: String, commit: Hash },

    #[fail(display = "I/O error on {}: {}", path, cause)]
    Io {
        path: String,
        #[cause]
        cause: io::Error,
    },

    #[fail(display = "index {} is unreadable: {}", path, cause)]
    IndexUnreadable {
        path: String,
        #[cause]
        cause: io::Error,
    },

    #[fail(display = "failed to build tree for {:?}: {}", dir, reason)]
    TreeBuildFailed { dir: String, reason: String },

    #[fail(display = "invalid input: {}", _0)]
    InvalidInput(String),

    #[fail(display = "not a got repository: {}", _0)]
    NotInitialized(String),

    #[fail(display = "repository already initialized at {}", _0)]
    AlreadyInitialized(String),

    #[fail(display = "repository is locked: {}", _0)]
    Locked(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed<S: Into<String>>(kind: &'static str, reason: S) -> Error {
        Error::MalformedObject {
            kind,
            reason: reason.into(),
        }
    }

    /// True for the "absent" family of errors, which callers often treat as an empty state
    /// rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ObjectNotFound(_) | Error::RefNotFound(_) | Error::PathNotFound { .. } => true,
            _ => false,
        }
    }
}

/// Wrap an `io::Error` with the path it occurred on, for use with `map_err`.
pub(crate) fn io_err<P: AsRef<Path>>(path: P) -> impl FnOnce(io::Error) -> Error {
    let path = path.as_ref().display().to_string();
    move |cause| Error::Io { path, cause }
}
