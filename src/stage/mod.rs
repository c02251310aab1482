//! `stage` -- the staging area between the working directory and the next commit: the persisted
//! index of staged files and the ignore rules that keep files out of it.

mod ignore;
mod index;

pub use self::ignore::{IgnoreRules, IGNORE_FILE};
pub use self::index::{check_path, IndexEntry, StagingIndex, Status};
