use crate::cas::{Hash, Storage, CAS};
use crate::config::{self, Config, IdentityOverrides};
use crate::delta;
use crate::error::{io_err, Error, Result};
use crate::fs::history::{self, LogEntry};
use crate::fs::{CommitData, Leaf, Mode, Refs, TreeBuilder};
use crate::lock::RepoLock;
use crate::stage::{self, IgnoreRules, IndexEntry, StagingIndex, Status};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The outcome of staging a set of paths.  Paths are repository-relative.
#[derive(Debug, Default)]
pub struct StageReport {
    /// new or changed files written to the index
    pub staged: Vec<String>,
    /// files whose content matched the index
    pub unchanged: Vec<String>,
    /// files excluded by the ignore rules
    pub ignored: Vec<String>,
    /// paths that could not be staged, with the reason
    pub skipped: Vec<(String, Error)>,
}

/// The result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: Hash,
    pub branch: String,
    /// the formatted commit object
    pub text: String,
}

/// A Repository is a working directory together with its metadata directory: the object store,
/// the refs, and the staging index.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    config: Config,
    storage: Storage,
    refs: Refs,
}

impl Repository {
    /// Create the metadata directory below `root` and open the new repository.
    pub fn init<P: AsRef<Path>>(root: P, config: Config) -> Result<Repository> {
        let root = root.as_ref();
        let got_dir = root.join(config.got_dir());
        if got_dir.exists() {
            return Err(Error::AlreadyInitialized(got_dir.display().to_string()));
        }

        for dir in &[got_dir.join("objects"), got_dir.join("refs").join("heads")] {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        Refs::new(&got_dir).set_head(config.default_branch())?;
        info!("initialized empty repository in {}", got_dir.display());

        Repository::open(root, config)
    }

    /// Does `root` contain an initialized metadata directory?
    pub fn is_initialized<P: AsRef<Path>>(root: P, config: &Config) -> bool {
        let got_dir = root.as_ref().join(config.got_dir());
        got_dir.join("HEAD").is_file() && got_dir.join("objects").is_dir()
    }

    /// Open an existing repository.
    pub fn open<P: AsRef<Path>>(root: P, config: Config) -> Result<Repository> {
        let root = root.as_ref();
        if !Repository::is_initialized(root, &config) {
            return Err(Error::NotInitialized(root.display().to_string()));
        }
        let root = fs::canonicalize(root).map_err(io_err(root))?;
        let got_dir = root.join(config.got_dir());
        Ok(Repository {
            storage: Storage::new(got_dir.join("objects")),
            refs: Refs::new(&got_dir),
            root,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn got_dir(&self) -> PathBuf {
        self.root.join(self.config.got_dir())
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(self.config.index_path())
    }

    /// Load the staging index.
    pub fn index(&self) -> Result<StagingIndex> {
        StagingIndex::load(self.index_path())
    }

    /// The current branch's latest commit (if any) and the branch name.
    pub fn head(&self) -> Result<(Option<Hash>, String)> {
        self.refs.current_commit()
    }

    /// Stage files and directories.  Relative paths are taken relative to the repository root.
    ///
    /// A file that cannot be staged is recorded in the report's `skipped` list and staging
    /// continues with the next one; only failures to read the index, the ignore file, or HEAD
    /// abort the whole call.
    pub fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<StageReport> {
        let _lock = RepoLock::acquire(&self.got_dir())?;
        let mut index = self.index()?;
        let ignore = IgnoreRules::load(&self.root, self.config.got_dir())?;
        let (head, _) = self.head()?;
        let mut stager = Stager {
            repo: self,
            index: &mut index,
            ignore: &ignore,
            head: head.as_ref(),
            report: StageReport::default(),
        };

        for path in paths {
            let path = path.as_ref();
            let abs = match self.resolve(path) {
                Ok(abs) => abs,
                Err(e) => {
                    warn!("cannot stage {}: {}", path.display(), e);
                    stager.report.skipped.push((path.display().to_string(), e));
                    continue;
                }
            };
            if abs.is_dir() {
                stager.stage_dir(&abs);
            } else {
                stager.stage_file(&abs);
            }
        }

        let report = stager.report;
        info!(
            "staged {}, unchanged {}, ignored {}, skipped {}",
            report.staged.len(),
            report.unchanged.len(),
            report.ignored.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Make an absolute, canonical path and check that it lies within the repository.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let abs = fs::canonicalize(&joined).map_err(io_err(&joined))?;
        if !abs.starts_with(&self.root) {
            return Err(Error::InvalidInput(format!(
                "{} is outside the repository at {}",
                abs.display(),
                self.root.display()
            )));
        }
        Ok(abs)
    }

    /// The `/`-separated path of `abs` relative to the repository root.
    fn relative(&self, abs: &Path) -> String {
        abs.strip_prefix(&self.root)
            .unwrap_or(abs)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Snapshot the staged files into a new commit on the current branch.
    ///
    /// Deltas are cleared from the index once the ref has moved.  If that rewrite fails, the
    /// commit still stands; the leftover deltas are recognized by the next commit, because the
    /// branch tip already holds the content they produce, and are dropped there.
    pub fn commit(&self, message: &str, overrides: &IdentityOverrides) -> Result<CommitRecord> {
        let date = config::now();
        let author = overrides.author(&self.config, &date)?;
        let committer = overrides.committer(&self.config, &date)?;

        let _lock = RepoLock::acquire(&self.got_dir())?;
        let mut index = self.index()?;
        let (parent, _) = self.head()?;

        let mut identity = None;
        let mut leaves = BTreeMap::new();
        for entry in index.entries() {
            let mut staged_delta = entry.delta.as_ref();
            if staged_delta.is_some() && self.committed_at(parent.as_ref(), entry)? {
                debug!("{} is unchanged since the last commit; dropping its delta", entry.path);
                staged_delta = None;
            }
            let leaf = if let Some(hash) = staged_delta {
                Leaf::delta(hash.clone(), entry.mode)
            } else if self.storage.contains(&entry.hash) {
                Leaf::blob(entry.hash.clone(), entry.mode)
            } else {
                // only reachable through an earlier delta, so carry the parent's version forward
                let hash = match identity {
                    Some(ref hash) => Hash::clone(hash),
                    None => self.storage.store(&delta::diff(b"", b""))?,
                };
                identity = Some(hash.clone());
                Leaf::delta(hash, entry.mode)
            };
            leaves.insert(entry.path.clone(), leaf);
        }

        let tree = TreeBuilder::new(&self.storage).build(&leaves, "")?;
        let commit = CommitData {
            tree,
            parent,
            author,
            committer,
            message: message.to_string(),
        };
        let text = commit.format();
        let hash = self.storage.store(text.as_bytes())?;
        let branch = self.refs.update(&hash)?;
        if let Err(e) = index.clear_deltas() {
            warn!("cannot clear deltas from {}: {}", index.path().display(), e);
        }

        info!("[{} {}] {}", branch, hash, message.lines().next().unwrap_or(""));
        Ok(CommitRecord { hash, branch, text })
    }

    /// Does the commit `at` already hold the staged content of `entry`?
    fn committed_at(&self, at: Option<&Hash>, entry: &IndexEntry) -> Result<bool> {
        let at = match at {
            Some(at) => at,
            None => return Ok(false),
        };
        match history::reconstruct(&self.storage, at, &entry.path) {
            Ok(content) => Ok(Hash::for_bytes(&content) == entry.hash),
            Err(Error::PathNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The history of the current branch, newest first.  Empty if nothing has been committed.
    pub fn log(&self) -> Result<Vec<LogEntry>> {
        match self.head()? {
            (Some(tip), _) => history::log(&self.storage, &tip),
            (None, _) => Ok(vec![]),
        }
    }

    /// The content of `path` as of commit `at`, or of the branch tip.
    pub fn show(&self, path: &str, at: Option<&Hash>) -> Result<Vec<u8>> {
        let start = match at {
            Some(hash) => hash.clone(),
            None => match self.head()? {
                (Some(tip), _) => tip,
                (None, branch) => return Err(Error::RefNotFound(branch)),
            },
        };
        history::reconstruct(&self.storage, &start, path.trim_matches('/'))
    }

    /// Load and parse a commit.
    pub fn read_commit(&self, hash: &Hash) -> Result<CommitData> {
        history::read_commit(&self.storage, hash)
    }
}

/// The state of one `add` call.
struct Stager<'a> {
    repo: &'a Repository,
    index: &'a mut StagingIndex,
    ignore: &'a IgnoreRules,
    head: Option<&'a Hash>,
    report: StageReport,
}

impl<'a> Stager<'a> {
    fn stage_dir(&mut self, dir: &Path) {
        let got_dir = self.repo.got_dir();
        let mut walk = WalkDir::new(dir).sort_by(|a, b| a.file_name().cmp(b.file_name()));
        if let Some(depth) = self.repo.config.max_depth() {
            walk = walk.max_depth(depth + 1);
        }

        for entry in walk.into_iter().filter_entry(|e| e.path() != got_dir) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        self.stage_file(entry.path());
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| self.repo.relative(p))
                        .unwrap_or_else(|| self.repo.relative(dir));
                    warn!("cannot walk {}: {}", path, e);
                    let cause = io::Error::from(e);
                    self.report
                        .skipped
                        .push((path.clone(), Error::Io { path, cause }));
                }
            }
        }
    }

    fn stage_file(&mut self, abs: &Path) {
        let rel = self.repo.relative(abs);
        if self.ignore.is_ignored(&rel) {
            debug!("ignoring {}", rel);
            self.report.ignored.push(rel);
            return;
        }
        if let Err(e) = stage::check_path(&rel) {
            warn!("cannot stage {:?}: {}", rel, e);
            self.report.skipped.push((rel, e));
            return;
        }
        match self.stage_one(&rel, abs) {
            Ok(Status::Unchanged) => {
                debug!("{} is already staged", rel);
                self.report.unchanged.push(rel);
            }
            Ok(_) => self.report.staged.push(rel),
            Err(e) => {
                warn!("cannot stage {}: {}", rel, e);
                self.report.skipped.push((rel, e));
            }
        }
    }

    fn stage_one(&mut self, rel: &str, abs: &Path) -> Result<Status> {
        let content = fs::read(abs).map_err(io_err(abs))?;
        let hash = Hash::for_bytes(&content);
        let mode = match Mode::of_file(abs) {
            Some(Mode::Executable) => Mode::Executable,
            _ => Mode::Regular,
        };
        let storage = &self.repo.storage;

        let status = self.index.classify(rel, &hash);
        match status {
            Status::New => {
                storage.store(&content)?;
                self.index.append(IndexEntry::new(rel, hash, None).with_mode(mode))?;
            }
            Status::Unchanged => {
                let mode_change = self
                    .index
                    .get(rel)
                    .filter(|e| e.mode != mode)
                    .map(|e| e.delta.clone());
                if let Some(delta) = mode_change {
                    debug!("{} is now {}", rel, mode);
                    self.index.update_hash(rel, hash, delta, mode)?;
                    return Ok(Status::Changed);
                }
            }
            Status::Changed => {
                let delta = match self.committed(rel)? {
                    Some(ref old) if *old != content => {
                        Some(storage.store(&delta::diff(old, &content))?)
                    }
                    _ => {
                        storage.store(&content)?;
                        None
                    }
                };
                self.index.update_hash(rel, hash, delta, mode)?;
            }
        }
        Ok(status)
    }

    /// The content of `rel` at the current branch tip, if it was committed there.
    fn committed(&self, rel: &str) -> Result<Option<Vec<u8>>> {
        let head = match self.head {
            Some(head) => head,
            None => return Ok(None),
        };
        match history::reconstruct(&self.repo.storage, head, rel) {
            Ok(content) => Ok(Some(content)),
            Err(Error::PathNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
