//! Repository configuration: the values the core consumes, the section-based file they are
//! persisted in, and the environment-style identity overrides applied at commit time.

use crate::error::{io_err, Error, Result};
use crate::fs::Signature;
use crate::util::write_atomically;
use chrono::Local;
use log::debug;
use std::env;
use std::fmt::Write;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The default name of the metadata directory.
pub const GOT_DIR: &str = ".got";

const CONFIG_FILE: &str = "config";
const INDEX_FILE: &str = "index";

/// Keys that may appear in the config file.
pub const ACCEPTED_KEYS: &[&str] = &["init.defaultBranch", "user.name", "user.email"];

/// Config carries everything the repository needs to know that is not in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    got_dir: String,
    default_branch: String,
    user_name: String,
    user_email: String,
    max_depth: Option<usize>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            got_dir: GOT_DIR.to_string(),
            default_branch: "main".to_string(),
            user_name: "Your name".to_string(),
            user_email: "user@example.com".to_string(),
            max_depth: None,
        }
    }
}

impl Config {
    /// The defaults, overlaid with `<root>/.got/config` if that file exists.
    pub fn load(root: &Path) -> Result<Config> {
        let config = Config::default();
        let file = ConfigFile::open(root.join(&config.got_dir).join(CONFIG_FILE))?;
        Ok(config.overlay(&file))
    }

    /// Replace defaults with whatever the file sets.
    pub fn overlay(mut self, file: &ConfigFile) -> Config {
        if let Some(branch) = file.lookup("init", "defaultBranch") {
            self.default_branch = branch.to_string();
        }
        if let Some(name) = file.lookup("user", "name") {
            self.user_name = name.to_string();
        }
        if let Some(email) = file.lookup("user", "email") {
            self.user_email = email.to_string();
        }
        self
    }

    pub fn with_got_dir<S: Into<String>>(mut self, got_dir: S) -> Config {
        self.got_dir = got_dir.into();
        self
    }

    pub fn with_default_branch<S: Into<String>>(mut self, branch: S) -> Config {
        self.default_branch = branch.into();
        self
    }

    pub fn with_user<N: Into<String>, E: Into<String>>(mut self, name: N, email: E) -> Config {
        self.user_name = name.into();
        self.user_email = email.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Config {
        self.max_depth = max_depth;
        self
    }

    /// Name of the metadata directory, relative to the repository root.
    pub fn got_dir(&self) -> &str {
        &self.got_dir
    }

    /// Location of the index file, relative to the repository root.
    pub fn index_path(&self) -> PathBuf {
        Path::new(&self.got_dir).join(INDEX_FILE)
    }

    /// Location of the config file, relative to the repository root.
    pub fn config_path(&self) -> PathBuf {
        Path::new(&self.got_dir).join(CONFIG_FILE)
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// How many levels of subdirectories directory staging descends into; `None` is unbounded.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

/// ConfigFile is the textual, section-based key/value store:
///
/// ```text
/// [user]
///     name = Jane Doe
///     email = jane@example.com
/// ```
///
/// Keys are addressed as `<section>.<key>`, and only `ACCEPTED_KEYS` may be read or written.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl ConfigFile {
    /// Read the file at `path`; a missing file is an empty config.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<ConfigFile> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(&path)(e)),
        };
        Ok(ConfigFile {
            sections: parse_sections(&text),
            path,
        })
    }

    /// Get the value of `<section>.<key>`, if set.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, name) = split_key(key)?;
        Ok(self.lookup(section, name).map(str::to_string))
    }

    /// Set `<section>.<key>` and rewrite the file.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, name) = split_key(key)?;
        let value = value.trim().to_string();

        let index = match self.sections.iter().position(|(s, _)| s == section) {
            Some(i) => i,
            None => {
                self.sections.push((section.to_string(), vec![]));
                self.sections.len() - 1
            }
        };
        let entries = &mut self.sections[index].1;
        match entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => entries.push((name.to_string(), value)),
        }

        write_atomically(&self.path, self.render().as_bytes())?;
        debug!("set {} in {}", key, self.path.display());
        Ok(())
    }

    fn lookup(&self, section: &str, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .filter(|(s, _)| s == section)
            .flat_map(|(_, entries)| entries.iter())
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .last()
    }

    fn render(&self) -> String {
        let mut text = String::new();
        for (section, entries) in &self.sections {
            let _ = writeln!(text, "[{}]", section);
            for (key, value) in entries {
                let _ = writeln!(text, "    {} = {}", key, value);
            }
        }
        text
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    let key = key.trim();
    if !ACCEPTED_KEYS.contains(&key) {
        return Err(Error::InvalidInput(format!("invalid config key {:?}", key)));
    }
    let mut parts = key.splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(section), Some(name)) => Ok((section, name)),
        _ => Err(Error::InvalidInput(format!("invalid config key {:?}", key))),
    }
}

fn parse_sections(text: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = vec![];
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            sections.push((line[1..line.len() - 1].trim().to_string(), vec![]));
            continue;
        }
        let mut parts = line.splitn(2, '=');
        if let (Some(key), Some(value), Some(section)) =
            (parts.next(), parts.next(), sections.last_mut())
        {
            section
                .1
                .push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    sections
}

/// The current local time as `<unix seconds> <+hhmm>`.
pub fn now() -> String {
    Local::now().format("%s %z").to_string()
}

/// The recognized identity override keys.
pub const IDENTITY_KEYS: &[&str] = &[
    "AUTHOR_NAME",
    "AUTHOR_EMAIL",
    "AUTHOR_DATE",
    "COMMITTER_NAME",
    "COMMITTER_EMAIL",
    "COMMITTER_DATE",
];

/// IdentityOverrides replace the configured author and committer identity for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityOverrides {
    values: [Option<String>; 6],
}

impl IdentityOverrides {
    pub fn new() -> IdentityOverrides {
        IdentityOverrides::default()
    }

    /// Collect whichever of the recognized keys are set in the process environment.
    pub fn from_env() -> IdentityOverrides {
        let mut overrides = IdentityOverrides::new();
        for (i, key) in IDENTITY_KEYS.iter().enumerate() {
            overrides.values[i] = env::var(key).ok();
        }
        overrides
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let i = key_index(key)?;
        self.values[i] = Some(value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        key_index(key)
            .ok()
            .and_then(|i| self.values[i].as_ref())
            .map(String::as_str)
    }

    /// The author signature: overrides where present, `config` otherwise, and `date` when no
    /// date override is given.  Fails with `InvalidInput` if the result could not be written
    /// into a commit and read back.
    pub fn author(&self, config: &Config, date: &str) -> Result<Signature> {
        self.signature("AUTHOR", config, date)
    }

    pub fn committer(&self, config: &Config, date: &str) -> Result<Signature> {
        self.signature("COMMITTER", config, date)
    }

    fn signature(&self, role: &str, config: &Config, date: &str) -> Result<Signature> {
        let get = |field: &str| self.get(&format!("{}_{}", role, field));
        let signature = Signature::new(
            get("NAME").unwrap_or_else(|| config.user_name()),
            get("EMAIL").unwrap_or_else(|| config.user_email()),
            get("DATE").unwrap_or(date),
        );
        signature.validate()?;
        Ok(signature)
    }
}

fn key_index(key: &str) -> Result<usize> {
    IDENTITY_KEYS
        .iter()
        .position(|k| *k == key)
        .ok_or_else(|| Error::InvalidInput(format!("unknown identity override {:?}", key)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.got_dir(), ".got");
        assert_eq!(config.index_path(), Path::new(".got/index"));
        assert_eq!(config.default_branch(), "main");
        assert_eq!(config.max_depth(), None);
    }

    #[test]
    fn config_file_set_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let mut file = ConfigFile::open(&path).unwrap();
        assert_eq!(file.get("user.name").unwrap(), None);

        file.set("user.name", "Jane Doe").unwrap();
        file.set("user.email", " jane@example.com ").unwrap();
        file.set("init.defaultBranch", "trunk").unwrap();
        file.set("user.name", "Jane Q. Doe").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[user]\n    name = Jane Q. Doe\n    email = jane@example.com\n\
             [init]\n    defaultBranch = trunk\n"
        );

        let file = ConfigFile::open(&path).unwrap();
        assert_eq!(file.get("user.email").unwrap(), Some("jane@example.com".to_string()));

        let config = Config::default().overlay(&file);
        assert_eq!(config.user_name(), "Jane Q. Doe");
        assert_eq!(config.default_branch(), "trunk");
    }

    #[test]
    fn config_file_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ConfigFile::open(dir.path().join("config")).unwrap();
        match file.set("core.editor", "vi") {
            Err(Error::InvalidInput(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(file.get("user").is_err());
    }

    #[test]
    fn config_file_tolerates_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "# mine\n[user]\n\tname=Jo\n\n[init]\n  defaultBranch = dev\n").unwrap();
        let file = ConfigFile::open(&path).unwrap();
        assert_eq!(file.get("user.name").unwrap(), Some("Jo".to_string()));
        assert_eq!(file.get("init.defaultBranch").unwrap(), Some("dev".to_string()));
    }

    #[test]
    fn overrides_replace_config() {
        let config = Config::default().with_user("Conf Name", "conf@example.com");
        let mut overrides = IdentityOverrides::new();
        overrides.set("AUTHOR_NAME", "Ann Author").unwrap();
        overrides.set("COMMITTER_EMAIL", "cc@example.com").unwrap();
        overrides.set("COMMITTER_DATE", "1 +0000").unwrap();

        let author = overrides.author(&config, "99 +0100").unwrap();
        assert_eq!(author, Signature::new("Ann Author", "conf@example.com", "99 +0100"));
        let committer = overrides.committer(&config, "99 +0100").unwrap();
        assert_eq!(committer, Signature::new("Conf Name", "cc@example.com", "1 +0000"));

        assert!(overrides.set("AUTHOR_PHONE", "555").is_err());
    }

    #[test]
    fn unusable_identity_is_rejected() {
        let config = Config::default();
        let mut overrides = IdentityOverrides::new();
        overrides.set("AUTHOR_NAME", "Eve\nparent 0000").unwrap();
        match overrides.author(&config, "1 +0000") {
            Err(Error::InvalidInput(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(overrides.committer(&config, "1 +0000").is_ok());

        let config = Config::default().with_user("Mallory", "m@example.com> x");
        assert!(IdentityOverrides::new().committer(&config, "1 +0000").is_err());
    }

    #[test]
    fn now_format() {
        let date = now();
        let mut parts = date.split(' ');
        assert!(parts.next().unwrap().parse::<i64>().is_ok());
        let zone = parts.next().unwrap();
        assert_eq!(zone.len(), 5);
        assert!(zone.starts_with('+') || zone.starts_with('-'));
    }
}
