use crate::error::{io_err, Result};
use glob::{MatchOptions, Pattern};
use log::warn;
use std::fs;
use std::io;
use std::path::Path;

/// The name of the ignore-pattern file at the repository root.
pub const IGNORE_FILE: &str = ".gotignore";

/// Files that are staged even when a pattern matches them.
const ESSENTIAL_FILES: &[&str] = &[IGNORE_FILE];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// IgnoreRules decides which repository-relative paths are left out of staging.
///
/// Patterns are globs matched against the whole relative path; a path is also ignored when one
/// of its parent directories matches.  Lines starting with `!` are negations, which override any
/// positive match.  The metadata directory is always ignored.
#[derive(Debug, Default)]
pub struct IgnoreRules {
    ignore: Vec<Pattern>,
    negate: Vec<Pattern>,
}

impl IgnoreRules {
    /// Parse rules from the text of an ignore file.  `#` starts a comment; blank lines are
    /// skipped; invalid globs are logged and dropped.
    pub fn parse(text: &str, got_dir: &str) -> IgnoreRules {
        let mut rules = IgnoreRules::default();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let (negated, glob) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let glob = glob.trim_matches('/');
            match Pattern::new(glob) {
                Ok(pattern) if negated => rules.negate.push(pattern),
                Ok(pattern) => rules.ignore.push(pattern),
                Err(e) => warn!("ignoring bad pattern {:?} in {}: {}", line, IGNORE_FILE, e),
            }
        }
        if let Ok(pattern) = Pattern::new(&Pattern::escape(got_dir.trim_matches('/'))) {
            rules.ignore.push(pattern);
        }
        rules
    }

    /// Load the rules from `<root>/.gotignore`; a missing file means only the metadata directory
    /// is ignored.
    pub fn load(root: &Path, got_dir: &str) -> Result<IgnoreRules> {
        let path = root.join(IGNORE_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(IgnoreRules::parse(&text, got_dir)),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(IgnoreRules::parse("", got_dir))
            }
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Should the file at this `/`-separated, repository-relative path be skipped?
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let base = rel_path.rsplit('/').next().unwrap_or(rel_path);
        if ESSENTIAL_FILES.contains(&base) {
            return false;
        }
        matches_any(&self.ignore, rel_path) && !matches_any(&self.negate, rel_path)
    }
}

/// Does any pattern match the path itself or one of its ancestors?
fn matches_any(patterns: &[Pattern], rel_path: &str) -> bool {
    let mut candidates = vec![rel_path];
    candidates.extend(rel_path.match_indices('/').map(|(i, _)| &rel_path[..i]));
    patterns
        .iter()
        .any(|p| candidates.iter().any(|c| p.matches_with(c, MATCH_OPTIONS)))
}
