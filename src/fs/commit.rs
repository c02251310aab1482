use crate::cas::Hash;
use crate::error::{Error, Result};
use std::fmt;
use std::str;

/// The identity and timestamp recorded on an `author` or `committer` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub date: String,
}

impl Signature {
    pub fn new<N, E, D>(name: N, email: E, date: D) -> Signature
    where
        N: Into<String>,
        E: Into<String>,
        D: Into<String>,
    {
        Signature {
            name: name.into(),
            email: email.into(),
            date: date.into(),
        }
    }

    /// Check that this signature reads back unchanged once formatted: no field may contain a
    /// line break, and the name and email may not contain angle brackets.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("name", &self.name, "\n\r<>"),
            ("email", &self.email, "\n\r<>"),
            ("date", &self.date, "\n\r"),
        ];
        for &(field, value, forbidden) in &fields {
            if let Some(c) = value.chars().find(|c| forbidden.contains(*c)) {
                return Err(Error::InvalidInput(format!(
                    "signature {} {:?} may not contain {:?}",
                    field, value, c
                )));
            }
        }
        Ok(())
    }

    /// Parse the value of an author/committer line: `<name> <<email>> <date>`.  The name and
    /// date may contain spaces; the email is whatever lies between the first `<` and the
    /// following `>`.
    fn parse(value: &str) -> Result<Signature> {
        let open = value
            .find('<')
            .ok_or_else(|| Error::malformed("commit", format!("no <email> in {:?}", value)))?;
        let close = value[open..]
            .find('>')
            .map(|i| open + i)
            .ok_or_else(|| Error::malformed("commit", format!("no <email> in {:?}", value)))?;
        Ok(Signature {
            name: value[..open].trim().to_string(),
            email: value[open + 1..close].to_string(),
            date: value[close + 1..].trim().to_string(),
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.date)
    }
}

/// The metadata of a commit: a snapshot (root tree), its lineage, and who made it.
///
/// The canonical text is
///
/// ```text
/// tree <hash>
/// parent <hash>        (omitted for a root commit)
/// author <name> <<email>> <date>
/// committer <name> <<email>> <date>
///
/// <message>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    pub tree: Hash,
    pub parent: Option<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl CommitData {
    /// Format this commit in its canonical textual encoding.
    pub fn format(&self) -> String {
        let mut text = format!("tree {}\n", self.tree);
        if let Some(ref parent) = self.parent {
            text.push_str(&format!("parent {}\n", parent));
        }
        text.push_str(&format!("author {}\n", self.author));
        text.push_str(&format!("committer {}\n", self.committer));
        text.push('\n');
        text.push_str(&self.message);
        text.push('\n');
        text
    }

    /// Parse a commit from its canonical textual encoding.
    pub fn parse(content: &[u8]) -> Result<CommitData> {
        let text = str::from_utf8(content).map_err(|_| Error::malformed("commit", "not UTF-8"))?;
        let (headers, message) = match text.find("\n\n") {
            Some(i) => (&text[..i], &text[i + 2..]),
            None => (text.trim_end_matches('\n'), ""),
        };

        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut committer = None;
        for line in headers.lines() {
            let mut parts = line.splitn(2, ' ');
            let key = parts.next().unwrap_or("");
            let value = parts.next().unwrap_or("").trim();
            match key {
                "tree" => tree = Some(parse_hash(value)?),
                "parent" => parent = Some(parse_hash(value)?),
                "author" => author = Some(Signature::parse(value)?),
                "committer" => committer = Some(Signature::parse(value)?),
                _ => {
                    return Err(Error::malformed(
                        "commit",
                        format!("unexpected header {:?}", line),
                    ))
                }
            }
        }

        Ok(CommitData {
            tree: tree.ok_or_else(|| Error::malformed("commit", "missing tree"))?,
            parent,
            author: author.ok_or_else(|| Error::malformed("commit", "missing author"))?,
            committer: committer.ok_or_else(|| Error::malformed("commit", "missing committer"))?,
            message: message.strip_suffix('\n').unwrap_or(message).to_string(),
        })
    }
}

fn parse_hash(value: &str) -> Result<Hash> {
    Hash::from_hex(value).map_err(|_| Error::malformed("commit", format!("bad hash {:?}", value)))
}
