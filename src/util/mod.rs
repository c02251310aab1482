//! Small helpers shared across the crate.

use crate::error::{io_err, Result};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::fs;
use std::io::Write;
use std::path::Path;

pub mod test;

/// Replace the file at `path` with `content`, all or nothing.  The content is written and synced
/// to a temporary file in the same directory, which is then renamed over `path`.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix: String = thread_rng().sample_iter(&Alphanumeric).take(8).collect();
    let temp = dir.join(format!(".{}.tmp_{}", name, suffix));
    {
        let mut file = fs::File::create(&temp).map_err(io_err(&temp))?;
        file.write_all(content).map_err(io_err(&temp))?;
        file.sync_all().map_err(io_err(&temp))?;
    }

    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(io_err(path)(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_atomically;
    use std::fs;

    #[test]
    fn replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        fs::write(&path, "old contents that are longer").unwrap();

        write_atomically(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new".to_vec());

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["index".to_string()]);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs/heads/main");
        write_atomically(&path, b"abc").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc".to_vec());
    }
}
