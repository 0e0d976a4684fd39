use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Walk from `start` towards the filesystem root and return the first
/// directory for which `pred` holds.
///
/// `start` itself is checked first. If `start` is a file, the walk begins at
/// its parent directory.
pub fn find_up<F>(start: &Path, mut pred: F) -> Option<PathBuf>
where
    F: FnMut(&Path) -> bool,
{
    let mut current = if start.is_file() {
        start.parent()?
    } else {
        start
    };

    loop {
        if pred(current) {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

/// Walk upwards from `start` and return the first existing file named `name`.
#[must_use]
pub fn find_file_up(start: &Path, name: &str) -> Option<PathBuf> {
    find_up(start, |dir| dir.join(name).is_file()).map(|dir| dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_valid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"export {}").unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert_eq!(content, "export {}");
    }

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_find_up_checks_start_first() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a/marker"), "").unwrap();

        let found = find_up(&nested, |d| d.join("marker").exists()).unwrap();
        assert_eq!(found, dir.path().join("a"));
    }

    #[test]
    fn test_find_up_from_file_starts_at_parent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("index.ts");
        fs::write(&file, "").unwrap();

        let found = find_up(&file, |d| d == dir.path()).unwrap();
        assert_eq!(found, dir.path());
    }

    #[test]
    fn test_find_file_up() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();

        assert_eq!(
            find_file_up(&nested, "tsconfig.json"),
            Some(dir.path().join("tsconfig.json"))
        );
        assert_eq!(find_file_up(&nested, "missing.json"), None);
    }
}
