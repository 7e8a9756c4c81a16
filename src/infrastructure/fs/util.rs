//! Small filesystem helpers shared by the services.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::errors::RigResult;

/// Copy a directory tree. Missing parents are created; symlinks are not
/// followed.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Total size of a directory tree in KB, rounded up per file.
/// A missing path counts as zero.
pub fn dir_size_kb(path: &Path) -> u64 {
    if !path.exists() {
        return 0;
    }
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len().div_ceil(1024))
        .sum()
}

/// Parse a human-readable size (`du -h` style) into KB: a bare number is
/// already KB; `K`, `M`, `G`, `T` suffixes scale accordingly.
pub fn parse_size_kb(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (number, multiplier) = match text.chars().last() {
        Some(c) if c.is_ascii_digit() => (text, 1.0),
        Some('K' | 'k') => (&text[..text.len() - 1], 1.0),
        Some('M' | 'm') => (&text[..text.len() - 1], 1024.0),
        Some('G' | 'g') => (&text[..text.len() - 1], 1024.0 * 1024.0),
        Some('T' | 't') => (&text[..text.len() - 1], 1024.0 * 1024.0 * 1024.0),
        _ => return None,
    };
    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let kb = (value * multiplier).round() as u64;
    Some(kb)
}

/// Free space in MB on the filesystem holding `path`.
pub fn free_disk_mb(path: &Path) -> RigResult<u64> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
    let bytes = u64::from(stat.blocks_available()) * u64::from(stat.fragment_size());
    Ok(bytes / (1024 * 1024))
}

/// Move `src` into `dest_dir`, appending an increasing numeric suffix
/// when the name already exists (`name`, `name.2`, `name.3`, ...).
/// Returns the final destination path.
pub fn archive_with_suffix(src: &Path, dest_dir: &Path, name: &str) -> io::Result<PathBuf> {
    let base = dest_dir.join(name);
    let mut dest = base.clone();
    let mut count = 1u32;
    while dest.exists() {
        count += 1;
        dest = PathBuf::from(format!("{}.{count}", base.display()));
    }
    std::fs::rename(src, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_size_kb() {
        // round(2.5 * 1,048,576)
        assert_eq!(parse_size_kb("2.5G"), Some(2_621_440));
        assert_eq!(parse_size_kb("300M"), Some(307_200));
        assert_eq!(parse_size_kb("16K"), Some(16));
        assert_eq!(parse_size_kb("123"), Some(123));
        assert_eq!(parse_size_kb("1.5T"), Some(1_610_612_736));
        assert_eq!(parse_size_kb(""), None);
        assert_eq!(parse_size_kb("abc"), None);
        assert_eq!(parse_size_kb("-1G"), None);
    }

    #[test]
    fn test_copy_tree_and_size() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("a.txt"), vec![0u8; 1500]).unwrap();
        std::fs::write(src.join("nested/b.txt"), vec![0u8; 100]).unwrap();

        let dest = dir.path().join("dest");
        copy_tree(&src, &dest).unwrap();
        assert!(dest.join("a.txt").exists());
        assert!(dest.join("nested/b.txt").exists());

        // 1500 bytes -> 2 KB, 100 bytes -> 1 KB
        assert_eq!(dir_size_kb(&dest), 3);
        assert_eq!(dir_size_kb(&dir.path().join("missing")), 0);
    }

    #[test]
    fn test_archive_with_suffix() {
        let dir = TempDir::new().unwrap();
        let dest_dir = dir.path().join("logs");
        std::fs::create_dir_all(&dest_dir).unwrap();

        for expected in ["run.log", "run.log.2", "run.log.3"] {
            let src = dir.path().join("run.log");
            std::fs::write(&src, "x").unwrap();
            let archived = archive_with_suffix(&src, &dest_dir, "run.log").unwrap();
            assert_eq!(archived, dest_dir.join(expected));
            assert!(!src.exists());
        }
    }

    #[test]
    fn test_free_disk_mb() {
        let dir = TempDir::new().unwrap();
        // Any real filesystem has some space; the exact value is not ours
        // to assert.
        assert!(free_disk_mb(dir.path()).is_ok());
    }
}
