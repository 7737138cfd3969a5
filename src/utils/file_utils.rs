//! File system utilities

use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Device names Windows refuses as file stems, whatever the extension
const RESERVED_WINDOWS_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", path.display(), e))?;
    }
    Ok(())
}

/// Sanitize filename for Windows file systems.
///
/// Forbidden characters become their full-width look-alikes (slashes become
/// the big solidus pair), matching what yt-dlp writes with
/// `--windows-filenames`, so the predicted name agrees with the file on disk.
pub fn sanitize_filename(filename: &str) -> String {
    let mapped: String = filename
        .chars()
        .filter_map(|c| match c {
            '/' => Some('\u{29F8}'),
            '\\' => Some('\u{29F9}'),
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => char::from_u32(c as u32 + 0xFEE0),
            '\n' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let trimmed = mapped.trim_end_matches(['.', ' ']).trim_start();
    if trimmed.is_empty() {
        return "_".to_string();
    }

    let stem = trimmed.split('.').next().unwrap_or(trimmed);
    if RESERVED_WINDOWS_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}

/// Longest prefix of `value` that fits in `max_bytes` without splitting a character
pub fn truncate_to_bytes(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Longest prefix of `value` holding at most `max_chars` characters
pub fn truncate_to_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Log a shallow picture of a directory tree.
///
/// Used at startup so support logs show what sits next to the executable.
/// Lists at most `max_files` file names per directory and stops descending
/// below `max_depth`.
pub fn log_directory_overview(root: &Path, max_depth: usize, max_files: usize) -> usize {
    info!("Scanning directory contents of {}", root.display());

    let mut directories = 0;
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_type().is_dir());

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        directories += 1;

        let indent = "  ".repeat(entry.depth());
        let name = entry.file_name().to_string_lossy();
        info!("{}{}/", indent, name);

        let mut files: Vec<String> = match fs::read_dir(entry.path()) {
            Ok(read_dir) => read_dir
                .filter_map(|child| child.ok())
                .filter(|child| child.file_type().map(|t| t.is_file()).unwrap_or(false))
                .map(|child| child.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(err) => {
                debug!("Cannot list {}: {}", entry.path().display(), err);
                continue;
            }
        };
        files.sort();

        let file_indent = "  ".repeat(entry.depth() + 1);
        for file in files.iter().take(max_files) {
            info!("{}{}", file_indent, file);
        }
        if files.len() > max_files {
            info!("{}... and {} more files", file_indent, files.len() - max_files);
        }
    }

    directories
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename_windows_safe() {
        assert_eq!(sanitize_filename("a/b\\c"), "a\u{29F8}b\u{29F9}c");
        assert_eq!(sanitize_filename("What? Yes: \"quoted\""), "What？ Yes： ＂quoted＂");
        assert_eq!(sanitize_filename("trailing dots..."), "trailing dots");
        assert_eq!(sanitize_filename("bell\u{7}"), "bell");
        assert_eq!(sanitize_filename("CON"), "_CON");
        assert_eq!(sanitize_filename("nul.txt"), "_nul.txt");
        assert_eq!(sanitize_filename("..."), "_");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_to_bytes("abcdef", 3), "abc");
        assert_eq!(truncate_to_bytes("abc", 10), "abc");
        // "é" is two bytes; cutting in its middle must back off
        assert_eq!(truncate_to_bytes("aé", 2), "a");
        assert_eq!(truncate_to_chars("añb", 2), "añ");
        assert_eq!(truncate_to_chars("ab", 5), "ab");
    }

    #[test]
    fn test_directory_overview_counts_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("one/two/three")).unwrap();
        for i in 0..12 {
            fs::write(dir.path().join(format!("file{}.txt", i)), b"x").unwrap();
        }

        // root, one, two (three is below max depth)
        assert_eq!(log_directory_overview(dir.path(), 2, 10), 3);
    }

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
