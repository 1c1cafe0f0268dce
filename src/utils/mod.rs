//! Utility functions and helpers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Lists the files below a directory
///
/// Implementations return paths sorted so that callers iterating the result
/// see a stable order.
pub trait FileLister: Send + Sync {
    fn list(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`FileLister`] backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLister;

impl FileLister for FsLister {
    fn list(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}

/// Whether the file's immediate parent directory is called `name`
pub fn parent_is(path: &Path, name: &str) -> bool {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n == name)
        .unwrap_or(false)
}

/// Whether the file has one of the given extensions (case-insensitive)
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Write a file, creating parent directories as needed
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Copy `file` from below `from` to the same relative location below `to`
pub fn copy_relative(file: &Path, from: &Path, to: &Path) -> io::Result<PathBuf> {
    let relative = file.strip_prefix(from).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not inside {}", file.display(), from.display()),
        )
    })?;
    let target = to.join(relative);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(file, &target)?;

    Ok(target)
}

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Get relative path from base to target
pub fn relative_path(from: &Path, to: &Path) -> Option<String> {
    pathdiff::diff_paths(to, from).map(|p| path_to_slash(&p))
}

/// Render a path with forward slashes on every platform
pub fn path_to_slash(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content() {
        let hash = hash_content(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, hash_content(b"hello world"));
        assert_ne!(hash, hash_content(b"hello world!"));
    }

    #[test]
    fn test_parent_is() {
        assert!(parent_is(Path::new("src/js/pages/about.js"), "pages"));
        assert!(!parent_is(Path::new("src/js/pages/deep/about.js"), "pages"));
        assert!(!parent_is(Path::new("about.js"), "pages"));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("a/logo.PNG"), &["png", "jpg"]));
        assert!(!has_extension(Path::new("a/logo.svg"), &["png", "jpg"]));
        assert!(!has_extension(Path::new("a/Makefile"), &["png"]));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/project"), Path::new("/project/src/js/main.js")).as_deref(),
            Some("src/js/main.js")
        );
    }

    #[test]
    fn test_fs_lister_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("b/two.txt"), "2").unwrap();
        write_file(&dir.path().join("a/one.txt"), "1").unwrap();
        write_file(&dir.path().join("root.txt"), "0").unwrap();

        let files = FsLister.list(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| relative_path(dir.path(), f).unwrap())
            .collect();

        assert_eq!(names, vec!["a/one.txt", "b/two.txt", "root.txt"]);
    }

    #[test]
    fn test_fs_lister_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsLister.list(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_copy_relative() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write_file(&src.join("nested/page.html"), "<p>hi</p>").unwrap();

        let target = copy_relative(&src.join("nested/page.html"), &src, &out).unwrap();

        assert_eq!(target, out.join("nested/page.html"));
        assert_eq!(fs::read_to_string(target).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}
