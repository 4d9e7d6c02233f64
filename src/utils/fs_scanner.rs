use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Information about a scanned file.
///
/// Used by the watcher to prime its "seen" set and by the server to
/// register the initial module graph before going live.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Absolute path to the file
    pub absolute_path: PathBuf,
    /// Forward-slash path relative to the scan root
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
}

/// Options for directory scanning
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum recursion depth
    pub max_depth: usize,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to ignore hidden files (starting with dot)
    pub ignore_hidden: bool,
    /// Substring/prefix patterns matched against the relative path
    pub exclude_patterns: Vec<String>,
    /// Maximum file size in bytes to include
    pub max_file_size: u64,
    /// Maximum number of files to return
    pub max_files: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: 100,
            follow_symlinks: false,
            ignore_hidden: true,
            exclude_patterns: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
                "build".to_string(),
            ],
            max_file_size: 10 * 1024 * 1024, // 10 MB
            max_files: 10_000,
        }
    }
}

impl ScanOptions {
    pub fn with_excludes(exclude_patterns: Vec<String>) -> Self {
        Self {
            exclude_patterns,
            ..Self::default()
        }
    }
}

/// Whether a root-relative path matches any exclude pattern.
///
/// A pattern matches when it occurs anywhere in the path.
pub fn is_excluded(relative_path: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|pattern| relative_path.contains(pattern.as_str()))
}

fn relative_string(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Scan a directory and return the regular files below it.
///
/// Excluded directories are not descended into. The scan stops with a
/// warning once `max_files` files have been collected.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Vec<FileInfo>, String> {
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }

    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .max_depth(options.max_depth)
        .follow_links(options.follow_symlinks)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if options.ignore_hidden && entry.file_name().to_string_lossy().starts_with('.') {
                return false;
            }
            !is_excluded(&relative_string(root, entry.path()), &options.exclude_patterns)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("[hmr:scan] Failed to read directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("[hmr:scan] Failed to read metadata for {:?}: {}", entry.path(), e);
                continue;
            }
        };

        // Skip large files
        if metadata.len() > options.max_file_size {
            log::warn!(
                "[hmr:scan] Skipping large file: {:?} ({} bytes)",
                entry.path(),
                metadata.len()
            );
            continue;
        }

        if files.len() >= options.max_files {
            log::warn!(
                "[hmr:scan] Too many files under {} (limit: {}), scan truncated",
                root.display(),
                options.max_files
            );
            break;
        }

        files.push(FileInfo {
            absolute_path: entry.path().to_path_buf(),
            relative_path: relative_string(root, entry.path()),
            size: metadata.len(),
        });
    }

    Ok(files)
}
