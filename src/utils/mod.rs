/// Utility modules for the live-update server
///
/// This module provides common utility functions used throughout the crate.
pub mod fs_scanner;
pub mod time;

/// Wire timestamps (RFC 3339 UTC, millisecond precision).
pub use time::{format_utc, now_utc};

/// Scans directories recursively with exclude patterns and limits.
pub use fs_scanner::{is_excluded, scan_directory, FileInfo, ScanOptions};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
