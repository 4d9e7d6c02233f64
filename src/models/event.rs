use super::{FileKind, ModuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A debounced, filtered filesystem change, consumed once by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    pub kind: ChangeKind,
    pub path: ModuleId,
    pub full_path: PathBuf,
    /// Empty when `kind == Removed`.
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
    pub file_kind: FileKind,
}

impl FileChangeEvent {
    pub fn new(kind: ChangeKind, path: ModuleId, full_path: PathBuf, content_hash: String) -> Self {
        let file_kind = FileKind::from_path(&full_path);
        let content_hash = if kind == ChangeKind::Removed {
            String::new()
        } else {
            content_hash
        };
        Self {
            kind,
            path,
            full_path,
            content_hash,
            timestamp: Utc::now(),
            file_kind,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.kind == ChangeKind::Removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_event_drops_hash() {
        let event = FileChangeEvent::new(
            ChangeKind::Removed,
            ModuleId::new("utils/helpers.ts"),
            PathBuf::from("/p/utils/helpers.ts"),
            "abc".to_string(),
        );
        assert!(event.is_removal());
        assert_eq!(event.content_hash, "");
        assert_eq!(event.file_kind, FileKind::Script);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&ChangeKind::Modified).unwrap(), "\"modified\"");
    }
}
