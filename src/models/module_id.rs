use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Stable identity of a source file: a forward-slash, root-relative path.
///
/// Normalization is purely lexical (`.` segments dropped, `..` folded into the
/// preceding segment, `\` treated as a separator), so the same on-disk path
/// always yields the same id and distinct paths under the root never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Build an id from an already root-relative path string.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_segments(raw.as_ref().split(['/', '\\'])))
    }

    /// Build an id for `full_path` relative to the watch `root`.
    ///
    /// Paths outside the root keep their full (normalized) form.
    pub fn from_path(root: &Path, full_path: &Path) -> Self {
        let relative = full_path.strip_prefix(root).unwrap_or(full_path);
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect();
        Self(normalize_segments(segments.iter().map(String::as_str)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. `Button.tsx` for `components/Button.tsx`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its final extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    /// Lowercased final extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx + 1..].to_lowercase()),
            _ => None,
        }
    }

    /// Directory part of the id (empty for files at the root).
    pub fn parent(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Resolve a relative import specifier (`./x`, `../y/z`) against this
    /// module's directory.
    pub fn join_relative(&self, specifier: &str) -> ModuleId {
        let parent = self.parent();
        let joined = if parent.is_empty() {
            specifier.to_string()
        } else {
            format!("{}/{}", parent, specifier)
        };
        ModuleId::new(joined)
    }

    /// Same id with `suffix` appended verbatim (used for extension probing).
    pub fn with_suffix(&self, suffix: &str) -> ModuleId {
        ModuleId::new(format!("{}{}", self.0, suffix))
    }

    /// Absolute location of this module under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

fn normalize_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in segments {
        match seg {
            "" | "." => {}
            ".." => match out.last() {
                Some(last) if *last != ".." => {
                    out.pop();
                }
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out.join("/")
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        ModuleId::new(value)
    }
}
