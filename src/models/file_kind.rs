use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coarse file classification, derived solely from the file extension.
///
/// Strategy:
/// 1. `js`/`ts` family -> Script
/// 2. `jsx`/`tsx` -> MarkupComponent
/// 3. `css` and preprocessor dialects -> Stylesheet
/// 4. `html`/`htm` -> Document
/// 5. Everything else -> Other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Script,
    MarkupComponent,
    Stylesheet,
    Document,
    Other,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "ts" | "mts" | "cts" => FileKind::Script,
            "jsx" | "tsx" => FileKind::MarkupComponent,
            "css" | "scss" | "sass" | "less" => FileKind::Stylesheet,
            "html" | "htm" => FileKind::Document,
            _ => FileKind::Other,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or(FileKind::Other)
    }

    /// Kinds that may hold a UI component and are worth analyzing.
    pub fn is_component_like(self) -> bool {
        matches!(self, FileKind::Script | FileKind::MarkupComponent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Script => "script",
            FileKind::MarkupComponent => "markup-component",
            FileKind::Stylesheet => "stylesheet",
            FileKind::Document => "document",
            FileKind::Other => "other",
        }
    }
}
