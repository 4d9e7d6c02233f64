//! Update strategy policy.
//!
//! Maps `(module, file kind, analysis)` to hot / fast-refresh / reload.
//! Ambiguity always resolves toward a full reload.

use crate::analysis::ComponentClassifier;
use crate::models::{ComponentAnalysis, FileKind, ModuleId, UpdateDecision};
use std::sync::Arc;

/// Base names that always force a full reload (root layout / page / app entry).
pub const CRITICAL_FILE_NAMES: [&str; 8] = [
    "layout.tsx",
    "layout.jsx",
    "app.tsx",
    "app.jsx",
    "_app.tsx",
    "_app.jsx",
    "page.tsx",
    "page.jsx",
];

/// Naming conventions for modules that are safe to hot-apply.
pub const UTILITY_PATTERNS: [&str; 5] = ["utils", "helpers", "constants", "hooks", "lib"];

/// Reason for a forced reload, if the module is structurally critical.
pub fn critical_reason(path: &ModuleId, kind: FileKind) -> Option<String> {
    let name = path.file_name().to_lowercase();

    if CRITICAL_FILE_NAMES.contains(&name.as_str()) {
        return Some(format!("Critical file changed: {}", name));
    }
    if name.contains("config") || name.contains(".env") {
        return Some(format!("Configuration file changed: {}", name));
    }
    if kind == FileKind::Document {
        return Some(format!("Document changed: {}", name));
    }
    None
}

/// Utility-shaped module: the base name or any directory segment carries a
/// utility naming convention.
pub fn is_utility_module(path: &ModuleId) -> bool {
    let name = path.file_name().to_lowercase();
    let parent = path.parent();
    UTILITY_PATTERNS.iter().any(|pattern| {
        name.contains(pattern) || parent.split('/').any(|segment| segment == *pattern)
    })
}

/// Component file by naming convention: capitalized `*.tsx`/`*.jsx`, or
/// anything under a `components/` directory.
pub fn is_component_path(path: &ModuleId) -> bool {
    let capitalized_markup = matches!(path.extension().as_deref(), Some("tsx" | "jsx"))
        && path.file_stem().starts_with(|c: char| c.is_ascii_uppercase())
        && path.file_stem().chars().all(|c| c.is_ascii_alphanumeric());
    capitalized_markup || path.parent().split('/').any(|segment| segment == "components")
}

/// Whether a module can be applied without a full reload at all.
///
/// Used by the registry to compute `acceptsLiveUpdate`.
pub fn accepts_live_update(path: &ModuleId, kind: FileKind, is_component: bool) -> bool {
    if critical_reason(path, kind).is_some() {
        return false;
    }
    match kind {
        FileKind::Stylesheet => true,
        FileKind::Script | FileKind::MarkupComponent => {
            is_component || is_component_path(path) || is_utility_module(path)
        }
        FileKind::Document | FileKind::Other => false,
    }
}

/// Pure decision function over a pluggable classifier.
#[derive(Clone)]
pub struct UpdateStrategyPolicy {
    classifier: Arc<dyn ComponentClassifier>,
    fast_refresh_enabled: bool,
}

impl UpdateStrategyPolicy {
    pub fn new(classifier: Arc<dyn ComponentClassifier>, fast_refresh_enabled: bool) -> Self {
        Self {
            classifier,
            fast_refresh_enabled,
        }
    }

    pub fn classifier(&self) -> &Arc<dyn ComponentClassifier> {
        &self.classifier
    }

    /// Decide how to propagate a change.
    ///
    /// Strategy, first match wins:
    /// 1. Critical name, config marker, or Document -> FullReload
    /// 2. Stylesheet -> Hot
    /// 3. Script/MarkupComponent with a fast-refresh-eligible analysis -> FastRefresh
    /// 4. Script/MarkupComponent that is utility- or component-shaped -> Hot
    /// 5. Otherwise -> FullReload
    pub fn decide(
        &self,
        path: &ModuleId,
        kind: FileKind,
        analysis: Option<&ComponentAnalysis>,
    ) -> UpdateDecision {
        if let Some(reason) = critical_reason(path, kind) {
            return UpdateDecision::full_reload(reason);
        }

        match kind {
            FileKind::Stylesheet => UpdateDecision::hot("Stylesheet can be hot-swapped"),
            FileKind::Script | FileKind::MarkupComponent => {
                if let Some(analysis) = analysis {
                    if self.fast_refresh_enabled && self.classifier.can_fast_refresh(analysis) {
                        return UpdateDecision::fast_refresh(format!(
                            "Fast refresh supported for component {}",
                            analysis.name
                        ));
                    }
                }

                if is_utility_module(path) {
                    UpdateDecision::hot(format!("Utility module {} can be hot-updated", path))
                } else if is_component_path(path) {
                    UpdateDecision::hot(format!("Component module {} can be hot-updated", path))
                } else {
                    UpdateDecision::full_reload(format!(
                        "Fallback to reload for {}",
                        kind.as_str()
                    ))
                }
            }
            FileKind::Document | FileKind::Other => {
                UpdateDecision::full_reload(format!("Unsupported file kind: {}", kind.as_str()))
            }
        }
    }
}
