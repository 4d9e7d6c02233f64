use super::ModuleId;
use serde::{Deserialize, Serialize};

/// Result of the lexical component classifier for a single file.
///
/// Always recomputed from current content, never cached across edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAnalysis {
    pub name: String,
    pub has_hooks: bool,
    pub has_local_state: bool,
    pub is_class_like: bool,
    pub is_function_like: bool,
    /// Relative imports resolved lexically against the analyzed file.
    pub local_dependencies: Vec<ModuleId>,
    /// Ordered hook calls plus destructured props, joined with `|`.
    pub signature: String,
}

impl ComponentAnalysis {
    pub fn is_component(&self) -> bool {
        self.is_function_like || self.is_class_like
    }
}

/// Component metadata the registry keeps per module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInfo {
    pub name: String,
    pub has_local_state: bool,
    pub signature: String,
}

impl From<&ComponentAnalysis> for ComponentInfo {
    fn from(analysis: &ComponentAnalysis) -> Self {
        Self {
            name: analysis.name.clone(),
            has_local_state: analysis.has_local_state,
            signature: analysis.signature.clone(),
        }
    }
}
