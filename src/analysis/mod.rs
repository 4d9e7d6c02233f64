//! Lightweight component classification.
//!
//! Classification is lexical, not a parse: a missed component only costs a
//! full reload, and malformed input never fails the pipeline. The
//! [`ComponentClassifier`] trait is the seam where a real syntax-aware
//! implementation could replace [`RegexComponentAnalyzer`].

mod lexical;
mod resolve;

pub use lexical::{component_signature, is_component_file, local_dependencies, RegexComponentAnalyzer};
pub use resolve::{resolve_dependencies, resolve_dependency, RESOLVE_EXTENSIONS};

use crate::models::{ComponentAnalysis, ModuleId};

/// Fallible component classifier.
///
/// Implementations must be pure with respect to their inputs and must never
/// panic on arbitrary text.
pub trait ComponentClassifier: Send + Sync {
    /// Classify `content` of the module `path`.
    ///
    /// # Returns
    /// - `Some(analysis)`: a component name could be extracted
    /// - `None`: the file does not look like a component
    fn analyze(&self, path: &ModuleId, content: &str) -> Option<ComponentAnalysis>;

    /// Whether an in-place component refresh is safe for this analysis.
    fn can_fast_refresh(&self, analysis: &ComponentAnalysis) -> bool;
}
