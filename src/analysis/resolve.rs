use crate::models::ModuleId;
use std::path::Path;

/// Extensions probed, in order, for an extensionless import specifier.
pub const RESOLVE_EXTENSIONS: [&str; 5] = [".tsx", ".ts", ".jsx", ".js", ".css"];

/// Map a lexically joined import target onto a file under `root`.
///
/// Tries the id as written, then each of [`RESOLVE_EXTENSIONS`], then
/// `index.*` inside it. Falls back to the lexical id when nothing exists, so
/// a later-created target still lines up when it is created under that name.
pub fn resolve_dependency(root: &Path, lexical: &ModuleId) -> ModuleId {
    if lexical.to_path(root).is_file() {
        return lexical.clone();
    }

    RESOLVE_EXTENSIONS
        .iter()
        .map(|ext| lexical.with_suffix(ext))
        .chain(
            RESOLVE_EXTENSIONS
                .iter()
                .map(|ext| lexical.with_suffix(&format!("/index{}", ext))),
        )
        .find(|candidate| candidate.to_path(root).is_file())
        .unwrap_or_else(|| lexical.clone())
}

pub fn resolve_dependencies(root: &Path, lexical: &[ModuleId]) -> Vec<ModuleId> {
    let mut resolved: Vec<ModuleId> = Vec::with_capacity(lexical.len());
    for id in lexical {
        let target = resolve_dependency(root, id);
        if !resolved.contains(&target) {
            resolved.push(target);
        }
    }
    resolved
}
