use super::ComponentClassifier;
use crate::models::{ComponentAnalysis, ModuleId};
use regex::Regex;
use std::sync::OnceLock;

/// Compiled patterns shared by every analyzer instance.
struct Patterns {
    export_default_function: Regex,
    export_default_name: Regex,
    function_name: Regex,
    const_name: Regex,
    hook_call: Regex,
    local_state: Regex,
    function_component: Regex,
    class_component: Regex,
    imports: Regex,
    ui_library_import: Regex,
    capitalized_markup: Regex,
    hook_signature: Regex,
    destructured_props: Regex,
    capitalized_identifier: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            export_default_function: Regex::new(r"export\s+default\s+function\s+([A-Z][a-zA-Z0-9]*)")?,
            export_default_name: Regex::new(r"export\s+default\s+([A-Z][a-zA-Z0-9]*)")?,
            function_name: Regex::new(r"function\s+([A-Z][a-zA-Z0-9]*)\s*\(")?,
            const_name: Regex::new(r"const\s+([A-Z][a-zA-Z0-9]*)\s*=")?,
            hook_call: Regex::new(r"use[A-Z][a-zA-Z0-9]*\s*\(")?,
            local_state: Regex::new(
                r"useState\s*\(|useReducer\s*\(|this\.state\s*=|this\.setState\s*\(|state\s*:\s*\{",
            )?,
            function_component: Regex::new(
                r"const\s+[A-Z][a-zA-Z0-9]*\s*=\s*\([^)]*\)\s*=>|function\s+[A-Z][a-zA-Z0-9]*\s*\([^)]*\)",
            )?,
            class_component: Regex::new(
                r"class\s+[A-Z][a-zA-Z0-9]*\s+extends\s+(?:React\.)?(?:Pure)?Component\b",
            )?,
            // Static `import/export ... from '...'`, side-effect `import '...'`,
            // and call-style `require('...')` / `import('...')`.
            imports: Regex::new(
                r#"(?:import|export)\s+[^'";]*?\bfrom\s*['"]([^'"]+)['"]|import\s*['"]([^'"]+)['"]|(?:require|import)\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
            )?,
            ui_library_import: Regex::new(r#"import[^;]*\bReact\b[^;]*from\s+['"]react['"]"#)?,
            capitalized_markup: Regex::new(r"<[A-Z][a-zA-Z0-9]*|React\.createElement")?,
            hook_signature: Regex::new(r"use[A-Z][a-zA-Z0-9]*\s*\([^)]*\)")?,
            destructured_props: Regex::new(r"\(\s*\{\s*([^}]+?)\s*\}\s*\)")?,
            capitalized_identifier: Regex::new(r"^[A-Z][a-zA-Z0-9]*$")?,
        })
    }
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| match Patterns::compile() {
            Ok(p) => Some(p),
            Err(e) => {
                log::error!("[hmr:analysis] Failed to compile component patterns: {}", e);
                None
            }
        })
        .as_ref()
}

/// Regex-based classifier for UI component source.
///
/// Strategy:
/// 1. Name from the capitalized file stem, else from the first matching
///    export/declaration idiom
/// 2. Hooks via `useXxx(`, local state via state-hook and class-state idioms
/// 3. Function-vs-class via declaration shape, requiring a `return` with markup
/// 4. Local dependencies from relative import specifiers only
#[derive(Debug, Clone)]
pub struct RegexComponentAnalyzer {
    class_components_eligible: bool,
}

impl Default for RegexComponentAnalyzer {
    fn default() -> Self {
        Self {
            class_components_eligible: true,
        }
    }
}

impl RegexComponentAnalyzer {
    pub fn new(class_components_eligible: bool) -> Self {
        Self {
            class_components_eligible,
        }
    }

    fn extract_name(p: &Patterns, path: &ModuleId, content: &str) -> Option<String> {
        let stem = match path.extension().as_deref() {
            Some("tsx" | "jsx" | "ts" | "js") => path.file_stem(),
            _ => path.file_name(),
        };
        if p.capitalized_identifier.is_match(stem) {
            return Some(stem.to_string());
        }

        [
            &p.export_default_function,
            &p.export_default_name,
            &p.function_name,
            &p.const_name,
        ]
        .iter()
        .find_map(|re| re.captures(content).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
    }

    fn is_function_like(p: &Patterns, content: &str) -> bool {
        p.function_component.is_match(content)
            && content.contains("return")
            && (content.contains('<') || content.contains("jsx") || content.contains("createElement"))
    }
}

impl ComponentClassifier for RegexComponentAnalyzer {
    fn analyze(&self, path: &ModuleId, content: &str) -> Option<ComponentAnalysis> {
        let p = patterns()?;
        let name = Self::extract_name(p, path, content)?;

        let analysis = ComponentAnalysis {
            name,
            has_hooks: p.hook_call.is_match(content),
            has_local_state: p.local_state.is_match(content),
            is_class_like: p.class_component.is_match(content),
            is_function_like: Self::is_function_like(p, content),
            local_dependencies: local_dependencies(path, content),
            signature: component_signature(content),
        };

        log::debug!(
            "[hmr:analysis] {} -> {} (hooks: {}, state: {}, deps: {})",
            path,
            analysis.name,
            analysis.has_hooks,
            analysis.has_local_state,
            analysis.local_dependencies.len()
        );
        Some(analysis)
    }

    fn can_fast_refresh(&self, analysis: &ComponentAnalysis) -> bool {
        if analysis.is_function_like {
            return true;
        }
        // No lifecycle inspection: class components are eligible unless disabled.
        analysis.is_class_like && self.class_components_eligible
    }
}

/// Ordered hook calls followed by the first destructured-props list, joined
/// with `|`. Two versions with the same signature keep the same hook layout.
pub fn component_signature(content: &str) -> String {
    let Some(p) = patterns() else {
        return String::new();
    };

    let mut parts: Vec<&str> = p.hook_signature.find_iter(content).map(|m| m.as_str()).collect();
    if let Some(props) = p.destructured_props.captures(content).and_then(|c| c.get(1)) {
        parts.push(props.as_str());
    }
    parts.join("|")
}

/// Relative import and re-export specifiers (`./x`, `../y`) of any script,
/// joined against the module's directory. Bare package imports are dropped.
pub fn local_dependencies(path: &ModuleId, content: &str) -> Vec<ModuleId> {
    let Some(p) = patterns() else {
        return Vec::new();
    };

    let mut deps: Vec<ModuleId> = Vec::new();
    for caps in p.imports.captures_iter(content) {
        let specifier = match caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            Some(m) => m.as_str(),
            None => continue,
        };
        if !(specifier.starts_with("./") || specifier.starts_with("../")) {
            continue;
        }
        let id = path.join_relative(specifier);
        if !deps.contains(&id) {
            deps.push(id);
        }
    }
    deps
}

/// Whether `path` looks like a UI component file at all.
///
/// True when the content imports the UI library, contains capitalized markup
/// or `createElement`, or the extension is `jsx`/`tsx`.
pub fn is_component_file(path: &ModuleId, content: &str) -> bool {
    if matches!(path.extension().as_deref(), Some("jsx" | "tsx")) {
        return true;
    }
    match patterns() {
        Some(p) => p.ui_library_import.is_match(content) || p.capitalized_markup.is_match(content),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(path: &str, content: &str) -> Option<ComponentAnalysis> {
        RegexComponentAnalyzer::default().analyze(&ModuleId::new(path), content)
    }

    #[test]
    fn test_stateless_function_component() {
        let content = r#"
import React from 'react';
import { Icon } from './Icon';

export default function Button({ label }) {
  return <button><Icon />{label}</button>;
}
"#;
        let analysis = analyze("components/Button.tsx", content).unwrap();
        assert_eq!(analysis.name, "Button");
        assert!(analysis.is_function_like);
        assert!(!analysis.is_class_like);
        assert!(!analysis.has_hooks);
        assert!(!analysis.has_local_state);
        assert_eq!(analysis.local_dependencies, vec![ModuleId::new("components/Icon")]);
    }

    #[test]
    fn test_name_from_content_when_stem_is_lowercase() {
        let content = "export default function Counter() { return <div/>; }";
        assert_eq!(analyze("app/counter.tsx", content).unwrap().name, "Counter");

        let content = "const Header = () => { return <h1/>; };\nexport default Header;";
        assert_eq!(analyze("app/header.tsx", content).unwrap().name, "Header");

        let content = "const Footer = () => <footer/>;";
        assert_eq!(analyze("app/footer.jsx", content).unwrap().name, "Footer");
    }

    #[test]
    fn test_no_name_returns_none() {
        assert!(analyze("lib/format.ts", "export const format = (x) => `${x}`;").is_none());
        assert!(analyze("lib/empty.ts", "").is_none());
    }

    #[test]
    fn test_hooks_and_state() {
        let content = r#"
import { useState, useEffect } from 'react';
export default function Counter() {
  const [count, setCount] = useState(0);
  useEffect(() => {}, []);
  return <span>{count}</span>;
}
"#;
        let analysis = analyze("components/Counter.tsx", content).unwrap();
        assert!(analysis.has_hooks);
        assert!(analysis.has_local_state);

        let memo = "function Label() { const v = useMemo(() => 1, []); return <b>{v}</b>; }";
        let analysis = analyze("components/Label.tsx", memo).unwrap();
        assert!(analysis.has_hooks);
        assert!(!analysis.has_local_state);
    }

    #[test]
    fn test_class_component() {
        let content = r#"
import React, { Component } from 'react';
class Clock extends React.Component {
  constructor(props) { super(props); this.state = { now: 0 }; }
  render() { return <p>{this.state.now}</p>; }
}
export default Clock;
"#;
        let analysis = analyze("components/Clock.jsx", content).unwrap();
        assert!(analysis.is_class_like);
        assert!(analysis.has_local_state);

        assert!(RegexComponentAnalyzer::new(true).can_fast_refresh(&analysis));

        let mut class_only = analysis.clone();
        class_only.is_function_like = false;
        assert!(RegexComponentAnalyzer::new(true).can_fast_refresh(&class_only));
        assert!(!RegexComponentAnalyzer::new(false).can_fast_refresh(&class_only));
    }

    #[test]
    fn test_non_component_cannot_fast_refresh() {
        // Capitalized name but no render-like body
        let analysis = analyze("lib/Config.ts", "export const Config = { a: 1 };").unwrap();
        assert!(!analysis.is_component());
        assert!(!RegexComponentAnalyzer::default().can_fast_refresh(&analysis));
    }

    #[test]
    fn test_local_dependencies_keep_only_relative_imports() {
        let content = r#"
import React from 'react';
import styles from './Card.module.css';
import { format } from '../../lib/format';
import './global.css';
const helper = require('./helper');
export { Badge } from './Badge';
import lodash from 'lodash';
export default function Card() { return <div/>; }
"#;
        let analysis = analyze("app/dashboard/Card.tsx", content).unwrap();
        assert_eq!(
            analysis.local_dependencies,
            vec![
                ModuleId::new("app/dashboard/Card.module.css"),
                ModuleId::new("lib/format"),
                ModuleId::new("app/dashboard/global.css"),
                ModuleId::new("app/dashboard/helper"),
                ModuleId::new("app/dashboard/Badge"),
            ]
        );
    }

    #[test]
    fn test_local_dependencies_of_plain_module() {
        let content = "import { round } from './round';\nexport * from '../shared/money';\nexport const f = (n) => round(n);";
        assert_eq!(
            local_dependencies(&ModuleId::new("utils/format.ts"), content),
            vec![ModuleId::new("utils/round"), ModuleId::new("shared/money")]
        );
    }

    #[test]
    fn test_multiline_import() {
        let content = "import {\n  a,\n  b,\n} from './parts';\nexport default function Parts() { return <i/>; }";
        let analysis = analyze("Parts.tsx", content).unwrap();
        assert_eq!(analysis.local_dependencies, vec![ModuleId::new("parts")]);
    }

    #[test]
    fn test_malformed_source_does_not_panic() {
        let garbage = "}{)(<<<>>>export default function ((( import from '";
        let _ = analyze("Broken.tsx", garbage);
        let _ = component_signature(garbage);
    }

    #[test]
    fn test_component_signature() {
        let content = r#"
function Form({ name, onSubmit }) {
  const [value, setValue] = useState(name);
  const ref = useRef(null);
  return <form/>;
}
"#;
        assert_eq!(
            component_signature(content),
            "useState(name)|useRef(null)|name, onSubmit"
        );
        assert_eq!(component_signature("const x = 1;"), "");
    }

    #[test]
    fn test_is_component_file() {
        assert!(is_component_file(&ModuleId::new("a/b.tsx"), ""));
        assert!(is_component_file(
            &ModuleId::new("a/b.js"),
            "import React from 'react';"
        ));
        assert!(is_component_file(&ModuleId::new("a/b.js"), "return <Widget />"));
        assert!(is_component_file(
            &ModuleId::new("a/b.js"),
            "React.createElement('div')"
        ));
        assert!(!is_component_file(&ModuleId::new("a/b.ts"), "export const x = 1 < 2;"));
    }
}
