//! Dependency declarations inside pseudocode artifacts.
//!
//! Pseudocode carries a section like:
//!
//! ```text
//! # Imports/Dependencies:
//! - Import express from express
//! - import { Todo } from './models/Todo.js'
//! # Main Logic:
//! ```
//!
//! Only references that resolve to a tracked project file become edges.

use crate::extract::Extraction;
use regex::Regex;
use std::collections::BTreeSet;

/// Script extensions tried for extension-less references.
const SCRIPT_EXTENSIONS: [&str; 4] = [".js", ".jsx", ".ts", ".tsx"];

/// Compiled patterns for every declaration shape we recognize.
pub struct ImportPatterns {
    section: Regex,
    shapes: Vec<Regex>,
}

impl ImportPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        let section = Regex::new(
            r"(?is)#\s*Imports/Dependencies:(.*?)(?:#\s*Main Logic:|#\s*Functions/Classes:|#\s*Exports/Outputs:|END FILE|$)",
        )?;
        let shapes = [
            // import X from './x.js'
            r#"(?i)import\s+[\w$]+\s+from\s+['"]([^'"]+)['"]"#,
            // import { a, b } from './x.js'
            r#"(?i)import\s*\{[^}]*\}\s*from\s+['"]([^'"]+)['"]"#,
            // require('./x.js')
            r#"(?i)require\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
            // from './x.js'
            r#"(?i)\bfrom\s+['"]([^'"]+)['"]"#,
            // - Import X from path/x.js
            r#"(?im)^\s*[-*]\s*import\s+.*?\bfrom\s+([^\s'"]+\.[A-Za-z]+)\s*$"#,
        ]
        .into_iter()
        .map(Regex::new)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { section, shapes })
    }

    /// The body of the dependencies section.
    pub fn dependency_section<'a>(&self, pseudocode: &'a str) -> Extraction<&'a str> {
        match self.section.captures(pseudocode).and_then(|c| c.get(1)) {
            Some(body) if !body.as_str().trim().is_empty() => Extraction::Parsed(body.as_str()),
            Some(_) => Extraction::Fallback("dependencies section is empty".to_string()),
            None => Extraction::Fallback("no dependencies section".to_string()),
        }
    }

    /// Every raw reference found in `section`, deduplicated, in first-seen order.
    pub fn references(&self, section: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut refs = Vec::new();
        for shape in &self.shapes {
            for caps in shape.captures_iter(section) {
                if let Some(m) = caps.get(1) {
                    let raw = m.as_str().trim().to_string();
                    if !raw.is_empty() && seen.insert(raw.clone()) {
                        refs.push(raw);
                    }
                }
            }
        }
        refs
    }
}

/// Strip leading `./` and `../` markers and any leading slash.
pub fn strip_relative_markers(reference: &str) -> &str {
    reference.trim_start_matches(['.', '/'])
}

/// Join `reference` onto the directory of `importer`, folding `.` and `..`.
fn join_relative(importer: &str, reference: &str) -> Option<String> {
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();
    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Resolve a raw reference from `importer` to a tracked path.
///
/// Tries the importer-relative path, then the project-root path, each as
/// written and with common script extensions appended.
pub fn resolve_reference(
    reference: &str,
    importer: &str,
    is_known: impl Fn(&str) -> bool,
) -> Option<String> {
    let mut bases = Vec::new();
    if reference.starts_with('.')
        && let Some(joined) = join_relative(importer, reference)
    {
        bases.push(joined);
    }
    let stripped = strip_relative_markers(reference);
    if !stripped.is_empty() {
        bases.push(stripped.to_string());
    }

    for base in bases {
        if is_known(&base) {
            return Some(base);
        }
        let has_extension = base
            .rsplit('/')
            .next()
            .is_some_and(|name| name.contains('.'));
        if !has_extension {
            for ext in SCRIPT_EXTENSIONS {
                let candidate = format!("{base}{ext}");
                if is_known(&candidate) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}
