//! Import-specifier resolution against the set of indexed files.
//!
//! Resolution is filesystem-free: a candidate "exists" when the index holds a
//! record for it. Candidate order is part of the contract: an exact match
//! always beats extension probing, which always beats directory index probing,
//! and the extension order is the canonical tracked list.

use codemap_extractor::TRACKED_EXTENSIONS;

/// True when a specifier can point inside the project.
/// Bare package names (`react`, `lodash/merge`) are external and never resolve.
pub fn is_internal(specifier: &str) -> bool {
    specifier.starts_with('.') || specifier.starts_with('/')
}

/// Resolve `specifier` as written in `from` to a known project-relative path.
///
/// `is_known` is the membership test over indexed records. Returns `None` for
/// external specifiers, paths escaping the project root, and resolution
/// misses; misses are expected and are not errors.
pub fn resolve<F>(from: &str, specifier: &str, is_known: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    candidates(from, specifier)
        .into_iter()
        .find(|candidate| is_known(candidate))
}

/// Candidate paths for a specifier, in resolution order:
/// the literal path, then `path.<ext>` per tracked extension, then
/// `path/index.<ext>` per tracked extension.
pub fn candidates(from: &str, specifier: &str) -> Vec<String> {
    if !is_internal(specifier) {
        return Vec::new();
    }

    let joined = if let Some(rooted) = specifier.strip_prefix('/') {
        rooted.to_string()
    } else {
        match parent_dir(from) {
            "" => specifier.to_string(),
            dir => format!("{dir}/{specifier}"),
        }
    };

    let Some(base) = normalize(&joined) else {
        return Vec::new();
    };
    if base.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(1 + TRACKED_EXTENSIONS.len() * 2);
    out.push(base.clone());
    for ext in TRACKED_EXTENSIONS {
        out.push(format!("{base}.{ext}"));
    }
    for ext in TRACKED_EXTENSIONS {
        out.push(format!("{base}/index.{ext}"));
    }
    out
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Collapse `.` and `..` segments without touching the filesystem.
/// Returns `None` when the path climbs above the project root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn known(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn resolve_in(set: &BTreeSet<String>, from: &str, spec: &str) -> Option<String> {
        resolve(from, spec, |c| set.contains(c))
    }

    #[test]
    fn test_bare_specifiers_are_external() {
        let set = known(&["react.js"]);
        assert_eq!(resolve_in(&set, "a.js", "react"), None);
        assert_eq!(resolve_in(&set, "a.js", "lodash/merge"), None);
    }

    #[test]
    fn test_sibling_file_resolution() {
        let set = known(&["a.js", "b.js"]);
        assert_eq!(resolve_in(&set, "a.js", "./b"), Some("b.js".to_string()));
    }

    #[test]
    fn test_exact_match_beats_extension_probing() {
        // a known extensionless path wins over appending extensions
        let set = known(&["vendor/blob", "vendor/blob.js"]);
        assert_eq!(
            resolve_in(&set, "vendor/main.js", "./blob"),
            Some("vendor/blob".to_string())
        );
    }

    #[test]
    fn test_extension_beats_directory_index() {
        let set = known(&["b.js", "b/index.js"]);
        assert_eq!(resolve_in(&set, "a.js", "./b"), Some("b.js".to_string()));

        let only_index = known(&["b/index.js"]);
        assert_eq!(
            resolve_in(&only_index, "a.js", "./b"),
            Some("b/index.js".to_string())
        );
    }

    #[test]
    fn test_extension_order_is_canonical() {
        let set = known(&["widget.ts", "widget.jsx"]);
        // jsx precedes ts in the tracked list
        assert_eq!(
            resolve_in(&set, "app.js", "./widget"),
            Some("widget.jsx".to_string())
        );
    }

    #[test]
    fn test_parent_traversal() {
        let set = known(&["models/user.js", "src/app.js"]);
        assert_eq!(
            resolve_in(&set, "src/app.js", "../models/user"),
            Some("models/user.js".to_string())
        );
    }

    #[test]
    fn test_escaping_the_root_never_resolves() {
        let set = known(&["x.js"]);
        assert_eq!(resolve_in(&set, "a.js", "../../x"), None);
        assert!(candidates("a.js", "../../x").is_empty());
    }

    #[test]
    fn test_root_relative_specifiers() {
        let set = known(&["src/shared/api.js"]);
        assert_eq!(
            resolve_in(&set, "src/deep/nested/mod.js", "/src/shared/api"),
            Some("src/shared/api.js".to_string())
        );
    }

    #[test]
    fn test_missing_targets_resolve_to_none() {
        let set = known(&["a.js"]);
        assert_eq!(resolve_in(&set, "a.js", "./missing"), None);
    }

    #[test]
    fn test_candidate_list_shape() {
        let list = candidates("src/app.js", "./b");
        assert_eq!(list[0], "src/b");
        assert_eq!(list[1], "src/b.js");
        assert_eq!(list[8], "src/b/index.js");
        assert_eq!(list.len(), 1 + 2 * TRACKED_EXTENSIONS.len());
    }

    #[test]
    fn test_dot_segments_collapse() {
        let set = known(&["src/util.js"]);
        assert_eq!(
            resolve_in(&set, "src/app.js", "././util"),
            Some("src/util.js".to_string())
        );
    }
}
