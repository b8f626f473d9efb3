//! Path heuristics assigning each file an importance tier and a kind tag.
//!
//! Both functions are pure over the relative path string. The depth rules are
//! ordered by specificity of signal: explicit naming outranks directory
//! membership, which outranks raw nesting. First match wins, and the order is
//! part of the contract: `components/index.js` classifies as an entry point
//! (rule 2) even though it sits in a feature directory.

use crate::types::FileKind;

/// Depth tier assigned when no named rule matches a very deep path
pub const MAX_DEPTH: u32 = 10;

/// Entry-point stems only count when the path is at most this many segments deep
const ENTRY_MAX_SEGMENTS: usize = 2;

const SPEC_STEMS: [&str; 7] = [
    "readme",
    "spec",
    "specs",
    "prd",
    "requirements",
    "architecture",
    "design",
];

const DOC_DIRS: [&str; 3] = ["docs", "doc", "specs"];

const ENTRY_STEMS: [&str; 4] = ["main", "server", "app", "index"];

const MANIFEST_NAMES: [&str; 9] = [
    "package.json",
    "tsconfig.json",
    "jsconfig.json",
    "vite.config.js",
    "vite.config.ts",
    "vue.config.js",
    "next.config.js",
    "nuxt.config.js",
    "webpack.config.js",
];

const FEATURE_DIRS: [&str; 9] = [
    "components",
    "views",
    "pages",
    "routes",
    "screens",
    "models",
    "controllers",
    "api",
    "features",
];

const SUPPORT_DIRS: [&str; 8] = [
    "utils",
    "utilities",
    "helpers",
    "services",
    "lib",
    "libs",
    "shared",
    "common",
];

const TEST_DIRS: [&str; 5] = ["__tests__", "test", "tests", "e2e", "cypress"];

const ROUTE_DIRS: [&str; 4] = ["routes", "api", "controllers", "middleware"];

const MODEL_DIRS: [&str; 5] = ["models", "schemas", "entities", "store", "stores"];

const COMPONENT_DIRS: [&str; 6] = [
    "components",
    "views",
    "pages",
    "screens",
    "widgets",
    "layouts",
];

const COMPONENT_EXTENSIONS: [&str; 3] = ["jsx", "tsx", "vue"];

const UTILITY_STEMS: [&str; 4] = ["utils", "helpers", "constants", "config"];

/// Lowercased path pieces shared by the depth and kind rules
struct PathFacts {
    segments: Vec<String>,
    file_name: String,
    stem: String,
    extension: String,
}

impl PathFacts {
    fn parse(path: &str) -> Option<Self> {
        let lowered = path.to_lowercase().replace('\\', "/");
        let segments: Vec<String> = lowered
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let file_name = segments.last()?.clone();
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.to_string()),
            None => (file_name.clone(), String::new()),
        };
        Some(Self {
            segments,
            file_name,
            stem,
            extension,
        })
    }

    /// Directory segments, excluding the file name itself
    fn dirs(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    fn any_dir_in(&self, vocab: &[&str]) -> bool {
        self.dirs().iter().any(|d| vocab.contains(&d.as_str()))
    }

    fn is_spec_marker(&self) -> bool {
        SPEC_STEMS.contains(&self.stem.as_str())
            || (self.segments.len() > 1 && DOC_DIRS.contains(&self.segments[0].as_str()))
    }

    fn is_entry_point(&self) -> bool {
        (ENTRY_STEMS.contains(&self.stem.as_str()) && self.segments.len() <= ENTRY_MAX_SEGMENTS)
            || MANIFEST_NAMES.contains(&self.file_name.as_str())
    }
}

/// Assign the importance tier for a project-relative path.
///
/// 0 = spec/doc, 1 = entry point, 2 = feature module, 3 = support code,
/// 4+ = generic implementation detail sinking with nesting, capped at
/// [`MAX_DEPTH`].
pub fn depth_for_path(path: &str) -> u32 {
    let Some(facts) = PathFacts::parse(path) else {
        return MAX_DEPTH;
    };

    if facts.is_spec_marker() {
        return 0;
    }
    if facts.is_entry_point() {
        return 1;
    }
    if facts.any_dir_in(&FEATURE_DIRS) {
        return 2;
    }
    if facts.any_dir_in(&SUPPORT_DIRS) {
        return 3;
    }

    let structural = 4 + facts.segments.len() as u32 / 3;
    structural.min(MAX_DEPTH)
}

/// Assign the kind tag for a project-relative path.
///
/// Precedence: test, spec, entry, route, model, component, utility, module.
pub fn kind_for_path(path: &str) -> FileKind {
    let Some(facts) = PathFacts::parse(path) else {
        return FileKind::Module;
    };

    if facts.any_dir_in(&TEST_DIRS)
        || facts.stem.ends_with(".test")
        || facts.stem.ends_with(".spec")
    {
        return FileKind::Test;
    }
    if facts.is_spec_marker() {
        return FileKind::Spec;
    }
    if facts.is_entry_point() {
        return FileKind::Entry;
    }
    if facts.any_dir_in(&ROUTE_DIRS) || facts.stem.contains("route") {
        return FileKind::Route;
    }
    if facts.any_dir_in(&MODEL_DIRS)
        || facts.stem.ends_with(".model")
        || facts.stem.ends_with(".schema")
    {
        return FileKind::Model;
    }
    if facts.any_dir_in(&COMPONENT_DIRS)
        || COMPONENT_EXTENSIONS.contains(&facts.extension.as_str())
    {
        return FileKind::Component;
    }
    if facts.any_dir_in(&SUPPORT_DIRS) || UTILITY_STEMS.contains(&facts.stem.as_str()) {
        return FileKind::Utility;
    }

    FileKind::Module
}

/// Classify a path into (kind, depth) in one call
pub fn classify(path: &str) -> (FileKind, u32) {
    (kind_for_path(path), depth_for_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spec_markers_win_over_everything() {
        assert_eq!(depth_for_path("README.md"), 0);
        assert_eq!(depth_for_path("docs/setup.md"), 0);
        assert_eq!(depth_for_path("spec.js"), 0);
        assert_eq!(depth_for_path("components/requirements.js"), 0);
    }

    #[test]
    fn test_entry_points_are_tier_one() {
        assert_eq!(depth_for_path("index.js"), 1);
        assert_eq!(depth_for_path("src/main.ts"), 1);
        assert_eq!(depth_for_path("server.js"), 1);
        assert_eq!(depth_for_path("package.json"), 1);
        assert_eq!(depth_for_path("apps/web/next.config.js"), 1);
    }

    #[test]
    fn test_entry_stems_lose_their_meaning_when_deep() {
        // three segments is no longer shallow, so the directory rule wins
        assert_eq!(depth_for_path("src/components/index.js"), 2);
        assert_eq!(depth_for_path("a/b/c/main.js"), 4 + 4 / 3);
    }

    #[test]
    fn test_entry_check_precedes_directory_check() {
        // a two-segment index.js classifies as an entry point even inside a
        // feature directory; the precedence is part of the contract
        assert_eq!(depth_for_path("components/index.js"), 1);
        assert_eq!(kind_for_path("components/index.js"), FileKind::Entry);
    }

    #[test]
    fn test_feature_and_support_directories() {
        assert_eq!(depth_for_path("src/components/Button.jsx"), 2);
        assert_eq!(depth_for_path("src/routes/user.js"), 2);
        assert_eq!(depth_for_path("src/utils/format.js"), 3);
        assert_eq!(depth_for_path("packages/core/lib/internal.js"), 3);
    }

    #[test]
    fn test_generic_files_sink_with_nesting() {
        assert_eq!(depth_for_path("notes.js"), 4);
        assert_eq!(depth_for_path("src/core/engine/parts/widget.js"), 4 + 5 / 3);
        let very_deep = "a/b/c/d/e/f/g/h/i/j/k/l/m/n/o/p/q/r/s/t/u.js";
        assert_eq!(depth_for_path(very_deep), MAX_DEPTH);
    }

    #[test]
    fn test_support_files_never_outrank_entry_points() {
        let entry = depth_for_path("index.js");
        for path in [
            "utils/format.js",
            "src/utils/deep/nested/thing.js",
            "helpers/date.js",
        ] {
            assert!(depth_for_path(path) >= entry, "{path}");
        }
    }

    #[test]
    fn test_kind_precedence_table() {
        assert_eq!(kind_for_path("src/__tests__/app.test.js"), FileKind::Test);
        assert_eq!(kind_for_path("src/components/Button.spec.ts"), FileKind::Test);
        assert_eq!(kind_for_path("docs/overview.md"), FileKind::Spec);
        assert_eq!(kind_for_path("main.js"), FileKind::Entry);
        assert_eq!(kind_for_path("src/routes/users.js"), FileKind::Route);
        assert_eq!(kind_for_path("src/api/sessions.ts"), FileKind::Route);
        assert_eq!(kind_for_path("src/models/user.js"), FileKind::Model);
        assert_eq!(kind_for_path("src/user.model.ts"), FileKind::Model);
        assert_eq!(kind_for_path("src/components/Nav.js"), FileKind::Component);
        assert_eq!(kind_for_path("src/widgets/Chart.tsx"), FileKind::Component);
        assert_eq!(kind_for_path("src/utils/format.js"), FileKind::Utility);
        assert_eq!(kind_for_path("src/engine.js"), FileKind::Module);
    }

    #[test]
    fn test_jsx_extension_implies_component() {
        assert_eq!(kind_for_path("src/deep/Anywhere.jsx"), FileKind::Component);
        assert_eq!(kind_for_path("src/App.vue"), FileKind::Component);
    }

    #[test]
    fn test_classify_returns_both_tags() {
        let (kind, depth) = classify("src/components/Button.jsx");
        assert_eq!(kind, FileKind::Component);
        assert_eq!(depth, 2);
    }
}
