//! Path exclusion: user glob patterns plus an always-on noise classifier.
//!
//! Patterns are glob-style and case-sensitive. Wildcards match dotfiles, and a
//! pattern without a `/` is also tried against the last path segment, so
//! `*.test.js` excludes `src/a.test.js` as well as `a.test.js`.

use std::sync::LazyLock;

use glob::{MatchOptions, Pattern};
use regex::RegexSet;

/// Patterns applied to every run before configured and per-invocation ones.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "*.lock",
    "*.log",
    "node_modules/**",
    "vendor/**",
    "dist/**",
    "build/**",
    "coverage/**",
    ".DS_Store",
];

/// Files that only cost tokens: maps, minified output, bundles, lockfiles,
/// generated sources and editor settings.
static NOISE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\.map$",
        r"\.min\.(js|css)$",
        r"(^|/|\.)bundle\.(js|css)$",
        r"(^|/)package-lock\.json$",
        r"(^|/)yarn\.lock$",
        r"(^|/)pnpm-lock\.yaml$",
        r"\.generated\.",
        r"\.gen\.",
        r"\.auto\.",
        r"(^|/)\.idea/",
        r"(^|/)\.vscode/",
    ])
    .unwrap()
});

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Normalize a path so matching behaves the same on every platform.
fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified.trim_start_matches("./").to_string()
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    // Invalid globs never match.
    let Ok(compiled) = Pattern::new(pattern) else {
        return false;
    };

    if compiled.matches_with(path, MATCH_OPTIONS) {
        return true;
    }

    if pattern.contains('/') {
        return false;
    }

    path.rsplit('/')
        .next()
        .is_some_and(|base| compiled.matches_with(base, MATCH_OPTIONS))
}

/// Whether any pattern in `patterns` matches `path`.
pub fn is_excluded<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    let path = normalize(path);
    patterns
        .iter()
        .any(|p| matches_pattern(p.as_ref(), &path))
}

/// Keep the paths no pattern matches, in their original order.
pub fn filter<S: AsRef<str>>(paths: &[String], patterns: &[S]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| !is_excluded(p, patterns))
        .cloned()
        .collect()
}

/// Whether `path` is a lockfile, build artifact, generated file or IDE setting.
pub fn is_noise(path: &str) -> bool {
    NOISE.is_match(&normalize(path))
}

/// Concatenate the three pattern sources. Duplicates are kept.
pub fn merge_patterns(configured: &[String], requested: &[String]) -> Vec<String> {
    DEFAULT_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .chain(configured.iter().cloned())
        .chain(requested.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_list_excludes_nothing() {
        let none: [&str; 0] = [];
        assert!(!is_excluded("src/main.rs", &none));
        assert!(!is_excluded(".env", &none));
    }

    #[test]
    fn bare_pattern_matches_base_name() {
        let patterns = ["*.test.js"];
        assert!(is_excluded("a.test.js", &patterns));
        assert!(is_excluded("src/deep/a.test.js", &patterns));
        assert!(!is_excluded("src/b.js", &patterns));
    }

    #[test]
    fn patterns_with_slash_match_full_path_only() {
        let patterns = ["src/*.js"];
        assert!(is_excluded("src/b.js", &patterns));
        assert!(!is_excluded("lib/src/b.js", &patterns));
        assert!(!is_excluded("src/nested/b.js", &patterns));
    }

    #[test]
    fn double_star_crosses_directories() {
        let patterns = ["dist/**"];
        assert!(is_excluded("dist/app.js", &patterns));
        assert!(is_excluded("dist/a/b/c.js", &patterns));
        assert!(!is_excluded("src/dist.js", &patterns));
    }

    #[test]
    fn wildcards_match_dotfiles() {
        let patterns = ["*"];
        assert!(is_excluded(".env", &patterns));
        let patterns = ["config/*"];
        assert!(is_excluded("config/.secrets", &patterns));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let patterns = ["*.MD"];
        assert!(!is_excluded("README.md", &patterns));
        assert!(is_excluded("README.MD", &patterns));
    }

    #[test]
    fn backslash_paths_are_normalized() {
        let patterns = ["src/*.js"];
        assert!(is_excluded("src\\b.js", &patterns));
        assert!(is_excluded("./src/b.js", &patterns));
    }

    #[test]
    fn invalid_pattern_never_matches() {
        let patterns = ["[unclosed"];
        assert!(!is_excluded("[unclosed", &patterns));
    }

    #[test]
    fn filter_preserves_order() {
        let paths = vec![
            "a.test.js".to_string(),
            "src/b.js".to_string(),
            "src/c.test.js".to_string(),
            "README.md".to_string(),
        ];
        assert_eq!(
            filter(&paths, &["*.test.js"]),
            vec!["src/b.js".to_string(), "README.md".to_string()]
        );
    }

    #[test]
    fn noise_classifier_covers_known_artifacts() {
        for path in [
            "app.js.map",
            "static/app.min.js",
            "static/site.min.css",
            "public/main.bundle.js",
            "bundle.js",
            "package-lock.json",
            "web/yarn.lock",
            "pnpm-lock.yaml",
            "src/schema.generated.ts",
            "api/client.gen.go",
            "types.auto.d.ts",
            ".idea/workspace.xml",
            "sub/.vscode/settings.json",
        ] {
            assert!(is_noise(path), "{path} should be noise");
        }
    }

    #[test]
    fn noise_classifier_leaves_sources_alone() {
        for path in ["src/main.rs", "src/generator.rs", "docs/minimal.md", "Cargo.lock"] {
            assert!(!is_noise(path), "{path} should not be noise");
        }
    }

    #[test]
    fn merged_patterns_keep_duplicates_in_source_order() {
        let merged = merge_patterns(&["*.log".to_string()], &["*.snap".to_string()]);
        assert_eq!(merged.len(), DEFAULT_PATTERNS.len() + 2);
        assert_eq!(merged[0], DEFAULT_PATTERNS[0]);
        assert_eq!(merged[merged.len() - 2], "*.log");
        assert_eq!(merged[merged.len() - 1], "*.snap");
    }
}
