//! The unit of work handed to a backend: filtered file list plus reduced diff.

use serde::Serialize;

use crate::error::InputError;
use crate::exclude;
use crate::reduce::reduce;

/// Staged changes after exclusion and reduction. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Changeset {
    files: Vec<String>,
    diff: String,
    has_changes: bool,
}

impl Changeset {
    /// Build a changeset from the staged file list and the raw staged diff.
    ///
    /// Files matching `patterns` or the noise classifier are dropped from both
    /// the file list and the diff payload; what remains is reduced.
    pub fn build(
        staged_files: &[String],
        raw_diff: &str,
        patterns: &[String],
    ) -> Result<Self, InputError> {
        if staged_files.is_empty() || raw_diff.trim().is_empty() {
            return Err(InputError::NoStagedChanges);
        }

        let files: Vec<String> = exclude::filter(staged_files, patterns)
            .into_iter()
            .filter(|f| !exclude::is_noise(f))
            .collect();

        if files.is_empty() {
            return Err(InputError::AllFilesExcluded {
                count: staged_files.len(),
            });
        }

        let kept: String = split_by_file(raw_diff)
            .into_iter()
            .filter(|section| match &section.path {
                Some(path) => files.iter().any(|f| f == path),
                None => true,
            })
            .map(|section| section.text)
            .collect();

        let diff = reduce(&kept);
        let has_changes = !diff.trim().is_empty();

        Ok(Changeset {
            files,
            diff,
            has_changes,
        })
    }

    /// Paths that survived filtering, in staged order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }
}

/// One `diff --git` block of a unified diff. `path` is `None` for any text
/// before the first header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSection {
    pub path: Option<String>,
    pub text: String,
}

/// Split a unified diff into per-file sections, keeping every line.
pub fn split_by_file(diff: &str) -> Vec<DiffSection> {
    let mut sections: Vec<DiffSection> = Vec::new();

    for line in diff.split_inclusive('\n') {
        if line.starts_with("diff --git ") || sections.is_empty() {
            sections.push(DiffSection {
                path: None,
                text: String::new(),
            });
        }

        if let Some(current) = sections.last_mut() {
            current.text.push_str(line);
        }
    }

    for section in &mut sections {
        section.path = section_path(&section.text);
    }

    sections
}

/// The path a section describes. The `+++` line names the new side; a
/// deletion only has the `---` line; mode-only and binary changes carry the
/// path in `rename to` or the `diff --git` header alone.
fn section_path(text: &str) -> Option<String> {
    let mut lines = text.lines();
    let header = lines.next()?.strip_prefix("diff --git ")?;
    let mut old_side = None;

    for line in lines {
        if line.starts_with("@@") {
            break;
        }
        if let Some(name) = line.strip_prefix("+++ ") {
            if name != "/dev/null" {
                return Some(side_path(name, "b/"));
            }
        } else if let Some(name) = line.strip_prefix("--- ") {
            if name != "/dev/null" {
                old_side = Some(side_path(name, "a/"));
            }
        } else if let Some(name) = line.strip_prefix("rename to ") {
            return Some(unquote(name));
        }
    }

    old_side.or_else(|| Some(path_from_header(header)))
}

/// Path from a `---`/`+++` line: git appends a tab when the name contains a
/// space, and quotes names with control characters.
fn side_path(name: &str, prefix: &str) -> String {
    let name = name.strip_suffix('\t').unwrap_or(name);
    let name = unquote(name);
    match name.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

/// Extract the new-side path from `a/<old> b/<new>`.
///
/// Without a rename both halves are the same name, so the split point is
/// known even when the name itself contains ` b/`.
fn path_from_header(header: &str) -> String {
    if header.ends_with('"') {
        if let Some(idx) = header.rfind(" \"b/") {
            let new_side = unquote(&header[idx + 1..]);
            return new_side.strip_prefix("b/").unwrap_or(&new_side).to_string();
        }
    }

    let same_name = header
        .len()
        .checked_sub(5)
        .filter(|rest| rest % 2 == 0)
        .and_then(|rest| {
            let half = rest / 2;
            let old = header.get(2..2 + half)?;
            let separator = header.get(2 + half..2 + half + 3)?;
            let new = header.get(2 + half + 3..)?;
            (header.starts_with("a/") && separator == " b/" && old == new).then_some(new)
        });

    same_name
        .or_else(|| header.rfind(" b/").map(|idx| &header[idx + 3..]))
        .unwrap_or(header)
        .to_string()
}

/// Undo git's C-style quoting (`"dir/\303\251.rs"`). Unquoted names pass
/// through unchanged.
fn unquote(name: &str) -> String {
    let Some(inner) = name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) else {
        return name.to_string();
    };

    let src = inner.as_bytes();
    let mut bytes = Vec::with_capacity(src.len());
    let mut i = 0;

    while i < src.len() {
        if src[i] != b'\\' || i + 1 == src.len() {
            bytes.push(src[i]);
            i += 1;
            continue;
        }

        let octal = src
            .get(i + 1..i + 4)
            .filter(|digits| digits.iter().all(|d| (b'0'..=b'7').contains(d)))
            .map(|digits| {
                digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'))
            })
            .and_then(|value| u8::try_from(value).ok());

        if let Some(byte) = octal {
            bytes.push(byte);
            i += 4;
            continue;
        }

        bytes.push(match src[i + 1] {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            other => other,
        });
        i += 2;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_FILES: &str = "diff --git a/a.test.js b/a.test.js
index 1111111..2222222 100644
--- a/a.test.js
+++ b/a.test.js
@@ -1 +1 @@
-expect(a).toBe(1);
+expect(a).toBe(2);
diff --git a/src/b.js b/src/b.js
index 3333333..4444444 100644
--- a/src/b.js
+++ b/src/b.js
@@ -1 +1 @@
-export const b = 1;
+export const b = 2;
";

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn excluded_files_leave_list_and_diff() {
        let cs = Changeset::build(
            &files(&["a.test.js", "src/b.js"]),
            TWO_FILES,
            &["*.test.js".to_string()],
        )
        .unwrap();

        assert_eq!(cs.files(), &["src/b.js".to_string()]);
        assert!(cs.has_changes());
        assert!(!cs.diff().contains("a.test.js"));
        assert!(cs.diff().contains("+export const b = 2;"));
    }

    #[test]
    fn noise_files_are_always_dropped() {
        let diff = "diff --git a/package-lock.json b/package-lock.json\n+{}\n\
                    diff --git a/src/b.js b/src/b.js\n+let b;\n";
        let cs = Changeset::build(&files(&["package-lock.json", "src/b.js"]), diff, &[]).unwrap();
        assert_eq!(cs.files(), &["src/b.js".to_string()]);
        assert!(!cs.diff().contains("package-lock"));
    }

    #[test]
    fn nothing_staged_is_an_input_error() {
        assert_eq!(
            Changeset::build(&[], "", &[]),
            Err(InputError::NoStagedChanges)
        );
    }

    #[test]
    fn everything_excluded_is_an_input_error() {
        let err = Changeset::build(
            &files(&["a.test.js"]),
            TWO_FILES,
            &["*.test.js".to_string()],
        )
        .unwrap_err();
        assert_eq!(err, InputError::AllFilesExcluded { count: 1 });
    }

    #[test]
    fn whitespace_only_change_keeps_only_headers() {
        let diff = "diff --git a/src/b.js b/src/b.js\n@@ -1 +1 @@\n-let b;\n+  let b;\n";
        let cs = Changeset::build(&files(&["src/b.js"]), diff, &[]).unwrap();
        assert!(cs.has_changes());
        assert!(!cs.diff().contains("let b;"));
        assert!(cs.diff().contains("@@ -1 +1 @@"));
    }

    #[test]
    fn blank_diff_counts_as_nothing_staged() {
        let diff = "\n\n";
        let err = Changeset::build(&files(&["src/b.js"]), diff, &[]).unwrap_err();
        assert_eq!(err, InputError::NoStagedChanges);
    }

    #[test]
    fn split_keeps_every_line() {
        let sections = split_by_file(TWO_FILES);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].path.as_deref(), Some("a.test.js"));
        assert_eq!(sections[1].path.as_deref(), Some("src/b.js"));
        let joined: String = sections.into_iter().map(|s| s.text).collect();
        assert_eq!(joined, TWO_FILES);
    }

    #[test]
    fn header_path_handles_renames_and_spaces() {
        assert_eq!(path_from_header("a/old name.rs b/new name.rs"), "new name.rs");
        assert_eq!(path_from_header("\"a/q.rs\" \"b/q.rs\""), "q.rs");
        assert_eq!(path_from_header("a/foo b/bar.rs b/foo b/bar.rs"), "foo b/bar.rs");
    }

    #[test]
    fn quoted_names_are_unquoted() {
        assert_eq!(
            unquote("\"src/\\303\\251t\\303\\251.rs\""),
            "src/\u{e9}t\u{e9}.rs"
        );
        assert_eq!(unquote("\"say \\\"hi\\\".txt\""), "say \"hi\".txt");
        assert_eq!(unquote("\"tab\\there\""), "tab\there");
        assert_eq!(unquote("plain.rs"), "plain.rs");
    }

    #[test]
    fn non_ascii_path_is_kept_and_excludable() {
        let diff = "diff --git a/src/\u{e9}t\u{e9}.rs b/src/\u{e9}t\u{e9}.rs
index 1111111..2222222 100644
--- a/src/\u{e9}t\u{e9}.rs
+++ b/src/\u{e9}t\u{e9}.rs
@@ -1 +1 @@
-let a = 1;
+let a = 2;
";
        let staged = files(&["src/\u{e9}t\u{e9}.rs"]);

        let cs = Changeset::build(&staged, diff, &[]).unwrap();
        assert_eq!(cs.files(), staged.as_slice());
        assert!(cs.diff().contains("+let a = 2;"));

        let patterns = ["src/\u{e9}t\u{e9}.rs".to_string()];
        let err = Changeset::build(&staged, diff, &patterns).unwrap_err();
        assert_eq!(err, InputError::AllFilesExcluded { count: 1 });
    }

    #[test]
    fn quoted_section_matches_verbatim_staged_name() {
        let diff = "diff --git \"a/src/\\303\\251.rs\" \"b/src/\\303\\251.rs\"
--- \"a/src/\\303\\251.rs\"
+++ \"b/src/\\303\\251.rs\"
@@ -1 +1 @@
-old()
+new()
";
        let cs = Changeset::build(&files(&["src/\u{e9}.rs"]), diff, &[]).unwrap();
        assert!(cs.diff().contains("+new()"));
    }

    #[test]
    fn path_containing_b_slash_comes_from_plus_line() {
        let diff = "diff --git a/foo b/bar.rs b/foo b/bar.rs
--- a/foo b/bar.rs\t
+++ b/foo b/bar.rs\t
@@ -1 +1 @@
-x();
+y();
diff --git a/bar.rs b/bar.rs
--- a/bar.rs
+++ b/bar.rs
@@ -1 +1 @@
-p();
+q();
";
        let sections = split_by_file(diff);
        assert_eq!(sections[0].path.as_deref(), Some("foo b/bar.rs"));
        assert_eq!(sections[1].path.as_deref(), Some("bar.rs"));

        let cs = Changeset::build(&files(&["foo b/bar.rs"]), diff, &[]).unwrap();
        assert!(cs.diff().contains("+y();"));
        assert!(!cs.diff().contains("+q();"));
    }

    #[test]
    fn deletion_takes_the_old_side_path() {
        let diff = "diff --git a/gone.rs b/gone.rs
deleted file mode 100644
--- a/gone.rs
+++ /dev/null
@@ -1 +0,0 @@
-fn gone() {}
";
        assert_eq!(split_by_file(diff)[0].path.as_deref(), Some("gone.rs"));
    }

    #[test]
    fn mode_only_and_rename_sections_still_have_paths() {
        let diff = "diff --git a/run me.sh b/run me.sh
old mode 100644
new mode 100755
diff --git a/old.rs b/new.rs
similarity index 100%
rename from old.rs
rename to new.rs
";
        let sections = split_by_file(diff);
        assert_eq!(sections[0].path.as_deref(), Some("run me.sh"));
        assert_eq!(sections[1].path.as_deref(), Some("new.rs"));
    }
}
