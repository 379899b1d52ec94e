//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the assistant link honest:
//! - No sleep() calls in production code outside reconnect backoff
//! - No blocking I/O inside async functions
//!
//! Helpers here find the production sources and strip what the scans should
//! not look at (comments, test modules).

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["horizon/core/src", "horizon/chat/src"];

/// Absolute path of the workspace root
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under the production roots
///
/// # Panics
///
/// Panics if a production root is missing, so a moved crate cannot make the
/// scans pass vacuously.
#[must_use]
pub fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();
    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        assert!(path.is_dir(), "production root missing: {}", path.display());

        files.extend(
            walkdir::WalkDir::new(&path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .map(walkdir::DirEntry::into_path),
        );
    }
    files.sort();
    files
}

/// Lines of a source file up to its top-level `#[cfg(test)]` module
#[must_use]
pub fn production_lines(path: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .take_while(|line| *line != "#[cfg(test)]")
        .map(str::to_owned)
        .collect()
}

/// The part of a line before any `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Signature line of the function enclosing `idx`, if any
///
/// Scans upward for the nearest line declaring a function (`fn name(` with
/// any visibility or `async` prefix).
#[must_use]
pub fn enclosing_fn<S: AsRef<str>>(lines: &[S], idx: usize) -> Option<&str> {
    lines[..=idx.min(lines.len().saturating_sub(1))]
        .iter()
        .rev()
        .map(|l| l.as_ref().trim())
        .find(|l| is_fn_signature(l))
}

fn is_fn_signature(line: &str) -> bool {
    let line = code_part(line);
    line.starts_with("fn ") || line.contains(" fn ")
}

/// Whether the function enclosing `idx` is `async`
#[must_use]
pub fn in_async_fn<S: AsRef<str>>(lines: &[S], idx: usize) -> bool {
    enclosing_fn(lines, idx).is_some_and(|sig| sig.contains("async fn "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_fn_with_visibility() {
        let lines = [
            "impl Loader {",
            "    pub(crate) fn load(path: &Path) -> String {",
            "        std::fs::read_to_string(path).unwrap_or_default()",
            "    }",
            "}",
        ];
        assert_eq!(
            enclosing_fn(&lines, 2),
            Some("pub(crate) fn load(path: &Path) -> String {")
        );
        assert!(!in_async_fn(&lines, 2));
    }

    #[test]
    fn test_async_detection() {
        let lines = [
            "pub async fn connect(&self) -> bool {",
            "    let s = std::net::TcpStream::connect(addr);",
            "}",
        ];
        assert!(in_async_fn(&lines, 1));
    }

    #[test]
    fn test_comment_is_not_a_signature() {
        let lines = ["// an async fn here would be bad", "let x = 1;"];
        assert_eq!(enclosing_fn(&lines, 1), None);
    }

    #[test]
    fn test_production_sources_found() {
        let files = production_sources();
        assert!(files.iter().any(|p| p.ends_with("horizon/core/src/client.rs")));
        assert!(files.iter().any(|p| p.ends_with("horizon/chat/src/main.rs")));
    }
}
