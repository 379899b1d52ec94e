//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in production code MUST NOT block the runtime.
//! **Required**: `tokio::fs`, `tokio::net`, `tokio::process`, `tokio::io::stdin`.
//! **Acceptable**: blocking calls in plain `fn`s (config loading before the
//! client starts, observer callbacks writing to a terminal) and test modules.

use std::path::Path;

use architectural_enforcement::{code_part, in_async_fn, production_lines, production_sources};

const FORBIDDEN_IN_ASYNC: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::thread::sleep", "Blocking sleep"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
];

#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();
    for path in production_sources() {
        check_file(&path, &mut violations);
    }

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in async production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse the tokio equivalents inside async functions.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let lines = production_lines(path);

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        for (pattern, kind) in FORBIDDEN_IN_ASYNC {
            if code.contains(pattern) && in_async_fn(&lines, idx) {
                violations.push(format!(
                    "{}:{} - {kind}: {}",
                    path.display(),
                    idx + 1,
                    line.trim()
                ));
            }
        }
    }
}

#[test]
fn test_detector_flags_async_fs() {
    let code = [
        "    pub async fn load(&self) -> String {".to_string(),
        "        std::fs::read_to_string(\"assist.toml\").unwrap()".to_string(),
        "    }".to_string(),
    ];
    assert!(in_async_fn(&code, 1));
}

#[test]
fn test_detector_allows_sync_fs() {
    let code = [
        "pub fn load_config_from_path(path: Option<&Path>) -> Config {",
        "    let raw = std::fs::read_to_string(path).unwrap();",
        "}",
    ];
    assert!(!in_async_fn(&code, 1));
}
