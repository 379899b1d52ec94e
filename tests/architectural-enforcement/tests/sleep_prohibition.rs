//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on I/O, channels or timers it owns. It
//! MUST NOT call sleep to poll or to paper over a race.
//! **Exceptions**: the reconnect backoff delay, periodic work driven by
//! `tokio::time::interval`, test modules.

use std::path::Path;

use architectural_enforcement::{code_part, production_lines, production_sources};

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();
    for path in production_sources() {
        check_file(&path, &mut violations);
    }

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nAcceptable:");
        eprintln!("  - Reconnect backoff computed from the retry schedule");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("  - Test modules");

        panic!("\nFound {} sleep violation(s) in production code.", violations.len());
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let lines = production_lines(path);

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }
        if is_backoff_context(&lines, idx) || is_interval_pattern(&lines, idx) {
            continue;
        }
        violations.push(format!("{}:{} - {}", path.display(), idx + 1, line.trim()));
    }
}

/// Sleep whose duration comes from the reconnect backoff schedule
fn is_backoff_context<S: AsRef<str>>(lines: &[S], idx: usize) -> bool {
    let window = &lines[idx.saturating_sub(30)..(idx + 5).min(lines.len())];

    let mut has_schedule = false;
    let mut has_retry_context = false;
    for line in window {
        let line = line.as_ref().to_lowercase();
        if line.contains("next_backoff")
            || line.contains("delay_for_attempt")
            || line.contains("<<")
            || line.contains("pow(")
        {
            has_schedule = true;
        }
        if line.contains("backoff") || line.contains("reconnect") || line.contains("retry") {
            has_retry_context = true;
        }
    }

    has_schedule && has_retry_context
}

/// Sleep inside a loop that is paced by `tokio::time::interval`
fn is_interval_pattern<S: AsRef<str>>(lines: &[S], idx: usize) -> bool {
    lines[idx.saturating_sub(20)..(idx + 5).min(lines.len())]
        .iter()
        .any(|l| l.as_ref().contains("interval.tick()"))
}

#[test]
fn test_backoff_detection() {
    let code = [
        "let Some((attempt, delay)) = state.next_backoff(&policy) else {",
        "    return;",
        "};",
        "// backoff delay before the reconnect",
        "tokio::time::sleep(delay).await;",
    ];
    assert!(is_backoff_context(&code, 4));
}

#[test]
fn test_plain_sleep_is_not_backoff() {
    let code = [
        "async fn wait_for_reply(&self) {",
        "    tokio::time::sleep(Duration::from_millis(50)).await;",
        "}",
    ];
    assert!(!is_backoff_context(&code, 1));
    assert!(!is_interval_pattern(&code, 1));
}
