// LogWatch - tests/e2e_scan.rs
//
// End-to-end tests for log discovery against realistic directory trees.

use logwatch::app::scanner::{scan_directory, LogScanner};
use logwatch::core::classify::ClassifierConfig;
use logwatch::core::model::ScanProgress;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn found_paths(root: &Path, config: &ClassifierConfig) -> Vec<PathBuf> {
    let cancel = AtomicBool::new(false);
    let mut found = Vec::new();
    scan_directory(root, config, &cancel, |msg| {
        if let ScanProgress::Found(path) = msg {
            found.push(path);
        }
    });
    found.sort();
    found
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Drain a background scan until `Done`, failing after a generous deadline.
fn wait_for_done(scanner: &LogScanner) -> Vec<ScanProgress> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut messages = Vec::new();
    while Instant::now() < deadline {
        if let Some(msg) = scanner.recv_progress_timeout(Duration::from_millis(100)) {
            let done = matches!(msg, ScanProgress::Done { .. });
            messages.push(msg);
            if done {
                return messages;
            }
        }
    }
    panic!("scan did not finish: {messages:?}");
}

#[test]
fn e2e_excluded_and_hidden_directories_are_pruned() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("app.log"), "x");
    write(&root.join("services").join("api").join("api.log"), "x");
    for excluded in ["node_modules", ".git", "__pycache__", "venv", ".cache"] {
        write(&root.join(excluded).join("hidden.log"), "x");
        write(&root.join("services").join(excluded).join("nested.log"), "x");
    }

    let found = found_paths(root, &ClassifierConfig::default());
    assert_eq!(
        found,
        vec![
            root.join("app.log"),
            root.join("services").join("api").join("api.log"),
        ]
    );
}

#[test]
fn e2e_content_heuristic_needs_two_timestamped_lines() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        &root.join("good").join("mylog.txt"),
        "2024-01-15 10:00:00 service up\n\
         continuation\n\
         2024-01-15 10:00:05 request served\n\
         continuation\n\
         continuation\n",
    );
    write(
        &root.join("bad").join("mylog.txt"),
        "2024-01-15 10:00:00 service up\n\
         continuation\n\
         continuation\n\
         continuation\n\
         continuation\n",
    );

    let found = found_paths(root, &ClassifierConfig::default());
    assert_eq!(found, vec![root.join("good").join("mylog.txt")]);
}

#[test]
fn e2e_extension_match_skips_content_check() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("empty.log"), "");
    write(&root.join("readme.md"), "2024-01-15 10:00:00 a\n2024-01-15 10:00:01 b\n");

    let found = found_paths(root, &ClassifierConfig::default());
    assert_eq!(found, vec![root.join("empty.log")]);
}

#[test]
fn e2e_txt_hint_is_opt_in() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let content = "2024-01-15 10:00:00 a\n2024-01-15 10:00:01 b\n";
    write(&root.join("output.txt"), content);

    assert!(found_paths(root, &ClassifierConfig::default()).is_empty());
    assert_eq!(
        found_paths(root, &ClassifierConfig::default().with_txt_files()),
        vec![root.join("output.txt")]
    );
}

#[test]
fn e2e_background_scan_reports_done() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(&root.join("a.log"), "x");
    write(&root.join("sub").join("b.log"), "x");

    let mut scanner = LogScanner::default();
    assert!(scanner.start_scan(root));
    let messages = wait_for_done(&scanner);

    assert_eq!(messages.first(), Some(&ScanProgress::Progress(0.0)));
    assert_eq!(messages.last(), Some(&ScanProgress::Done { total_found: 2 }));
    let found = messages
        .iter()
        .filter(|m| matches!(m, ScanProgress::Found(_)))
        .count();
    assert_eq!(found, 2);

    scanner.stop();
    assert!(!scanner.is_scanning());
}

#[test]
fn e2e_scanner_can_be_reused_after_completion() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("a.log"), "x");

    let mut scanner = LogScanner::default();
    assert!(scanner.start_scan(dir.path()));
    wait_for_done(&scanner);
    scanner.stop();

    write(&dir.path().join("b.log"), "x");
    assert!(scanner.start_scan(dir.path()));
    let messages = wait_for_done(&scanner);
    assert_eq!(messages.last(), Some(&ScanProgress::Done { total_found: 2 }));
    scanner.stop();
}

#[test]
fn e2e_missing_root_finishes_immediately() {
    let dir = TempDir::new().unwrap();
    let mut scanner = LogScanner::default();
    assert!(scanner.start_scan(dir.path().join("does-not-exist")));
    let messages = wait_for_done(&scanner);
    assert_eq!(messages, vec![ScanProgress::Done { total_found: 0 }]);
    assert!(scanner.poll_progress().is_empty());
    scanner.stop();
}

/// A tree big enough that a background walk is still running right after
/// `start_scan` returns.
fn build_large_tree(root: &Path) -> usize {
    let mut files = 0;
    for a in 0..20 {
        for b in 0..10 {
            let dir = root.join(format!("svc{a}")).join(format!("node{b}"));
            std::fs::create_dir_all(&dir).unwrap();
            for c in 0..5 {
                std::fs::write(dir.join(format!("part{c}.log")), "x").unwrap();
                std::fs::write(
                    dir.join(format!("mylog{c}.txt")),
                    "2024-01-15 10:00:00 a\n2024-01-15 10:00:01 b\n",
                )
                .unwrap();
                files += 2;
            }
        }
    }
    files
}

#[test]
fn e2e_start_while_scanning_is_ignored() {
    let dir = TempDir::new().unwrap();
    let total = build_large_tree(dir.path());

    let mut scanner = LogScanner::default();
    assert!(scanner.start_scan(dir.path()));
    assert!(scanner.is_scanning());
    assert!(!scanner.start_scan(dir.path().join("svc0")));

    // The ignored call did not replace the running scan.
    let messages = wait_for_done(&scanner);
    assert_eq!(messages.last(), Some(&ScanProgress::Done { total_found: total }));
    scanner.stop();
}

#[test]
fn e2e_stop_during_scan_still_delivers_done() {
    let dir = TempDir::new().unwrap();
    let total = build_large_tree(dir.path());

    let mut scanner = LogScanner::default();
    assert!(scanner.start_scan(dir.path()));

    let started = Instant::now();
    scanner.stop();
    assert!(started.elapsed() < Duration::from_millis(2_500));
    assert!(!scanner.is_scanning());

    let messages = wait_for_done(&scanner);
    match messages.last() {
        Some(ScanProgress::Done { total_found }) => assert!(*total_found <= total),
        other => panic!("expected Done, got {other:?}"),
    }
    let found = messages
        .iter()
        .filter(|m| matches!(m, ScanProgress::Found(_)))
        .count();
    assert_eq!(
        messages.last(),
        Some(&ScanProgress::Done { total_found: found })
    );
}
