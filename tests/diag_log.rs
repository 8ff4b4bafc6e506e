// tests/diag_log.rs

use std::fs;

use dlqueue::exec::DiagnosticLog;
use dlqueue::exec::diag_log::LogLevel;

#[test]
fn lines_are_appended_with_timestamp_and_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("download.log");
    let log = DiagnosticLog::new(&path);

    log.info("Starting download for: https://example.com/v");
    log.write(LogLevel::Stdout, "[download]  1.0% of 2MiB");
    log.error("Timeout: https://example.com/v");

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);

    // [YYYY-MM-DD HH:MM:SS] [LEVEL] message
    for line in &lines {
        assert_eq!(&line[0..1], "[");
        assert_eq!(&line[20..23], "] [");
    }
    assert!(lines[0].ends_with("[INFO] Starting download for: https://example.com/v"));
    assert!(lines[1].ends_with("[STDOUT] [download]  1.0% of 2MiB"));
    assert!(lines[2].ends_with("[ERROR] Timeout: https://example.com/v"));

    // Appends, never truncates.
    DiagnosticLog::new(&path).info("again");
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 4);
}

#[test]
fn disabled_log_writes_nothing() {
    let log = DiagnosticLog::disabled();
    assert!(log.path().is_none());
    log.info("ignored");
}

#[test]
fn unwritable_path_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = DiagnosticLog::new(dir.path().join("missing-dir").join("download.log"));
    log.error("still fine");
    assert!(!dir.path().join("missing-dir").exists());
}
