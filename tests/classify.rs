// tests/classify.rs

use dlqueue::exec::classify_failure;
use proptest::prelude::*;

#[test]
fn known_patterns_map_to_canonical_messages() {
    let cases = [
        ("ERROR: [youtube] abc: Video unavailable", "Video is unavailable (private, deleted, or region-locked)"),
        ("ERROR: Sign in to confirm your age", "Video requires age verification"),
        ("ERROR: [youtube] abc: Private video. Sign in", "This video is private"),
        ("ERROR: Unable to download webpage: <urlopen error>", "Network error - check your internet connection"),
        ("urllib.error.URLError: <urlopen error [Errno -2]>", "Network error - check your internet connection"),
        ("[Errno 111] Connection refused", "Network error - check your internet connection"),
        ("ERROR: The read operation timed out", "Network error - check your internet connection"),
        ("ERROR: Incomplete YouTube ID abc", "Invalid YouTube video ID"),
        ("ERROR: unable to download video data: HTTP Error 404: Not Found", "Video not found (404)"),
        ("ERROR: unable to download video data: HTTP Error 403: Forbidden", "Access denied (403)"),
        ("ERROR: Postprocessing: ffmpeg not found. Please install", "FFmpeg required but not found"),
    ];

    for (stderr, expected) in cases {
        assert_eq!(classify_failure(stderr, 1), expected, "stderr: {stderr}");
    }
}

#[test]
fn earlier_rules_win_over_later_ones() {
    let stderr = "WARNING: HTTP Error 404\nERROR: [youtube] x: Video unavailable\n";
    assert_eq!(
        classify_failure(stderr, 1),
        "Video is unavailable (private, deleted, or region-locked)"
    );

    let stderr = "ERROR: HTTP Error 403 while fetching; Connection refused";
    assert_eq!(
        classify_failure(stderr, 1),
        "Network error - check your internet connection"
    );
}

#[test]
fn ffmpeg_rule_needs_both_words() {
    assert_eq!(
        classify_failure("WARNING: ffmpeg is old", 2),
        "Download failed (exit code 2)"
    );
    assert_eq!(
        classify_failure("something was not found", 2),
        "Download failed (exit code 2)"
    );
}

#[test]
fn first_error_line_is_used_when_no_rule_matches() {
    let stderr = "WARNING: something odd\nERROR:   Unsupported URL: https://example.com  \nERROR: second\n";
    assert_eq!(classify_failure(stderr, 1), "Unsupported URL: https://example.com");
}

#[test]
fn empty_error_lines_are_skipped() {
    let stderr = "ERROR:\nERROR:    \nERROR: real reason\n";
    assert_eq!(classify_failure(stderr, 1), "real reason");
}

#[test]
fn indented_error_lines_do_not_count() {
    assert_eq!(
        classify_failure("  ERROR: indented", 3),
        "Download failed (exit code 3)"
    );
}

#[test]
fn fallback_includes_exit_code() {
    assert_eq!(classify_failure("", 1), "Download failed (exit code 1)");
    assert_eq!(classify_failure("just noise", -9), "Download failed (exit code -9)");
}

proptest! {
    #[test]
    fn unmatched_text_falls_back_to_exit_code(text in "[a-z ]{0,40}", code in any::<i32>()) {
        prop_assume!(!text.contains("timed out") && !text.contains("not found"));
        prop_assert_eq!(classify_failure(&text, code), format!("Download failed (exit code {code})"));
    }
}
