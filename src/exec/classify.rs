// src/exec/classify.rs

//! Maps the extraction tool's stderr to a short, user-facing error message.

/// How a rule matches the diagnostic text.
enum Needles {
    /// Any one of the substrings is present.
    Any(&'static [&'static str]),
    /// Every substring is present (anywhere, in any order).
    All(&'static [&'static str]),
}

impl Needles {
    fn matches(&self, text: &str) -> bool {
        match self {
            Needles::Any(needles) => needles.iter().any(|n| text.contains(n)),
            Needles::All(needles) => needles.iter().all(|n| text.contains(n)),
        }
    }
}

/// Ordered rules; the first match wins.
const RULES: &[(Needles, &str)] = &[
    (
        Needles::Any(&["Video unavailable"]),
        "Video is unavailable (private, deleted, or region-locked)",
    ),
    (
        Needles::Any(&["Sign in to confirm your age"]),
        "Video requires age verification",
    ),
    (Needles::Any(&["Private video"]), "This video is private"),
    (
        Needles::Any(&[
            "Unable to download webpage",
            "URLError",
            "Connection refused",
            "timed out",
        ]),
        "Network error - check your internet connection",
    ),
    (
        Needles::Any(&["Incomplete YouTube ID"]),
        "Invalid YouTube video ID",
    ),
    (Needles::Any(&["HTTP Error 404"]), "Video not found (404)"),
    (Needles::Any(&["HTTP Error 403"]), "Access denied (403)"),
    (
        Needles::All(&["ffmpeg", "not found"]),
        "FFmpeg required but not found",
    ),
];

const ERROR_LINE_PREFIX: &str = "ERROR:";

/// Classify a failed run from its stderr text and exit code.
///
/// Total and deterministic: known patterns map to canonical messages, then
/// the first non-empty `ERROR:` line is used verbatim, and anything else
/// falls back to `Download failed (exit code N)`.
pub fn classify_failure(diagnostics: &str, exit_code: i32) -> String {
    if let Some((_, message)) = RULES.iter().find(|(needles, _)| needles.matches(diagnostics)) {
        return (*message).to_string();
    }

    first_error_line(diagnostics)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Download failed (exit code {exit_code})"))
}

fn first_error_line(diagnostics: &str) -> Option<&str> {
    diagnostics
        .lines()
        .filter_map(|line| line.strip_prefix(ERROR_LINE_PREFIX))
        .map(str::trim)
        .find(|rest| !rest.is_empty())
}
