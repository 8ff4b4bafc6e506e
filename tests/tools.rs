// tests/tools.rs
#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dlqueue::config::ToolsSection;
use dlqueue::engine::{TitleFetcher, ToolTitleFetcher};
use dlqueue::tools::Toolchain;
use dlqueue_test_utils::fake_tool::FakeTools;
use dlqueue_test_utils::with_timeout;

#[test]
fn bundled_tools_are_found_in_tools_dir() {
    let tools = FakeTools::new();
    let extractor = tools.script("yt-dlp", "exit 0");
    let ffmpeg = tools.script("ffmpeg", "exit 0");
    tools.script("ffprobe", "exit 0");

    let toolchain = Toolchain::discover(&ToolsSection {
        dir: tools.path().to_path_buf(),
        ..ToolsSection::default()
    });

    assert_eq!(toolchain.extractor(), Some(extractor));
    assert_eq!(toolchain.helper(), Some(ffmpeg));
    assert!(toolchain.is_extractor_available());
    assert!(toolchain.is_helper_available());
}

#[test]
fn explicit_path_wins_over_tools_dir() {
    let tools = FakeTools::new();
    tools.script("yt-dlp", "exit 0");
    let custom = tools.script("yt-dlp-nightly", "exit 0");

    let toolchain = Toolchain::discover(&ToolsSection {
        dir: tools.path().to_path_buf(),
        yt_dlp: Some(custom.clone()),
        ..ToolsSection::default()
    });

    assert_eq!(toolchain.extractor(), Some(custom));
}

#[test]
fn refresh_picks_up_newly_installed_tools() {
    let tools = FakeTools::new();
    let config = ToolsSection {
        dir: tools.path().to_path_buf(),
        yt_dlp: Some(tools.path().join("custom-yt-dlp")),
        ..ToolsSection::default()
    };
    let toolchain = Toolchain::discover(&config);
    let before = toolchain.extractor();

    let installed = tools.script("custom-yt-dlp", "exit 0");
    toolchain.refresh();

    assert_ne!(before, Some(installed.clone()));
    assert_eq!(toolchain.extractor(), Some(installed));
}

#[test]
fn fixed_paths_survive_refresh() {
    let toolchain = Toolchain::from_paths(Some(PathBuf::from("/x/yt-dlp")), None);
    toolchain.refresh();
    assert_eq!(toolchain.extractor(), Some(PathBuf::from("/x/yt-dlp")));
    assert!(!toolchain.is_helper_available());
}

#[tokio::test]
async fn title_fetcher_returns_last_line_on_success() {
    let tools = FakeTools::new();
    let program = tools.script(
        "yt-dlp",
        "[ \"$1\" = \"--get-title\" ] && [ \"$2\" = \"--no-playlist\" ] || exit 2\nprintf 'WARNING: noise\\nMy Video\\n\\n'",
    );
    let fetcher = ToolTitleFetcher::new(
        Arc::new(Toolchain::from_paths(Some(program), None)),
        Duration::from_secs(5),
    );

    assert!(fetcher.is_available());
    let title = with_timeout(fetcher.fetch("https://example.com/v")).await;
    assert_eq!(title.as_deref(), Some("My Video"));
}

#[tokio::test]
async fn title_fetcher_gives_up_on_failure_or_timeout() {
    let tools = FakeTools::new();
    let failing = tools.script("failing", "printf 'Title\\n'\nexit 1");
    let slow = tools.script("slow", "sleep 30");

    let fetcher = ToolTitleFetcher::new(
        Arc::new(Toolchain::from_paths(Some(failing), None)),
        Duration::from_secs(5),
    );
    assert_eq!(with_timeout(fetcher.fetch("u")).await, None);

    let fetcher = ToolTitleFetcher::new(
        Arc::new(Toolchain::from_paths(Some(slow), None)),
        Duration::from_millis(200),
    );
    assert_eq!(with_timeout(fetcher.fetch("u")).await, None);

    let fetcher = ToolTitleFetcher::new(Arc::new(Toolchain::from_paths(None, None)), Duration::from_secs(1));
    assert!(!fetcher.is_available());
    assert_eq!(with_timeout(fetcher.fetch("u")).await, None);
}
