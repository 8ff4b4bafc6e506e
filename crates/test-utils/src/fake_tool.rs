//! Stand-in executables for process-level tests: small `sh` scripts written
//! into a temp dir.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temp dir holding fake tool scripts. Deleted on drop.
pub struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir for fake tools"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable `sh` script called `name` with `body`.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
        make_executable(&path);
        path
    }

    /// A fake extractor printing `stdout_lines`, then `stderr_lines` to
    /// stderr, then exiting with `code`.
    pub fn extractor(&self, name: &str, stdout_lines: &[&str], stderr_lines: &[&str], code: i32) -> PathBuf {
        let mut body = String::new();
        for line in stdout_lines {
            body.push_str(&format!("printf '%s\\n' '{}'\n", shell_escape(line)));
        }
        for line in stderr_lines {
            body.push_str(&format!("printf '%s\\n' '{}' >&2\n", shell_escape(line)));
        }
        body.push_str(&format!("exit {code}"));
        self.script(name, &body)
    }

    /// A fake extractor that writes its arguments (one per line) to
    /// `args_file` and succeeds.
    pub fn recording_extractor(&self, name: &str, args_file: &Path) -> PathBuf {
        self.script(
            name,
            &format!(
                "for a in \"$@\"; do printf '%s\\n' \"$a\"; done > '{}'\nexit 0",
                args_file.display()
            ),
        )
    }

    /// A fake extractor that prints a progress line and then sleeps.
    pub fn hanging_extractor(&self, name: &str, secs: u32) -> PathBuf {
        self.script(
            name,
            &format!("printf '%s\\n' '[download]  10.0% of 1.00MiB'\nsleep {secs}\nexit 0"),
        )
    }
}

impl Default for FakeTools {
    fn default() -> Self {
        Self::new()
    }
}

fn shell_escape(s: &str) -> String {
    s.replace('\'', r"'\''")
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).expect("stat fake tool").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod fake tool");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
