// src/exec/args.rs

//! Command-line construction for the extraction tool.

use std::ffi::OsString;
use std::path::Path;

use crate::job::Job;

/// Preset that is expanded into explicit remux / format-sort directives when
/// the post-processing helper is available.
pub const MP4_PRESET: &str = "mp4";

/// Format-sort order used for the mp4 preset. `proto:https` prefers
/// progressive streams over DASH fragments, which avoid 403s mid-download.
pub const MP4_FORMAT_SORT: &str = "proto:https,vcodec:h264,lang,quality,res,fps,hdr:12,acodec:aac";

/// Inputs to [`build_args`] that do not come from the job itself.
#[derive(Debug, Clone, Copy)]
pub struct ArgContext<'a> {
    /// Directory the tool writes into.
    pub output_dir: &'a Path,
    /// Subtitle language requested when the job wants subtitles.
    pub subtitle_lang: &'a str,
    /// Post-processing helper (ffmpeg), if one was found.
    pub helper: Option<&'a Path>,
}

/// Build the argument vector for one job. The URL is always last.
///
/// Arguments go straight to the process (no shell), so nothing is quoted.
pub fn build_args(job: &Job, ctx: &ArgContext<'_>) -> Vec<OsString> {
    let options = job.options();
    let mut args: Vec<OsString> = Vec::with_capacity(16);

    args.push("-P".into());
    args.push(ctx.output_dir.as_os_str().to_owned());
    args.push("--force-overwrites".into());

    if options.has_preset() {
        args.push("-o".into());
        args.push(format!("%(title)s_[{}].%(ext)s", options.preset).into());
    }

    args.push(if options.playlist { "--yes-playlist" } else { "--no-playlist" }.into());

    if options.subtitles {
        args.push("--write-subs".into());
        args.push("--write-auto-subs".into());
        args.push("--sub-lang".into());
        args.push(ctx.subtitle_lang.into());
    }

    if let Some(helper) = ctx.helper {
        args.push("--ffmpeg-location".into());
        args.push(helper.as_os_str().to_owned());
    }

    if options.preset == MP4_PRESET && ctx.helper.is_some() {
        for arg in [
            "--merge-output-format",
            MP4_PRESET,
            "--remux-video",
            MP4_PRESET,
            "-S",
            MP4_FORMAT_SORT,
        ] {
            args.push(arg.into());
        }
    } else if options.has_preset() {
        args.push("-t".into());
        args.push(options.preset.as_str().into());
    }

    args.push(job.url().into());
    args
}

/// Render a program + arguments as one line for logs.
pub fn display_command(program: &Path, args: &[OsString]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}
