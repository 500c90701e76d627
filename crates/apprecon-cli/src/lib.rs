//! apprecon CLI — Chromium shim, artifact storage, and report rendering for apprecon sessions.

pub mod artifacts;
pub mod chromium;
pub mod config;
pub mod report;

pub use artifacts::{safe_name, FsArtifactSink};
pub use chromium::{find_chromium, launch, spawn_interceptor, ChromiumPage};
pub use config::{resolve_home, resolve_output_dir, resolve_profile_dir};
pub use report::{read_report, render_markdown, write_markdown, write_report};
