//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use crate::artifacts::safe_name;

/// Resolve the apprecon home directory.
///
/// Order: explicit flag, `APPRECON_HOME`, `~/.apprecon`.
pub fn resolve_home(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var("APPRECON_HOME") {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    resolve_default_home()
}

fn resolve_default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apprecon")
}

/// Persistent browser profile for a named session. Reusing a name resumes its cookies.
pub fn resolve_profile_dir(home: &Path, session: &str) -> PathBuf {
    home.join("profiles").join(safe_name(session))
}

/// Where a session's report and page artifacts are written.
pub fn resolve_output_dir(explicit: Option<&str>, home: &Path, session: &str) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(path),
        None => home.join("output").join(safe_name(session)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_home_wins() {
        assert_eq!(resolve_home(Some("/tmp/recon")), PathBuf::from("/tmp/recon"));
    }

    #[test]
    fn test_session_dirs_are_sanitized() {
        let home = Path::new("/data");
        assert_eq!(
            resolve_profile_dir(home, "my salon/2"),
            PathBuf::from("/data/profiles/my_salon_2")
        );
        assert_eq!(
            resolve_output_dir(None, home, "default"),
            PathBuf::from("/data/output/default")
        );
        assert_eq!(
            resolve_output_dir(Some("./out"), home, "default"),
            PathBuf::from("./out")
        );
    }
}
