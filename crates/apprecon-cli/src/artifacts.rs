//! Filesystem artifact sink.
//!
//! Layout under the output directory:
//!
//! ```text
//! pages/<name>/screenshot.png
//! pages/<name>/page.html
//! pages/<name>/styles.json
//! pages/<name>/components.json
//! pages/<name>/meta.json
//! assets/icons/icon_<hash>.svg
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};

use apprecon::{ArtifactRefs, ArtifactSink, CapturedPage, ReconResult};

/// Longest folder name derived from a page name, in characters.
const MAX_FOLDER_NAME: usize = 50;

fn unsafe_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-]").expect("folder name regex is valid"))
}

/// Turn a display name into a folder name: anything but word characters
/// and `-` becomes `_`, capped at 50 characters.
pub fn safe_name(name: &str) -> String {
    let replaced = unsafe_chars_re().replace_all(name.trim(), "_");
    let truncated: String = replaced.chars().take(MAX_FOLDER_NAME).collect();
    if truncated.is_empty() {
        "page".to_string()
    } else {
        truncated
    }
}

/// Writes each captured page to its own folder.
pub struct FsArtifactSink {
    pages_dir: PathBuf,
    icons_dir: PathBuf,
    used: HashSet<String>,
}

impl FsArtifactSink {
    /// Create the sink, making `pages/` and `assets/icons/` under `root`.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        let pages_dir = root.join("pages");
        let icons_dir = root.join("assets").join("icons");
        std::fs::create_dir_all(&pages_dir)?;
        std::fs::create_dir_all(&icons_dir)?;
        Ok(Self {
            pages_dir,
            icons_dir,
            used: HashSet::new(),
        })
    }

    /// Folder name for `name`, suffixed when another page already took it.
    fn claim_folder(&mut self, name: &str) -> String {
        let base = safe_name(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    }

    fn store_icons(&self, icons: &[String]) -> ReconResult<usize> {
        let mut written = 0;
        for svg in icons {
            let digest = format!("{:x}", Sha256::digest(svg.as_bytes()));
            let path = self.icons_dir.join(format!("icon_{}.svg", &digest[..8]));
            if !path.exists() {
                std::fs::write(&path, svg)?;
                written += 1;
            }
        }
        Ok(written)
    }
}

impl ArtifactSink for FsArtifactSink {
    fn store_page(&mut self, page: &CapturedPage) -> ReconResult<ArtifactRefs> {
        let name = self.claim_folder(&page.name);
        let folder = self.pages_dir.join(name);
        std::fs::create_dir_all(&folder)?;

        let screenshot = folder.join("screenshot.png");
        std::fs::write(&screenshot, &page.screenshot)?;

        let document = folder.join("page.html");
        std::fs::write(&document, &page.document)?;

        let styles = folder.join("styles.json");
        std::fs::write(&styles, serde_json::to_string_pretty(&page.styles)?)?;

        let components = folder.join("components.json");
        std::fs::write(&components, serde_json::to_string_pretty(&page.components)?)?;

        let meta = serde_json::json!({
            "name": page.name,
            "url": page.url,
            "scanned_at": Utc::now().to_rfc3339(),
            "images": page.assets.images,
            "icon_count": page.assets.icons.len(),
        });
        std::fs::write(folder.join("meta.json"), serde_json::to_string_pretty(&meta)?)?;

        let new_icons = self.store_icons(&page.assets.icons)?;
        tracing::debug!(
            "Stored {} in {} ({new_icons} new icons)",
            page.name,
            folder.display()
        );

        Ok(ArtifactRefs {
            folder: Some(folder),
            screenshot: Some(screenshot),
            document: Some(document),
            styles: Some(styles),
            components: Some(components),
        })
    }
}
