//! Report rendering — JSON and Markdown views of an [`ArchitectureReport`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use apprecon::{ArchitectureReport, ComponentKind, Exchange};

pub const REPORT_JSON: &str = "architecture.json";
pub const EXCHANGES_JSON: &str = "exchanges.json";
pub const REPORT_MARKDOWN: &str = "ARCHITECTURE.md";

const NAVIGATION_LIMIT: usize = 30;
const FIELD_LIMIT: usize = 20;
const EXAMPLE_CHARS: usize = 1000;
const ENDPOINT_LIMIT: usize = 50;

/// Files produced by [`write_report`].
#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub json: PathBuf,
    pub exchanges: PathBuf,
    pub markdown: PathBuf,
}

/// Write the report JSON, the raw exchange log, and the Markdown summary into `dir`.
pub fn write_report(
    report: &ArchitectureReport,
    exchanges: &[Exchange],
    dir: &Path,
) -> Result<WrittenReport> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let json = dir.join(REPORT_JSON);
    std::fs::write(&json, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("failed to write {}", json.display()))?;

    let exchanges_path = dir.join(EXCHANGES_JSON);
    std::fs::write(&exchanges_path, serde_json::to_string_pretty(exchanges)?)
        .with_context(|| format!("failed to write {}", exchanges_path.display()))?;

    let markdown = write_markdown(report, dir)?;

    Ok(WrittenReport {
        json,
        exchanges: exchanges_path,
        markdown,
    })
}

/// Render `report` as Markdown into `dir`.
pub fn write_markdown(report: &ArchitectureReport, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(REPORT_MARKDOWN);
    std::fs::write(&path, render_markdown(report))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Load a saved report.
pub fn read_report(path: &Path) -> Result<ArchitectureReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid report", path.display()))
}

/// Human-readable Markdown summary of a report.
pub fn render_markdown(report: &ArchitectureReport) -> String {
    let mut md = String::new();
    let summary = &report.summary;

    let entity_names = if summary.entity_names.is_empty() {
        "none".to_string()
    } else {
        summary.entity_names.join(", ")
    };

    let _ = writeln!(md, "# Architecture Report\n");
    let _ = writeln!(md, "Generated: {}\n", report.generated_at.to_rfc3339());
    let _ = writeln!(md, "## Summary\n");
    let _ = writeln!(md, "- **Pages scanned:** {}", summary.total_pages);
    let _ = writeln!(
        md,
        "- **API calls captured:** {} ({} answered)",
        summary.total_exchanges, summary.answered_exchanges
    );
    let _ = writeln!(md, "- **Entities discovered:** {entity_names}");
    let _ = writeln!(md, "- **Endpoint templates:** {}", summary.endpoint_count);
    let _ = writeln!(md, "- **Navigation items:** {}", summary.navigation_items);
    if summary.skipped_pages > 0 {
        let _ = writeln!(md, "- **Pages skipped:** {}", summary.skipped_pages);
    }

    let _ = writeln!(md, "\n---\n\n## Navigation Structure\n");
    for nav in report.navigation.iter().take(NAVIGATION_LIMIT) {
        let _ = writeln!(md, "- [{}]({})", nav.text, nav.href);
    }

    let _ = writeln!(md, "\n---\n\n## Entities (Data Models)\n");
    for (name, entity) in &report.entities {
        let _ = writeln!(md, "### {}\n", title_case(name));
        let fields: Vec<&str> = entity
            .fields
            .iter()
            .take(FIELD_LIMIT)
            .map(String::as_str)
            .collect();
        let _ = writeln!(md, "**Fields:** {}\n", fields.join(", "));
        if let Some(example) = entity.examples.first() {
            let pretty = serde_json::to_string_pretty(example).unwrap_or_default();
            let clipped: String = pretty.chars().take(EXAMPLE_CHARS).collect();
            let _ = writeln!(md, "```json\n{clipped}\n```\n");
        }
    }

    let _ = writeln!(md, "---\n\n## API Endpoints\n");
    let _ = writeln!(md, "| Method | Endpoint | Calls | Response seen |");
    let _ = writeln!(md, "|--------|----------|-------|---------------|");
    for endpoint in report.endpoints_by_traffic().into_iter().take(ENDPOINT_LIMIT) {
        let _ = writeln!(
            md,
            "| {} | `{}` | {} | {} |",
            endpoint.method,
            endpoint.template,
            endpoint.call_count,
            if endpoint.has_example_response { "yes" } else { "no" }
        );
    }

    let _ = writeln!(md, "\n---\n\n## Pages Scanned\n");
    for page in &report.pages {
        let _ = writeln!(md, "### {}\n", page.name);
        let _ = writeln!(md, "- URL: {}", page.url);
        if let Some(screenshot) = &page.artifacts.screenshot {
            let _ = writeln!(md, "- Screenshot: `{}`", screenshot.display());
        }
        for kind in ComponentKind::ALL {
            let _ = writeln!(
                md,
                "- {}: {}",
                kind_label(kind),
                page.components.count(kind)
            );
        }
        md.push('\n');
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(md, "---\n\n## Skipped Pages\n");
        for skip in &report.skipped {
            let _ = writeln!(md, "- {} ({}): {}", skip.name, skip.url, skip.reason);
        }
        md.push('\n');
    }

    let _ = writeln!(md, "---\n\n## Next Steps\n");
    let _ = writeln!(md, "1. Review entities → create database schema");
    let _ = writeln!(md, "2. Review API → create API routes");
    let _ = writeln!(md, "3. Review pages → create page components");
    let _ = writeln!(md, "4. Review components → create UI components");
    let _ = writeln!(md, "5. Review styles → create design system");

    md
}

fn kind_label(kind: ComponentKind) -> &'static str {
    match kind {
        ComponentKind::Button => "Buttons",
        ComponentKind::Input => "Inputs",
        ComponentKind::Form => "Forms",
        ComponentKind::Table => "Tables",
        ComponentKind::Card => "Cards",
        ComponentKind::Navigation => "Navigation blocks",
        ComponentKind::Modal => "Modals",
    }
}

/// `"staff_member"` → `"Staff_Member"`.
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut boundary = true;
    for c in name.chars() {
        if boundary {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        boundary = !c.is_alphanumeric();
    }
    out
}
