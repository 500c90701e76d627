//! Integration tests for report and artifact output.

use async_trait::async_trait;
use serde_json::{json, Value};

use apprecon::*;
use apprecon_cli::report::{EXCHANGES_JSON, REPORT_JSON, REPORT_MARKDOWN};
use apprecon_cli::{read_report, render_markdown, write_markdown, write_report, FsArtifactSink};

// ─────────────────────── helpers ───────────────────────

const PAGE_HTML: &str = r#"
<html><body>
  <nav><a href="/clients">Clients</a><a href="/team">Team</a></nav>
  <button class="btn"><svg width="1"></svg>Add client</button>
  <table><tr><th>Name</th></tr><tr><td>Jane</td></tr></table>
</body></html>
"#;

/// A page that is always on the same static screen.
struct StaticPage;

#[async_trait]
impl BrowserPage for StaticPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> ReconResult<NavigationResult> {
        Err(ReconError::Navigation(format!("{url} unreachable")))
    }

    async fn current_url(&self) -> ReconResult<String> {
        Ok("https://salon.test/dashboard".to_string())
    }

    async fn current_document(&self) -> ReconResult<String> {
        Ok(PAGE_HTML.to_string())
    }

    async fn evaluate(&self, _script: &str) -> ReconResult<Value> {
        Ok(json!({}))
    }

    async fn capture_screenshot(&self) -> ReconResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

fn seeded_session() -> ReconSession {
    let mut session = ReconSession::new("salon", SessionConfig::default());
    let url = "https://salon.test/api/clients/42";
    session.apply(TrafficEvent::Request(ObservedRequest {
        url: url.to_string(),
        method: "GET".to_string(),
        headers: Headers::new(),
        body: None,
    }));
    session.apply(TrafficEvent::Response(ObservedResponse {
        url: url.to_string(),
        status: 200,
        headers: Headers::new(),
        body: json!({"id": 42, "name": "Jane", "phone": "555"}).to_string(),
    }));
    session
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_scan_writes_artifacts_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FsArtifactSink::new(dir.path()).unwrap();
    let options = ScanOptions {
        settle_ms: 0,
        ..ScanOptions::default()
    };
    let mut session = seeded_session();
    let mut scanner = Scanner::new(StaticPage, sink, options);

    let summary = scanner.crawl(&mut session, "dashboard").await;
    assert_eq!(summary.captured, 1);
    assert_eq!(summary.skipped, 2);

    let report = session.report();
    let written = write_report(&report, session.exchanges(), dir.path()).unwrap();
    assert_eq!(written.json, dir.path().join(REPORT_JSON));
    assert!(dir.path().join(EXCHANGES_JSON).exists());
    assert!(dir.path().join(REPORT_MARKDOWN).exists());

    let page_dir = dir.path().join("pages").join("dashboard");
    for file in ["screenshot.png", "page.html", "styles.json", "components.json", "meta.json"] {
        assert!(page_dir.join(file).exists(), "missing {file}");
    }
    let meta: Value =
        serde_json::from_str(&std::fs::read_to_string(page_dir.join("meta.json")).unwrap()).unwrap();
    assert_eq!(meta["url"], "https://salon.test/dashboard");

    let components: Value =
        serde_json::from_str(&std::fs::read_to_string(page_dir.join("components.json")).unwrap())
            .unwrap();
    assert_eq!(components["buttons"][0]["text"], "Add client");
    assert_eq!(components["buttons"][0]["has_icon"], true);

    let exchanges: Value =
        serde_json::from_str(&std::fs::read_to_string(&written.exchanges).unwrap()).unwrap();
    assert_eq!(exchanges.as_array().unwrap().len(), 1);
}

#[test]
fn test_markdown_sections() {
    let mut session = seeded_session();
    session.skip_page("Team", "https://salon.test/team", "navigation timed out");
    let md = render_markdown(&session.report());

    for heading in [
        "# Architecture Report",
        "## Summary",
        "## Navigation Structure",
        "## Entities (Data Models)",
        "## API Endpoints",
        "## Pages Scanned",
        "## Skipped Pages",
        "## Next Steps",
    ] {
        assert!(md.contains(heading), "missing {heading}");
    }
    assert!(md.contains("### Client"));
    assert!(md.contains("**Fields:** id, name, phone"));
    assert!(md.contains("| GET | `https://salon.test/api/clients/{id}` | 1 | yes |"));
    assert!(md.contains("- **Entities discovered:** client"));
    assert!(md.contains("navigation timed out"));
}

#[test]
fn test_empty_report_renders() {
    let session = ReconSession::new("empty", SessionConfig::default());
    let md = render_markdown(&session.report());
    assert!(md.contains("- **Entities discovered:** none"));
    assert!(!md.contains("## Skipped Pages"));
}

#[test]
fn test_render_from_saved_json() {
    let dir = tempfile::tempdir().unwrap();
    let session = seeded_session();
    let written = write_report(&session.report(), session.exchanges(), dir.path()).unwrap();
    std::fs::remove_file(&written.markdown).unwrap();

    let loaded = read_report(&written.json).unwrap();
    assert_eq!(loaded.summary.entity_names, vec!["client"]);
    let path = write_markdown(&loaded, dir.path()).unwrap();
    assert!(std::fs::read_to_string(path).unwrap().contains("### Client"));
}

#[test]
fn test_read_report_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(REPORT_JSON);
    std::fs::write(&path, "{not json").unwrap();
    let err = read_report(&path).unwrap_err();
    assert!(err.to_string().contains("not a valid report"));
}
