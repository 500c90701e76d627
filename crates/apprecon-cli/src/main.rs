//! apprecon — entry point.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use apprecon::{
    validate_start_url, BrowserPage, ReconSession, ScanOptions, Scanner, SessionConfig,
    TrafficFilter, DEFAULT_BODY_LIMIT,
};
use apprecon_cli::{
    launch, read_report, resolve_home, resolve_output_dir, resolve_profile_dir, spawn_interceptor,
    write_markdown, write_report, ChromiumPage, FsArtifactSink,
};

#[derive(Parser)]
#[command(
    name = "apprecon",
    about = "Map a web application's entities, API routes, and UI components from a live browsing session",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a browser, let you log in, then crawl the app and write a report.
    Scan {
        /// Session name. Reusing a name resumes its browser profile.
        #[arg(default_value = "default")]
        session: String,

        /// Page opened before you take over.
        #[arg(long, default_value = "https://www.google.com/")]
        start_url: String,

        /// Output directory (default: $APPRECON_HOME/output/<session>).
        #[arg(short, long)]
        output: Option<String>,

        /// apprecon home directory (default: $APPRECON_HOME or ~/.apprecon).
        #[arg(long)]
        home: Option<String>,

        /// Maximum navigation targets to visit after the entry page.
        #[arg(long, default_value_t = 25)]
        max_pages: usize,

        /// Milliseconds to let each page render before capturing it.
        #[arg(long, default_value_t = 2000)]
        settle_ms: u64,

        /// Navigation timeout in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,

        /// Response body ceiling in bytes.
        #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
        body_limit: usize,

        /// Also follow navigation links to other hosts.
        #[arg(long)]
        any_host: bool,

        /// Run without a visible window. Only useful with an already logged-in profile.
        #[arg(long)]
        headless: bool,
    },

    /// Re-render ARCHITECTURE.md from a saved architecture.json.
    Render {
        /// Path to architecture.json.
        report: PathBuf,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   apprecon completions bash > ~/.local/share/bash-completion/completions/apprecon
    ///   apprecon completions zsh > ~/.zfunc/_apprecon
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan {
            session,
            start_url,
            output,
            home,
            max_pages,
            settle_ms,
            timeout_ms,
            body_limit,
            any_host,
            headless,
        } => {
            let start_url = validate_start_url(&start_url)?;
            let home = resolve_home(home.as_deref());
            let profile_dir = resolve_profile_dir(&home, &session);
            let output_dir = resolve_output_dir(output.as_deref(), &home, &session);
            tracing::info!("Session: {session}");
            tracing::info!("Profile: {}", profile_dir.display());
            tracing::info!("Output: {}", output_dir.display());

            let sink = FsArtifactSink::new(&output_dir).with_context(|| {
                format!("failed to prepare output directory {}", output_dir.display())
            })?;

            let (mut browser, pump) = launch(&home, &profile_dir, headless).await?;
            let page = browser
                .new_page("about:blank")
                .await
                .context("failed to open a tab")?;

            let traffic_filter = TrafficFilter::default();
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let interceptor = spawn_interceptor(&page, traffic_filter.clone(), tx).await?;

            let options = ScanOptions {
                settle_ms,
                nav_timeout_ms: timeout_ms,
                max_pages,
                same_host_only: !any_host,
            };
            let mut scanner = Scanner::new(ChromiumPage::new(page), sink, options).with_traffic(rx);
            let mut recon = ReconSession::new(
                session.as_str(),
                SessionConfig {
                    filter: traffic_filter,
                    body_limit,
                },
            );

            if let Err(e) = scanner.page_mut().navigate(&start_url, timeout_ms).await {
                tracing::warn!("Could not open {start_url}: {e}");
            }

            eprintln!();
            eprintln!("Your turn: open the application, log in, and go to its main screen.");
            wait_for_enter("Press Enter to start scanning...").await?;

            let summary = scanner.crawl(&mut recon, "dashboard").await;
            let late = scanner.flush_traffic(&mut recon).await;
            tracing::debug!("Applied {late} late traffic events");
            let report = recon.report();
            let written = write_report(&report, recon.exchanges(), &output_dir)?;

            println!("Pages captured: {}", summary.captured);
            println!("Pages skipped: {}", summary.skipped);
            println!("API calls: {}", report.summary.total_exchanges);
            println!("Entities: {}", report.summary.entity_names.join(", "));
            println!("Endpoints: {}", report.summary.endpoint_count);
            println!("Report: {}", written.markdown.display());

            wait_for_enter("Press Enter to close the browser...").await?;

            interceptor.abort();
            if let Err(e) = browser.close().await {
                tracing::debug!("Browser close: {e}");
            }
            pump.abort();
        }

        Commands::Render { report } => {
            let loaded = read_report(&report)?;
            let dir = report
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let path = write_markdown(&loaded, &dir)?;
            println!("{}", path.display());
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "apprecon", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Block on a line from stdin without stalling the runtime.
async fn wait_for_enter(prompt: &str) -> anyhow::Result<()> {
    eprintln!("{prompt}");
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| ())
    })
    .await
    .context("stdin reader panicked")?
    .context("failed to read stdin")
}
