//! CLI binary for pdf2docx.
//!
//! A thin shim over the library crate that maps CLI flags to `ClientConfig`,
//! drives a `SessionController` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2docx::api::DEFAULT_LIST_LIMIT;
use pdf2docx::pipeline::download;
use pdf2docx::{
    explain_job_failure, format_file_size, ClientConfig, Conversion, ConversionApi,
    ConversionStatus, HttpConversionApi, PdfFile, ProgressCallback, SessionController,
    SessionPhase, SessionSnapshot, UploadProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal upload bar. Switches to a spinner once the service has the file
/// and the session is waiting on the job.
struct CliUploadProgress {
    bar: ProgressBar,
}

impl CliUploadProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Spinner-only style for the polling phase.
    fn waiting(&self) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.reset_elapsed();
    }

    fn status(&self, job: &Conversion) {
        self.bar.set_message(job.status.description());
    }
}

impl UploadProgressCallback for CliUploadProgress {
    fn on_upload_start(&self, file_name: &str, total_bytes: u64) {
        self.bar.set_message(format!(
            "{file_name} {}",
            dim(&format_file_size(total_bytes))
        ));
    }

    fn on_upload_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_upload_complete(&self, job: &Conversion) {
        self.bar.set_position(100);
        self.bar
            .println(format!("{} Uploaded  {}", green("✓"), dim(&job.id)));
        self.waiting();
        self.status(job);
    }

    fn on_upload_error(&self, error: &str) {
        self.bar.println(format!("{} Upload failed: {}", red("✗"), error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and save next to the current directory
  pdf2docx convert report.pdf

  # Convert into a directory, against a remote service
  pdf2docx --api-url https://convert.example.com convert report.pdf -o out/

  # Inspect and fetch an existing job
  pdf2docx status 6f1c2a
  pdf2docx download 6f1c2a -o out/

  # Recent jobs as JSON
  pdf2docx --json list --limit 10

LIMITS:
  Only PDF files up to 100MB are accepted. Files over 50MB convert slowly.
  Scanned PDFs are run through OCR automatically.

ENVIRONMENT VARIABLES:
  PDF2DOCX_API_URL           Conversion service root (default http://localhost:8000)
  PDF2DOCX_POLL_INTERVAL_MS  Delay between status checks (default 2000)
  PDF2DOCX_TIMEOUT           Per-request timeout in seconds (default 300)
  PDF2DOCX_OUTPUT_DIR        Where converted documents are saved (default .)
  RUST_LOG                   Override log filtering
"#;

/// Convert PDF files to Word documents through a conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert PDF files to Word documents through a conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Conversion service root URL.
    #[arg(long, global = true, env = "PDF2DOCX_API_URL", default_value = pdf2docx::config::DEFAULT_BASE_URL)]
    api_url: String,

    /// Delay between status checks in milliseconds.
    #[arg(long, global = true, env = "PDF2DOCX_POLL_INTERVAL_MS", default_value_t = 2000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "PDF2DOCX_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "PDF2DOCX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2DOCX_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF, wait for the conversion and save the .docx.
    Convert {
        /// Local PDF file.
        input: PathBuf,

        /// Directory the document is saved into.
        #[arg(short, long, env = "PDF2DOCX_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Wait for the conversion but don't download the result.
        #[arg(long)]
        no_download: bool,
    },
    /// Show one conversion job.
    Status {
        id: String,
    },
    /// Save the document of a completed job.
    Download {
        id: String,

        #[arg(short, long, env = "PDF2DOCX_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },
    /// List recent jobs.
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,

        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,
    },
    /// Delete a job record.
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback channel during `convert`; library
    // INFO logs would only tear it.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && matches!(cli.command, Command::Convert { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Convert {
            input,
            output_dir,
            no_download,
        } => run_convert(&cli, input, output_dir, *no_download, show_progress).await,
        Command::Status { id } => run_status(&cli, id).await,
        Command::Download { id, output_dir } => run_download(&cli, id, output_dir).await,
        Command::List { skip, limit } => run_list(&cli, *skip, *limit).await,
        Command::Delete { id } => run_delete(&cli, id).await,
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(&cli.api_url)
        .poll_interval_ms(cli.poll_interval)
        .request_timeout_secs(cli.timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn api(cli: &Cli) -> Result<HttpConversionApi> {
    let config = build_config(cli, None)?;
    HttpConversionApi::new(&config).context("Failed to create HTTP client")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

// ── convert ──────────────────────────────────────────────────────────────────

async fn run_convert(
    cli: &Cli,
    input: &Path,
    output_dir: &Path,
    no_download: bool,
    show_progress: bool,
) -> Result<()> {
    let file = PdfFile::from_path(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let bar = show_progress.then(CliUploadProgress::new);
    let progress = bar
        .clone()
        .map(|b| b as Arc<dyn UploadProgressCallback>);
    let config = build_config(cli, progress)?;
    let session = SessionController::new(&config).context("Failed to create HTTP client")?;

    if let Err(e) = session.start(file).await {
        if let Some(b) = &bar {
            b.bar.finish_and_clear();
        }
        return Err(anyhow::Error::new(e).context("Conversion failed"));
    }
    if let Some(advisory) = session.snapshot().advisory {
        if !cli.quiet {
            let line = format!("{} {}", yellow("⚠"), advisory);
            match &bar {
                Some(b) => b.bar.println(line),
                None => eprintln!("{line}"),
            }
        }
    }

    let mut updates = session.stream().until_settled();
    let mut last = session.snapshot();
    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some(snapshot) => {
                    if let (Some(b), Some(job)) = (&bar, &snapshot.active_job) {
                        b.status(job);
                    }
                    last = snapshot;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                session.reset();
                if let Some(b) = &bar {
                    b.bar.finish_and_clear();
                }
                bail!("Interrupted");
            }
        }
    }
    if let Some(b) = &bar {
        b.bar.finish_and_clear();
    }

    match last.phase() {
        SessionPhase::Completed => {}
        SessionPhase::Failed => {
            if cli.json {
                print_json(&last)?;
            }
            report_failure(&last);
            bail!("Conversion failed");
        }
        phase => bail!("Session ended unexpectedly in phase {:?}", phase),
    }

    let Some(completed) = last.completed_job() else {
        bail!("Conversion finished without a downloadable document");
    };

    if no_download {
        if cli.json {
            print_json(&last)?;
        } else if !cli.quiet {
            eprintln!("{} Converted  {}", green("✔"), dim(completed.id()));
        }
        return Ok(());
    }

    let path = session
        .download(&completed, output_dir)
        .await
        .context("Download failed")?;

    if cli.json {
        #[derive(serde::Serialize)]
        struct Converted<'a> {
            #[serde(flatten)]
            session: &'a SessionSnapshot,
            saved_to: &'a Path,
        }
        print_json(&Converted {
            session: &last,
            saved_to: &path,
        })?;
    } else if !cli.quiet {
        eprintln!(
            "{}  {}  →  {}",
            green("✔"),
            completed.original_file_name(),
            bold(&path.display().to_string()),
        );
        if completed.conversion().ocr_applied() {
            eprintln!("   {}", dim("Scanned PDF: text was recognised with OCR"));
        }
    }
    Ok(())
}

fn report_failure(snapshot: &SessionSnapshot) {
    if let Some(failure) = &snapshot.failure {
        eprintln!("{} {}", red("✘"), bold("Conversion failed"));
        eprintln!("   {}", failure.message);
    } else if let Some(error) = &snapshot.last_error {
        eprintln!("{} {}", red("✘"), bold(&error.title));
        eprintln!("   {}", error.message);
    }
}

// ── status / download / list / delete ────────────────────────────────────────

async fn run_status(cli: &Cli, id: &str) -> Result<()> {
    let job = api(cli)?
        .get_conversion(id)
        .await
        .with_context(|| format!("Failed to fetch conversion {id}"))?;

    if cli.json {
        return print_json(&job);
    }

    println!("ID:         {}", job.id);
    println!(
        "File:       {} {}",
        job.original_file_name,
        dim(&format!("({})", format_file_size(job.file_size)))
    );
    println!("Status:     {}  {}", status_badge(job.status), dim(job.status.description()));
    if job.ocr_applied() {
        println!("OCR:        applied");
    }
    println!("Created:    {}", job.created_at.to_rfc3339());
    if let Some(done) = job.completed_at {
        println!("Completed:  {}", done.to_rfc3339());
    }
    if job.status == ConversionStatus::Failed {
        let explanation = explain_job_failure(job.error_message.as_deref());
        println!("Error:      {}", explanation.message);
    }
    Ok(())
}

async fn run_download(cli: &Cli, id: &str, output_dir: &Path) -> Result<()> {
    let api = api(cli)?;
    let job = api
        .get_conversion(id)
        .await
        .with_context(|| format!("Failed to fetch conversion {id}"))?;
    let Some(completed) = job.completed() else {
        bail!(
            "Conversion {} is {}; only completed conversions can be downloaded",
            job.id,
            job.status.label()
        );
    };

    let path = download::download(&api, &completed, output_dir)
        .await
        .context("Download failed")?;
    if cli.json {
        print_json(&serde_json::json!({ "id": job.id, "saved_to": path }))?;
    } else if !cli.quiet {
        eprintln!("{}  {}", green("✔"), bold(&path.display().to_string()));
    }
    Ok(())
}

async fn run_list(cli: &Cli, skip: u32, limit: u32) -> Result<()> {
    let jobs = api(cli)?
        .list_conversions(skip, limit)
        .await
        .context("Failed to list conversions")?;

    if cli.json {
        return print_json(&jobs);
    }
    if jobs.is_empty() {
        eprintln!("{}", dim("No conversions"));
        return Ok(());
    }
    for job in &jobs {
        println!(
            "{:<38} {:<12} {:>10}  {}",
            job.id,
            status_badge(job.status),
            format_file_size(job.file_size),
            job.original_file_name,
        );
    }
    Ok(())
}

async fn run_delete(cli: &Cli, id: &str) -> Result<()> {
    api(cli)?
        .delete_conversion(id)
        .await
        .with_context(|| format!("Failed to delete conversion {id}"))?;
    if cli.json {
        print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
    } else if !cli.quiet {
        eprintln!("{} Deleted {}", green("✔"), id);
    }
    Ok(())
}

fn status_badge(status: ConversionStatus) -> String {
    let label = status.label();
    match status {
        ConversionStatus::Completed => green(label),
        ConversionStatus::Failed => red(label),
        ConversionStatus::Processing => cyan(label),
        ConversionStatus::Pending => yellow(label),
    }
}
