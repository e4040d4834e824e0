//! CLI binary for pdf-diagrams.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_diagrams::{
    check_tools, extract, inspect, pipeline::input, CorpusReport, ExtractionConfig, ExtractionProgressCallback,
    MergeMode, PageSelection, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
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

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per document plus per-page log lines.
/// Works when pages complete out of order (`--concurrency > 1`).
struct CliProgressCallback {
    /// Replaced at every document start.
    bar: Mutex<ProgressBar>,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(ProgressBar::hidden()),
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn bar(&self) -> ProgressBar {
        lock(&self.bar).clone()
    }

    fn page_elapsed(&self, page_num: usize) -> String {
        let ms = lock(&self.start_times)
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total_pages as u64);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{document}: {total_pages} pages"))
        ));
        *lock(&self.bar) = bar;
        lock(&self.start_times).clear();
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        lock(&self.start_times).insert(page_num, Instant::now());
        self.bar().set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, diagrams: usize) {
        let elapsed = self.page_elapsed(page_num);
        let bar = self.bar();
        bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{diagrams} diagram(s)")),
            elapsed,
        ));
        bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed(page_num);
        let bar = self.bar();
        bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&truncate(error, 80)),
            elapsed,
        ));
        bar.inc(1);
    }

    fn on_diagram_error(&self, _page_num: usize, _diagram: usize, error: &str) {
        self.bar()
            .println(format!("    {} {}", yellow("⚠"), yellow(&truncate(error, 90))));
    }

    fn on_document_complete(&self, document: &str, pages_ok: usize, diagrams: usize) {
        let bar = self.bar();
        let total = bar.length().unwrap_or(0) as usize;
        bar.finish_and_clear();
        let failed = total.saturating_sub(pages_ok);
        let mark = if failed == 0 {
            green("✔")
        } else if failed == total {
            red("✘")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{} {}  {}/{} pages  {} diagrams",
            mark,
            bold(document),
            pages_ok,
            total,
            bold(&diagrams.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every PDF in a directory → output/<doc>/page<N>_diagram<K>.svg
  pdf-diagrams pdfs/

  # One document, some pages, keep the intermediate page SVGs
  pdf-diagrams --pages 3-15 --keep-tmp exam.pdf

  # Looser merging
  pdf-diagrams --distance 45 --merge-mode transitive pdfs/

  # Machine-readable report
  pdf-diagrams --json pdfs/ > report.json

  # Page count and metadata only (no external tools needed)
  pdf-diagrams --inspect-only exam.pdf

  # Are pdftocairo and inkscape installed?
  pdf-diagrams --check-tools

REQUIREMENTS:
  pdftocairo   poppler-utils (apt install poppler-utils / brew install poppler)
  inkscape     Inkscape 1.x

ENVIRONMENT VARIABLES:
  Every flag has a PDF_DIAGRAMS_* fallback (e.g. PDF_DIAGRAMS_MIN_AREA).
  A .env file in the working directory is loaded first.
  RUST_LOG overrides the log filter.
"#;

/// Extract vector diagrams from PDF pages as cropped SVG files.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-diagrams",
    version,
    about = "Extract vector diagrams from PDF pages as cropped, autosized SVG files",
    long_about = "Vectorises every page with pdftocairo, finds large path primitives, merges \
the fragments of each figure into one region, then crops each region with Inkscape and fits \
its canvas to the drawing.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file or directory of PDFs.
    #[arg(env = "PDF_DIAGRAMS_INPUT", required_unless_present = "check_tools")]
    input: Option<PathBuf>,

    /// Root directory for exported diagrams.
    #[arg(short, long, env = "PDF_DIAGRAMS_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Root directory for intermediate page SVGs.
    #[arg(long, env = "PDF_DIAGRAMS_TMP_DIR", default_value = "tmp")]
    tmp_dir: PathBuf,

    /// Minimum primitive bounding-box area.
    #[arg(long, env = "PDF_DIAGRAMS_MIN_AREA", default_value_t = 1000.0)]
    min_area: f64,

    /// Edge tolerance for merging primitives into one diagram.
    #[arg(short, long, env = "PDF_DIAGRAMS_DISTANCE", default_value_t = 30.0)]
    distance: f64,

    /// Merge policy: one-hop (seed only) or transitive (chains).
    #[arg(long, env = "PDF_DIAGRAMS_MERGE_MODE", value_enum, default_value = "one-hop")]
    merge_mode: MergeModeArg,

    /// Keep tmp/<doc>/ after each document.
    #[arg(long, env = "PDF_DIAGRAMS_KEEP_TMP")]
    keep_tmp: bool,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF_DIAGRAMS_PAGES", default_value = "all")]
    pages: String,

    /// Pages of one document processed at once.
    #[arg(short, long, env = "PDF_DIAGRAMS_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// pdftocairo executable.
    #[arg(long, env = "PDF_DIAGRAMS_PDFTOCAIRO", default_value = "pdftocairo")]
    pdftocairo: PathBuf,

    /// Inkscape executable.
    #[arg(long, env = "PDF_DIAGRAMS_INKSCAPE", default_value = "inkscape")]
    inkscape: PathBuf,

    /// Timeout for each external tool call, in seconds.
    #[arg(long, env = "PDF_DIAGRAMS_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Extra autofit attempts per diagram.
    #[arg(long, env = "PDF_DIAGRAMS_AUTOFIT_RETRIES", default_value_t = 1)]
    autofit_retries: u32,

    /// Exit non-zero when any page or diagram failed.
    #[arg(long, env = "PDF_DIAGRAMS_STRICT")]
    strict: bool,

    /// Output a structured JSON report on stdout.
    #[arg(long, env = "PDF_DIAGRAMS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_DIAGRAMS_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Report whether pdftocairo and inkscape can run, then exit.
    #[arg(long)]
    check_tools: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_DIAGRAMS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_DIAGRAMS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum MergeModeArg {
    OneHop,
    Transitive,
}

impl From<MergeModeArg> for MergeMode {
    fn from(v: MergeModeArg) -> Self {
        match v {
            MergeModeArg::OneHop => MergeMode::OneHop,
            MergeModeArg::Transitive => MergeMode::Transitive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = cli.input.as_deref().context("No input given")?;
        return inspect_all(input, cli.json).await;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Tool check ───────────────────────────────────────────────────────
    let tools = check_tools(&config).await;
    if cli.check_tools {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&tools).context("Failed to serialise tool check")?);
        } else {
            let mark = |ok: bool| if ok { green("✓ found") } else { red("✗ missing") };
            println!("{:<12} {}", tools.converter, mark(tools.converter_available));
            println!("{:<12} {}", tools.exporter, mark(tools.exporter_available));
        }
        if !tools.all_available() {
            std::process::exit(1);
        }
        return Ok(());
    }
    if !tools.converter_available {
        anyhow::bail!(
            "'{}' cannot be run. Install poppler-utils or pass --pdftocairo <path>",
            cli.pdftocairo.display()
        );
    }
    if !tools.exporter_available {
        anyhow::bail!(
            "'{}' cannot be run. Install Inkscape 1.x or pass --inkscape <path>",
            cli.inkscape.display()
        );
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let input = cli.input.as_deref().context("No input given")?;
    let report = extract(input, &config).await.context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &cli.output_dir, show_progress);
    }

    if cli.strict {
        if let Some(f) = report.failures.first() {
            anyhow::bail!("{}: {}", f.source.display(), f.error);
        }
        for doc in report.documents {
            doc.into_result().context("Strict mode")?;
        }
    }

    Ok(())
}

/// Print metadata for one file, or for every PDF in a directory.
async fn inspect_all(input: &Path, json: bool) -> Result<()> {
    let files = if input.is_dir() {
        input::list_documents(input).await.context("Failed to list PDFs")?
    } else {
        vec![input.to_path_buf()]
    };

    let mut all = Vec::with_capacity(files.len());
    for file in &files {
        let meta = inspect(file)
            .await
            .with_context(|| format!("Failed to inspect {}", file.display()))?;
        if json {
            all.push(meta);
            continue;
        }
        println!("File:         {}", file.display());
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = meta.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        if let Some(ref p) = meta.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = meta.creator {
            println!("Creator:      {}", c);
        }
        println!();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all).context("Failed to serialise metadata")?);
    }
    Ok(())
}

fn print_summary(report: &CorpusReport, output_dir: &Path, show_progress: bool) {
    // The progress callback already printed one line per document.
    if !show_progress {
        for doc in &report.documents {
            let s = &doc.stats;
            eprintln!(
                "{}: {}/{} pages, {} diagrams in {}ms",
                doc.name, s.processed_pages, s.selected_pages, s.diagrams_exported, s.total_duration_ms
            );
            if s.failed_pages > 0 || s.diagrams_failed > 0 {
                eprintln!("  {} pages and {} diagrams failed", s.failed_pages, s.diagrams_failed);
            }
        }
    }
    for f in &report.failures {
        eprintln!("{} {}  {}", red("✘"), bold(&f.source.display().to_string()), red(&f.error));
    }
    eprintln!(
        "{}  {} documents  {} diagrams  {}ms  →  {}",
        if report.failures.is_empty() { green("✔") } else { cyan("⚠") },
        report.documents.len(),
        report.diagrams_exported(),
        report.total_duration_ms,
        bold(&output_dir.display().to_string()),
    );
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .min_area(cli.min_area)
        .merge_distance(cli.distance)
        .merge_mode(cli.merge_mode.clone().into())
        .cleanup(!cli.keep_tmp)
        .output_dir(&cli.output_dir)
        .tmp_dir(&cli.tmp_dir)
        .pages(pages)
        .concurrency(cli.concurrency)
        .pdftocairo_path(&cli.pdftocairo)
        .inkscape_path(&cli.inkscape)
        .tool_timeout_secs(cli.timeout)
        .autofit_retries(cli.autofit_retries);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();
    let parse_page = |p: &str| -> Result<usize> {
        let page: usize = p
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number: '{}'", p.trim()))?;
        if page < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
        }
        Ok(page)
    };

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let (start, end) = (parse_page(start)?, parse_page(end)?);
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages = s.split(',').map(parse_page).collect::<Result<Vec<_>>>()?;
        return Ok(PageSelection::Set(pages));
    }

    Ok(PageSelection::Single(parse_page(&s)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pages_forms() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages(" ALL ").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages("5").unwrap(), PageSelection::Single(5)));
        assert!(matches!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15)));
        match parse_pages("1, 3,5").unwrap() {
            PageSelection::Set(p) => assert_eq!(p, vec![1, 3, 5]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_pages_rejects_bad_input() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-3").is_err());
        assert!(parse_pages("1,x").is_err());
        assert!(parse_pages("").is_err());
    }

    #[test]
    fn cli_defaults_match_library_defaults() {
        let cli = Cli::parse_from(["pdf-diagrams", "pdfs/"]);
        let config = build_config(&cli, None).unwrap();
        let defaults = ExtractionConfig::default();
        assert_eq!(config.min_area, defaults.min_area);
        assert_eq!(config.merge_distance, defaults.merge_distance);
        assert_eq!(config.merge_mode, defaults.merge_mode);
        assert_eq!(config.cleanup, defaults.cleanup);
        assert_eq!(config.tool_timeout_secs, defaults.tool_timeout_secs);
        assert_eq!(config.output_dir, defaults.output_dir);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "éé\u{2026}");
    }
}
