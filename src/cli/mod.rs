//! # CLI Module
//!
//! Command-line harness for the job execution core. This stands in for the
//! "external HTTP/SSE surface" and browser UI spec.md places out of scope
//! (§1): it submits jobs, polls/streams their progress, and prints the
//! catalog state those jobs produce, all against a local SQLite catalog
//! file.
//!
//! ## Usage
//! ```bash
//! photo-catalog init --name vacation --dir ~/Photos
//! photo-catalog submit scan --catalog <id> --watch
//! photo-catalog submit detect_duplicates --catalog <id> --param threshold=5 --watch
//! photo-catalog jobs --catalog <id>
//! photo-catalog duplicates <id>
//! ```

use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_catalog_jobs::catalog::model::JobStatus;
use photo_catalog_jobs::catalog::SqliteCatalog;
use photo_catalog_jobs::jobs::{JobController, JobRegistry};
use photo_catalog_jobs::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Parallel job execution core for a photo/video catalog.
#[derive(Parser, Debug)]
#[command(name = "photo-catalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the catalog database (defaults to a per-user data directory).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create (or update) a catalog rooted at one or more directories.
    Init {
        #[arg(long)]
        name: String,
        #[arg(long = "dir", required = true)]
        directories: Vec<PathBuf>,
    },
    /// List known catalogs.
    Catalogs,
    /// Submit a job against a catalog.
    Submit {
        /// One of: scan, detect_duplicates, detect_bursts,
        /// generate_thumbnails, score_quality, auto_tag.
        job_type: String,
        #[arg(long)]
        catalog: String,
        /// Repeatable `key=value` job parameter (value parsed as JSON,
        /// falling back to a plain string).
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// Block and print progress until the job reaches a terminal state.
        #[arg(long)]
        watch: bool,
    },
    /// Show one job's current status/progress/result.
    Status { job_id: String },
    /// List jobs, optionally filtered.
    Jobs {
        #[arg(long)]
        catalog: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Request cancellation of a running job.
    Cancel { job_id: String },
    /// List the duplicate groups currently recorded for a catalog.
    Duplicates { catalog: String },
    /// List the bursts currently recorded for a catalog.
    Bursts { catalog: String },
}

fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

fn default_db_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("photo-catalog").join("catalog.db")
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let term = Term::stderr();

    let catalog = Arc::new(SqliteCatalog::open(&db_path)?);

    match cli.command {
        Commands::Init { name, directories } => run_init(&term, &catalog, &name, &directories),
        Commands::Catalogs => run_catalogs(&term, &catalog),
        Commands::Submit { job_type, catalog: catalog_id, params, watch } => {
            run_submit(&term, catalog, &job_type, &catalog_id, params, watch)
        }
        Commands::Status { job_id } => run_status(&term, catalog, &job_id),
        Commands::Jobs { catalog: catalog_id, status } => run_jobs(&term, &catalog, catalog_id.as_deref(), status.as_deref()),
        Commands::Cancel { job_id } => run_cancel(&term, catalog, &job_id),
        Commands::Duplicates { catalog: catalog_id } => run_duplicates(&term, &catalog, &catalog_id),
        Commands::Bursts { catalog: catalog_id } => run_bursts(&term, &catalog, &catalog_id),
    }
}

fn run_init(term: &Term, catalog: &SqliteCatalog, name: &str, directories: &[PathBuf]) -> Result<()> {
    let dirs: Vec<String> = directories.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    let id = Uuid::new_v4().to_string();
    let created = catalog.create_catalog(&id, name, &dirs)?;

    term.write_line(&format!(
        "{} catalog {} ({})",
        style("created").green().bold(),
        style(&created.name).cyan(),
        created.id
    ))
    .ok();
    for dir in &created.source_directories {
        term.write_line(&format!("  {} {}", style("source:").dim(), dir)).ok();
    }
    Ok(())
}

fn run_catalogs(term: &Term, catalog: &SqliteCatalog) -> Result<()> {
    let catalogs = catalog.list_catalogs()?;
    if catalogs.is_empty() {
        term.write_line(&style("no catalogs yet — run `init` first").dim().to_string()).ok();
        return Ok(());
    }
    for c in catalogs {
        term.write_line(&format!("{}  {}  ({} source dirs)", c.id, style(&c.name).cyan(), c.source_directories.len())).ok();
    }
    Ok(())
}

fn run_submit(
    term: &Term,
    catalog: Arc<SqliteCatalog>,
    job_type: &str,
    catalog_id: &str,
    params: Vec<(String, Value)>,
    watch: bool,
) -> Result<()> {
    let registry = Arc::new(JobRegistry::with_builtin_jobs());
    let controller = JobController::new(catalog, registry);

    let parameters = Value::Object(params.into_iter().collect());
    let job_id = controller.submit(job_type, Some(catalog_id.to_string()), parameters)?;
    term.write_line(&format!("{} job {} ({})", style("submitted").green().bold(), style(job_type).cyan(), job_id)).ok();

    if watch {
        watch_job(term, &controller, &job_id)?;
    }
    Ok(())
}

fn watch_job(term: &Term, controller: &JobController, job_id: &str) -> Result<()> {
    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );

    loop {
        let job = controller.get(job_id)?.ok_or_else(|| {
            photo_catalog_jobs::PhotoCatalogError::Job(photo_catalog_jobs::error::JobError::NotFound { job_id: job_id.to_string() })
        })?;

        let history = controller.progress_history(job_id);
        if let Some(latest) = history.last() {
            progress_bar.set_length(latest.items_total as u64);
            progress_bar.set_position(latest.items_processed as u64);
            let eta = latest.eta_seconds.map(|s| format!("eta {s:.0}s")).unwrap_or_default();
            progress_bar.set_message(format!("{} {}", job.status, eta));
        }

        if job.status.is_terminal() {
            progress_bar.finish_and_clear();
            print_job(term, &job);
            break;
        }
        std::thread::sleep(Duration::from_millis(150));
    }
    Ok(())
}

fn run_status(term: &Term, catalog: Arc<SqliteCatalog>, job_id: &str) -> Result<()> {
    let registry = Arc::new(JobRegistry::with_builtin_jobs());
    let controller = JobController::new(catalog, registry);
    let job = controller
        .get(job_id)?
        .ok_or_else(|| photo_catalog_jobs::PhotoCatalogError::Job(photo_catalog_jobs::error::JobError::NotFound { job_id: job_id.to_string() }))?;
    print_job(term, &job);
    Ok(())
}

fn print_job(term: &Term, job: &photo_catalog_jobs::catalog::model::Job) {
    let status_style = match job.status {
        JobStatus::Success => style(job.status.to_string()).green(),
        JobStatus::Failed => style(job.status.to_string()).red(),
        JobStatus::Cancelled => style(job.status.to_string()).yellow(),
        _ => style(job.status.to_string()).cyan(),
    };
    term.write_line(&format!("{}  {}  {}", job.id, style(&job.job_type).bold(), status_style)).ok();
    if let Some(error) = &job.error {
        term.write_line(&format!("  {} {}", style("error:").red(), error)).ok();
    }
    if let Some(result) = &job.result {
        term.write_line(&format!("  {} {}", style("result:").dim(), result)).ok();
    }
}

fn run_jobs(term: &Term, catalog: &SqliteCatalog, catalog_id: Option<&str>, status: Option<&str>) -> Result<()> {
    let status = status.map(|s| s.parse::<JobStatus>()).transpose().map_err(|e| {
        photo_catalog_jobs::PhotoCatalogError::Config(format!("invalid status filter: {e}"))
    })?;
    let jobs = catalog.list_jobs(catalog_id, status)?;
    if jobs.is_empty() {
        term.write_line(&style("no jobs match").dim().to_string()).ok();
        return Ok(());
    }
    for job in jobs {
        print_job(term, &job);
    }
    Ok(())
}

fn run_cancel(term: &Term, catalog: Arc<SqliteCatalog>, job_id: &str) -> Result<()> {
    let registry = Arc::new(JobRegistry::with_builtin_jobs());
    let controller = JobController::new(catalog, registry);
    controller.cancel(job_id)?;
    term.write_line(&format!("{} {}", style("cancellation requested for").yellow(), job_id)).ok();
    Ok(())
}

fn run_duplicates(term: &Term, catalog: &SqliteCatalog, catalog_id: &str) -> Result<()> {
    let groups = catalog.list_duplicate_groups(catalog_id)?;
    if groups.is_empty() {
        term.write_line(&format!("{}", style("no duplicate groups recorded").dim())).ok();
        return Ok(());
    }
    for (i, group) in groups.iter().enumerate() {
        term.write_line(&format!(
            "{} {} ({} members, confidence {})",
            style(format!("Group {}:", i + 1)).bold(),
            style(format!("{}", group.similarity_type)).yellow(),
            group.members.len(),
            group.confidence
        ))
        .ok();
        for member in &group.members {
            let marker = if member.image_id == group.primary_image_id { style("★").green().to_string() } else { style("○").dim().to_string() };
            term.write_line(&format!("    {} {} (score {})", marker, member.image_id, member.similarity_score)).ok();
        }
    }
    Ok(())
}

fn run_bursts(term: &Term, catalog: &SqliteCatalog, catalog_id: &str) -> Result<()> {
    let bursts = catalog.list_bursts(catalog_id)?;
    if bursts.is_empty() {
        term.write_line(&format!("{}", style("no bursts recorded").dim())).ok();
        return Ok(());
    }
    for (i, burst) in bursts.iter().enumerate() {
        term.write_line(&format!(
            "{} {} images, {:.1}s, camera {}",
            style(format!("Burst {}:", i + 1)).bold(),
            burst.image_count,
            burst.duration_seconds,
            burst.camera_make.clone().unwrap_or_else(|| "unknown".to_string())
        ))
        .ok();
        if let Some(best) = &burst.best_image_id {
            term.write_line(&format!("    {} {} ({:?})", style("best:").green(), best, burst.selection_method)).ok();
        }
    }
    Ok(())
}
