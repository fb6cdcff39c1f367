//! CLI command implementations

use crate::output::{format_bytes, print_output, print_report};
use crate::{ConfigAction, ModeArg, OutputFormat};
use anyhow::{anyhow, bail, Context, Result};
use console::style;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use steadyget_core::{
    default_config_path, load_config, load_or_default, multipart_etag, save_config, Scheduler,
};
use steadyget_types::{EngineConfig, ProgressMode};
use tracing::{debug, info};

/// Exit status after a forced second Ctrl-C (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// One entry of a tasks file
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    pub url: String,
    pub destination: PathBuf,
    #[serde(default)]
    pub label: Option<String>,
}

impl TaskEntry {
    /// The label, or the destination's file name when none was given
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| {
            self.destination
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.url.clone())
        })
    }
}

impl From<ModeArg> for ProgressMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Aggregated => ProgressMode::Aggregated,
            ModeArg::Messages => ProgressMode::Messages,
            ModeArg::Silent => ProgressMode::Silent,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// An explicit options file must load; the default location may be absent
async fn load_options(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_config(path)
            .await
            .with_context(|| format!("Failed to load options from {}", path.display())),
        None => Ok(load_or_default(&default_config_path()).await),
    }
}

/// Options file plus command-line overrides
pub async fn resolve_config(
    path: Option<&Path>,
    workers: Option<usize>,
    mode: Option<ModeArg>,
) -> Result<EngineConfig> {
    let mut config = load_options(path).await?;

    if let Some(workers) = workers {
        config.worker_count = workers;
    }
    if let Some(mode) = mode {
        config.progress_mode = mode.into();
    }

    config.check().map_err(|e| anyhow!("Invalid options: {}", e))?;
    debug!("Effective options: {:?}", config);
    Ok(config)
}

pub async fn config_action(
    path: Option<&Path>,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> Result<()> {
    let target = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = load_options(path).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Human | OutputFormat::Table => {
                    println!("{} {}", style("Options file:").bold(), target.display());
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
            }
        }

        ConfigAction::Init { force } => {
            if target.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    target.display()
                );
            }
            save_config(&target, &EngineConfig::default()).await?;
            println!(
                "{} Wrote default options to {}",
                style("✓").green().bold(),
                target.display()
            );
        }

        ConfigAction::Path => println!("{}", target.display()),
    }

    Ok(())
}

// ============================================================================
// Download Commands
// ============================================================================

pub async fn load_tasks(path: &Path) -> Result<Vec<TaskEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read tasks file {}", path.display()))?;
    let tasks: Vec<TaskEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse tasks file {}", path.display()))?;
    Ok(tasks)
}

/// Drop tasks whose destination is already on disk
pub fn skip_existing(tasks: Vec<TaskEntry>) -> (Vec<TaskEntry>, usize) {
    let before = tasks.len();
    let remaining: Vec<TaskEntry> = tasks
        .into_iter()
        .filter(|task| !task.destination.exists())
        .collect();
    let skipped = before - remaining.len();
    (remaining, skipped)
}

pub async fn run_tasks(
    config: EngineConfig,
    tasks_file: &Path,
    skip: bool,
    format: OutputFormat,
) -> Result<bool> {
    let mut tasks = load_tasks(tasks_file).await?;

    if skip {
        let (remaining, skipped) = skip_existing(tasks);
        if skipped > 0 {
            info!("Skipping {} task(s) with existing destinations", skipped);
            if matches!(format, OutputFormat::Human) {
                println!("{} Skipped {} existing file(s)", style("·").dim(), skipped);
            }
        }
        tasks = remaining;
    }

    run_entries(config, tasks, format).await
}

pub async fn get_url(
    config: EngineConfig,
    url: &str,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool> {
    let destination = match output {
        Some(path) => path,
        None => PathBuf::from(file_name_from_url(url)?),
    };

    let entry = TaskEntry {
        url: url.to_string(),
        destination: destination.clone(),
        label: None,
    };
    let all_done = run_entries(config, vec![entry], format).await?;

    if all_done && matches!(format, OutputFormat::Human) {
        let size = tokio::fs::metadata(&destination).await?.len();
        println!(
            "{} Saved {} ({})",
            style("✓").green().bold(),
            style(destination.display()).cyan(),
            format_bytes(size)
        );
    }

    Ok(all_done)
}

async fn run_entries(
    config: EngineConfig,
    tasks: Vec<TaskEntry>,
    format: OutputFormat,
) -> Result<bool> {
    let labels: Vec<String> = tasks.iter().map(TaskEntry::display_label).collect();
    let entries = tasks
        .into_iter()
        .zip(labels.iter().cloned())
        .map(|(task, label)| (task.url, task.destination, label));

    let scheduler = Scheduler::from_entries(entries, config);

    let cancel = scheduler.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!(
            "{}",
            style("Please wait for running downloads to finish...").yellow()
        );
        cancel.cancel();

        // A second interrupt gives up on the running downloads
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", style("Interrupted, partial downloads left behind").red());
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let outcomes = scheduler.run().await;
    interrupt.abort();
    let outcomes = outcomes?;

    print_report(&labels, &outcomes, format)
}

/// Last non-empty path segment of `url`
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|_| anyhow!("Invalid URL: {}", url))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a file name from {}, use --output", url))
}

// ============================================================================
// Checksums
// ============================================================================

#[derive(serde::Serialize)]
struct EtagReport {
    file: PathBuf,
    chunk_size: usize,
    etag: String,
}

impl std::fmt::Display for EtagReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  {}", self.etag, self.file.display())
    }
}

pub async fn print_etag(
    config_path: Option<&Path>,
    file: &Path,
    chunk_size: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let chunk_size = match chunk_size {
        Some(size) => size,
        None => load_options(config_path).await?.validator_chunk_size,
    };

    let path = file.to_path_buf();
    let etag = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let mut reader = std::io::BufReader::new(std::fs::File::open(&path)?);
        multipart_etag(&mut reader, chunk_size)
    })
    .await?
    .with_context(|| format!("Failed to hash {}", file.display()))?;

    print_output(
        &EtagReport {
            file: file.to_path_buf(),
            chunk_size,
            etag,
        },
        format,
    )
}
