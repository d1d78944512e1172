use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use pocketbook_core::{CategoryItem, Transaction, UuidIds};
use pocketbook_import::{
    ingest, BackupPayload, ColumnClassifier, ColumnRole, DateFormat, ImportConfig, ImportMode, ImportSession,
    ImportSink, ImportSummary, IngestedFile, Progress, RestoreSink, Step,
};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to a CSV or JSON file
    pub file: PathBuf,
    /// Categories already stored at the destination (JSON array)
    #[arg(long)]
    pub categories: Option<PathBuf>,
    /// The destination already holds transactions
    #[arg(long)]
    pub has_existing: bool,
    /// Replace existing transactions instead of appending
    #[arg(long)]
    pub replace: bool,
    /// Primary date format (ymd, dmy or mdy)
    #[arg(long = "date-format")]
    pub date_format: Option<DateFormat>,
    /// Format for rows the primary format cannot read. Defaults to the proposal.
    #[arg(long = "secondary-format")]
    pub secondary_format: Option<DateFormat>,
    /// Override a suggested column role, e.g. `--map 1=amount`
    #[arg(long = "map", value_parser = parse_role_override)]
    pub overrides: Vec<(usize, ColumnRole)>,
    /// Leave every detected group in the default category
    #[arg(long)]
    pub reject_groups: bool,
    /// Import rules (TOML). Defaults to the user config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Write the result here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

fn parse_role_override(s: &str) -> Result<(usize, ColumnRole), String> {
    let (col, role) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected COLUMN=ROLE, got '{s}'"))?;
    let col = col
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("Invalid column '{col}': {e}"))?;
    Ok((col, role.parse()?))
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportBatch {
    transactions: Vec<Transaction>,
    clear_existing: bool,
    new_categories: Vec<CategoryItem>,
}

#[derive(Default)]
struct BatchCollector {
    batch: Option<ImportBatch>,
}

impl ImportSink for BatchCollector {
    fn apply(&mut self, transactions: Vec<Transaction>, clear_existing: bool, new_categories: Vec<CategoryItem>) {
        self.batch = Some(ImportBatch {
            transactions,
            clear_existing,
            new_categories,
        });
    }
}

#[derive(Default)]
struct RestoreCollector {
    backup: Option<BackupPayload>,
}

impl RestoreSink for RestoreCollector {
    fn restore(&mut self, backup: BackupPayload) {
        self.backup = Some(backup);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportReport {
    #[serde(flatten)]
    batch: ImportBatch,
    summary: ImportSummary,
}

#[derive(Serialize)]
struct RestoreRequest {
    restore: BackupPayload,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn import(args: ImportArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref()).await?;
    if let Some(format) = args.date_format {
        config.primary_format = format;
    }
    let existing = match &args.categories {
        Some(path) => read_categories(path).await?,
        None => Vec::new(),
    };
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file_name = file_name(&args.file)?;

    let mut collector = BatchCollector::default();
    let mut restore = RestoreCollector::default();
    let mut session = ImportSession::new(config, UuidIds, &mut collector, &mut restore)?
        .with_existing_categories(existing)
        .with_existing_transactions(args.has_existing);

    let mut progress = Progress::At(session.load_file(&file_name, &data)?);
    let outcome = loop {
        progress = match progress {
            Progress::At(Step::Decision) => {
                let mode = if args.replace { ImportMode::Replace } else { ImportMode::Append };
                Progress::At(session.choose_mode(mode)?)
            }
            Progress::At(Step::Map) => {
                for &(col, role) in &args.overrides {
                    session.set_role(col, role)?;
                }
                session.confirm_mapping()?
            }
            Progress::At(Step::DateCorrection) => {
                if let Some(format) = args.secondary_format.or(session.proposed_format()) {
                    for p in session.select_secondary_format(format)? {
                        tracing::info!(row = p.source_row, raw = %p.raw, parsed = ?p.parsed, %format, "date correction preview");
                    }
                }
                session.apply_correction()?
            }
            Progress::At(Step::Group) => {
                for i in 0..session.groups().len() {
                    if args.reject_groups {
                        session.set_group_enabled(i, false)?;
                    }
                    let g = &session.groups()[i];
                    tracing::info!(signature = %g.signature, count = g.count(), enabled = g.enabled, "group");
                }
                session.confirm_groups()?
            }
            Progress::At(Step::BackupConfirm) => session.confirm_restore()?,
            Progress::At(step) => bail!("Import stopped in the {step} step"),
            done @ (Progress::Finalized(_) | Progress::Restored) => break done,
        };
    };
    drop(session);

    match outcome {
        Progress::Finalized(summary) => {
            let batch = collector.batch.context("Import finished without a batch")?;
            write_json(args.out.as_deref(), &ImportReport { batch, summary }).await
        }
        _ => {
            let backup = restore.backup.context("Restore finished without a backup")?;
            write_json(args.out.as_deref(), &RestoreRequest { restore: backup }).await
        }
    }
}

pub async fn classify(path: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config).await?;
    config.validate()?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match ingest(&file_name(path)?, &data, &config)? {
        IngestedFile::Backup(backup) => {
            println!(
                "Backup file: {} transactions, {} categories",
                backup.transactions.len(),
                backup.categories.len()
            );
        }
        IngestedFile::Table(table) => {
            let mapping = ColumnClassifier::new(&config).classify(&table, table.has_header);
            let sample = table.data_rows().first();
            println!(
                "{} rows, {} columns, header: {}",
                table.data_rows().len(),
                table.column_count(),
                if table.has_header { "yes" } else { "no" }
            );
            for (col, role) in mapping.roles().iter().enumerate() {
                let name = table.header().and_then(|h| h.get(col)).map_or("", String::as_str);
                let cell = sample.and_then(|r| r.get(col)).map_or("", String::as_str);
                println!("{col:>3}  {role:<12} {name:<20} {cell}");
            }
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a file path: {}", path.display()))
}

/// Explicit path, else `import.toml` in the user config dir, else defaults.
async fn load_config(path: Option<&Path>) -> Result<ImportConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(ImportConfig::default()),
        },
    };
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = ImportConfig::from_toml(&content)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), rules = config.rules.len(), "loaded import config");
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "pocketbook", "Pocketbook").map(|d| d.config_dir().join("import.toml"))
}

async fn read_categories(path: &Path) -> Result<Vec<CategoryItem>> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read categories {}", path.display()))?;
    serde_json::from_slice(&content).with_context(|| format!("Invalid categories file {}", path.display()))
}

async fn write_json<T: Serialize>(out: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote import result");
        }
        None => println!("{json}"),
    }
    Ok(())
}
