use serde::Serialize;
use thiserror::Error;

use pocketbook_core::{CategoryItem, IdGenerator, Transaction, TransactionType};

use crate::candidate::{partition, FailedRow, ValidItem};
use crate::classify::{ColumnClassifier, ColumnMapping, ColumnRole};
use crate::config::{ConfigError, ImportConfig};
use crate::date::{parse_strict, preview, propose_secondary, DateFormat, DatePreview};
use crate::grouper::{apply_groups, GroupedTransaction, PatternGrouper};
use crate::ingest::{ingest, BackupPayload, IngestError, IngestedFile, RawTable};
use crate::machine::{transition, Event, Guards, Step};
use crate::resolver::CategoryResolver;
use crate::rules::CategoryNamer;

/// Receives the result of a finalized import, exactly once per run.
pub trait ImportSink {
    fn apply(&mut self, transactions: Vec<Transaction>, clear_existing: bool, new_categories: Vec<CategoryItem>);
}

/// Performs the destructive restore of a full backup.
pub trait RestoreSink {
    fn restore(&mut self, backup: BackupPayload);
}

impl<T: ImportSink + ?Sized> ImportSink for &mut T {
    fn apply(&mut self, transactions: Vec<Transaction>, clear_existing: bool, new_categories: Vec<CategoryItem>) {
        (**self).apply(transactions, clear_existing, new_categories)
    }
}

impl<T: RestoreSink + ?Sized> RestoreSink for &mut T {
    fn restore(&mut self, backup: BackupPayload) {
        (**self).restore(backup)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    #[default]
    Append,
    Replace,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Not available in the {actual} step")]
    WrongStep { actual: Step },
    #[error("Column {0} is outside the table")]
    ColumnOutOfRange(usize),
    #[error("No group at index {0}")]
    UnknownGroup(usize),
    #[error("{0} is already the primary date format")]
    SecondaryIsPrimary(DateFormat),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub income: usize,
    pub expense: usize,
    pub blank_rows: usize,
    /// Rows whose date failed under both the primary and the secondary format.
    pub dropped_after_correction: usize,
    pub categories_touched: usize,
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    At(Step),
    Finalized(ImportSummary),
    Restored,
}

impl Progress {
    /// The step the session rests in afterwards.
    pub fn step(&self) -> Step {
        match self {
            Progress::At(step) => *step,
            Progress::Finalized(_) | Progress::Restored => Step::Upload,
        }
    }
}

/// Everything that belongs to one run and is thrown away on finish or cancel.
#[derive(Debug, Default)]
struct RunState {
    table: Option<RawTable>,
    backup: Option<BackupPayload>,
    mode: ImportMode,
    mapping: Option<ColumnMapping>,
    has_header: bool,
    primary_format: DateFormat,
    valid: Vec<ValidItem>,
    failed: Vec<FailedRow>,
    blank: usize,
    secondary_format: Option<DateFormat>,
    dropped_after_correction: usize,
    groups: Vec<GroupedTransaction>,
}

/// Drives one operator through an import: upload, optional append/replace
/// decision, column mapping, optional date correction, optional group
/// review, and finally a single hand-off to the [`ImportSink`].
pub struct ImportSession<G, S, R> {
    config: ImportConfig,
    namer: CategoryNamer,
    existing: Vec<CategoryItem>,
    has_existing_transactions: bool,
    ids: G,
    sink: S,
    restore: R,
    step: Step,
    run: RunState,
}

impl<G: IdGenerator, S: ImportSink, R: RestoreSink> ImportSession<G, S, R> {
    pub fn new(config: ImportConfig, ids: G, sink: S, restore: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let namer = CategoryNamer::from_config(&config)?;
        Ok(Self {
            config,
            namer,
            existing: Vec::new(),
            has_existing_transactions: false,
            ids,
            sink,
            restore,
            step: Step::Upload,
            run: RunState::default(),
        })
    }

    /// Categories already stored at the destination. Read, never modified.
    pub fn with_existing_categories(mut self, categories: Vec<CategoryItem>) -> Self {
        self.existing = categories;
        self
    }

    /// When set, a loaded file first asks whether to append or replace.
    pub fn with_existing_transactions(mut self, has_existing: bool) -> Self {
        self.has_existing_transactions = has_existing;
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn existing_categories(&self) -> &[CategoryItem] {
        &self.existing
    }

    // ── Upload ────────────────────────────────────────────────────────────────

    /// Reads a whole file. Dialog-level errors leave the session on `Upload`.
    pub fn load_file(&mut self, file_name: &str, data: &[u8]) -> Result<Step, SessionError> {
        self.expect_step(Step::Upload)?;
        let file = match ingest(file_name, data, &self.config) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(file = file_name, error = %e, "file rejected");
                return Err(e.into());
            }
        };

        let backup = matches!(file, IngestedFile::Backup(_));
        match file {
            IngestedFile::Backup(payload) => self.run.backup = Some(payload),
            IngestedFile::Table(table) => {
                self.run.has_header = table.has_header;
                self.run.primary_format = self.config.primary_format;
                self.run.mapping =
                    Some(ColumnClassifier::new(&self.config).classify(&table, table.has_header));
                self.run.table = Some(table);
            }
        }
        let guards = Guards {
            has_existing_transactions: self.has_existing_transactions,
            ..Guards::default()
        };
        self.advance(Event::FileLoaded { backup }, guards)
    }

    // ── Decision ──────────────────────────────────────────────────────────────

    /// Recorded now, applied only when the run is finalized.
    pub fn choose_mode(&mut self, mode: ImportMode) -> Result<Step, SessionError> {
        self.expect_step(Step::Decision)?;
        self.run.mode = mode;
        self.advance(Event::ModeChosen, Guards::default())
    }

    pub fn mode(&self) -> ImportMode {
        self.run.mode
    }

    // ── Map ───────────────────────────────────────────────────────────────────

    pub fn table(&self) -> Option<&RawTable> {
        self.run.table.as_ref()
    }

    pub fn mapping(&self) -> Option<&ColumnMapping> {
        self.run.mapping.as_ref()
    }

    pub fn has_header(&self) -> bool {
        self.run.has_header
    }

    pub fn primary_format(&self) -> DateFormat {
        self.run.primary_format
    }

    pub fn set_role(&mut self, column: usize, role: ColumnRole) -> Result<(), SessionError> {
        self.expect_step(Step::Map)?;
        let mapping = self.run.mapping.as_mut().ok_or(SessionError::WrongStep { actual: self.step })?;
        if mapping.set(column, role) {
            Ok(())
        } else {
            Err(SessionError::ColumnOutOfRange(column))
        }
    }

    pub fn set_has_header(&mut self, has_header: bool) -> Result<(), SessionError> {
        self.expect_step(Step::Map)?;
        self.run.has_header = has_header;
        Ok(())
    }

    pub fn set_primary_format(&mut self, format: DateFormat) -> Result<(), SessionError> {
        self.expect_step(Step::Map)?;
        self.run.primary_format = format;
        Ok(())
    }

    /// Replaces the current mapping with a fresh suggestion.
    pub fn reclassify(&mut self) -> Result<&ColumnMapping, SessionError> {
        self.expect_step(Step::Map)?;
        let table = self.run.table.as_ref().ok_or(SessionError::WrongStep { actual: self.step })?;
        let mapping = ColumnClassifier::new(&self.config).classify(table, self.run.has_header);
        Ok(self.run.mapping.insert(mapping))
    }

    /// Reads every row through the mapping and the primary date format.
    pub fn confirm_mapping(&mut self) -> Result<Progress, SessionError> {
        self.expect_step(Step::Map)?;
        let (Some(table), Some(mapping)) = (self.run.table.as_ref(), self.run.mapping.as_ref()) else {
            return Err(SessionError::WrongStep { actual: self.step });
        };
        let first_data_row = usize::from(self.run.has_header);
        let parts = partition(&table.rows, first_data_row, mapping, self.run.primary_format, &self.namer);
        tracing::info!(
            valid = parts.valid.len(),
            failed = parts.failed.len(),
            blank = parts.blank,
            format = %self.run.primary_format,
            "rows parsed"
        );

        self.run.valid = parts.valid;
        self.run.failed = parts.failed;
        self.run.blank = parts.blank;
        self.run.groups = if self.run.failed.is_empty() {
            PatternGrouper::new(&self.config).detect(&self.run.valid)
        } else {
            Vec::new()
        };
        if !self.run.failed.is_empty() {
            self.run.secondary_format = Some(propose_secondary(self.run.primary_format, &self.run.failed));
        }

        let guards = Guards {
            has_failures: !self.run.failed.is_empty(),
            has_groups: !self.run.groups.is_empty(),
            ..Guards::default()
        };
        let next = self.advance(Event::MappingConfirmed, guards)?;
        self.settle(next)
    }

    pub fn valid_items(&self) -> &[ValidItem] {
        &self.run.valid
    }

    // ── Date correction ───────────────────────────────────────────────────────

    pub fn failed_rows(&self) -> &[FailedRow] {
        &self.run.failed
    }

    /// The alternative format suggested for the failed rows.
    pub fn proposed_format(&self) -> Option<DateFormat> {
        if self.run.failed.is_empty() {
            return None;
        }
        Some(propose_secondary(self.run.primary_format, &self.run.failed))
    }

    pub fn secondary_format(&self) -> Option<DateFormat> {
        self.run.secondary_format
    }

    pub fn select_secondary_format(&mut self, format: DateFormat) -> Result<Vec<DatePreview>, SessionError> {
        self.expect_step(Step::DateCorrection)?;
        if format == self.run.primary_format {
            return Err(SessionError::SecondaryIsPrimary(format));
        }
        self.run.secondary_format = Some(format);
        Ok(self.correction_preview())
    }

    /// The first few failed rows re-read under the selected secondary format.
    pub fn correction_preview(&self) -> Vec<DatePreview> {
        match self.run.secondary_format {
            Some(format) => preview(&self.run.failed, format, self.config.preview_rows),
            None => Vec::new(),
        }
    }

    /// The single retry. Rows that still fail are dropped for good.
    pub fn apply_correction(&mut self) -> Result<Progress, SessionError> {
        self.expect_step(Step::DateCorrection)?;
        let format = self
            .run
            .secondary_format
            .unwrap_or_else(|| propose_secondary(self.run.primary_format, &self.run.failed));

        let mut dropped = 0;
        for row in std::mem::take(&mut self.run.failed) {
            match parse_strict(&row.candidate.date_str, format) {
                Some(date) => self.run.valid.push(ValidItem::new(row.candidate, date, &self.namer)),
                None => dropped += 1,
            }
        }
        self.run.valid.sort_by_key(|item| item.source_row());
        self.run.dropped_after_correction = dropped;
        if dropped > 0 {
            tracing::warn!(dropped, %format, "rows still unreadable after date correction were dropped");
        }

        self.run.groups = PatternGrouper::new(&self.config).detect(&self.run.valid);
        let guards = Guards {
            has_groups: !self.run.groups.is_empty(),
            ..Guards::default()
        };
        let next = self.advance(Event::CorrectionApplied, guards)?;
        self.settle(next)
    }

    // ── Group review ──────────────────────────────────────────────────────────

    pub fn groups(&self) -> &[GroupedTransaction] {
        &self.run.groups
    }

    pub fn set_group_enabled(&mut self, index: usize, enabled: bool) -> Result<(), SessionError> {
        self.group_mut(index)?.enabled = enabled;
        Ok(())
    }

    pub fn set_group_category(
        &mut self,
        index: usize,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<(), SessionError> {
        let group = self.group_mut(index)?;
        group.proposed_category_name = category.trim().to_string();
        group.proposed_subcategory_name = subcategory.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(())
    }

    /// Applies enabled groups and finalizes.
    pub fn confirm_groups(&mut self) -> Result<Progress, SessionError> {
        self.expect_step(Step::Group)?;
        let moved = apply_groups(&mut self.run.valid, &self.run.groups);
        tracing::debug!(moved, "group assignments applied");
        let next = self.advance(Event::GroupsConfirmed, Guards::default())?;
        self.settle(next)
    }

    // ── Backup ────────────────────────────────────────────────────────────────

    pub fn backup(&self) -> Option<&BackupPayload> {
        self.run.backup.as_ref()
    }

    pub fn confirm_restore(&mut self) -> Result<Progress, SessionError> {
        self.expect_step(Step::BackupConfirm)?;
        let next = self.advance(Event::RestoreConfirmed, Guards::default())?;
        if let Some(payload) = std::mem::take(&mut self.run).backup {
            tracing::info!(
                transactions = payload.transactions.len(),
                categories = payload.categories.len(),
                "restoring backup"
            );
            self.restore.restore(payload);
        }
        self.step = Step::Upload;
        debug_assert_eq!(next, Step::Restored);
        Ok(Progress::Restored)
    }

    // ── Cancel ────────────────────────────────────────────────────────────────

    /// Drops everything from the current run. Nothing is emitted.
    pub fn cancel(&mut self) -> Step {
        if transition(self.step, Event::Cancel, Guards::default()).is_some() {
            tracing::debug!(from = %self.step, "import cancelled");
        }
        self.run = RunState::default();
        self.step = Step::Upload;
        self.step
    }

    // ── internals ─────────────────────────────────────────────────────────────

    fn expect_step(&self, expected: Step) -> Result<(), SessionError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(SessionError::WrongStep { actual: self.step })
        }
    }

    fn group_mut(&mut self, index: usize) -> Result<&mut GroupedTransaction, SessionError> {
        self.expect_step(Step::Group)?;
        self.run.groups.get_mut(index).ok_or(SessionError::UnknownGroup(index))
    }

    fn advance(&mut self, event: Event, guards: Guards) -> Result<Step, SessionError> {
        let next = transition(self.step, event, guards).ok_or(SessionError::WrongStep { actual: self.step })?;
        tracing::debug!(from = %self.step, to = %next, ?event, "import step");
        self.step = next;
        Ok(next)
    }

    /// A run with nothing left to import is never emitted, even in replace
    /// mode; the session goes back to `Upload` as for an empty file.
    fn settle(&mut self, next: Step) -> Result<Progress, SessionError> {
        match next {
            Step::Finalized if self.run.valid.is_empty() => {
                tracing::warn!(
                    blank = self.run.blank,
                    dropped = self.run.dropped_after_correction,
                    replace = self.run.mode == ImportMode::Replace,
                    "no usable rows, nothing imported"
                );
                self.run = RunState::default();
                self.step = Step::Upload;
                Err(IngestError::EmptyFile.into())
            }
            Step::Finalized => Ok(Progress::Finalized(self.finalize())),
            other => Ok(Progress::At(other)),
        }
    }

    /// Materializes categories, builds transactions, emits once, resets.
    fn finalize(&mut self) -> ImportSummary {
        let run = std::mem::take(&mut self.run);
        let mut resolver = CategoryResolver::new(&self.existing, &self.config);
        let mut transactions = Vec::with_capacity(run.valid.len());

        for item in &run.valid {
            let category_id = resolver.resolve(&item.category_name, item.kind, &mut self.ids).id.clone();
            let subcategory_id = item.subcategory_name.as_deref().and_then(|sub| {
                resolver
                    .resolve_subcategory(&item.category_name, item.kind, sub, &mut self.ids)
                    .map(|s| s.id.clone())
            });
            transactions.push(Transaction {
                id: self.ids.next_id(),
                date: item.date,
                amount: item.amount,
                description: item.candidate.description.clone(),
                kind: item.kind,
                category_id,
                subcategory_id,
            });
        }
        let deltas = resolver.into_deltas();

        let summary = ImportSummary {
            imported: transactions.len(),
            income: transactions.iter().filter(|t| t.kind == TransactionType::Income).count(),
            expense: transactions.iter().filter(|t| t.kind == TransactionType::Expense).count(),
            blank_rows: run.blank,
            dropped_after_correction: run.dropped_after_correction,
            categories_touched: deltas.len(),
            replaced: run.mode == ImportMode::Replace,
        };
        tracing::info!(
            imported = summary.imported,
            categories = summary.categories_touched,
            replace = summary.replaced,
            dropped = summary.dropped_after_correction,
            "import finalized"
        );

        self.sink.apply(transactions, summary.replaced, deltas);
        self.step = Step::Upload;
        summary
    }
}
