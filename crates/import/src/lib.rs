pub mod candidate;
pub mod classify;
pub mod config;
pub mod csv;
pub mod date;
pub mod grouper;
pub mod ingest;
pub mod json;
pub mod machine;
pub mod resolver;
pub mod rules;
pub mod session;

pub use candidate::{parse_amount, partition, FailedRow, ParsedCandidate, Partition, ValidItem};
pub use classify::{ColumnClassifier, ColumnMapping, ColumnRole};
pub use config::{ConfigError, ImportConfig};
pub use date::{parse_strict, propose_secondary, DateFormat, DatePreview};
pub use grouper::{apply_groups, GroupedTransaction, PatternGrouper};
pub use ingest::{ingest, BackupPayload, FileKind, IngestError, IngestedFile, RawRow, RawTable};
pub use machine::{transition, Event, Guards, Step};
pub use resolver::CategoryResolver;
pub use rules::{CategoryNamer, KeywordRule, KeywordRuleEngine, MatchType};
pub use session::{ImportMode, ImportSession, ImportSink, ImportSummary, Progress, RestoreSink, SessionError};
