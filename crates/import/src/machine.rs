use serde::Serialize;
use std::fmt;

/// Where an import run stands. `Finalized`, `Restored` and `Cancelled` are
/// actions rather than resting places: the session performs them and falls
/// back to `Upload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Upload,
    Decision,
    Map,
    DateCorrection,
    Group,
    BackupConfirm,
    Finalized,
    Restored,
    Cancelled,
}

impl Step {
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Finalized | Step::Restored | Step::Cancelled)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Upload => "upload",
            Step::Decision => "decision",
            Step::Map => "map",
            Step::DateCorrection => "date_correction",
            Step::Group => "group",
            Step::BackupConfirm => "backup_confirm",
            Step::Finalized => "finalized",
            Step::Restored => "restored",
            Step::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    FileLoaded { backup: bool },
    ModeChosen,
    MappingConfirmed,
    CorrectionApplied,
    GroupsConfirmed,
    RestoreConfirmed,
    Cancel,
}

/// Facts the transition depends on, computed by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Guards {
    pub has_existing_transactions: bool,
    pub has_failures: bool,
    pub has_groups: bool,
}

/// The whole step graph. `None` means the event is not accepted in `step`.
pub fn transition(step: Step, event: Event, guards: Guards) -> Option<Step> {
    use Event::*;
    use Step::*;

    if step.is_terminal() {
        return None;
    }
    let next = match (step, event) {
        (_, Cancel) => Cancelled,
        (Upload, FileLoaded { backup: true }) => BackupConfirm,
        (Upload, FileLoaded { backup: false }) if guards.has_existing_transactions => Decision,
        (Upload, FileLoaded { backup: false }) => Map,
        (Decision, ModeChosen) => Map,
        (Map, MappingConfirmed) if guards.has_failures => DateCorrection,
        (Map, MappingConfirmed) | (DateCorrection, CorrectionApplied) if guards.has_groups => Group,
        (Map, MappingConfirmed) | (DateCorrection, CorrectionApplied) => Finalized,
        (Group, GroupsConfirmed) => Finalized,
        (BackupConfirm, RestoreConfirmed) => Restored,
        _ => return None,
    };
    Some(next)
}
