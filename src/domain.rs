use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::access::{Capability, Role, is_allowed};

#[derive(Debug, Error)]
pub enum SiftError {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
}

#[derive(Debug, Clone, Setters)]
pub struct SiftConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub role: Role,
    /// Field paths the global search looks at.
    pub global_search_fields: Vec<String>,
    #[setters(strip_option)]
    pub state_file: Option<PathBuf>,
    /// Directory `w` writes export files to.
    #[setters(into)]
    pub export_dir: PathBuf,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            role: Role::default(),
            global_search_fields: Vec::new(),
            state_file: None,
            export_dir: PathBuf::from("."),
        }
    }
}

/// Which line the command input is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CMDMode {
    ColumnFilter(String),
    GlobalSearch,
}

#[derive(Debug, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    CycleSort,
    EditFilter,
    EditSearch,
    ClearFilter,
    ClearAll,
    CopyCell,
    CopyRecord,
    Export,
    Enter,
    Exit,
    Help,
    Resize(usize, usize),
    PointerDown(u16, u16),
    RawKey(KeyEvent),
}

impl Message {
    /// Capabilities a role needs before the message is acted on.
    pub fn required(&self) -> &'static [Capability] {
        match self {
            Message::CycleSort
            | Message::EditFilter
            | Message::EditSearch
            | Message::ClearFilter
            | Message::ClearAll => &[Capability::FilterRecords],
            Message::CopyCell | Message::CopyRecord => &[Capability::CopyRecords],
            Message::Export => &[Capability::ExportRecords],
            Message::Enter => &[Capability::ViewRecords],
            _ => &[],
        }
    }
}

const HELP_ENTRIES: &[(&str, &str, &[Capability])] = &[
    ("hjkl / arrows", "move the cursor", &[]),
    ("PgUp / PgDn", "page up / down", &[]),
    ("g / G", "first / last row", &[]),
    ("s", "cycle sort on the column", &[Capability::FilterRecords]),
    ("f", "filter the column", &[Capability::FilterRecords]),
    ("/", "global search", &[Capability::FilterRecords]),
    ("c", "clear the column filter", &[Capability::FilterRecords]),
    ("C", "clear all filters and search", &[Capability::FilterRecords]),
    ("Enter", "show the record", &[Capability::ViewRecords]),
    ("y", "copy the cell", &[Capability::CopyRecords]),
    ("Y", "copy the record as json", &[Capability::CopyRecords]),
    ("w", "export the view as json", &[Capability::ExportRecords]),
    ("Esc", "back / close", &[]),
    ("?", "this help", &[]),
    ("q", "quit", &[]),
];

/// Help text listing only what `role` may do.
pub fn help_text(role: Role) -> String {
    let mut lines = vec![format!("sift, role: {role}"), String::new()];
    for (keys, what, required) in HELP_ENTRIES {
        if is_allowed(role, required) {
            lines.push(format!("{keys:<14} {what}"));
        }
    }
    lines.join("\n")
}
