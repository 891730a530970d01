//! Filter, search and sort engine for collections of loosely shaped records,
//! plus the loading and access pieces the `sift` viewer is built from.

pub mod access;
pub mod column;
pub mod domain;
pub mod editor;
pub mod engine;
pub mod loader;
pub mod record;
pub mod state;

pub use column::{ColumnFilterConfig, FilterKind};
pub use domain::{SiftConfig, SiftError};
pub use engine::{compute_rows, compute_view};
pub use record::{Record, Value};
pub use state::{
    FilterState, SortDirection, SortState, TableState, ViewState, clear_all, clear_column_filter,
    set_sort,
};
