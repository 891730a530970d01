use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: Some(key.into()),
            direction,
        }
    }

    pub fn ascending(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Ascending)
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Descending)
    }

    /// The key and direction when the sort actually orders anything.
    pub fn active(&self) -> Option<(&str, SortDirection)> {
        match (&self.key, self.direction) {
            (Some(key), dir) if !key.is_empty() && dir != SortDirection::None => {
                Some((key.as_str(), dir))
            }
            _ => None,
        }
    }

    pub fn direction_for(&self, key: &str) -> SortDirection {
        match self.active() {
            Some((k, dir)) if k == key => dir,
            _ => SortDirection::None,
        }
    }

    /// Parse `key` or `-key`, the ordering notation of the REST backend.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(key) if !key.is_empty() => Self::descending(key),
            _ if spec.is_empty() => Self::default(),
            _ => Self::ascending(spec),
        }
    }
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.active() {
            Some((key, SortDirection::Ascending)) => write!(f, "{key} ▲"),
            Some((key, _)) => write!(f, "{key} ▼"),
            None => write!(f, "unsorted"),
        }
    }
}

/// Advance the sort cycle for `key`: ascending, descending, unsorted.
/// A key other than the active one always starts at ascending.
pub fn set_sort(current: &SortState, key: &str) -> SortState {
    let next = match current.active() {
        Some((k, SortDirection::Ascending)) if k == key => SortState::descending(key),
        Some((k, SortDirection::Descending)) if k == key => SortState::default(),
        _ => SortState::ascending(key),
    };
    trace!("Sort {current:?} + {key} => {next:?}");
    next
}

/// Column key to filter value. A key is either present with a non-empty value
/// or absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterState(BTreeMap<String, String>);

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Setting an empty value is the same as clearing the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn clear_column_filter(filters: &FilterState, key: &str) -> FilterState {
    let mut next = filters.clone();
    next.0.remove(key);
    next
}

pub fn clear_all(_filters: &FilterState, _global_search: &str) -> (FilterState, String) {
    (FilterState::new(), String::new())
}

/// Everything a consumer persists about one table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub filters: FilterState,
    pub sort: SortState,
    pub global_search: String,
}

pub type FiltersListener = Box<dyn FnMut(&FilterState)>;
pub type SortListener = Box<dyn FnMut(&SortState)>;

/// Filter, sort and search state for one mounted table, plus the optional
/// change listeners. Listeners only observe; they get shared references.
#[derive(Default)]
pub struct TableState {
    view: ViewState,
    on_filters: Option<FiltersListener>,
    on_sort: Option<SortListener>,
}

impl fmt::Debug for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableState")
            .field("view", &self.view)
            .field("on_filters", &self.on_filters.is_some())
            .field("on_sort", &self.on_sort.is_some())
            .finish()
    }
}

impl TableState {
    pub fn new(view: ViewState) -> Self {
        Self {
            view,
            on_filters: None,
            on_sort: None,
        }
    }

    pub fn on_filters_change(mut self, listener: impl FnMut(&FilterState) + 'static) -> Self {
        self.on_filters = Some(Box::new(listener));
        self
    }

    pub fn on_sort_change(mut self, listener: impl FnMut(&SortState) + 'static) -> Self {
        self.on_sort = Some(Box::new(listener));
        self
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn filters(&self) -> &FilterState {
        &self.view.filters
    }

    pub fn sort(&self) -> &SortState {
        &self.view.sort
    }

    pub fn global_search(&self) -> &str {
        &self.view.global_search
    }

    pub fn set_filter(&mut self, key: &str, value: &str) {
        let mut next = self.view.filters.clone();
        next.set(key, value);
        self.replace_filters(next);
    }

    pub fn clear_filter(&mut self, key: &str) {
        let next = clear_column_filter(&self.view.filters, key);
        self.replace_filters(next);
    }

    pub fn cycle_sort(&mut self, key: &str) {
        let next = set_sort(&self.view.sort, key);
        self.replace_sort(next);
    }

    pub fn set_global_search(&mut self, text: &str) {
        self.view.global_search = text.to_string();
    }

    pub fn clear_all(&mut self) {
        let (filters, search) = clear_all(&self.view.filters, &self.view.global_search);
        self.view.global_search = search;
        self.replace_filters(filters);
    }

    fn replace_filters(&mut self, next: FilterState) {
        if next == self.view.filters {
            return;
        }
        self.view.filters = next;
        if let Some(listener) = self.on_filters.as_mut() {
            listener(&self.view.filters);
        }
    }

    fn replace_sort(&mut self, next: SortState) {
        if next == self.view.sort {
            return;
        }
        self.view.sort = next;
        if let Some(listener) = self.on_sort.as_mut() {
            listener(&self.view.sort);
        }
    }
}
