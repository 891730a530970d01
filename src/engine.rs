//! Turns a record collection plus filter, search and sort state into the
//! ordered subset that is displayed.
//!
//! Every function here is pure: inputs are borrowed immutably and a fresh
//! row mapping is returned on each call.

use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, trace};

use crate::column::{ColumnFilterConfig, FilterKind, find_column};
use crate::record::{Record, Value};
use crate::state::{FilterState, SortDirection, SortState, ViewState};

/// A filter entry that matched a configured column, with its lower-cased value.
struct ActiveFilter<'a> {
    column: &'a ColumnFilterConfig,
    raw: &'a str,
    needle: String,
}

/// Indices into `records` of the rows to display, in display order.
pub fn compute_rows(
    records: &[Record],
    columns: &[ColumnFilterConfig],
    filters: &FilterState,
    global_search: &str,
    global_search_fields: &[String],
    sort: &SortState,
) -> Vec<usize> {
    let start_time = Instant::now();

    // Whitespace-only search text searches for nothing.
    let search = Some(global_search.trim().to_lowercase()).filter(|s| !s.is_empty());

    let active: Vec<ActiveFilter> = filters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(key, value)| match find_column(columns, key) {
            Some(column) => Some(ActiveFilter {
                column,
                raw: value,
                needle: value.to_lowercase(),
            }),
            None => {
                trace!("Ignoring filter on unknown column {key}");
                None
            }
        })
        .collect();

    let mut rows: Vec<usize> = (0..records.len())
        .into_par_iter()
        .filter(|&idx| {
            let record = &records[idx];
            if let Some(needle) = &search
                && !matches_global(record, needle, global_search_fields)
            {
                return false;
            }
            active.iter().all(|f| matches_filter(record, f))
        })
        .collect();

    if let Some((key, direction)) = sort.active() {
        let path = find_column(columns, key)
            .map(ColumnFilterConfig::sort_path)
            .unwrap_or(key);
        rows.par_sort_by(|&a, &b| {
            let ord = compare_records(&records[a], &records[b], key, path);
            match direction {
                SortDirection::Descending => ord.reverse(),
                _ => ord,
            }
        });
    }

    debug!(
        "Computed view with {} of {} rows in {}ms",
        rows.len(),
        records.len(),
        start_time.elapsed().as_millis()
    );
    rows
}

/// The displayed records, borrowed from `records` in display order.
pub fn compute_view<'a>(
    records: &'a [Record],
    columns: &[ColumnFilterConfig],
    filters: &FilterState,
    global_search: &str,
    global_search_fields: &[String],
    sort: &SortState,
) -> Vec<&'a Record> {
    compute_rows(
        records,
        columns,
        filters,
        global_search,
        global_search_fields,
        sort,
    )
    .into_iter()
    .map(|idx| &records[idx])
    .collect()
}

/// Same as [`compute_rows`] with the state bundled as a [`ViewState`].
pub fn rows_for(
    records: &[Record],
    columns: &[ColumnFilterConfig],
    view: &ViewState,
    global_search_fields: &[String],
) -> Vec<usize> {
    compute_rows(
        records,
        columns,
        &view.filters,
        &view.global_search,
        global_search_fields,
        &view.sort,
    )
}

fn matches_global(record: &Record, needle: &str, fields: &[String]) -> bool {
    fields
        .iter()
        .any(|field| record.text(field).to_lowercase().contains(needle))
}

fn matches_filter(record: &Record, filter: &ActiveFilter) -> bool {
    let column = filter.column;
    let needle = filter.needle.as_str();
    match column.kind {
        FilterKind::Search => match &column.search_fields {
            Some(fields) if !fields.is_empty() => fields
                .iter()
                .any(|field| record.text(field).to_lowercase().starts_with(needle)),
            _ => record.text(&column.key).to_lowercase().starts_with(needle),
        },
        FilterKind::EnumeratedList => record.text(&column.key).to_lowercase() == needle,
        FilterKind::Date => {
            let day = record
                .resolve(&column.key)
                .map(Value::date_part)
                .unwrap_or_default();
            day == filter.raw.trim()
        }
        FilterKind::None | FilterKind::Other => {
            record.text(&column.key).to_lowercase().contains(needle)
        }
    }
}

fn compare_records(a: &Record, b: &Record, key: &str, path: &str) -> Ordering {
    let va = a.resolve(path);
    let vb = b.resolve(path);

    let dated = key.contains("date")
        || va.is_some_and(Value::is_date)
        || vb.is_some_and(Value::is_date);
    if dated {
        let ma = va.map(Value::epoch_millis).unwrap_or(0);
        let mb = vb.map(Value::epoch_millis).unwrap_or(0);
        return ma.cmp(&mb);
    }

    if let (Some(na), Some(nb)) = (va.and_then(Value::as_f64), vb.and_then(Value::as_f64)) {
        return na.partial_cmp(&nb).unwrap_or(Ordering::Equal);
    }

    let sa = va.map(Value::as_text).unwrap_or_default().to_lowercase();
    let sb = vb.map(Value::as_text).unwrap_or_default().to_lowercase();
    sa.cmp(&sb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn records(values: serde_json::Value) -> Vec<Record> {
        values
            .as_array()
            .unwrap()
            .iter()
            .cloned()
            .map(|v| Record::try_from(v).unwrap())
            .collect()
    }

    fn ids(view: &[&Record]) -> Vec<String> {
        view.iter().map(|r| r.text("id")).collect()
    }

    #[test]
    fn default_kind_is_substring() {
        let data = records(json!([{"id": 1, "title": "Scan batch"}, {"id": 2, "title": "Review"}]));
        let columns = vec![ColumnFilterConfig::new("title", FilterKind::None)];
        let filters = FilterState::new().with("title", "BATCH");
        let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn unknown_kind_behaves_like_default() {
        let data = records(json!([{"id": 1, "title": "Scan batch"}, {"id": 2, "title": "Review"}]));
        let columns = vec![ColumnFilterConfig::new("title", FilterKind::Other)];
        let filters = FilterState::new().with("title", "view");
        let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["2"]);
    }

    #[test]
    fn search_kind_uses_search_fields() {
        let data = records(json!([
            {"id": 1, "assignee": "x", "assigned_to_user_details": [{"first_name": "Ada"}]},
            {"id": 2, "assignee": "adam", "assigned_to_user_details": [{"first_name": "Bob"}]},
            {"id": 3, "assignee": "y", "assigned_to_user_details": []}
        ]));
        let columns = vec![
            ColumnFilterConfig::new("assignee", FilterKind::Search)
                .search_fields(vec!["assigned_to_user_details.0.first_name".to_string()]),
        ];
        let filters = FilterState::new().with("assignee", "ad");
        let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn enumerated_list_is_exact() {
        let data = records(json!([
            {"id": 1, "status": "In_Progress"},
            {"id": 2, "status": "in_progress_review"}
        ]));
        let columns = vec![ColumnFilterConfig::new("status", FilterKind::EnumeratedList)];
        let filters = FilterState::new().with("status", "in_progress");
        let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn date_filter_compares_the_day() {
        let data = records(json!([
            {"id": 1, "created_at": "2024-05-01T09:30:00Z"},
            {"id": 2, "created_at": "2024-05-02T00:00:00Z"},
            {"id": 3}
        ]));
        let columns = vec![ColumnFilterConfig::new("created_at", FilterKind::Date)];
        let filters = FilterState::new().with("created_at", "2024-05-01");
        let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn all_filters_must_pass() {
        let data = records(json!([
            {"id": 1, "status": "open", "priority": "high"},
            {"id": 2, "status": "open", "priority": "low"},
            {"id": 3, "status": "closed", "priority": "high"}
        ]));
        let columns = vec![
            ColumnFilterConfig::new("status", FilterKind::EnumeratedList),
            ColumnFilterConfig::new("priority", FilterKind::EnumeratedList),
        ];
        let filters = FilterState::new().with("status", "open").with("priority", "high");
        let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["1"]);
    }

    #[test]
    fn unknown_filter_keys_are_ignored() {
        let data = records(json!([{"id": 1, "status": "open"}, {"id": 2, "status": "closed"}]));
        let filters = FilterState::new().with("status", "open");
        let view = compute_view(&data, &[], &filters, "", &[], &SortState::default());
        assert_eq!(ids(&view), vec!["1", "2"]);
    }

    #[test]
    fn global_search_trims_and_ignores_case() {
        let data = records(json!([
            {"id": 1, "name": "Bravo", "notes": null},
            {"id": 2, "name": "alpha", "notes": "see BRAVO"},
            {"id": 3, "name": "charlie"}
        ]));
        let fields = vec!["name".to_string(), "notes".to_string()];
        let view = compute_view(&data, &[], &FilterState::new(), "  BRAvo ", &fields, &SortState::default());
        assert_eq!(ids(&view), vec!["1", "2"]);
    }

    #[test]
    fn numeric_sort() {
        let data = records(json!([{"id": 1, "n": 10}, {"id": 2, "n": 9}, {"id": 3, "n": 100}]));
        let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("n"));
        assert_eq!(ids(&view), vec!["2", "1", "3"]);
        let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::descending("n"));
        assert_eq!(ids(&view), vec!["3", "1", "2"]);
    }

    #[test]
    fn string_sort_ignores_case() {
        let data = records(json!([{"id": 1, "name": "bravo"}, {"id": 2, "name": "Alpha"}, {"id": 3, "name": "charlie"}]));
        let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("name"));
        assert_eq!(ids(&view), vec!["2", "1", "3"]);
    }

    #[test]
    fn sort_resolves_through_search_fields() {
        let data = records(json!([
            {"id": 1, "owner": {"name": "Zed"}},
            {"id": 2, "owner": {"name": "Amy"}}
        ]));
        let columns = vec![
            ColumnFilterConfig::new("owner", FilterKind::Search)
                .search_fields(vec!["owner.name".to_string()]),
        ];
        let view = compute_view(&data, &columns, &FilterState::new(), "", &[], &SortState::ascending("owner"));
        assert_eq!(ids(&view), vec!["2", "1"]);
    }

    #[test]
    fn native_dates_sort_chronologically() {
        let early = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        let late = chrono::DateTime::from_timestamp(2_000, 0).unwrap();
        let data = vec![
            Record::new().with("id", 1i64).with("seen", late),
            Record::new().with("id", 2i64).with("seen", early),
        ];
        let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("seen"));
        assert_eq!(ids(&view), vec!["2", "1"]);
    }

    #[test]
    fn descending_keeps_ties_in_order() {
        let data = records(json!([
            {"id": 1, "p": 1}, {"id": 2, "p": 2}, {"id": 3, "p": 1}, {"id": 4, "p": 2}
        ]));
        let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::descending("p"));
        assert_eq!(ids(&view), vec!["2", "4", "1", "3"]);
    }

    #[test]
    fn rows_for_uses_view_state() {
        let data = records(json!([{"id": 1, "name": "b"}, {"id": 2, "name": "a"}]));
        let view = ViewState {
            sort: SortState::ascending("name"),
            ..ViewState::default()
        };
        assert_eq!(rows_for(&data, &[], &view, &[]), vec![1, 0]);
    }
}
