use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

use sift::editor::{FilterEditor, NoCapture, Region};
use sift::loader::parse_json;
use sift::{
    ColumnFilterConfig, FilterKind, FilterState, Record, SortDirection, SortState, TableState,
    ViewState, clear_all, clear_column_filter, compute_view, set_sort,
};

fn records(values: serde_json::Value) -> Vec<Record> {
    parse_json(&values.to_string()).unwrap()
}

fn ids(view: &[&Record]) -> Vec<String> {
    view.iter().map(|r| r.text("id")).collect()
}

fn tasks() -> Vec<Record> {
    records(json!([
        {"id": 1, "status": "pending", "name": "Bravo"},
        {"id": 2, "status": "completed", "name": "alpha"}
    ]))
}

#[test]
fn no_state_keeps_order_and_membership() {
    let data = records(json!([{"id": 3}, {"id": 1}, {"id": 2}]));
    let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::default());
    assert_eq!(ids(&view), vec!["3", "1", "2"]);
}

#[test]
fn identical_arguments_give_identical_output() {
    let data = tasks();
    let columns = vec![ColumnFilterConfig::new("name", FilterKind::None)];
    let filters = FilterState::new().with("name", "a");
    let sort = SortState::descending("name");
    let first = compute_view(&data, &columns, &filters, "", &[], &sort);
    let second = compute_view(&data, &columns, &filters, "", &[], &sort);
    assert_eq!(first, second);
}

#[test]
fn enumerated_list_then_global_search() {
    let data = tasks();
    let columns: Vec<ColumnFilterConfig> =
        serde_json::from_value(json!([{"key": "status", "type": "enumerated-list"}])).unwrap();

    let filters = FilterState::new().with("status", "completed");
    let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
    assert_eq!(ids(&view), vec!["2"]);

    let fields = vec!["name".to_string()];
    let view = compute_view(
        &data,
        &columns,
        &FilterState::new(),
        "bra",
        &fields,
        &SortState::default(),
    );
    assert_eq!(ids(&view), vec!["1"]);
}

#[test]
fn search_kind_matches_prefix_only() {
    let data = records(json!([{"id": 1, "code": "abc"}, {"id": 2, "code": "xab"}]));
    let columns = vec![ColumnFilterConfig::new("code", FilterKind::Search)];
    let filters = FilterState::new().with("code", "ab");
    let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
    assert_eq!(ids(&view), vec!["1"]);

    // Global search over the same field is a substring match.
    let fields = vec!["code".to_string()];
    let view = compute_view(
        &data,
        &columns,
        &FilterState::new(),
        "ab",
        &fields,
        &SortState::default(),
    );
    assert_eq!(ids(&view), vec!["1", "2"]);
}

#[test]
fn whitespace_search_keeps_everything() {
    let data = tasks();
    let fields = vec!["name".to_string()];
    let no_fields: &[String] = &[];
    for search_fields in [fields.as_slice(), no_fields] {
        let view = compute_view(
            &data,
            &[],
            &FilterState::new(),
            "   ",
            search_fields,
            &SortState::default(),
        );
        assert_eq!(ids(&view), vec!["1", "2"]);
    }
}

#[test]
fn padded_search_text_is_trimmed() {
    let data = tasks();
    let fields = vec!["name".to_string()];
    let view = compute_view(&data, &[], &FilterState::new(), " ALP ", &fields, &SortState::default());
    assert_eq!(ids(&view), vec!["2"]);
}

#[test]
fn date_filter_on_native_dates() {
    let due = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
    let data = vec![
        Record::new().with("id", 1i64).with("due", due("2024-03-05T23:00:00Z")),
        Record::new().with("id", 2i64).with("due", due("2024-03-06T00:00:00Z")),
        Record::new().with("id", 3i64),
    ];
    let columns = vec![ColumnFilterConfig::new("due", FilterKind::Date)];
    let filters = FilterState::new().with("due", "2024-03-05");
    let view = compute_view(&data, &columns, &filters, "", &[], &SortState::default());
    assert_eq!(ids(&view), vec!["1"]);

    // Native dates sort chronologically even without "date" in the key.
    let view = compute_view(&data, &columns, &FilterState::new(), "", &[], &SortState::descending("due"));
    assert_eq!(ids(&view), vec!["2", "1", "3"]);
}

#[test]
fn missing_text_sorts_as_empty() {
    let data = records(json!([
        {"id": 1, "name": "bravo"},
        {"id": 2},
        {"id": 3, "name": "Alpha"},
        {"id": 4, "name": null}
    ]));
    let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("name"));
    assert_eq!(ids(&view), vec!["2", "4", "3", "1"]);
}

#[test]
fn unknown_filter_keys_are_ignored() {
    let data = tasks();
    let filters = FilterState::new().with("priority", "high");
    let view = compute_view(&data, &[], &filters, "", &[], &SortState::default());
    assert_eq!(ids(&view), vec!["1", "2"]);
}

#[test]
fn equal_keys_keep_relative_order() {
    let data = records(json!([
        {"id": 1, "group": "b"},
        {"id": 2, "group": "a"},
        {"id": 3, "group": "B"},
        {"id": 4, "group": "a"},
        {"id": 5, "group": "b"}
    ]));
    let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("group"));
    assert_eq!(ids(&view), vec!["2", "4", "1", "3", "5"]);

    let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::descending("group"));
    assert_eq!(ids(&view), vec!["1", "3", "5", "2", "4"]);
}

#[test]
fn date_keys_sort_chronologically_with_missing_first() {
    let data = records(json!([
        {"id": 1, "due_date": "2024-06-01T00:00:00Z"},
        {"id": 2},
        {"id": 3, "due_date": "2024-01-01T00:00:00Z"}
    ]));
    let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("due_date"));
    assert_eq!(ids(&view), vec!["2", "3", "1"]);
}

#[test]
fn numbers_sort_numerically() {
    let data = records(json!([{"id": 1, "n": 10}, {"id": 2, "n": 9}, {"id": 3, "n": 100}]));
    let view = compute_view(&data, &[], &FilterState::new(), "", &[], &SortState::ascending("n"));
    assert_eq!(ids(&view), vec!["2", "1", "3"]);
}

#[test]
fn sort_cycle_restarts_after_unsorted() {
    let mut sort = SortState::default();
    let mut seen = Vec::new();
    for _ in 0..4 {
        sort = set_sort(&sort, "k");
        seen.push(sort.direction);
    }
    assert_eq!(
        seen,
        vec![
            SortDirection::Ascending,
            SortDirection::Descending,
            SortDirection::None,
            SortDirection::Ascending
        ]
    );
    assert_eq!(set_sort(&SortState::descending("a"), "b"), SortState::ascending("b"));
}

#[test]
fn clearing_filters() {
    let filters = FilterState::new().with("a", "1").with("b", "2");
    assert_eq!(clear_column_filter(&filters, "a"), FilterState::new().with("b", "2"));
    let (filters, search) = clear_all(&filters, "text");
    assert!(filters.is_empty());
    assert_eq!(search, "");
}

#[test]
fn listeners_observe_changes() {
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let on_filters = Rc::clone(&seen);
    let on_sort = Rc::clone(&seen);
    let mut state = TableState::new(ViewState::default())
        .on_filters_change(move |f| on_filters.borrow_mut().push(format!("filters:{}", f.len())))
        .on_sort_change(move |s| on_sort.borrow_mut().push(format!("sort:{s}")));

    state.set_filter("status", "open");
    state.set_filter("status", "open");
    state.cycle_sort("name");
    state.clear_all();

    assert_eq!(
        *seen.borrow(),
        vec!["filters:1", "sort:name ▲", "filters:0"]
    );
}

#[test]
fn editor_dismissed_by_outside_pointer() {
    let mut editor = FilterEditor::new(NoCapture);
    editor.open("column:status");
    editor.register_region(Region::new(10, 5, 20, 3));

    assert!(!editor.pointer_down(12, 6));
    assert_eq!(editor.active(), Some("column:status"));

    editor.open("column:name");
    assert_eq!(editor.active(), Some("column:name"));
    editor.register_region(Region::new(10, 5, 20, 3));

    assert!(editor.pointer_down(0, 0));
    assert_eq!(editor.active(), None);
}
