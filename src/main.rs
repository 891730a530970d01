use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod inputter;
mod model;
mod ui;

use controller::{Controller, TerminalMouseCapture};
use model::{Model, Status};
use sift::access::Role;
use sift::column::ColumnFilterConfig;
use sift::domain::{SiftConfig, SiftError};
use sift::engine::compute_view;
use sift::loader::{expand_path, infer_columns, load_columns, load_records, write_ndjson};
use sift::record::Record;
use sift::state::{SortState, TableState, ViewState};
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(version, about = "A tui based record filter and sort viewer.")]
struct Args {
    /// Records to load (json, ndjson, csv, parquet, arrow)
    file: String,

    /// Json file with the column filter configuration
    #[arg(long)]
    columns: Option<String>,

    /// Initial global search text
    #[arg(long)]
    search: Option<String>,

    /// Field path searched by the global search, repeatable
    #[arg(long = "search-field")]
    search_fields: Vec<String>,

    /// Column filter as KEY=VALUE, repeatable
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Sort key, prefix with '-' for descending
    #[arg(long, allow_hyphen_values = true)]
    sort: Option<String>,

    #[arg(long, default_value = "annotator")]
    role: Role,

    /// Restore filter and sort state from this file and keep it updated
    #[arg(long)]
    state: Option<String>,

    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    export_dir: String,

    /// Print the filtered view as ndjson instead of starting the ui
    #[arg(long)]
    dump: bool,

    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,

    #[arg(long)]
    log_file: Option<String>,
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(log_file: Option<&str>) -> Result<(), SiftError> {
    let path = match log_file {
        Some(p) => expand_path(p)?,
        None => std::env::temp_dir().join("sift.log"),
    };
    let file = File::create(&path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), SiftError> {
    init_logging(args.log_file.as_deref())?;
    info!("Starting sift!");
    debug!("Arguments: {args:?}");

    let data_path = expand_path(&args.file)?;
    let records = load_records(&data_path)?;
    let columns = match &args.columns {
        Some(p) => load_columns(&expand_path(p)?)?,
        None => infer_columns(&records),
    };

    let search_fields = if args.search_fields.is_empty() {
        default_search_fields(&columns)
    } else {
        args.search_fields.clone()
    };

    let mut config = SiftConfig::default()
        .event_poll_time(args.event_poll_time)
        .max_column_width(args.max_column_width)
        .role(args.role)
        .global_search_fields(search_fields)
        .export_dir(expand_path(&args.export_dir)?);
    if let Some(p) = &args.state {
        config = config.state_file(expand_path(p)?);
    }

    let view = initial_view(&args, config.state_file.as_deref())?;

    if args.dump {
        return dump(&records, &columns, &view, &config);
    }

    let state = TableState::new(view)
        .on_filters_change(|filters| info!("Filters changed: {filters:?}"))
        .on_sort_change(|sort| info!("Sort changed: {sort}"));

    let name = data_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), SiftError> {
        let size = terminal.size()?;
        let mut model = Model::init(
            &config,
            name,
            records,
            columns,
            state,
            Box::new(TerminalMouseCapture),
            size.width as usize,
            size.height as usize,
        );
        let mut ui = TableUI::new();
        let controller = Controller::new(&config);

        while model.status != Status::QUITTING {
            terminal.draw(|f| ui.draw(&model, f))?;
            if let Some(message) = controller.handle_event(&model)? {
                model.update(Some(message))?;
            }
        }
        Ok(())
    })();
    ratatui::restore();
    result
}

/// Every column key plus the paths its search fields point at.
fn default_search_fields(columns: &[ColumnFilterConfig]) -> Vec<String> {
    let mut fields = Vec::new();
    for column in columns {
        if !fields.contains(&column.key) {
            fields.push(column.key.clone());
        }
        for field in column.search_fields.iter().flatten() {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
    }
    fields
}

/// Saved state first, command line arguments on top.
fn initial_view(args: &Args, state_file: Option<&Path>) -> Result<ViewState, SiftError> {
    let mut view = match state_file {
        Some(path) if path.exists() => {
            let view: ViewState = serde_json::from_str(&fs::read_to_string(path)?)?;
            info!("Restored view state from {}", path.display());
            view
        }
        _ => ViewState::default(),
    };
    for (key, value) in &args.filters {
        view.filters.set(key.as_str(), value.as_str());
    }
    if let Some(sort) = &args.sort {
        view.sort = SortState::parse(sort);
    }
    if let Some(search) = &args.search {
        view.global_search = search.clone();
    }
    Ok(view)
}

fn dump(
    records: &[Record],
    columns: &[ColumnFilterConfig],
    view: &ViewState,
    config: &SiftConfig,
) -> Result<(), SiftError> {
    let output = compute_view(
        records,
        columns,
        &view.filters,
        &view.global_search,
        &config.global_search_fields,
        &view.sort,
    );
    info!("Dumping {} of {} records", output.len(), records.len());
    write_ndjson(BufWriter::new(io::stdout().lock()), &output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sift::column::FilterKind;

    #[test]
    fn parses_cli() {
        let args = Args::try_parse_from([
            "sift",
            "tasks.json",
            "--filter",
            "status=open",
            "--filter",
            "title=a=b",
            "--sort",
            "-created_at",
            "--role",
            "viewer",
            "--dump",
        ])
        .unwrap();
        assert_eq!(
            args.filters,
            vec![
                ("status".to_string(), "open".to_string()),
                ("title".to_string(), "a=b".to_string())
            ]
        );
        assert_eq!(args.role, Role::Viewer);
        assert!(args.dump);

        let view = initial_view(&args, None).unwrap();
        assert_eq!(view.sort, SortState::descending("created_at"));
        assert_eq!(view.filters.get("title"), Some("a=b"));
    }

    #[test]
    fn rejects_bad_filters_and_roles() {
        assert!(Args::try_parse_from(["sift", "x.json", "--filter", "nokey"]).is_err());
        assert!(Args::try_parse_from(["sift", "x.json", "--role", "root"]).is_err());
    }

    #[test]
    fn restores_state_file_under_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"filters": {"status": "open"}, "sort": {"key": "name", "direction": "descending"}, "global_search": "scan"}"#,
        )
        .unwrap();

        let args = Args::try_parse_from(["sift", "x.json", "--search", "label"]).unwrap();
        let view = initial_view(&args, Some(&path)).unwrap();
        assert_eq!(view.filters.get("status"), Some("open"));
        assert_eq!(view.sort, SortState::descending("name"));
        assert_eq!(view.global_search, "label");
    }

    #[test]
    fn default_search_fields_include_nested_paths() {
        let columns = vec![
            ColumnFilterConfig::new("title", FilterKind::None),
            ColumnFilterConfig::new("assignee", FilterKind::Search)
                .search_fields(vec!["assigned_to_user_details.0.first_name".to_string()]),
        ];
        assert_eq!(
            default_search_fields(&columns),
            vec!["title", "assignee", "assigned_to_user_details.0.first_name"]
        );
    }
}
