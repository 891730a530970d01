//! Reading records and column configuration from disk, and writing views back.

use chrono::DateTime;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::column::{ColumnFilterConfig, FilterKind};
use crate::domain::SiftError;
use crate::record::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    JSON,
    NDJSON,
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, SiftError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| SiftError::InvalidArgument(format!("cannot expand '{path}': {e}")))
}

pub fn load_records(path: &Path) -> Result<Vec<Record>, SiftError> {
    let file_info = get_file_info(path)?;
    let start_time = Instant::now();

    let records = match file_info.file_type {
        FileType::JSON => parse_json(&fs::read_to_string(&file_info.path)?)?,
        FileType::NDJSON => parse_ndjson(&fs::read_to_string(&file_info.path)?)?,
        FileType::CSV => frame_to_records(load_csv(&file_info.path)?.collect()?)?,
        FileType::PARQUET => frame_to_records(load_parquet(&file_info.path)?.collect()?)?,
        FileType::ARROW => frame_to_records(load_arrow(&file_info.path)?.collect()?)?,
    };

    info!(
        "Loaded {} records ({} bytes, {:?}) in {}ms",
        records.len(),
        file_info.file_size,
        file_info.file_type,
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

/// Accepts a list of objects, a paginated `{"results": [...]}` envelope, or a
/// single object.
pub fn parse_json(text: &str) -> Result<Vec<Record>, SiftError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("results") {
            Some(serde_json::Value::Array(items)) => {
                debug!("Unwrapped paginated response with {} results", items.len());
                items
            }
            Some(other) => {
                map.insert("results".to_string(), other);
                vec![serde_json::Value::Object(map)]
            }
            None => vec![serde_json::Value::Object(map)],
        },
        other => vec![other],
    };
    items.into_iter().map(Record::try_from).collect()
}

pub fn parse_ndjson(text: &str) -> Result<Vec<Record>, SiftError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let value: serde_json::Value = serde_json::from_str(line)?;
            Record::try_from(value).map_err(|e| match e {
                SiftError::InvalidRecord(msg) => {
                    SiftError::InvalidRecord(format!("line {}: {msg}", idx + 1))
                }
                other => other,
            })
        })
        .collect()
}

pub fn load_columns(path: &Path) -> Result<Vec<ColumnFilterConfig>, SiftError> {
    let text = fs::read_to_string(path).map_err(map_io_error)?;
    let columns: Vec<ColumnFilterConfig> = serde_json::from_str(&text)?;
    debug!("Loaded {} column configurations", columns.len());
    Ok(columns)
}

/// One plain column per top-level key, in first-seen order.
pub fn infer_columns(records: &[Record]) -> Vec<ColumnFilterConfig> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.clone()) {
                columns.push(ColumnFilterConfig::new(key.clone(), FilterKind::None));
            }
        }
    }
    columns
}

pub fn write_ndjson<W: Write>(mut writer: W, records: &[&Record]) -> Result<(), SiftError> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_json(path: &Path, records: &[&Record]) -> Result<(), SiftError> {
    let writer = BufWriter::new(File::create(path).map_err(map_io_error)?);
    serde_json::to_writer_pretty(writer, records)?;
    info!("Exported {} records to {}", records.len(), path.display());
    Ok(())
}

fn map_io_error(e: std::io::Error) -> SiftError {
    match e.kind() {
        ErrorKind::NotFound => SiftError::FileNotFound,
        ErrorKind::PermissionDenied => SiftError::PermissionDenied,
        _ => SiftError::IoError(e),
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, SiftError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("JSON") => Ok(FileType::JSON),
        Some("NDJSON") | Some("JSONL") => Ok(FileType::NDJSON),
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(SiftError::UnknownFileType),
    }
}

fn get_file_info(path: &Path) -> Result<FileInfo, SiftError> {
    let metadata = fs::metadata(path).map_err(map_io_error)?;
    if !metadata.is_file() {
        return Err(SiftError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
        file_type: detect_file_type(path)?,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_try_parse_dates(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

/// Convert a frame into records. Each column is converted on its own rayon
/// task, then the values are zipped into rows.
fn frame_to_records(df: DataFrame) -> Result<Vec<Record>, SiftError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let columns: Result<Vec<Vec<Value>>, PolarsError> = names
        .par_iter()
        .map(|name| column_values(&df, name))
        .collect();
    let columns = columns?;

    let mut records = vec![Record::new(); df.height()];
    for (name, values) in names.iter().zip(columns) {
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.clone(), value);
        }
    }
    Ok(records)
}

fn is_integer_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
    )
}

fn is_float_type(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64 | DataType::UInt64)
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(name)?;
    let dtype = column.dtype().clone();

    let values = if is_integer_type(&dtype) {
        let col = column.cast(&DataType::Int64)?;
        col.i64()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect()
    } else if is_float_type(&dtype) {
        let col = column.cast(&DataType::Float64)?;
        col.f64()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect()
    } else if dtype == DataType::Boolean {
        column
            .bool()?
            .into_iter()
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
            .collect()
    } else if dtype == DataType::Date {
        // Days since the epoch
        let col = column.cast(&DataType::Int32)?;
        col.i32()?
            .into_iter()
            .map(|v| {
                v.and_then(|days| DateTime::from_timestamp(days as i64 * 86_400, 0))
                    .map(Value::Date)
                    .unwrap_or(Value::Null)
            })
            .collect()
    } else if let DataType::Datetime(unit, _) = &dtype {
        let unit = *unit;
        let col = column.cast(&DataType::Int64)?;
        col.i64()?
            .into_iter()
            .map(|v| {
                v.map(|raw| match unit {
                    TimeUnit::Nanoseconds => raw / 1_000_000,
                    TimeUnit::Microseconds => raw / 1_000,
                    TimeUnit::Milliseconds => raw,
                })
                .and_then(DateTime::from_timestamp_millis)
                .map(Value::Date)
                .unwrap_or(Value::Null)
            })
            .collect()
    } else {
        let col = column.cast(&DataType::String)?;
        col.str()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect()
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn temp_with(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn unwraps_paginated_results() {
        let records = parse_json(
            r#"{"count": 2, "next": null, "previous": null,
                "results": [{"id": 1}, {"id": 2}]}"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text("id"), "2");
    }

    #[test]
    fn single_object_is_one_record() {
        let records = parse_json(r#"{"id": 1, "results": "none"}"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("results"), "none");
    }

    #[test]
    fn rejects_non_object_records() {
        assert!(matches!(
            parse_json("[1, 2]"),
            Err(SiftError::InvalidRecord(_))
        ));
        let err = parse_ndjson("{\"id\": 1}\n\n\"text\"\n").unwrap_err();
        match err {
            SiftError::InvalidRecord(msg) => assert!(msg.starts_with("line 3")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn loads_ndjson_file() {
        let file = temp_with(".ndjson", "{\"id\": 1}\n{\"id\": 2}\n");
        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn loads_csv_through_polars() {
        let file = temp_with(".csv", "id,name,score,active\n1,Bravo,2.5,true\n2,alpha,,false\n");
        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&Value::from(1i64)));
        assert_eq!(records[0].text("name"), "Bravo");
        assert_eq!(records[0].get("score").and_then(Value::as_f64), Some(2.5));
        assert_eq!(records[1].get("score"), Some(&Value::Null));
        assert_eq!(records[1].get("active"), Some(&Value::Bool(false)));
    }

    #[test]
    fn unknown_extension_and_missing_file() {
        let file = temp_with(".xyz", "");
        assert!(matches!(load_records(file.path()), Err(SiftError::UnknownFileType)));
        assert!(matches!(
            load_records(Path::new("/definitely/not/here.json")),
            Err(SiftError::FileNotFound)
        ));
    }

    #[test]
    fn infers_columns_in_first_seen_order() {
        let records = parse_json(r#"[{"b": 1, "a": 2}, {"c": 3, "a": 4}]"#).unwrap();
        let keys: Vec<String> = infer_columns(&records).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn csv_columns_keep_header_order() {
        let file = temp_with(".csv", "title,status,id\nx,open,1\n");
        let records = load_records(file.path()).unwrap();
        let keys: Vec<String> = infer_columns(&records).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["title", "status", "id"]);

        let mut out = Vec::new();
        write_ndjson(&mut out, &[&records[0]]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"title\":\"x\",\"status\":\"open\",\"id\":1}\n"
        );
    }

    #[test]
    fn loads_column_file() {
        let file = temp_with(".json", r#"[{"key": "status", "type": "list"}]"#);
        let columns = load_columns(file.path()).unwrap();
        assert_eq!(columns[0].kind, FilterKind::EnumeratedList);
    }

    #[test]
    fn writes_ndjson_and_export() {
        let records = parse_json(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        let view: Vec<&Record> = records.iter().rev().collect();

        let mut out = Vec::new();
        write_ndjson(&mut out, &view).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"id\":2}\n{\"id\":1}\n");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        export_json(&path, &view).unwrap();
        let back = parse_json(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back[0].text("id"), "2");
    }
}
