use crate::error::{InsightsError, Result};
use crate::normalize::normalize_row;
use crate::schema::{Month, Row};
use crate::store::{original_key, sales_key, KeyValueStore};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDateTime, Timelike};
use encoding_rs::WINDOWS_1252;
use log::{debug, info};
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Minimum number of normalized columns the first row must carry.
pub const MIN_COLUMNS: usize = 3;

const BLANK_HEADER: &str = "__EMPTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xlsm,
    Xlsb,
    Xls,
    Ods,
    Csv,
}

impl SheetFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" => Ok(SheetFormat::Xlsx),
            "xlsm" => Ok(SheetFormat::Xlsm),
            "xlsb" => Ok(SheetFormat::Xlsb),
            "xls" => Ok(SheetFormat::Xls),
            "ods" => Ok(SheetFormat::Ods),
            "csv" | "txt" => Ok(SheetFormat::Csv),
            _ => Err(InsightsError::UnsupportedFormat(file_name.to_string())),
        }
    }

    pub fn is_delimited(self) -> bool {
        matches!(self, SheetFormat::Csv)
    }
}

/// Outcome of a successful upload, reported back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub month: Month,
    pub rows: usize,
    pub columns: usize,
}

/// Reads the first sheet of a spreadsheet into rows keyed by the header row.
///
/// Empty cells are left out of a row, fully blank rows are skipped. Blank header
/// cells become `__EMPTY`, `__EMPTY_1`, ... and repeated headers get a numeric
/// suffix so no column is lost before normalization.
pub fn read_sheet(format: SheetFormat, bytes: &[u8]) -> Result<Vec<Row>> {
    let grid = if format.is_delimited() {
        read_delimited_grid(bytes)?
    } else {
        read_workbook_grid(bytes)?
    };

    let mut lines = grid.into_iter();
    let Some(header_cells) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers = header_names(&header_cells);

    let rows: Vec<Row> = lines
        .filter_map(|cells| {
            let row: Row = headers
                .iter()
                .zip(cells)
                .filter_map(|(header, cell)| cell.map(|value| (header.clone(), value)))
                .collect();
            (!row.is_empty()).then_some(row)
        })
        .collect();

    debug!(
        "Read {} rows across {} header columns ({:?})",
        rows.len(),
        headers.len(),
        format
    );
    Ok(rows)
}

/// Ingests one uploaded file into the slot for `month`.
///
/// Validation runs before anything is written: on error the store is left exactly
/// as it was. On success both the normalized and the original rows replace any
/// dataset previously stored for that month.
pub fn ingest<S: KeyValueStore + ?Sized>(
    store: &mut S,
    month: Month,
    file_name: &str,
    bytes: &[u8],
) -> Result<IngestionReport> {
    let format = SheetFormat::from_file_name(file_name)?;
    let raw_rows = read_sheet(format, bytes)?;

    let Some(first_raw) = raw_rows.first() else {
        return Err(InsightsError::EmptySheet);
    };

    let columns = normalize_row(first_raw).len();
    if columns < MIN_COLUMNS {
        return Err(InsightsError::InsufficientColumns {
            found: columns,
            required: MIN_COLUMNS,
        });
    }

    let normalized: Vec<Row> = raw_rows.iter().map(normalize_row).collect();

    store.set_many(vec![
        (sales_key(month), serde_json::to_string(&normalized)?),
        (original_key(month), serde_json::to_string(&raw_rows)?),
    ])?;

    info!(
        "Loaded {} rows with {} columns for {} from '{}'",
        normalized.len(),
        columns,
        month,
        file_name
    );

    Ok(IngestionReport {
        month,
        rows: normalized.len(),
        columns,
    })
}

pub fn ingest_path<S: KeyValueStore + ?Sized>(
    store: &mut S,
    month: Month,
    path: &Path,
) -> Result<IngestionReport> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| InsightsError::UnsupportedFormat(path.display().to_string()))?;
    let bytes = fs::read(path)?;
    ingest(store, month, file_name, &bytes)
}

/// Drops both stored row sets of one month.
pub fn clear_month<S: KeyValueStore + ?Sized>(store: &mut S, month: Month) -> Result<()> {
    store.remove(&sales_key(month))?;
    store.remove(&original_key(month))?;
    info!("Cleared data for {}", month);
    Ok(())
}

type Grid = Vec<Vec<Option<Value>>>;

fn read_workbook_grid(bytes: &[u8]) -> Result<Grid> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&sheet_name)?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => number_value(*f),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) if !dt.is_duration() => Some(Value::String(format_datetime(datetime))),
            _ => number_value(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

/// Integral floats are emitted as integers so `3` does not turn into `3.0`.
fn number_value(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some(Value::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number)
}

fn format_datetime(datetime: NaiveDateTime) -> String {
    if datetime.num_seconds_from_midnight() == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn read_delimited_grid(bytes: &[u8]) -> Result<Grid> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let delimiter = sniff_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        grid.push(
            record
                .iter()
                .map(|field| text_value(&decode_field(field)))
                .collect(),
        );
    }
    Ok(grid)
}

/// Fields that are not valid UTF-8 are read as Windows-1252, the encoding Excel
/// uses for CSV exports on Portuguese-locale Windows.
fn decode_field(field: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(field) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(field).0,
    }
}

/// Picks the separator that occurs most often in the first line.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, first_line.iter().filter(|b| **b == d).count()))
        .fold((b',', 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .0
}

fn text_value(field: &str) -> Option<Value> {
    if field.is_empty() {
        return None;
    }
    let trimmed = field.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return number_value(f);
        }
    }
    Some(Value::String(field.to_string()))
}

fn header_names(cells: &[Option<Value>]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    cells
        .iter()
        .map(|cell| {
            let base = match cell {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::String(_)) | None => BLANK_HEADER.to_string(),
                Some(other) => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}_{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}
