//! Table readers: every input lands as an all-string DataFrame, then typed
//! decoding happens row by row in the owning module.

use std::path::Path;

use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::info;

use crate::error::TraceError;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: [&str; 4] = [
    DATETIME_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

/// Read a CSV or Excel table with every column as String.
///
/// `sheet` selects the worksheet for Excel files and is ignored for CSV.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<DataFrame, TraceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let df = match ext.as_str() {
        "csv" => read_csv_as_strings(path)?,
        "xlsx" | "xlsm" => read_sheet_as_strings(path, sheet)?,
        other => {
            return Err(TraceError::InvalidArgument(format!(
                "Unsupported table format '{other}' for {}",
                path.display()
            )))
        }
    };
    info!(path = %path.display(), rows = df.height(), "table loaded");
    Ok(df)
}

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, TraceError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Read one worksheet; the first row is the header.
pub fn read_sheet_as_strings(path: &Path, sheet: Option<&str>) -> Result<DataFrame, TraceError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| TraceError::InvalidData(format!("{} has no sheets", path.display())))?,
    };
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| {
            TraceError::InvalidData(format!("Sheet '{sheet_name}' in {} is empty", path.display()))
        })?
        .iter()
        .map(|cell| cell_to_string(cell).trim().to_string())
        .collect();

    let mut values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        for (j, column) in values.iter_mut().enumerate() {
            column.push(row.get(j).map(cell_to_string).unwrap_or_default());
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(values.iter())
        .map(|(name, vals)| Column::new(name.as_str().into(), vals))
        .collect();

    Ok(DataFrame::new(columns)?)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), TraceError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(TraceError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Borrow a String column, failing with the column name when absent.
pub fn str_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked, TraceError> {
    df.column(name)
        .map_err(|_| TraceError::ColumnNotFound(name.to_string()))?
        .str()
        .map_err(TraceError::from)
}

/// Trimmed cell text; blank cells are `None`.
pub fn cell<'a>(column: &'a StringChunked, row: usize) -> Option<&'a str> {
    column.get(row).map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_f64(raw: Option<&str>, column: &str, row: usize) -> Result<f64, TraceError> {
    let text = raw.ok_or_else(|| {
        TraceError::InvalidData(format!("Null {column} at row {row}"))
    })?;
    text.replace(',', "").parse::<f64>().map_err(|_| {
        TraceError::InvalidData(format!("Unparseable {column} '{text}' at row {row}"))
    })
}

pub fn parse_datetime(raw: Option<&str>, column: &str, row: usize) -> Result<NaiveDateTime, TraceError> {
    let text = raw.ok_or_else(|| {
        TraceError::InvalidData(format!("Null {column} at row {row}"))
    })?;
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TraceError::InvalidData(format!("Unparseable {column} '{text}' at row {row}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_datetime_layouts() {
        let expected = NaiveDate::from_ymd_opt(2018, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        for text in [
            "2018-03-01 08:30:00",
            "2018-03-01T08:30:00",
            "2018-03-01 08:30",
            "03/01/2018 08:30",
        ] {
            assert_eq!(parse_datetime(Some(text), "t", 0).unwrap(), expected);
        }
        assert_eq!(
            parse_datetime(Some("2018-03-01"), "t", 0).unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_datetime(Some("yesterday"), "t", 0).is_err());
        assert!(parse_datetime(None, "t", 0).is_err());
    }

    #[test]
    fn parses_numbers_with_thousands_separators() {
        assert_eq!(parse_f64(Some("1,250.5"), "q", 0).unwrap(), 1250.5);
        assert!(matches!(
            parse_f64(Some("lots"), "q", 3),
            Err(TraceError::InvalidData(msg)) if msg.contains("row 3")
        ));
    }

    #[test]
    fn csv_columns_arrive_as_trimmed_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, " a ,b\n1,x\n,y\n").unwrap();
        let df = read_table(&path, None).unwrap();
        require_columns(&df, &["a", "b"]).unwrap();
        let a = str_column(&df, "a").unwrap();
        assert_eq!(cell(a, 0), Some("1"));
        assert_eq!(cell(a, 1), None);
        assert!(matches!(
            require_columns(&df, &["c"]),
            Err(TraceError::MissingColumn(_))
        ));
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = read_table(Path::new("facilities.ods"), None).unwrap_err();
        assert!(matches!(err, TraceError::InvalidArgument(_)));
    }
}
