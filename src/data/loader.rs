//! Spreadsheet and CSV readers producing typed tables.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::{table::parse_timestamp, DataError, Scalar, Table};

/// Read `<dir>/<stem>.xlsx`, falling back to `<dir>/<stem>.csv`.
pub fn read_table(dir: &Path, stem: &str) -> Result<Table, DataError> {
    let xlsx = dir.join(format!("{}.xlsx", stem));
    let csv = dir.join(format!("{}.csv", stem));
    let table = if xlsx.exists() {
        read_excel(&xlsx)?
    } else if csv.exists() {
        read_csv(&csv)?
    } else {
        return Err(DataError::NotFound { path: xlsx });
    };
    tracing::debug!(table = stem, rows = table.len(), "loaded table");
    Ok(table)
}

/// First worksheet, first row as header.
pub fn read_excel(path: &Path) -> Result<Table, DataError> {
    let excel_err = |e: calamine::Error| DataError::Excel {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut workbook = open_workbook_auto(path).map_err(excel_err)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DataError::NoWorksheet { path: path.to_path_buf() })?;
    let range = workbook.worksheet_range(&sheet).map_err(excel_err)?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|row| row.iter().map(|c| excel_cell(c).to_string()).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<Scalar>> = rows_iter
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();

    Ok(normalize_integral_columns(Table::new(headers, rows)))
}

pub fn read_csv(path: &Path) -> Result<Table, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(infer_cell).collect());
    }
    Ok(normalize_integral_columns(Table::new(headers, rows)))
}

fn excel_cell(cell: &Data) -> Scalar {
    match cell {
        Data::Empty | Data::Error(_) => Scalar::Null,
        Data::String(s) => {
            if s.trim().is_empty() {
                Scalar::Null
            } else {
                Scalar::Str(s.clone())
            }
        }
        Data::Int(i) => Scalar::Int(*i),
        Data::Float(f) => Scalar::Float(*f),
        Data::Bool(b) => Scalar::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map(Scalar::Timestamp).unwrap_or(Scalar::Null),
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(Scalar::Timestamp)
            .unwrap_or_else(|| Scalar::Str(s.clone())),
        Data::DurationIso(s) => Scalar::Str(s.clone()),
    }
}

/// Text cells: empty and NaN-ish markers become null, numbers are parsed,
/// everything else stays a string. Dates are coerced per column later.
pub(crate) fn infer_cell(raw: &str) -> Scalar {
    let trimmed = raw.trim();
    if trimmed.is_empty() || matches!(trimmed, "NaN" | "nan" | "NULL" | "null" | "None" | "NaT") {
        return Scalar::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Scalar::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Scalar::Float(f);
        }
    }
    match trimmed {
        "True" | "true" | "TRUE" => Scalar::Bool(true),
        "False" | "false" | "FALSE" => Scalar::Bool(false),
        _ => Scalar::Str(trimmed.to_string()),
    }
}

/// Spreadsheets store every number as a float. A column whose cells are all
/// present and integral is narrowed to integers.
fn normalize_integral_columns(table: Table) -> Table {
    let columns = table.columns().to_vec();
    let mut rows = table.rows().to_vec();
    for idx in 0..columns.len() {
        let integral = !rows.is_empty()
            && rows.iter().all(|r| match &r[idx] {
                Scalar::Int(_) => true,
                Scalar::Float(f) => f.fract() == 0.0 && f.abs() < 9.0e15,
                _ => false,
            });
        if integral {
            for row in rows.iter_mut() {
                if let Scalar::Float(f) = row[idx] {
                    row[idx] = Scalar::Int(f as i64);
                }
            }
        }
    }
    Table::new(columns, rows)
}

/// Coerce a column to timestamps; nulls stay null.
pub fn coerce_timestamps(table: &mut Table, table_name: &str, column: &str) -> Result<(), DataError> {
    table.try_map_column(column, |cell| match cell {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Timestamp(ts) => Ok(Scalar::Timestamp(*ts)),
        Scalar::Str(s) => parse_timestamp(s).map(Scalar::Timestamp).ok_or_else(|| {
            DataError::InvalidTimestamp {
                table: table_name.to_string(),
                column: column.to_string(),
                value: s.clone(),
            }
        }),
        other => Err(DataError::InvalidTimestamp {
            table: table_name.to_string(),
            column: column.to_string(),
            value: other.to_string(),
        }),
    })
}
