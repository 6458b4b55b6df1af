//! Export of projected rows.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, info};

use crate::domain::{ListError, Result};
use crate::table::ContactRow;

/// A flat record with named fields, in a fixed order.
pub trait ExportRow {
    fn field_names(&self) -> Vec<&'static str>;
    fn field_values(&self) -> Vec<String>;
}

impl ExportRow for ContactRow {
    fn field_names(&self) -> Vec<&'static str> {
        vec!["id", "nom", "prenom", "age", "address", "action"]
    }

    fn field_values(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.nom.clone(),
            self.prenom.clone(),
            self.age.clone(),
            self.address.clone(),
            self.action.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    Delimited(char),
    Parquet,
    Arrow,
}

fn detect_file_type(path: &Path, delimiter: char) -> Result<FileType> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") | Some("TXT") => Ok(FileType::Delimited(delimiter)),
        Some("TSV") => Ok(FileType::Delimited('\t')),
        Some("PARQUET") | Some("PQ") => Ok(FileType::Parquet),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::Arrow),
        _ => Err(ListError::UnknownFileType(path.display().to_string())),
    }
}

fn wrap_cell_content(cell: &str, delimiter: char) -> String {
    let needs_wrapping = cell
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r');
    if needs_wrapping {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Header line from the field names of the first row, then one line per row.
pub fn to_delimited_text<R: ExportRow>(rows: &[R], delimiter: char) -> Result<String> {
    let first = rows.first().ok_or(ListError::EmptyExport)?;
    let separator = delimiter.to_string();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(first.field_names().join(&separator));
    lines.extend(rows.iter().map(|row| format_row(row, delimiter)));
    Ok(lines.join("\n"))
}

/// One row as a delimited line, without header.
pub fn format_row<R: ExportRow>(row: &R, delimiter: char) -> String {
    row.field_values()
        .iter()
        .map(|v| wrap_cell_content(v, delimiter))
        .collect::<Vec<String>>()
        .join(&delimiter.to_string())
}

fn to_dataframe<R: ExportRow>(rows: &[R]) -> Result<DataFrame> {
    let first = rows.first().ok_or(ListError::EmptyExport)?;
    let values: Vec<Vec<String>> = rows.iter().map(|r| r.field_values()).collect();
    let columns = first
        .field_names()
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let data: Vec<String> = values
                .iter()
                .map(|v| v.get(idx).cloned().unwrap_or_default())
                .collect();
            polars::prelude::Column::new(name.into(), data)
        })
        .collect::<Vec<_>>();
    Ok(DataFrame::new(columns)?)
}

/// Write `rows` to `path`; the format follows the file extension.
pub fn write_file<R: ExportRow>(rows: &[R], path: &str, delimiter: char) -> Result<PathBuf> {
    if rows.is_empty() {
        return Err(ListError::EmptyExport);
    }
    let expanded = shellexpand::full(path).map_err(|e| ListError::InvalidConfig(e.to_string()))?;
    let path = PathBuf::from(expanded.into_owned());
    let file_type = detect_file_type(&path, delimiter)?;
    let start_time = Instant::now();
    debug!("Exporting {} rows to {} as {:?}", rows.len(), path.display(), file_type);

    match file_type {
        FileType::Delimited(delimiter) => {
            let text = to_delimited_text(rows, delimiter)?;
            std::fs::write(&path, text)?;
        }
        FileType::Parquet => {
            let mut df = to_dataframe(rows)?;
            let mut file = File::create(&path)?;
            ParquetWriter::new(&mut file).finish(&mut df)?;
        }
        FileType::Arrow => {
            let mut df = to_dataframe(rows)?;
            let mut file = File::create(&path)?;
            IpcWriter::new(&mut file).finish(&mut df)?;
        }
    }

    info!(
        "Exported {} rows to {} in {}ms",
        rows.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(path)
}
