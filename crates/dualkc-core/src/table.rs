//! Schema-driven reading of delimited tables
//!
//! Wraps `csv::ReaderBuilder` with the policies the input files need: a
//! configurable delimiter, preamble header rows, case-insensitive header
//! resolution against a [`TableSchema`], and typed cell access with the
//! table and row named in every error.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::errors::{DualKcError, DualKcResult};
use crate::schema::TableSchema;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];

/// A fully read table with headers resolved to canonical keys.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    /// canonical key → column index; optional fields whose header was not
    /// found are absent.
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

/// Read and resolve a table from a file path.
pub fn read_table(path: &Path, schema: &TableSchema) -> DualKcResult<Table> {
    let file = File::open(path).map_err(|source| DualKcError::MissingInputFile {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(table = %schema.name, path = %path.display(), "reading table");
    read_table_from(file, schema)
}

/// Read and resolve a table from any reader (used by tests with in-memory
/// buffers).
pub fn read_table_from<R: Read>(reader: R, schema: &TableSchema) -> DualKcResult<Table> {
    let mut records = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(schema.delimiter as u8)
        .flexible(true)
        .from_reader(reader)
        .into_records();

    let mut names: Option<StringRecord> = None;
    for row in 1..=schema.header_rows {
        let record = match records.next() {
            Some(record) => record?,
            None => {
                return Err(DualKcError::Table {
                    table: schema.name.clone(),
                    row,
                    reason: "file ends inside the header block".to_string(),
                })
            }
        };
        if row == schema.names_row {
            names = Some(record);
        }
    }
    let names = names.ok_or_else(|| {
        DualKcError::Configuration(format!(
            "table '{}': names_row {} outside header block of {} rows",
            schema.name, schema.names_row, schema.header_rows
        ))
    })?;

    let mut columns = HashMap::new();
    for field in &schema.fields {
        let wanted = field.header.trim().to_lowercase();
        let found = names
            .iter()
            .position(|header| header.trim().to_lowercase() == wanted);
        match found {
            Some(idx) => {
                columns.insert(field.key.clone(), idx);
            }
            None if field.required => {
                return Err(DualKcError::MissingField {
                    field: field.key.clone(),
                    table: schema.name.clone(),
                });
            }
            None => {
                debug!(
                    table = %schema.name,
                    field = %field.key,
                    "optional column not present"
                );
            }
        }
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        // Tolerate blank trailing lines
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record);
    }

    Ok(Table {
        name: schema.name.clone(),
        columns,
        rows,
    })
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether an (optional) column was resolved.
    pub fn has_column(&self, key: &str) -> bool {
        self.columns.contains_key(key)
    }

    /// Raw cell value; `None` when the column is absent or the cell is empty.
    pub fn value(&self, row: usize, key: &str) -> Option<&str> {
        let idx = *self.columns.get(key)?;
        let cell = self.rows.get(row)?.get(idx)?.trim();
        if cell.is_empty() {
            None
        } else {
            Some(cell)
        }
    }

    /// Cell value that must be present.
    pub fn require(&self, row: usize, key: &str) -> DualKcResult<&str> {
        self.value(row, key).ok_or_else(|| DualKcError::Table {
            table: self.name.clone(),
            row,
            reason: format!("empty value for required field '{key}'"),
        })
    }

    /// Float cell; empty cells and `nan` markers come back as `None`.
    pub fn f64_at(&self, row: usize, key: &str) -> DualKcResult<Option<f64>> {
        let Some(cell) = self.value(row, key) else {
            return Ok(None);
        };
        if cell.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        cell.parse::<f64>().map(Some).map_err(|_| DualKcError::Table {
            table: self.name.clone(),
            row,
            reason: format!("'{cell}' is not a number for field '{key}'"),
        })
    }

    /// Float cell that must parse to a value.
    pub fn require_f64(&self, row: usize, key: &str) -> DualKcResult<f64> {
        self.f64_at(row, key)?.ok_or_else(|| DualKcError::Table {
            table: self.name.clone(),
            row,
            reason: format!("empty value for required field '{key}'"),
        })
    }

    /// Date cell, tried against the supported formats.
    pub fn date_at(&self, row: usize, key: &str) -> DualKcResult<Option<NaiveDate>> {
        let Some(cell) = self.value(row, key) else {
            return Ok(None);
        };
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
                return Ok(Some(date));
            }
        }
        Err(DualKcError::Table {
            table: self.name.clone(),
            row,
            reason: format!("'{cell}' is not a recognised date for field '{key}'"),
        })
    }
}
