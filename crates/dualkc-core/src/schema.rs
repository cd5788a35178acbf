//! Schema descriptors for the delimited input tables
//!
//! Every input table is declared up front as a list of fields: the canonical
//! key the engine uses, the header the file is expected to carry, an optional
//! unit label, and whether the field is required. The reader in
//! [`crate::table`] resolves headers against a schema and reports
//! `MissingField` / `BadUnits` with both the field and the table named, so no
//! dynamic column discovery happens downstream.
//!
//! # Example
//!
//! ```
//! use dualkc_core::schema::{FieldSpec, TableSchema};
//!
//! let schema = TableSchema::new("weather daily")
//!     .with_delimiter(',')
//!     .with_field(FieldSpec::required("date", "Date", None))
//!     .with_field(FieldSpec::required("tmax", "TMax", Some("C")))
//!     .with_field(FieldSpec::optional("snow", "Snow", Some("mm")));
//! assert_eq!(schema.fields.len(), 3);
//! ```

use serde::{Deserialize, Serialize};

/// How an optional field's values were obtained.
///
/// `Provided` values came from the file, `Estimated` values were filled from
/// a proxy (e.g. Tdew from specific humidity), `Unused` fields were absent
/// and defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOrigin {
    Provided,
    Estimated,
    Unused,
}

/// Declaration of one column in a delimited input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Canonical key the engine refers to (e.g. `tmax`).
    pub key: String,
    /// Header expected in the file; matched case-insensitively.
    pub header: String,
    /// Unit label from the closed vocabulary in [`crate::units`], when the
    /// field carries a dimensioned quantity.
    pub unit: Option<String>,
    /// Required fields fail the read when their header cannot be resolved.
    pub required: bool,
}

impl FieldSpec {
    pub fn required(key: impl Into<String>, header: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            unit: unit.map(str::to_string),
            required: true,
        }
    }

    pub fn optional(key: impl Into<String>, header: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            unit: unit.map(str::to_string),
            required: false,
        }
    }
}

/// Schema for one input table: the field list plus the reading policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Name used in error messages and logs.
    pub name: String,
    /// Single-byte delimiter; defaults to `,`.
    pub delimiter: char,
    /// Number of rows preceding the data, including the header-name row.
    pub header_rows: usize,
    /// 1-based index of the row holding the column names.
    pub names_row: usize,
    pub fields: Vec<FieldSpec>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: ',',
            header_rows: 1,
            names_row: 1,
            fields: Vec::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header_rows(mut self, header_rows: usize, names_row: usize) -> Self {
        self.header_rows = header_rows;
        self.names_row = names_row;
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field declaration by canonical key.
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_by_key() {
        let schema = TableSchema::new("cells")
            .with_field(FieldSpec::required("cell_id", "ET Cell ID", None))
            .with_field(FieldSpec::optional("aridity", "Aridity Rating", None));
        assert!(schema.field("cell_id").unwrap().required);
        assert!(!schema.field("aridity").unwrap().required);
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn defaults_are_single_comma_header() {
        let schema = TableSchema::new("anything");
        assert_eq!(schema.delimiter, ',');
        assert_eq!(schema.header_rows, 1);
        assert_eq!(schema.names_row, 1);
    }
}
