// 📋 Relation type used at the storage boundary
//
// A Table is an ordered set of named columns and rows of SQLite dynamic values.
// Engines never work on Tables directly: entity types convert from/to them at
// the edges, so column validation and value parsing happen in one place.

use crate::error::{EngineError, Result};
use chrono::{NaiveDate, NaiveDateTime};
pub use rusqlite::types::Value;

/// Timestamp text layout written to every output relation.
/// The fraction is only written when non-zero, so stored text parses back exactly.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_INPUT_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self::with_columns(name, columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn with_columns(name: &str, columns: Vec<String>) -> Self {
        Table {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with NULL, extra cells dropped
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Columns from `required` that this table does not carry
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::MissingColumns {
                table: self.name.clone(),
                columns: missing,
            })
        }
    }

    /// Column projection, in the requested order
    pub fn project(&self, columns: &[&str]) -> Result<Table> {
        self.require_columns(columns)?;

        let indexes: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        let mut projected = Table::new(&self.name, columns);
        for row in &self.rows {
            projected.push_row(indexes.iter().map(|&i| row[i].clone()).collect());
        }
        Ok(projected)
    }

    /// Keep at most `limit` rows
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().enumerate().map(move |(index, values)| RowRef {
            table: self,
            values,
            index,
        })
    }
}

/// Borrowed view of one row with typed, column-named accessors
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    values: &'a [Value],
    index: usize,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw cell; absent columns read as NULL
    pub fn value(&self, column: &str) -> &'a Value {
        match self.table.column_index(column) {
            Some(i) => &self.values[i],
            None => &NULL,
        }
    }

    /// Text view of a cell; blank text is treated as NULL
    pub fn text(&self, column: &str) -> Option<String> {
        match self.value(column) {
            Value::Null => None,
            Value::Text(s) if s.trim().is_empty() => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    pub fn real(&self, column: &str) -> Result<Option<f64>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Real(r) => Ok(Some(*r)),
            Value::Integer(i) => Ok(Some(*i as f64)),
            Value::Text(s) if s.trim().is_empty() => Ok(None),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(column, format!("'{}' is not a number", s))),
            Value::Blob(_) => Err(self.invalid(column, "binary value where a number was expected")),
        }
    }

    pub fn datetime(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => parse_datetime(&raw)
                .map(Some)
                .ok_or_else(|| self.invalid(column, format!("'{}' is not a timestamp", raw))),
        }
    }

    pub fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => parse_date(&raw)
                .map(Some)
                .ok_or_else(|| self.invalid(column, format!("'{}' is not a date", raw))),
        }
    }

    pub fn require_text(&self, column: &str) -> Result<String> {
        self.text(column)
            .ok_or_else(|| self.invalid(column, "required value is null"))
    }

    pub fn require_real(&self, column: &str) -> Result<f64> {
        self.real(column)?
            .ok_or_else(|| self.invalid(column, "required value is null"))
    }

    pub fn require_datetime(&self, column: &str) -> Result<NaiveDateTime> {
        self.datetime(column)?
            .ok_or_else(|| self.invalid(column, "required value is null"))
    }

    fn invalid(&self, column: &str, message: impl Into<String>) -> EngineError {
        EngineError::invalid_value(&self.table.name, column, self.index, message)
    }
}

// ============================================================================
// CELL CONSTRUCTORS
// ============================================================================

pub fn text_value<S: AsRef<str>>(value: Option<S>) -> Value {
    match value {
        Some(s) => Value::Text(s.as_ref().to_string()),
        None => Value::Null,
    }
}

pub fn real_value(value: Option<f64>) -> Value {
    match value {
        Some(v) if v.is_finite() => Value::Real(v),
        _ => Value::Null,
    }
}

pub fn integer_value(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

pub fn datetime_value(value: Option<NaiveDateTime>) -> Value {
    text_value(value.map(|dt| dt.format(DATETIME_FORMAT).to_string()))
}

pub fn date_value(value: Option<NaiveDate>) -> Value {
    text_value(value.map(|d| d.format(DATE_FORMAT).to_string()))
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a timestamp; a bare date reads as midnight
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    for format in DATETIME_INPUT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a date (supports YYYY-MM-DD, MM/DD/YYYY and datetime text)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Some(date);
    }

    // "2024-01-05 00:00:00" and friends
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new("sample", &["id", "amount", "at", "note"]);
        table.push_row(vec![
            Value::Text("t1".to_string()),
            Value::Real(12.5),
            Value::Text("2024-03-01 21:15:00".to_string()),
            Value::Text("  ".to_string()),
        ]);
        table.push_row(vec![
            Value::Text("t2".to_string()),
            Value::Text("40".to_string()),
            Value::Text("2024-03-02T06:00".to_string()),
        ]);
        table
    }

    #[test]
    fn test_typed_accessors() {
        let table = sample_table();
        let rows: Vec<RowRef> = table.iter().collect();

        assert_eq!(rows[0].require_text("id").unwrap(), "t1");
        assert_eq!(rows[0].require_real("amount").unwrap(), 12.5);
        assert_eq!(rows[1].require_real("amount").unwrap(), 40.0);
        assert_eq!(
            rows[1].require_datetime("at").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap().and_hms_opt(6, 0, 0).unwrap()
        );

        // Blank text, padded cell and absent column all read as NULL
        assert_eq!(rows[0].text("note"), None);
        assert_eq!(rows[1].text("note"), None);
        assert_eq!(rows[0].text("no_such_column"), None);
    }

    #[test]
    fn test_required_null_is_invalid_value() {
        let table = sample_table();
        let row = table.iter().nth(1).unwrap();

        match row.require_text("note") {
            Err(EngineError::InvalidValue { table, column, row, .. }) => {
                assert_eq!(table, "sample");
                assert_eq!(column, "note");
                assert_eq!(row, 1);
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_number() {
        let mut table = Table::new("sample", &["amount"]);
        table.push_row(vec![Value::Text("12,5 birr".to_string())]);

        assert!(table.iter().next().unwrap().real("amount").is_err());
    }

    #[test]
    fn test_project_and_missing_columns() {
        let table = sample_table();

        let projected = table.project(&["at", "id"]).unwrap();
        assert_eq!(projected.columns(), &["at".to_string(), "id".to_string()]);
        assert_eq!(projected.rows()[0][1], Value::Text("t1".to_string()));

        let err = table.project(&["id", "branchid"]).unwrap_err();
        match err {
            EngineError::MissingColumns { columns, .. } => assert_eq!(columns, vec!["branchid"]),
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2019, 7, 4).unwrap();

        assert_eq!(parse_date("2019-07-04"), Some(expected));
        assert_eq!(parse_date("07/04/2019"), Some(expected));
        assert_eq!(parse_date("2019-07-04 00:00:00"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_datetime_value_keeps_fraction() {
        let dt = parse_datetime("2024-01-01 10:30:00.250").unwrap();
        let stored = datetime_value(Some(dt));
        assert_eq!(stored, Value::Text("2024-01-01 10:30:00.250".to_string()));

        let mut table = Table::new("sample", &["at"]);
        table.push_row(vec![stored]);
        assert_eq!(table.iter().next().unwrap().require_datetime("at").unwrap(), dt);

        let whole = parse_datetime("2024-01-01 10:30:00").unwrap();
        assert_eq!(datetime_value(Some(whole)), Value::Text("2024-01-01 10:30:00".to_string()));
        assert_eq!(datetime_value(None), Value::Null);
        assert_eq!(real_value(Some(f64::NAN)), Value::Null);
    }
}
