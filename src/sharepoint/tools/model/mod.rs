use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::sharepoint::tools::error::{Result, ToolError};

pub mod path;

pub use path::RemotePath;

/// Per-column type hints keyed by header name.
pub type ColumnTypes = BTreeMap<String, ColumnType>;

const MILLIS_PER_DAY: f64 = 86_400_000.0;
// 2^63, the first float past `i64::MAX`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// A single cell of a downloaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Missing value.
    Empty,
    /// Text cell.
    String(String),
    /// Integer cell. Only produced by CSV inference or an explicit hint.
    Int(i64),
    /// Floating point cell. Every numeric Excel cell starts out as a float.
    Float(f64),
    /// Boolean cell.
    Bool(bool),
    /// Date-formatted Excel cell.
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Converts an Excel serial date (days since 1899-12-30) into a timestamp.
    pub fn from_excel_serial(serial: f64) -> Option<Self> {
        let millis = (serial * MILLIS_PER_DAY).round();
        if !millis.is_finite() {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
        let offset = TimeDelta::try_milliseconds(millis as i64)?;
        epoch.checked_add_signed(offset).map(CellValue::DateTime)
    }

    /// Inverse of [`CellValue::from_excel_serial`].
    pub fn excel_serial(value: &NaiveDateTime) -> f64 {
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        (*value - epoch).num_milliseconds() as f64 / MILLIS_PER_DAY
    }

    /// Returns the integer a float holds exactly, if it fits an `i64`.
    pub fn whole_number(value: f64) -> Option<i64> {
        let representable = value.is_finite()
            && value.fract() == 0.0
            && value >= -I64_LIMIT
            && value < I64_LIMIT;
        representable.then(|| value as i64)
    }

    /// Infers the most specific value for untyped text, the way delimited
    /// files are read without hints.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return CellValue::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return CellValue::Float(value);
        }
        match parse_bool(trimmed) {
            Some(value) => CellValue::Bool(value),
            None => CellValue::String(raw.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::Null,
            CellValue::String(value) => Value::String(value.clone()),
            CellValue::Int(value) => Value::from(*value),
            CellValue::Float(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Bool(value) => Value::Bool(*value),
            CellValue::DateTime(value) => Value::String(value.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::String(value) => f.write_str(value),
            CellValue::Int(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::DateTime(value) => write!(f, "{value}"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Type a column is coerced into while a table is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int,
    Float,
    Bool,
}

impl ColumnType {
    /// Coerces a parsed cell into this column type. Empty cells stay empty.
    pub fn coerce(self, column: &str, value: CellValue) -> Result<CellValue> {
        let invalid = |value: &CellValue| ToolError::InvalidLiteral {
            column: column.to_string(),
            value: value.to_string(),
        };

        Ok(match (self, value) {
            (_, CellValue::Empty) => CellValue::Empty,
            (ColumnType::String, CellValue::String(text)) => CellValue::String(text),
            (ColumnType::String, other) => CellValue::String(other.to_string()),

            (ColumnType::Int, CellValue::Int(value)) => CellValue::Int(value),
            (ColumnType::Int, CellValue::Float(value)) => match CellValue::whole_number(value) {
                Some(value) => CellValue::Int(value),
                None => return Err(invalid(&CellValue::Float(value))),
            },
            (ColumnType::Int, CellValue::String(text)) => match CellValue::infer(&text) {
                CellValue::Int(value) => CellValue::Int(value),
                CellValue::Float(value) => match CellValue::whole_number(value) {
                    Some(value) => CellValue::Int(value),
                    None => return Err(invalid(&CellValue::String(text))),
                },
                _ => return Err(invalid(&CellValue::String(text))),
            },

            (ColumnType::Float, CellValue::Float(value)) => CellValue::Float(value),
            (ColumnType::Float, CellValue::Int(value)) => CellValue::Float(value as f64),
            (ColumnType::Float, CellValue::String(text)) => match text.trim().parse::<f64>() {
                Ok(value) => CellValue::Float(value),
                Err(_) => return Err(invalid(&CellValue::String(text))),
            },

            (ColumnType::Bool, CellValue::Bool(value)) => CellValue::Bool(value),
            (ColumnType::Bool, CellValue::Int(value)) if value == 0 || value == 1 => {
                CellValue::Bool(value == 1)
            }
            (ColumnType::Bool, CellValue::Float(value)) if value == 0.0 || value == 1.0 => {
                CellValue::Bool(value == 1.0)
            }
            (ColumnType::Bool, CellValue::String(text)) => match text.trim() {
                "1" => CellValue::Bool(true),
                "0" => CellValue::Bool(false),
                other => match parse_bool(other) {
                    Some(value) => CellValue::Bool(value),
                    None => return Err(invalid(&CellValue::String(text))),
                },
            },

            (_, other) => return Err(invalid(&other)),
        })
    }
}

impl FromStr for ColumnType {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "str" | "string" | "text" => Ok(ColumnType::String),
            "int" | "int64" | "integer" => Ok(ColumnType::Int),
            "float" | "float64" | "double" | "number" => Ok(ColumnType::Float),
            "bool" | "boolean" => Ok(ColumnType::Bool),
            other => Err(ToolError::InvalidConfig(format!(
                "unknown column type '{other}'"
            ))),
        }
    }
}

/// In-memory table produced from a downloaded spreadsheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding short rows with empty cells.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(ToolError::InvalidWorkbook(format!(
                "row {} has {} cells but the header declares {} columns",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns the cells of the named column in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).unwrap_or(&EMPTY_CELL))
                .collect(),
        )
    }

    /// Returns a copy holding only the first `count` rows.
    pub fn head(&self, count: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(count).cloned().collect(),
        }
    }

    /// Applies column type hints. Hints naming unknown columns are an error.
    pub fn apply_types(&mut self, types: &ColumnTypes) -> Result<()> {
        for (column, column_type) in types {
            let index = self.column_index(column).ok_or_else(|| {
                ToolError::InvalidWorkbook(format!("type hint for unknown column '{column}'"))
            })?;
            for cell in self.rows.iter_mut().filter_map(|row| row.get_mut(index)) {
                let value = std::mem::replace(cell, CellValue::Empty);
                *cell = column_type.coerce(column, value)?;
            }
        }
        Ok(())
    }

    /// Renders the rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| (column.clone(), cell.to_json()))
                    .collect();
                Value::Object(record)
            })
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                rendered
                    .iter()
                    .map(|row| row.get(idx).map_or(0, String::len))
                    .chain(std::iter::once(column.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (column, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {column:>width$}")?;
        }
        for (row_idx, row) in rendered.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{row_idx:<index_width$}")?;
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "  {cell:>width$}")?;
            }
        }
        Ok(())
    }
}

/// Bytes to be placed in a remote folder under a given name.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    pub target_folder: RemotePath,
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadPayload {
    pub fn new(target_folder: RemotePath, file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            target_folder,
            file_name: file_name.into(),
            content,
        }
    }

    /// Library-relative path of the file once uploaded.
    pub fn target_path(&self) -> Result<RemotePath> {
        self.target_folder.join(&self.file_name)
    }
}

/// Result of a directory creation request that reached the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    /// The folder did not exist and has been created.
    Created(RemotePath),
    /// The folder was already present; nothing was changed.
    AlreadyExists(RemotePath),
    /// The site refused to create the folder.
    Denied { path: RemotePath, reason: String },
}

impl FolderOutcome {
    pub fn path(&self) -> &RemotePath {
        match self {
            FolderOutcome::Created(path) | FolderOutcome::AlreadyExists(path) => path,
            FolderOutcome::Denied { path, .. } => path,
        }
    }
}

/// Summary of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub path: RemotePath,
    pub bytes: u64,
    pub segments: usize,
    pub replaced: bool,
}
