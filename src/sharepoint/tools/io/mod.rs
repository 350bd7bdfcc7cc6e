//! Conversions between downloaded bytes and [`Table`] values.

use crate::sharepoint::tools::error::Result;
use crate::sharepoint::tools::model::{ColumnTypes, RemotePath, Table};

pub mod delimited;
pub mod excel_read;
pub mod excel_write;

/// File formats a table can be decoded from or encoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Csv,
}

impl SpreadsheetFormat {
    /// Picks the format from the file extension. Anything that is not a
    /// delimited text file is handed to the workbook reader.
    pub fn from_path(path: &RemotePath) -> Self {
        match path.extension().as_deref() {
            Some("csv") | Some("txt") => SpreadsheetFormat::Csv,
            _ => SpreadsheetFormat::Xlsx,
        }
    }
}

/// Caller supplied parsing options for downloaded tables.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Worksheet to read. Ignored for delimited files.
    pub sheet: Option<String>,
    /// Column type hints applied after decoding.
    pub column_types: ColumnTypes,
    /// Forces a format instead of guessing from the extension.
    pub format: Option<SpreadsheetFormat>,
}

impl ReadOptions {
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_column_types(mut self, column_types: ColumnTypes) -> Self {
        self.column_types = column_types;
        self
    }

    pub fn with_format(mut self, format: SpreadsheetFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Decodes a fully buffered file and applies the requested type hints.
pub fn parse_table(bytes: &[u8], format: SpreadsheetFormat, options: &ReadOptions) -> Result<Table> {
    let mut table = match format {
        SpreadsheetFormat::Xlsx => excel_read::read_table(bytes, options.sheet.as_deref())?,
        SpreadsheetFormat::Csv => delimited::read_table(bytes, &options.column_types)?,
    };
    table.apply_types(&options.column_types)?;
    Ok(table)
}

/// Encodes a table so it can be uploaded as a file of the given format.
pub fn encode_table(table: &Table, format: SpreadsheetFormat) -> Result<Vec<u8>> {
    match format {
        SpreadsheetFormat::Xlsx => excel_write::write_table(table, None),
        SpreadsheetFormat::Csv => delimited::write_table(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharepoint::tools::error::ToolError;
    use crate::sharepoint::tools::model::{CellValue, ColumnType};

    #[test]
    fn format_follows_extension() {
        let csv = RemotePath::new("General/export.CSV").expect("path");
        let xlsx = RemotePath::new("General/report.xlsx").expect("path");
        assert_eq!(SpreadsheetFormat::from_path(&csv), SpreadsheetFormat::Csv);
        assert_eq!(SpreadsheetFormat::from_path(&xlsx), SpreadsheetFormat::Xlsx);
    }

    #[test]
    fn hints_apply_to_both_formats() {
        let mut types = ColumnTypes::new();
        types.insert("code".into(), ColumnType::String);
        let options = ReadOptions::default().with_column_types(types);

        let table = parse_table(b"code,qty\n007,2\n", SpreadsheetFormat::Csv, &options)
            .expect("csv parsed");
        assert_eq!(table.rows[0][0], CellValue::String("007".into()));
        assert_eq!(table.rows[0][1], CellValue::Int(2));

        let bytes = encode_table(&table, SpreadsheetFormat::Xlsx).expect("encoded");
        let table = parse_table(&bytes, SpreadsheetFormat::Xlsx, &options).expect("xlsx parsed");
        assert_eq!(table.rows[0][0], CellValue::String("007".into()));
        assert_eq!(table.rows[0][1], CellValue::Int(2));
    }

    #[test]
    fn unhinted_xlsx_round_trip_keeps_integers() {
        let mut table = Table::new(vec!["id".into(), "score".into()]);
        table
            .push_row(vec![CellValue::Int(7), CellValue::Float(0.5)])
            .expect("row");

        let bytes = encode_table(&table, SpreadsheetFormat::Xlsx).expect("encoded");
        let restored = parse_table(&bytes, SpreadsheetFormat::Xlsx, &ReadOptions::default())
            .expect("xlsx parsed");

        assert_eq!(restored, table);
    }

    #[test]
    fn out_of_range_integer_hint_is_rejected() {
        let mut types = ColumnTypes::new();
        types.insert("n".into(), ColumnType::Int);
        let options = ReadOptions::default().with_column_types(types);

        let error = parse_table(b"n\n1e20\n", SpreadsheetFormat::Csv, &options)
            .expect_err("does not fit an i64");
        assert!(matches!(error, ToolError::InvalidLiteral { .. }));
    }
}
