use crate::sharepoint::tools::error::{Result, ToolError};
use crate::sharepoint::tools::model::{CellValue, ColumnTypes, Table};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads comma separated content into a table. The first record is the
/// header. Cells of hinted columns are kept as raw text for the hint to
/// convert; all other values are inferred per cell.
pub fn read_table(bytes: &[u8], column_types: &ColumnTypes) -> Result<Table> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let hinted: Vec<bool> = columns
        .iter()
        .map(|column| column_types.contains_key(column))
        .collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .enumerate()
            .map(|(idx, raw)| match hinted.get(idx) {
                Some(true) if raw.is_empty() => CellValue::Empty,
                Some(true) => CellValue::String(raw.to_string()),
                _ => CellValue::infer(raw),
            })
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

/// Writes the table as comma separated text with a header record.
pub fn write_table(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(ToString::to_string))?;
    }
    writer
        .into_inner()
        .map_err(|error| ToolError::Io(error.into_error()))
}
