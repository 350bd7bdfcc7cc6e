use std::io::Cursor;

use calamine::{DataType, Reader, Xlsx};

use crate::sharepoint::tools::error::{Result, ToolError};
use crate::sharepoint::tools::model::{CellValue, Table};

/// Reads one sheet of an in-memory XLSX workbook into a table. The first row
/// of the sheet supplies the column names; the first sheet is used when no
/// name is given.
pub fn read_table(bytes: &[u8], sheet: Option<&str>) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ToolError::InvalidWorkbook("workbook has no sheets".into()))?,
    };

    let range = read_required_sheet(&mut workbook, &sheet_name)?;
    table_from_range(&range)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn table_from_range(range: &calamine::Range<DataType>) -> Result<Table> {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let name = cell_to_string(Some(cell));
                if name.trim().is_empty() {
                    format!("Unnamed: {idx}")
                } else {
                    name
                }
            })
            .collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(cell_to_value).collect())?;
    }
    Ok(table)
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty | DataType::Error(_) => CellValue::Empty,
        DataType::String(value) if value.is_empty() => CellValue::Empty,
        DataType::String(value) => CellValue::String(value.clone()),
        // Workbooks store every number as a float; whole values read back as
        // integers.
        DataType::Float(value) => match CellValue::whole_number(*value) {
            Some(int) => CellValue::Int(int),
            None => CellValue::Float(*value),
        },
        DataType::Int(value) => CellValue::Int(*value),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(serial) => {
            CellValue::from_excel_serial(*serial).unwrap_or(CellValue::Float(*serial))
        }
        other => CellValue::String(other.to_string()),
    }
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
