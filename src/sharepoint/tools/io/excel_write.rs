use rust_xlsxwriter::{Format, Workbook};

use crate::sharepoint::tools::error::{Result, ToolError};
use crate::sharepoint::tools::model::{CellValue, Table};

const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// Serialises the table into an in-memory XLSX workbook with a header row.
pub fn write_table(table: &Table, sheet_name: Option<&str>) -> Result<Vec<u8>> {
    if table.columns.len() > MAX_COLUMNS || table.rows.len() + 1 > MAX_ROWS {
        return Err(ToolError::InvalidWorkbook(format!(
            "{} rows x {} columns exceeds the worksheet limits",
            table.rows.len(),
            table.columns.len()
        )));
    }

    let mut workbook_writer = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let worksheet = workbook_writer.add_worksheet();
    if let Some(name) = sheet_name {
        worksheet.set_name(name)?;
    }

    for (col_idx, header) in table.columns.iter().enumerate() {
        if !header.is_empty() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let excel_col = col_idx as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::String(value) => {
                    worksheet.write_string(excel_row, excel_col, value)?;
                }
                CellValue::Int(value) => {
                    worksheet.write_number(excel_row, excel_col, *value as f64)?;
                }
                CellValue::Float(value) => {
                    worksheet.write_number(excel_row, excel_col, *value)?;
                }
                CellValue::Bool(value) => {
                    worksheet.write_boolean(excel_row, excel_col, *value)?;
                }
                CellValue::DateTime(value) => {
                    worksheet.write_number_with_format(
                        excel_row,
                        excel_col,
                        CellValue::excel_serial(value),
                        &date_format,
                    )?;
                }
            }
        }
    }

    Ok(workbook_writer.save_to_buffer()?)
}
