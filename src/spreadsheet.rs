use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::domain::RecipientRecord;

pub const REQUIRED_COLUMNS: [&str; 3] = ["Name", "Email", "Company"];

#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("Invalid Excel file format, {0}")]
    InvalidSpreadsheet(String),
    #[error("Excel file has no worksheet")]
    NoWorksheet,
    #[error("Excel must contain 'Name', 'Email', 'Company' columns, missing {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
}

/// Reads recipients from the first worksheet of an xlsx/xls/ods file.
/// The first row is the header; rows keep their spreadsheet order.
#[tracing::instrument(name = "Parsing the recipients spreadsheet", skip(bytes), fields(size = bytes.len()))]
pub fn parse_recipients(bytes: &[u8]) -> Result<Vec<RecipientRecord>, FormatError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| FormatError::InvalidSpreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(FormatError::NoWorksheet)?
        .map_err(|e| FormatError::InvalidSpreadsheet(e.to_string()))?;

    records_from_rows(range.rows())
}

fn records_from_rows<'a>(
    mut rows: impl Iterator<Item = &'a [Data]>,
) -> Result<Vec<RecipientRecord>, FormatError> {
    let header = rows.next().unwrap_or_default();
    let position = |column: &str| {
        header
            .iter()
            .position(|cell| cell_text(cell).trim() == column)
    };

    let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
    let mut missing = Vec::new();
    for column in REQUIRED_COLUMNS {
        match position(column) {
            Some(index) => columns.push(index),
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        return Err(FormatError::MissingColumns(missing));
    }
    let [name, email, company] = [columns[0], columns[1], columns[2]];

    let cell = |row: &[Data], index: usize| row.get(index).map(cell_text).unwrap_or_default();

    Ok(rows
        .map(|row| RecipientRecord {
            name: cell(row, name),
            email: cell(row, email),
            company: cell(row, company),
        })
        .filter(|record| {
            !(record.name.is_empty() && record.email.is_empty() && record.company.is_empty())
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Builds an xlsx file with one worksheet holding `rows` as text cells.
#[cfg(test)]
pub(crate) fn workbook(rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row, cells) in rows.iter().enumerate() {
        for (col, value) in cells.iter().enumerate() {
            worksheet
                .write_string(row as u32, col as u16, *value)
                .unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}
