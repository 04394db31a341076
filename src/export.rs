//! Spreadsheet rendering of scan records.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};

use crate::types::ScanRecord;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const SHEET_NAME: &str = "Scan Report";
pub const HEADERS: [&str; 9] = ["No", "Date", "Time", "Unit", "QR Code", "Location", "Scanner", "Result", "Notes"];

const COLUMN_WIDTH: f64 = 15.0;
const HEADER_BLUE: u32 = 0x4472C4;

/// `scan_report_YYYYMMDD_HHMMSS.xlsx`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("scan_report_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

pub fn result_label(is_match: bool) -> &'static str {
    if is_match {
        "Match"
    } else {
        "Mismatch"
    }
}

/// Cell values of one data row, in [`HEADERS`] order after the row number.
fn row_cells(record: &ScanRecord) -> [String; 8] {
    [
        record.scanned_at.format("%Y-%m-%d").to_string(),
        record.scanned_at.format("%H:%M:%S").to_string(),
        record.unit.name.clone(),
        record.unit.qr_code.clone(),
        record.unit.location.clone(),
        record.user.name.clone(),
        result_label(record.is_match).to_string(),
        record.notes.clone(),
    ]
}

/// Renders `records` (already ordered) into an xlsx workbook.
pub fn render_workbook(records: &[ScanRecord]) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BLUE))
        .set_align(FormatAlign::Center);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in HEADERS.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, &header)?;
        sheet.set_column_width(col, COLUMN_WIDTH)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number(row, 0, (i + 1) as f64)?;
        for (offset, value) in row_cells(record).into_iter().enumerate() {
            sheet.write_string(row, offset as u16 + 1, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
