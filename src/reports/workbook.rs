//! Formatted per-account driver summary workbooks.
//!
//! The sheet is laid out as plain cells first (`SheetLayout`) and rendered
//! with rust_xlsxwriter afterwards, so the layout can be checked without
//! opening a workbook.

use crate::artifacts::{ensure_parent, read_csv};
use crate::constants::{BAD_DRIVERS_FILE_PREFIX, DRIVER_REPORT_SUFFIX, columns};
use crate::error::{Result, RoamingError};
use crate::models::{BadDriverRow, MergedRow};
use colored::*;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SHEET_NAME: &str = "Driver Summary";
pub const BAD_TITLE: &str = "Bad Drivers";
pub const NO_BAD_DRIVERS: &str = "No bad drivers found.";
pub const NO_GOOD_DRIVERS: &str = "No good drivers found.";
const TOTALS_LABEL: &str = "Totals:";
const THOUSANDS: &str = "#,##0";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    fn display_len(&self) -> usize {
        match self {
            CellValue::Text(s) => s.chars().count(),
            CellValue::Number(n) => n.to_string().len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub bold: bool,
    pub bottom_border: bool,
    pub align_right: bool,
    pub thousands: bool,
}

impl CellStyle {
    const PLAIN: Self = Self {
        bold: false,
        bottom_border: false,
        align_right: false,
        thousands: false,
    };
    const BOLD: Self = Self {
        bold: true,
        ..Self::PLAIN
    };
    const HEADER: Self = Self {
        bottom_border: true,
        ..Self::PLAIN
    };
    const RIGHT: Self = Self {
        align_right: true,
        ..Self::PLAIN
    };
    const RIGHT_THOUSANDS: Self = Self {
        align_right: true,
        thousands: true,
        ..Self::PLAIN
    };

    fn to_format(self) -> Format {
        let mut format = Format::new();
        if self.bold {
            format = format.set_bold();
        }
        if self.bottom_border {
            format = format.set_border_bottom(FormatBorder::Thin);
        }
        if self.align_right {
            format = format.set_align(FormatAlign::Right);
        }
        if self.thousands {
            format = format.set_num_format(THOUSANDS);
        }
        format
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub style: CellStyle,
}

/// Cells of one summary sheet plus derived column widths
#[derive(Debug, Clone, Default)]
pub struct SheetLayout {
    pub cells: Vec<Cell>,
}

impl SheetLayout {
    fn put(&mut self, row: u32, col: u16, value: CellValue, style: CellStyle) {
        self.cells.push(Cell {
            row,
            col,
            value,
            style,
        });
    }

    fn header(&mut self, row: u32, names: &[&str]) {
        for (col, name) in names.iter().enumerate() {
            self.put(row, col as u16, CellValue::text(*name), CellStyle::HEADER);
        }
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Longest value per column plus 2
    pub fn column_widths(&self) -> Vec<f64> {
        let columns = self.cells.iter().map(|c| c.col as usize + 1).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for cell in &self.cells {
            let width = &mut widths[cell.col as usize];
            *width = (*width).max(cell.value.display_len());
        }
        widths.into_iter().map(|w| (w + 2) as f64).collect()
    }
}

pub fn good_title(threshold: f64) -> String {
    format!("Good Drivers (Roaming > {}%)", threshold)
}

/// Fleet rows sharing an adapter with the account's bad drivers and scoring
/// above `threshold`, newest vintage first
pub fn good_drivers_for(bad: &[BadDriverRow], merged: &[MergedRow], threshold: f64) -> Vec<MergedRow> {
    let adapters: HashSet<String> = bad.iter().map(|r| r.adapter.trim().to_lowercase()).collect();
    let mut good: Vec<MergedRow> = merged
        .iter()
        .filter(|r| adapters.contains(&r.adapter.trim().to_lowercase()))
        .filter(|r| r.good_pct > threshold)
        .cloned()
        .collect();
    good.sort_by(|a, b| {
        let a = a.driver_vintage.as_deref().unwrap_or("");
        let b = b.driver_vintage.as_deref().unwrap_or("");
        b.cmp(a)
    });
    good
}

/// Cell layout for one account
pub fn driver_summary_layout(bad: &[BadDriverRow], good: &[MergedRow], good_threshold: f64) -> SheetLayout {
    let mut sheet = SheetLayout::default();
    sheet.put(0, 0, CellValue::text(BAD_TITLE), CellStyle::BOLD);

    let mut row = 1u32;
    if bad.is_empty() {
        sheet.put(row, 0, CellValue::text(NO_BAD_DRIVERS), CellStyle::PLAIN);
        row += 1;
    } else {
        sheet.header(
            row,
            &[
                columns::ADAPTER_DRIVER,
                columns::CLIENT_COUNT,
                columns::CRITICAL_MINUTES,
                columns::GOOD_PCT,
            ],
        );
        row += 1;
        for r in bad {
            sheet.put(row, 0, CellValue::text(&r.adapter_driver), CellStyle::PLAIN);
            sheet.put(row, 1, CellValue::Number(r.client_count as f64), CellStyle::RIGHT);
            sheet.put(row, 2, CellValue::Number(r.critical_minutes as f64), CellStyle::RIGHT);
            sheet.put(row, 3, CellValue::Number(r.good_pct), CellStyle::RIGHT);
            row += 1;
        }
        let clients: i64 = bad.iter().map(|r| r.client_count).sum();
        let critical: i64 = bad.iter().map(|r| r.critical_minutes).sum();
        let totals = CellStyle {
            bold: true,
            ..CellStyle::RIGHT_THOUSANDS
        };
        sheet.put(row, 0, CellValue::text(TOTALS_LABEL), CellStyle::BOLD);
        sheet.put(row, 1, CellValue::Number(clients as f64), totals);
        sheet.put(row, 2, CellValue::Number(critical as f64), totals);
        row += 1;
    }

    // One blank row between sections
    row += 1;
    sheet.put(row, 0, CellValue::Text(good_title(good_threshold)), CellStyle::BOLD);
    row += 1;

    if good.is_empty() {
        sheet.put(row, 0, CellValue::text(NO_GOOD_DRIVERS), CellStyle::PLAIN);
    } else {
        sheet.header(
            row,
            &[
                columns::ADAPTER_DRIVER,
                columns::TOTAL_SAMPLES,
                "",
                columns::GOOD_PCT,
                columns::DRIVER_VINTAGE,
            ],
        );
        row += 1;
        for r in good {
            sheet.put(row, 0, CellValue::text(&r.adapter_driver), CellStyle::PLAIN);
            sheet.put(row, 1, CellValue::Number(r.total_sum as f64), CellStyle::RIGHT_THOUSANDS);
            sheet.put(row, 3, CellValue::Number(r.good_pct), CellStyle::RIGHT);
            sheet.put(
                row,
                4,
                CellValue::text(r.driver_vintage.clone().unwrap_or_default()),
                CellStyle::RIGHT,
            );
            row += 1;
        }
    }
    sheet
}

/// Render a layout into a single-sheet workbook at `path`
pub fn save_layout(layout: &SheetLayout, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for cell in &layout.cells {
        let format = cell.style.to_format();
        match &cell.value {
            CellValue::Text(text) => {
                worksheet.write_string_with_format(cell.row, cell.col, text, &format)?;
            }
            CellValue::Number(n) => {
                worksheet.write_number_with_format(cell.row, cell.col, *n, &format)?;
            }
        }
    }
    for (col, width) in layout.column_widths().into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width)?;
    }

    workbook.save(path)?;
    debug!("Saved workbook {}", path.display());
    Ok(())
}

/// Account files in the bad-driver directory, as (account, path)
pub fn discover_bad_driver_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let pattern = format!(
        "{}/{}*.csv",
        glob::Pattern::escape(&dir.to_string_lossy()),
        BAD_DRIVERS_FILE_PREFIX
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| RoamingError::configuration(format!("Invalid pattern '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for path in paths.flatten() {
        let account = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(BAD_DRIVERS_FILE_PREFIX))
            .map(str::to_string);
        if let Some(account) = account {
            files.push((account, path));
        }
    }
    files.sort();
    Ok(files)
}

pub fn driver_report_path(dir: &Path, account: &str) -> PathBuf {
    dir.join(format!("{}{}", account, DRIVER_REPORT_SUFFIX))
}

#[derive(Debug, Clone, Default)]
pub struct DriverReportsReport {
    pub accounts: usize,
    pub skipped: usize,
    pub files: Vec<PathBuf>,
}

/// One workbook per bad-driver file
pub fn write_driver_reports(
    bad_drivers_dir: &Path,
    merged_csv: &Path,
    output_dir: &Path,
    good_threshold: f64,
) -> Result<DriverReportsReport> {
    let merged: Vec<MergedRow> = read_csv(merged_csv)?;
    let accounts = discover_bad_driver_files(bad_drivers_dir)?;
    if accounts.is_empty() {
        warn!("No bad-driver files in {}", bad_drivers_dir.display());
    }

    let mut report = DriverReportsReport::default();
    for (account, path) in accounts {
        let bad: Vec<BadDriverRow> = match read_csv(&path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("[{}] Skipping unreadable bad-driver file: {}", account, e);
                report.skipped += 1;
                continue;
            }
        };

        let good = good_drivers_for(&bad, &merged, good_threshold);
        let layout = driver_summary_layout(&bad, &good, good_threshold);
        let output = driver_report_path(output_dir, &account);
        save_layout(&layout, &output)?;

        println!(
            "  {} {} report generated ({} bad, {} good)",
            "✓".green(),
            account,
            bad.len(),
            good.len()
        );
        report.accounts += 1;
        report.files.push(output);
    }

    info!(
        "Driver reports: {} written, {} skipped",
        report.accounts, report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::write_csv;
    use calamine::{Data, Reader, open_workbook_auto};
    use tempfile::TempDir;

    fn bad(adapter: &str, key: &str, clients: i64, critical: i64, pct: f64) -> BadDriverRow {
        BadDriverRow {
            account_name: "Acme".to_string(),
            adapter: adapter.to_string(),
            driver: "1".to_string(),
            adapter_driver: key.to_string(),
            critical_minutes: critical,
            client_count: clients,
            total_minutes: 100_000,
            good_pct: pct,
        }
    }

    fn merged(adapter: &str, key: &str, pct: f64, vintage: Option<&str>) -> MergedRow {
        MergedRow {
            adapter_driver: key.to_string(),
            adapter: adapter.to_string(),
            good_sum: 0,
            critical_sum: 0,
            warning_sum: 0,
            client_count: 0,
            total_sum: 1_234_567,
            good_pct: pct,
            driver_vintage: vintage.map(str::to_string),
        }
    }

    #[test]
    fn test_good_drivers_match_adapter_and_sort_by_vintage() {
        let bad_rows = vec![bad("intel ax201", "Intel AX201 - 1", 3, 400, 95.0)];
        let fleet = vec![
            merged("Intel AX201", "Intel AX201 - 2", 99.9, Some("2023-01-01")),
            merged("Intel AX201 ", "Intel AX201 - 3", 99.7, Some("2024-06-01")),
            merged("Intel AX201", "Intel AX201 - 4", 99.5, Some("2025-01-01")),
            merged("Intel AX201", "Intel AX201 - 5", 99.6, None),
            merged("Realtek", "Realtek - 1", 100.0, Some("2025-01-01")),
        ];
        let good = good_drivers_for(&bad_rows, &fleet, 99.5);
        let keys: Vec<&str> = good.iter().map(|r| r.adapter_driver.as_str()).collect();
        assert_eq!(keys, vec!["Intel AX201 - 3", "Intel AX201 - 2", "Intel AX201 - 5"]);
    }

    #[test]
    fn test_layout_sections_and_totals() {
        let bad_rows = vec![
            bad("intel", "Intel - 1", 3, 1_500, 90.0),
            bad("intel", "Intel - 2", 2, 500, 98.5),
        ];
        let good = vec![merged("intel", "Intel - 9", 99.9, Some("2024-01-01"))];
        let layout = driver_summary_layout(&bad_rows, &good, 99.5);

        assert_eq!(layout.cell(0, 0).unwrap().value, CellValue::text("Bad Drivers"));
        assert!(layout.cell(0, 0).unwrap().style.bold);
        assert!(layout.cell(1, 3).unwrap().style.bottom_border);

        let totals = layout.cell(4, 0).unwrap();
        assert_eq!(totals.value, CellValue::text("Totals:"));
        assert_eq!(layout.cell(4, 1).unwrap().value, CellValue::Number(5.0));
        assert_eq!(layout.cell(4, 2).unwrap().value, CellValue::Number(2000.0));
        assert!(layout.cell(4, 2).unwrap().style.thousands);

        // Blank row 5, good title on 6
        assert!(layout.cells.iter().all(|c| c.row != 5));
        assert_eq!(
            layout.cell(6, 0).unwrap().value,
            CellValue::text("Good Drivers (Roaming > 99.5%)")
        );
        assert_eq!(layout.cell(7, 4).unwrap().value, CellValue::text("Driver Vintage"));
        assert_eq!(layout.cell(8, 1).unwrap().value, CellValue::Number(1_234_567.0));
        assert!(layout.cell(8, 4).unwrap().style.align_right);
    }

    #[test]
    fn test_layout_empty_sections() {
        let layout = driver_summary_layout(&[], &[], 99.5);
        assert_eq!(layout.cell(1, 0).unwrap().value, CellValue::text(NO_BAD_DRIVERS));
        assert_eq!(layout.cell(4, 0).unwrap().value, CellValue::text(NO_GOOD_DRIVERS));
    }

    #[test]
    fn test_column_widths() {
        let layout = driver_summary_layout(&[bad("a", "A - 1", 1, 1, 1.0)], &[], 99.5);
        let widths = layout.column_widths();
        assert_eq!(widths[0], "Good Drivers (Roaming > 99.5%)".len() as f64 + 2.0);
        assert_eq!(widths[3], "Good Roaming Calculation (%)".len() as f64 + 2.0);
    }

    #[test]
    fn test_write_driver_reports_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let bad_dir = temp_dir.path().join("bad");
        let merged_csv = temp_dir.path().join("merged.csv");
        let out_dir = temp_dir.path().join("reports");

        write_csv(
            &bad_dir.join("bad_drivers_for_Acme_Corp.csv"),
            &[bad("intel", "Intel - 1", 3, 1_500, 90.0)],
        )
        .unwrap();
        write_csv(
            &merged_csv,
            &[merged("Intel", "Intel - 9", 99.9, Some("2024-01-01"))],
        )
        .unwrap();

        let report = write_driver_reports(&bad_dir, &merged_csv, &out_dir, 99.5).unwrap();
        assert_eq!(report.accounts, 1);
        let path = out_dir.join("Acme_Corp_driver_summary.xlsx");
        assert_eq!(report.files, vec![path.clone()]);

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Bad Drivers".to_string())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Intel - 1".to_string())));
        assert_eq!(range.get_value((3, 2)), Some(&Data::Float(1500.0)));
        assert_eq!(range.get_value((7, 0)), Some(&Data::String("Intel - 9".to_string())));
    }

    #[test]
    fn test_write_driver_reports_requires_merged_table() {
        let temp_dir = TempDir::new().unwrap();
        let result = write_driver_reports(
            temp_dir.path(),
            &temp_dir.path().join("missing.csv"),
            temp_dir.path(),
            99.5,
        );
        assert!(matches!(result, Err(RoamingError::MissingInput { .. })));
    }
}
