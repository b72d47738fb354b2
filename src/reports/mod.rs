//! Report writers: per-account bad-driver CSVs, formatted driver summary
//! workbooks, and the fleet-wide manufacturer and sample summaries.

pub mod bad_drivers;
pub mod fleet;
pub mod workbook;

pub use bad_drivers::{BadDriversReport, find_bad_drivers, sanitize_filename};
pub use fleet::{FleetSummary, fleet_summary};
pub use workbook::{DriverReportsReport, write_driver_reports};
