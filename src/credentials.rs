//! Credential acquisition.
//!
//! Stages ask a `CredentialSource` for the account list once per run and
//! hold the secrets only for the duration of that run. The bundled source
//! reads the customer spreadsheet (xlsx/xls/ods through calamine) or a CSV
//! export with the same columns.

use crate::error::{Result, RoamingError};
use crate::models::Credential;
use calamine::{Data, Reader, open_workbook_auto};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CLIENT_ID: &str = "client_id";
const CLIENT_SECRET: &str = "client_secret";
const ACCOUNT_NAME: &str = "account_name";

/// Anything that can hand out the configured accounts
pub trait CredentialSource {
    /// Load every account; `require_account_name` fails on sources without
    /// an `account_name` column
    fn load(&self, require_account_name: bool) -> Result<Vec<Credential>>;
}

/// Tabular credential file (spreadsheet or CSV)
#[derive(Debug, Clone)]
pub struct TabularCredentials {
    path: PathBuf,
}

impl TabularCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }

    fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Err(RoamingError::MissingInput {
                path: self.path.clone(),
            });
        }

        if self.is_csv() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&self.path)?;
            let mut rows = Vec::new();
            for record in reader.records() {
                let record = record?;
                rows.push(record.iter().map(|s| s.to_string()).collect());
            }
            return Ok(rows);
        }

        let mut workbook =
            open_workbook_auto(&self.path).map_err(|e| RoamingError::Spreadsheet {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| RoamingError::Spreadsheet {
                path: self.path.clone(),
                reason: "workbook has no sheets".to_string(),
            })?
            .map_err(|e| RoamingError::Spreadsheet {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // Numeric ids come back as floats; keep them integral
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

impl CredentialSource for TabularCredentials {
    fn load(&self, require_account_name: bool) -> Result<Vec<Credential>> {
        let rows = self.read_rows()?;
        parse_credential_rows(&self.path, rows, require_account_name)
    }
}

/// Build credentials from a header row followed by data rows
pub fn parse_credential_rows(
    path: &Path,
    rows: Vec<Vec<String>>,
    require_account_name: bool,
) -> Result<Vec<Credential>> {
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or_else(|| RoamingError::MissingColumn {
        path: path.to_path_buf(),
        column: CLIENT_ID.to_string(),
    })?;

    let index: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    let column = |name: &str| -> Result<usize> {
        index
            .get(name)
            .copied()
            .ok_or_else(|| RoamingError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };

    let id_col = column(CLIENT_ID)?;
    let secret_col = column(CLIENT_SECRET)?;
    let account_col = if require_account_name {
        Some(column(ACCOUNT_NAME)?)
    } else {
        index.get(ACCOUNT_NAME).copied()
    };

    let mut credentials = Vec::new();
    for (line, row) in rows.enumerate() {
        let get = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
        let client_id = get(id_col);
        let client_secret = get(secret_col);

        if client_id.is_empty() || client_secret.is_empty() {
            warn!(
                "Skipping credential row {} in {}: empty client_id or client_secret",
                line + 2,
                path.display()
            );
            continue;
        }

        let mut credential = Credential::new(client_id, client_secret);
        if let Some(col) = account_col {
            let account = get(col);
            if !account.is_empty() {
                credential = credential.with_account(account);
            } else if require_account_name {
                warn!(
                    "Skipping credential row {} in {}: empty account_name",
                    line + 2,
                    path.display()
                );
                continue;
            }
        }
        credentials.push(credential);
    }

    debug!(
        "Loaded {} credentials from {}",
        credentials.len(),
        path.display()
    );
    Ok(credentials)
}
