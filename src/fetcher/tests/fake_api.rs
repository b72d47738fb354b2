//! Fetcher behaviour against a scripted API

use crate::config::RoamingConfig;
use crate::error::{Result, RoamingError};
use crate::fetcher::{AdapterDriversResponse, RoamingApi, RoamingFetcher, fetch_history};
use crate::history::read_history_file;
use crate::models::{Credential, TimeWindow};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

/// Token is `token-<client_id>`; each token maps to a canned response
struct ScriptedApi {
    responses: HashMap<String, String>,
    rejected: Vec<String>,
    windows: Mutex<Vec<Option<TimeWindow>>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
            rejected: Vec::new(),
            windows: Mutex::new(Vec::new()),
        }
    }

    fn respond(mut self, client_id: &str, json: &str) -> Self {
        self.responses
            .insert(format!("token-{}", client_id), json.to_string());
        self
    }

    fn reject(mut self, client_id: &str) -> Self {
        self.rejected.push(client_id.to_string());
        self
    }
}

impl RoamingApi for ScriptedApi {
    async fn access_token(&self, credential: &Credential) -> Result<String> {
        if self.rejected.contains(&credential.client_id) {
            return Err(RoamingError::Authentication {
                client_id: credential.client_id.clone(),
                reason: "401".to_string(),
            });
        }
        Ok(format!("token-{}", credential.client_id))
    }

    async fn adapter_drivers(
        &self,
        token: &str,
        window: Option<TimeWindow>,
    ) -> Result<AdapterDriversResponse> {
        self.windows.lock().unwrap().push(window);
        match self.responses.get(token) {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Err(RoamingError::configuration("connection reset")),
        }
    }
}

const ACME: &str = r#"{"results":[
    {"driverProvider":"Microsoft - Intel(R) Wi-Fi 6 AX201","driverVersion":"22.1",
     "clientCount":2,"types":[{"goodSum":900,"criticalSum":100,"warningSum":0}]}
]}"#;

const GLOBEX: &str = r#"{"results":[
    {"driverProvider":"Microsoft - Intel(R) Wi-Fi 6 AX201","driverVersion":"22.1",
     "clientCount":3,"types":[{"goodSum":1000,"criticalSum":0,"warningSum":0}]},
    {"driverProvider":"Vendor - Realtek 8852","driverVersion":"6.0",
     "clientCount":1,"types":[{"goodSum":10,"criticalSum":10,"warningSum":0}]}
]}"#;

fn credentials() -> Vec<Credential> {
    vec![
        Credential::new("acme", "s1").with_account("Acme"),
        Credential::new("globex", "s2").with_account("Globex"),
        Credential::new("initech", "s3").with_account("Initech"),
        Credential::new("umbrella", "s4").with_account("Umbrella"),
    ]
}

#[tokio::test]
async fn test_failures_are_dropped_not_raised() {
    let api = ScriptedApi::new()
        .respond("acme", ACME)
        .respond("globex", GLOBEX)
        .respond("umbrella", r#"{"results":[]}"#)
        .reject("initech");

    let outcome = RoamingFetcher::new(&api, 2)
        .tag_accounts()
        .fetch_all(&credentials())
        .await;

    assert_eq!(outcome.stats.configured, 4);
    assert_eq!(outcome.stats.succeeded, 2);
    assert_eq!(outcome.stats.empty, 1);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.records.len(), 3);
    assert!(
        outcome
            .records
            .iter()
            .all(|r| matches!(r.account_name.as_deref(), Some("Acme") | Some("Globex")))
    );
}

#[tokio::test]
async fn test_window_is_forwarded() {
    let api = ScriptedApi::new().respond("acme", ACME);
    let window = TimeWindow {
        from_ms: 1_000,
        to_ms: 2_000,
    };

    RoamingFetcher::new(&api, 1)
        .with_window(Some(window))
        .fetch_all(&credentials()[..1])
        .await;

    assert_eq!(*api.windows.lock().unwrap(), vec![Some(window)]);
}

#[tokio::test]
async fn test_no_accounts_configured() {
    let api = ScriptedApi::new();
    let outcome = RoamingFetcher::new(&api, 3).fetch_all(&[]).await;
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.describe(), "no accounts configured");
}

#[tokio::test]
async fn test_fetch_history_groups_and_writes_dated_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = RoamingConfig::default().with_paths(
        temp_dir.path().join("creds.csv"),
        temp_dir.path().join("History"),
        temp_dir.path().join("Output"),
    );
    let api = ScriptedApi::new()
        .respond("acme", ACME)
        .respond("globex", GLOBEX);
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let report = fetch_history(&api, &credentials()[..2], &config, date, false)
        .await
        .unwrap();

    let path = report.output.unwrap();
    assert!(path.ends_with("History/roaming_data_2025-03-10.csv"));
    assert_eq!(report.rows_written, 2);

    let rows = read_history_file(&path).unwrap();
    // Sorted descending by percentage
    assert_eq!(
        rows[0].adapter_driver,
        "Intel(R) Wi-Fi 6 AX201 - 22.1"
    );
    assert_eq!(rows[0].good_sum, 1900);
    assert_eq!(rows[0].critical_sum, 100);
    assert_eq!(rows[0].client_count, 5);
    assert_eq!(rows[0].total_sum, Some(2000));
    assert_eq!(rows[0].good_pct.as_deref(), Some("95.0%"));
    assert_eq!(rows[1].adapter.as_deref(), Some("Realtek 8852"));
    assert_eq!(rows[1].good_pct.as_deref(), Some("50.0%"));
}

#[tokio::test]
async fn test_fetch_history_without_data_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let config = RoamingConfig::default().with_paths(
        temp_dir.path().join("creds.csv"),
        temp_dir.path().join("History"),
        temp_dir.path().join("Output"),
    );
    let api = ScriptedApi::new()
        .respond("acme", r#"{"results":[]}"#)
        .respond("globex", r#"{"results":[]}"#);
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

    let report = fetch_history(&api, &credentials()[..2], &config, date, false)
        .await
        .unwrap();

    assert!(report.output.is_none());
    assert_eq!(report.stats.empty, 2);
    assert!(!temp_dir.path().join("History").exists());
}
