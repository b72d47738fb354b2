//! End-to-end pipeline runs against in-process fakes
//!
//! The API, the driver catalog and the credential source are replaced with
//! canned implementations; every stage then reads and writes real artifacts
//! in a temporary directory.

use chrono::{Local, TimeZone};
use roaming_report::artifacts::read_csv;
use roaming_report::constants::{CRITICAL_MINUTES_FILE, MANUFACTURERS_FILE, TOTAL_SAMPLES_FILE};
use roaming_report::fetcher::AdapterDriversResponse;
use roaming_report::models::{MergedRow, TimeWindow};
use roaming_report::reports::fleet::{ManufacturerShare, TotalSamples};
use roaming_report::{
    Credential, CredentialSource, Pipeline, RoamingApi, RoamingConfig, RoamingError, Stage,
    StageContext, StageOutcome, VintageLookup, VintageMatch,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const ACME: &str = r#"{"results":[
    {"driverProvider":"Microsoft - Intel(R) Wi-Fi 6 AX201","driverVersion":"22.1",
     "clientCount":4,"types":[{"goodSum":9000,"criticalSum":1000,"warningSum":0}]}
]}"#;

const GLOBEX: &str = r#"{"results":[
    {"driverProvider":"Microsoft - Intel(R) Wi-Fi 6 AX201","driverVersion":"22.1",
     "clientCount":6,"types":[{"goodSum":20000,"criticalSum":0,"warningSum":0}]},
    {"driverProvider":"Vendor - Realtek 8852","driverVersion":"6.0",
     "clientCount":2,"types":[{"goodSum":50000,"criticalSum":50,"warningSum":0}]}
]}"#;

/// Serves a canned response per client; unknown clients get no results
struct CannedApi {
    responses: HashMap<String, &'static str>,
}

impl CannedApi {
    fn fleet() -> Self {
        let mut responses = HashMap::new();
        responses.insert("acme".to_string(), ACME);
        responses.insert("globex".to_string(), GLOBEX);
        Self { responses }
    }

    fn silent() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }
}

impl RoamingApi for CannedApi {
    async fn access_token(&self, credential: &Credential) -> roaming_report::Result<String> {
        Ok(credential.client_id.clone())
    }

    async fn adapter_drivers(
        &self,
        token: &str,
        _window: Option<TimeWindow>,
    ) -> roaming_report::Result<AdapterDriversResponse> {
        let json = self.responses.get(token).copied().unwrap_or(r#"{"results":[]}"#);
        Ok(serde_json::from_str(json)?)
    }
}

/// Knows Intel drivers only
struct IntelOnlyCatalog {
    queries: AtomicUsize,
}

impl VintageLookup for IntelOnlyCatalog {
    async fn lookup(&self, query: &str) -> roaming_report::Result<VintageMatch> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if query.starts_with("Intel") {
            Ok(VintageMatch::found("3/15/2023"))
        } else {
            Ok(VintageMatch::missing())
        }
    }
}

struct FixedAccounts;

impl CredentialSource for FixedAccounts {
    fn load(&self, _require_account_name: bool) -> roaming_report::Result<Vec<Credential>> {
        Ok(vec![
            Credential::new("acme", "secret-a").with_account("Acme"),
            Credential::new("globex", "secret-g").with_account("Globex Corp"),
        ])
    }
}

fn config_in(root: &Path) -> RoamingConfig {
    RoamingConfig::default().with_paths(
        root.join("accounts.csv"),
        root.join("history"),
        root.join("out"),
    )
}

#[tokio::test]
async fn test_full_pipeline_writes_every_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let api = CannedApi::fleet();
    let catalog = IntelOnlyCatalog {
        queries: AtomicUsize::new(0),
    };
    let ctx = StageContext {
        config: &config,
        history_api: &api,
        account_api: &api,
        lookup: &catalog,
        credentials: &FixedAccounts,
        now: Local.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
        show_progress: false,
    };

    let runs = Pipeline::default().run(&ctx).await.unwrap();
    assert_eq!(runs.len(), 8);
    assert!(
        runs.iter()
            .all(|r| matches!(r.outcome, StageOutcome::Completed(_))),
        "{:?}",
        runs
    );

    assert!(
        temp_dir
            .path()
            .join("history/roaming_data_2024-05-02.csv")
            .exists()
    );

    // Fleet table: ascending percentage, Intel 29000/30000, Realtek 50000/50050
    let merged: Vec<MergedRow> = read_csv(&config.merged_csv_path()).unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].adapter_driver, "Intel(R) Wi-Fi 6 AX201 - 22.1");
    assert_eq!(merged[0].total_sum, 30_000);
    assert_eq!(merged[0].good_pct, 96.7);
    assert_eq!(merged[0].driver_vintage.as_deref(), Some("2023-03-15"));
    assert_eq!(merged[1].adapter_driver, "Realtek 8852 - 6.0");
    assert_eq!(merged[1].driver_vintage.as_deref(), Some("Not Found"));
    assert!(config.merged_json_path().exists());
    assert_eq!(catalog.queries.load(Ordering::SeqCst), 2);

    // Only Acme has a driver below 99%
    let bad_dir = config.bad_drivers_dir();
    assert!(bad_dir.join("bad_drivers_for_Acme.csv").exists());
    assert!(!bad_dir.join("bad_drivers_for_Globex_Corp.csv").exists());
    assert!(
        config
            .driver_reports_dir()
            .join("Acme_driver_summary.xlsx")
            .exists()
    );

    let out = &config.paths.output_dir;
    let shares: Vec<ManufacturerShare> = read_csv(&out.join(MANUFACTURERS_FILE)).unwrap();
    assert_eq!(shares.len(), 2);
    assert!(shares.iter().all(|s| s.percentage == 50.0));
    let totals: Vec<TotalSamples> = read_csv(&out.join(TOTAL_SAMPLES_FILE)).unwrap();
    assert_eq!(totals[0].total_sum, 80_050);

    let critical: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join(CRITICAL_MINUTES_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(critical["total_minutes"], 1_050);
}

#[tokio::test]
async fn test_rerun_reuses_known_vintage() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let api = CannedApi::fleet();
    let catalog = IntelOnlyCatalog {
        queries: AtomicUsize::new(0),
    };
    let ctx = StageContext {
        config: &config,
        history_api: &api,
        account_api: &api,
        lookup: &catalog,
        credentials: &FixedAccounts,
        now: Local.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
        show_progress: false,
    };

    let pipeline = Pipeline::parse(&["fetch", "aggregate", "vintage"]).unwrap();
    pipeline.run(&ctx).await.unwrap();
    assert_eq!(catalog.queries.load(Ordering::SeqCst), 2);

    // Second run only asks again for the key that was not found
    Pipeline::parse(&["vintage"]).unwrap().run(&ctx).await.unwrap();
    assert_eq!(catalog.queries.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_fetch_reports_no_input() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let api = CannedApi::silent();
    let catalog = IntelOnlyCatalog {
        queries: AtomicUsize::new(0),
    };
    let ctx = StageContext {
        config: &config,
        history_api: &api,
        account_api: &api,
        lookup: &catalog,
        credentials: &FixedAccounts,
        now: Local::now(),
        show_progress: false,
    };

    let pipeline = Pipeline::parse(&["fetch", "aggregate", "critical-minutes"]).unwrap();
    let runs = pipeline.run(&ctx).await.unwrap();
    assert_eq!(runs.len(), 3);
    assert!(
        runs.iter()
            .all(|r| matches!(r.outcome, StageOutcome::NoInput(_)))
    );
    assert!(!config.aggregated_path().exists());
}

#[tokio::test]
async fn test_stage_error_stops_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(temp_dir.path());
    let api = CannedApi::fleet();
    let catalog = IntelOnlyCatalog {
        queries: AtomicUsize::new(0),
    };
    let ctx = StageContext {
        config: &config,
        history_api: &api,
        account_api: &api,
        lookup: &catalog,
        credentials: &FixedAccounts,
        now: Local::now(),
        show_progress: false,
    };

    let pipeline = Pipeline::new(vec![Stage::Merge, Stage::FleetSummary]).unwrap();
    let err = pipeline.run(&ctx).await.unwrap_err();
    assert!(matches!(err, RoamingError::MissingInput { .. }));
    assert!(!config.paths.output_dir.join(MANUFACTURERS_FILE).exists());
}
