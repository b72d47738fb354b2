//! Driver vintage enrichment.
//!
//! Every distinct adapter-driver key of the aggregated table is looked up in
//! the vendor driver catalog; the "last updated" date of the first match is
//! that driver's vintage. Lookups go through `VintageLookup` so the scraping
//! technique can change without touching enrichment or merge. A lookup that
//! misses or fails records `Not Found` for that key only.

pub mod catalog;
pub mod intel;
#[cfg(feature = "webdriver")]
pub mod webdriver;

pub use catalog::{CatalogSearch, parse_catalog_results};

use crate::artifacts::{read_csv, write_csv};
use crate::config::{LookupBackend, VintageConfig};
use crate::constants::VINTAGE_NOT_FOUND;
use crate::error::Result;
#[cfg(not(feature = "webdriver"))]
use crate::error::RoamingError;
use crate::models::{AggregatedRow, VintageRecord, normalize_key};
use crate::progress::ProgressReporter;
use chrono::NaiveDate;
use colored::*;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one catalog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VintageMatch {
    pub found: bool,
    pub date: Option<String>,
}

impl VintageMatch {
    pub fn found(date: impl Into<String>) -> Self {
        Self {
            found: true,
            date: Some(date.into()),
        }
    }

    pub fn missing() -> Self {
        Self {
            found: false,
            date: None,
        }
    }

    /// Stored vintage string: normalized date or the sentinel
    pub fn into_vintage(self) -> String {
        match (self.found, self.date) {
            (true, Some(date)) if !date.trim().is_empty() => normalize_vintage_date(&date),
            _ => VINTAGE_NOT_FOUND.to_string(),
        }
    }
}

/// Source of driver release dates
#[allow(async_fn_in_trait)]
pub trait VintageLookup {
    async fn lookup(&self, query: &str) -> Result<VintageMatch>;
}

/// Lookup selected by `vintage.backend`
#[derive(Debug, Clone)]
pub enum CatalogBackend {
    Http(CatalogSearch),
    #[cfg(feature = "webdriver")]
    WebDriver(webdriver::WebDriverCatalog),
}

impl CatalogBackend {
    pub fn from_config(config: &VintageConfig) -> Result<Self> {
        match config.backend {
            LookupBackend::Http => Ok(Self::Http(CatalogSearch::new(
                &config.search_url,
                Duration::from_secs(config.timeout_secs),
            )?)),
            #[cfg(feature = "webdriver")]
            LookupBackend::WebDriver => Ok(Self::WebDriver(webdriver::WebDriverCatalog::new(
                &config.webdriver_url,
                &config.search_url,
            ))),
            #[cfg(not(feature = "webdriver"))]
            LookupBackend::WebDriver => Err(RoamingError::configuration(
                "vintage.backend = \"web_driver\" needs a build with the `webdriver` feature",
            )),
        }
    }
}

impl VintageLookup for CatalogBackend {
    async fn lookup(&self, query: &str) -> Result<VintageMatch> {
        match self {
            Self::Http(search) => search.lookup(query).await,
            #[cfg(feature = "webdriver")]
            Self::WebDriver(browser) => browser.lookup(query).await,
        }
    }
}

const VINTAGE_DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// ISO form of a catalog date; unparseable values come back untouched
pub fn normalize_vintage_date(value: &str) -> String {
    let trimmed = value.trim();
    VINTAGE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Distinct keys in first-seen order, compared by normalized form
pub fn distinct_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|k| !k.trim().is_empty())
        .filter(|k| seen.insert(normalize_key(k)))
        .map(str::to_string)
        .collect()
}

/// Bounded, optionally throttled lookup of many keys
pub struct VintageEnricher<'a, L> {
    lookup: &'a L,
    workers: usize,
    delay: Duration,
    jitter_ms: u64,
    show_progress: bool,
}

impl<'a, L: VintageLookup> VintageEnricher<'a, L> {
    pub fn new(lookup: &'a L, workers: usize) -> Self {
        Self {
            lookup,
            workers: workers.max(1),
            delay: Duration::ZERO,
            jitter_ms: 0,
            show_progress: false,
        }
    }

    pub fn with_throttle(mut self, delay_ms: u64, jitter_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn pause(&self) -> Duration {
        if self.jitter_ms == 0 {
            return self.delay;
        }
        let extra = rand::rng().random_range(0..=self.jitter_ms);
        self.delay + Duration::from_millis(extra)
    }

    async fn resolve_one(&self, key: &str) -> String {
        let pause = self.pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match self.lookup.lookup(key).await {
            Ok(result) => {
                let vintage = result.into_vintage();
                debug!("{} -> {}", key, vintage);
                vintage
            }
            Err(e) => {
                warn!("Vintage lookup failed for '{}': {}", key, e);
                VINTAGE_NOT_FOUND.to_string()
            }
        }
    }

    /// One record per key, in the order given
    pub async fn resolve(&self, keys: &[String]) -> Vec<VintageRecord> {
        let progress = ProgressReporter::new(keys.len(), "drivers", self.show_progress);

        let mut resolved: Vec<(usize, VintageRecord)> = stream::iter(keys.iter().enumerate())
            .map(|(index, key)| {
                let progress = progress.clone();
                async move {
                    progress.set_message(format!("Searching: {}", key));
                    let vintage = self.resolve_one(key).await;
                    progress.increment();
                    (
                        index,
                        VintageRecord {
                            adapter_driver: key.clone(),
                            vintage,
                        },
                    )
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        resolved.sort_by_key(|(index, _)| *index);
        progress.finish("Vintage lookups complete");
        resolved.into_iter().map(|(_, record)| record).collect()
    }
}

/// Counters for one enrichment run
#[derive(Debug, Clone, Default)]
pub struct VintageReport {
    pub keys: usize,
    pub reused: usize,
    pub queried: usize,
    pub found: usize,
    /// Dated entries from the previous table whose driver is not in this run
    pub carried_over: usize,
    pub output_path: PathBuf,
}

/// Vintage table for the aggregated keys, reusing known dates from the
/// table already at `output_path` when configured to
pub async fn enrich_vintage<L: VintageLookup>(
    lookup: &L,
    aggregated_path: &Path,
    output_path: &Path,
    config: &VintageConfig,
    show_progress: bool,
) -> Result<VintageReport> {
    let aggregated: Vec<AggregatedRow> = read_csv(aggregated_path)?;
    let keys = distinct_keys(aggregated.iter().map(|r| r.adapter_driver.as_str()));

    let previous_rows: Vec<VintageRecord> = if config.reuse_previous && output_path.exists() {
        match read_csv::<VintageRecord>(output_path) {
            Ok(rows) => rows.into_iter().filter(VintageRecord::is_found).collect(),
            Err(e) => {
                warn!("Ignoring unreadable previous vintage table: {}", e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };
    let previous: HashMap<String, String> = previous_rows
        .iter()
        .map(|r| (normalize_key(&r.adapter_driver), r.vintage.clone()))
        .collect();

    let to_query: Vec<String> = keys
        .iter()
        .filter(|k| !previous.contains_key(&normalize_key(k)))
        .cloned()
        .collect();
    info!(
        "{} distinct drivers, {} known from previous run, {} to look up",
        keys.len(),
        keys.len() - to_query.len(),
        to_query.len()
    );

    let fresh: HashMap<String, String> = VintageEnricher::new(lookup, config.workers)
        .with_throttle(config.delay_ms, config.jitter_ms)
        .with_progress(show_progress)
        .resolve(&to_query)
        .await
        .into_iter()
        .map(|r| (normalize_key(&r.adapter_driver), r.vintage))
        .collect();

    let mut records: Vec<VintageRecord> = keys
        .iter()
        .map(|key| {
            let normalized = normalize_key(key);
            let vintage = previous
                .get(&normalized)
                .or_else(|| fresh.get(&normalized))
                .cloned()
                .unwrap_or_else(|| VINTAGE_NOT_FOUND.to_string());
            VintageRecord {
                adapter_driver: key.clone(),
                vintage,
            }
        })
        .collect();
    let found = records.iter().filter(|r| r.is_found()).count();

    // Dated drivers absent from this run stay in the table for later runs
    let current: HashSet<String> = keys.iter().map(|k| normalize_key(k)).collect();
    let mut carried_keys = HashSet::new();
    let carried: Vec<VintageRecord> = previous_rows
        .into_iter()
        .filter(|r| {
            let key = normalize_key(&r.adapter_driver);
            !current.contains(&key) && carried_keys.insert(key)
        })
        .collect();
    if !carried.is_empty() {
        debug!("Keeping {} dated drivers not seen in this run", carried.len());
    }
    let carried_over = carried.len();
    records.extend(carried);

    write_csv(output_path, &records)?;

    println!(
        "  {} {}/{} drivers dated ({} looked up) -> {}",
        "Vintage".bright_green(),
        found.to_string().bright_white().bold(),
        keys.len(),
        to_query.len(),
        output_path.display()
    );

    Ok(VintageReport {
        keys: keys.len(),
        reused: keys.len() - to_query.len(),
        queried: to_query.len(),
        found,
        carried_over,
        output_path: output_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoamingError;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeCatalog {
        dates: HashMap<String, String>,
        failing: Vec<String>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeCatalog {
        fn new(dates: &[(&str, &str)], failing: &[&str]) -> Self {
            Self {
                dates: dates
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    impl VintageLookup for FakeCatalog {
        async fn lookup(&self, query: &str) -> Result<VintageMatch> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.failing.iter().any(|f| f == query) {
                return Err(RoamingError::scrape(query, "element not interactable"));
            }
            Ok(match self.dates.get(query) {
                Some(date) => VintageMatch::found(date.clone()),
                None => VintageMatch::missing(),
            })
        }
    }

    fn aggregated_row(key: &str) -> AggregatedRow {
        AggregatedRow {
            adapter_driver: key.to_string(),
            adapter: key.to_string(),
            good_sum: 10_000,
            critical_sum: 0,
            warning_sum: 0,
            client_count: 1,
            total_sum: 10_000,
            good_pct: 100.0,
        }
    }

    #[test]
    fn test_normalize_vintage_date() {
        assert_eq!(normalize_vintage_date("3/7/2024"), "2024-03-07");
        assert_eq!(normalize_vintage_date("12/31/2023"), "2023-12-31");
        assert_eq!(normalize_vintage_date("2024/03/07"), "2024-03-07");
        assert_eq!(normalize_vintage_date("2024-03-07"), "2024-03-07");
        assert_eq!(normalize_vintage_date("Not Found"), "Not Found");
        assert_eq!(normalize_vintage_date("sometime"), "sometime");
    }

    #[test]
    fn test_distinct_keys_normalized() {
        let keys = distinct_keys(["Intel - 22.1", " intel - 22.1", "Realtek - 1", ""]);
        assert_eq!(keys, vec!["Intel - 22.1", "Realtek - 1"]);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_isolated() {
        let catalog = FakeCatalog::new(
            &[("A - 1", "3/7/2024"), ("C - 3", "1/2/2023")],
            &["B - 2"],
        );
        let keys: Vec<String> = ["A - 1", "B - 2", "C - 3", "D - 4"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let records = VintageEnricher::new(&catalog, 2).resolve(&keys).await;
        let vintages: Vec<&str> = records.iter().map(|r| r.vintage.as_str()).collect();
        assert_eq!(vintages, vec!["2024-03-07", "Not Found", "2023-01-02", "Not Found"]);
        assert_eq!(records[1].adapter_driver, "B - 2");
    }

    #[tokio::test]
    async fn test_enrich_reuses_previous_dates() {
        let temp_dir = TempDir::new().unwrap();
        let aggregated = temp_dir.path().join("aggregated.csv");
        let output = temp_dir.path().join("driver_vintage.csv");

        write_csv(
            &aggregated,
            &[
                aggregated_row("A - 1"),
                aggregated_row("B - 2"),
                aggregated_row("C - 3"),
            ],
        )
        .unwrap();
        write_csv(
            &output,
            &[
                VintageRecord {
                    adapter_driver: "a - 1".to_string(),
                    vintage: "2020-01-01".to_string(),
                },
                VintageRecord {
                    adapter_driver: "B - 2".to_string(),
                    vintage: "Not Found".to_string(),
                },
            ],
        )
        .unwrap();

        let catalog = FakeCatalog::new(&[("B - 2", "5/5/2022")], &[]);
        let report = enrich_vintage(
            &catalog,
            &aggregated,
            &output,
            &VintageConfig::default(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(report.keys, 3);
        assert_eq!(report.reused, 1);
        assert_eq!(report.queried, 2);
        assert_eq!(report.found, 2);

        let mut queried = catalog.queries.lock().unwrap().clone();
        queried.sort();
        assert_eq!(queried, vec!["B - 2", "C - 3"]);

        let table: Vec<VintageRecord> = read_csv(&output).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].vintage, "2020-01-01");
        assert_eq!(table[1].vintage, "2022-05-05");
        assert_eq!(table[2].vintage, "Not Found");
    }

    #[tokio::test]
    async fn test_enrich_keeps_dates_of_absent_drivers() {
        let temp_dir = TempDir::new().unwrap();
        let aggregated = temp_dir.path().join("aggregated.csv");
        let output = temp_dir.path().join("driver_vintage.csv");
        let dated = |key: &str, vintage: &str| VintageRecord {
            adapter_driver: key.to_string(),
            vintage: vintage.to_string(),
        };

        write_csv(&aggregated, &[aggregated_row("A - 1")]).unwrap();
        write_csv(
            &output,
            &[
                dated("Old - 9", "2019-06-01"),
                dated("Gone - 2", "Not Found"),
            ],
        )
        .unwrap();

        let catalog = FakeCatalog::new(&[("A - 1", "3/7/2024"), ("Old - 9", "1/1/2000")], &[]);
        let report = enrich_vintage(
            &catalog,
            &aggregated,
            &output,
            &VintageConfig::default(),
            false,
        )
        .await
        .unwrap();
        assert_eq!(report.keys, 1);
        assert_eq!(report.carried_over, 1);

        let table: Vec<VintageRecord> = read_csv(&output).unwrap();
        assert_eq!(
            table,
            vec![dated("A - 1", "2024-03-07"), dated("Old - 9", "2019-06-01")]
        );

        // The carried entry is reused once the driver shows up again
        write_csv(&aggregated, &[aggregated_row("A - 1"), aggregated_row("Old - 9")]).unwrap();
        let report = enrich_vintage(
            &catalog,
            &aggregated,
            &output,
            &VintageConfig::default(),
            false,
        )
        .await
        .unwrap();
        assert_eq!(report.queried, 0);
        assert_eq!(report.carried_over, 0);
        assert_eq!(catalog.queries.lock().unwrap().clone(), vec!["A - 1"]);
    }

    #[tokio::test]
    async fn test_enrich_requires_aggregated_table() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = FakeCatalog::new(&[], &[]);
        let result = enrich_vintage(
            &catalog,
            &temp_dir.path().join("missing.csv"),
            &temp_dir.path().join("out.csv"),
            &VintageConfig::default(),
            false,
        )
        .await;
        assert!(matches!(result, Err(RoamingError::MissingInput { .. })));
    }
}
