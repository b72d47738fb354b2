//! Turn API responses into flat roaming records.

use super::client::AdapterDriversResponse;
use crate::constants::UNKNOWN_VALUE;
use crate::error::{Result, RoamingError};
use crate::models::RoamingRecord;
use regex::Regex;

/// Removes the configured junk prefix from adapter strings
#[derive(Debug, Clone)]
pub struct KeyCleaner {
    prefix: Regex,
}

impl KeyCleaner {
    pub fn new(pattern: &str) -> Result<Self> {
        let prefix = Regex::new(pattern).map_err(|e| {
            RoamingError::configuration(format!("Invalid key prefix pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { prefix })
    }

    pub fn clean(&self, value: &str) -> String {
        self.prefix.replace(value, "").into_owned()
    }
}

fn minutes(value: Option<f64>) -> i64 {
    value.map(|v| v.round() as i64).unwrap_or(0)
}

/// One record per `types[]` entry; the entry's client count repeats on each
pub fn flatten_response(
    response: &AdapterDriversResponse,
    account_name: Option<&str>,
    cleaner: Option<&KeyCleaner>,
) -> Vec<RoamingRecord> {
    let mut records = Vec::new();
    for entry in &response.results {
        let adapter = entry.driver_provider.as_deref().unwrap_or(UNKNOWN_VALUE);
        let driver = entry.driver_version.as_deref().unwrap_or(UNKNOWN_VALUE);
        let key = format!("{} - {}", adapter, driver);

        let (adapter, key) = match cleaner {
            Some(c) => (c.clean(adapter), c.clean(&key)),
            None => (adapter.to_string(), key),
        };

        for sums in &entry.types {
            records.push(RoamingRecord {
                account_name: account_name.map(str::to_string),
                adapter: adapter.clone(),
                driver: driver.to_string(),
                adapter_driver: key.clone(),
                good_sum: minutes(sums.good_sum),
                critical_sum: minutes(sums.critical_sum),
                warning_sum: minutes(sums.warning_sum),
                client_count: minutes(entry.client_count),
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_KEY_PREFIX_PATTERN;

    fn response(json: &str) -> AdapterDriversResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_one_row_per_type_with_defaults() {
        let r = response(
            r#"{"results":[
                {"driverProvider":"Intel","driverVersion":"22.1","clientCount":4,
                 "types":[{"goodSum":10,"criticalSum":2,"warningSum":1},{"goodSum":5}]},
                {"clientCount":1,"types":[{"criticalSum":3}]}
            ]}"#,
        );
        let records = flatten_response(&r, Some("Acme"), None);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].adapter_driver, "Intel - 22.1");
        assert_eq!(records[1].good_sum, 5);
        assert_eq!(records[1].critical_sum, 0);
        assert_eq!(records[1].client_count, 4);
        assert_eq!(records[2].adapter_driver, "Unknown - Unknown");
        assert_eq!(records[2].account_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_entry_without_types_yields_nothing() {
        let r = response(r#"{"results":[{"driverProvider":"Intel","driverVersion":"1"}]}"#);
        assert!(flatten_response(&r, None, None).is_empty());
        assert!(flatten_response(&response("{}"), None, None).is_empty());
    }

    #[test]
    fn test_prefix_strip() {
        let cleaner = KeyCleaner::new(DEFAULT_KEY_PREFIX_PATTERN).unwrap();
        assert_eq!(
            cleaner.clean("Microsoft - Intel(R) Wi-Fi 6 AX201 160MHz"),
            "Intel(R) Wi-Fi 6 AX201 160MHz"
        );

        let r = response(
            r#"{"results":[{"driverProvider":"Vendor - Realtek 8852","driverVersion":"6.0",
                "types":[{"goodSum":1}]}]}"#,
        );
        let records = flatten_response(&r, None, Some(&cleaner));
        assert_eq!(records[0].adapter, "Realtek 8852");
        assert_eq!(records[0].adapter_driver, "Realtek 8852 - 6.0");
        assert_eq!(records[0].driver, "6.0");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(KeyCleaner::new("([").is_err());
    }
}
