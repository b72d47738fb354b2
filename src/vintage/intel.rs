//! Latest Intel wireless driver release notes.
//!
//! Scrapes the vendor download page for the newest version in the version
//! picker, the "Purpose" paragraphs and the supported adapter list, and
//! writes a JSON document plus a one-row CSV for embedding in reports.

use crate::artifacts::{write_csv, write_json};
use crate::constants::{INTEL_ADAPTERS_MAX_CHARS, VINTAGE_NOT_FOUND};
use crate::error::{Result, RoamingError};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const PURPOSE_MISSING: &str = "Purpose section not found.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelDriverInfo {
    pub latest_driver_version: String,
    pub purpose: String,
    pub additional_info: Vec<String>,
    pub supported_adapters: Vec<String>,
}

/// Flattened single-row form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelDriverRow {
    pub latest_driver_version: String,
    pub purpose: String,
    pub additional_info_1: String,
    pub additional_info_2: String,
    pub supported_adapters: String,
}

impl From<&IntelDriverInfo> for IntelDriverRow {
    fn from(info: &IntelDriverInfo) -> Self {
        let joined = info.supported_adapters.join("<br>");
        Self {
            latest_driver_version: info.latest_driver_version.clone(),
            purpose: info.purpose.clone(),
            additional_info_1: info.additional_info.first().cloned().unwrap_or_default(),
            additional_info_2: info.additional_info.get(1).cloned().unwrap_or_default(),
            supported_adapters: joined.chars().take(INTEL_ADAPTERS_MAX_CHARS).collect(),
        }
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| RoamingError::configuration(format!("invalid selector '{}': {}", css, e)))
}

/// Extract release information from the download page
pub fn parse_intel_driver_page(html: &str) -> Result<IntelDriverInfo> {
    let document = Html::parse_document(html);

    let version_option = selector("select#version-driver-select option")?;
    let latest_driver_version = document
        .select(&version_option)
        .next()
        .map(|o| element_text(&o))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| VINTAGE_NOT_FOUND.to_string());

    // Paragraphs and lists in document order; adapters come from the first
    // list after the Purpose heading only
    let flow = selector("p, ul")?;
    let item = selector("li")?;
    let mut purpose = None;
    let mut additional_info = Vec::new();
    let mut supported_adapters = Vec::new();
    let mut seen_purpose = false;
    let mut adapters_read = false;

    for element in document.select(&flow) {
        match element.value().name() {
            "p" if !seen_purpose => seen_purpose = element_text(&element).contains("Purpose"),
            "p" if purpose.is_none() => purpose = Some(element_text(&element)),
            "p" if additional_info.len() < 2 => additional_info.push(element_text(&element)),
            "ul" if seen_purpose && !adapters_read => {
                adapters_read = true;
                supported_adapters = element
                    .select(&item)
                    .map(|li| element_text(&li))
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    debug!(
        "Intel page: version {}, {} adapters",
        latest_driver_version,
        supported_adapters.len()
    );
    Ok(IntelDriverInfo {
        latest_driver_version,
        purpose: purpose.unwrap_or_else(|| PURPOSE_MISSING.to_string()),
        additional_info,
        supported_adapters,
    })
}

/// Download and parse the page at `url`
pub async fn fetch_intel_driver_info(url: &str, timeout: Duration) -> Result<IntelDriverInfo> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let html = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_intel_driver_page(&html)
}

/// Write the JSON document and the flattened CSV row
pub fn write_intel_driver_info(
    info: &IntelDriverInfo,
    json_path: &Path,
    csv_path: &Path,
) -> Result<()> {
    write_json(json_path, info)?;
    write_csv(csv_path, &[IntelDriverRow::from(info)])?;
    info!(
        "Intel driver {} saved to {} and {}",
        info.latest_driver_version,
        json_path.display(),
        csv_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = r#"
<html><body>
<nav><ul><li>Home</li><li>Support</li></ul></nav>
<select id="version-driver-select">
  <option> 23.110.0.5 </option>
  <option>23.100.0.4</option>
</select>
<p>Some intro</p>
<p><strong>Purpose</strong></p>
<p>This download installs the Intel Wi-Fi drivers.</p>
<p>Driver version varies by adapter.</p>
<p>Windows 11 supported.</p>
<p>Unrelated footer paragraph.</p>
<ul>
  <li>Intel Wi-Fi 7 BE200</li>
  <li>Intel Wi-Fi 6E AX211</li>
</ul>
<ul><li>Intel Wi-Fi 6 AX201</li></ul>
</body></html>"#;

    #[test]
    fn test_parse_intel_page() {
        let info = parse_intel_driver_page(PAGE).unwrap();
        assert_eq!(info.latest_driver_version, "23.110.0.5");
        assert_eq!(info.purpose, "This download installs the Intel Wi-Fi drivers.");
        assert_eq!(
            info.additional_info,
            vec!["Driver version varies by adapter.", "Windows 11 supported."]
        );
        assert_eq!(
            info.supported_adapters,
            vec!["Intel Wi-Fi 7 BE200", "Intel Wi-Fi 6E AX211"]
        );
    }

    #[test]
    fn test_footer_lists_are_not_adapters() {
        let page = r#"
<html><body>
<p>Purpose</p>
<p>Installs the driver.</p>
<ul><li>Intel Wi-Fi 6E AX211</li></ul>
<footer><ul><li>Privacy</li><li>Cookies</li><li>Terms of Use</li></ul></footer>
</body></html>"#;
        let info = parse_intel_driver_page(page).unwrap();
        assert_eq!(info.supported_adapters, vec!["Intel Wi-Fi 6E AX211"]);
        assert_eq!(info.purpose, "Installs the driver.");
    }

    #[test]
    fn test_page_without_sections() {
        let info = parse_intel_driver_page("<html><body><p>Nothing</p></body></html>").unwrap();
        assert_eq!(info.latest_driver_version, "Not Found");
        assert_eq!(info.purpose, "Purpose section not found.");
        assert!(info.supported_adapters.is_empty());
    }

    #[test]
    fn test_csv_row_truncates_adapters() {
        let info = IntelDriverInfo {
            latest_driver_version: "1".to_string(),
            purpose: "p".to_string(),
            additional_info: vec!["a".to_string()],
            supported_adapters: (0..100).map(|i| format!("Adapter {}", i)).collect(),
        };
        let row = IntelDriverRow::from(&info);
        assert_eq!(row.supported_adapters.chars().count(), 325);
        assert!(row.supported_adapters.starts_with("Adapter 0<br>Adapter 1<br>"));
        assert_eq!(row.additional_info_2, "");
    }

    #[test]
    fn test_write_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let info = parse_intel_driver_page(PAGE).unwrap();
        let json = temp_dir.path().join("intel_driver_info.json");
        let csv = temp_dir.path().join("intel_driver_info.csv");
        write_intel_driver_info(&info, &json, &csv).unwrap();

        let back: IntelDriverInfo =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(back, info);
        assert!(
            std::fs::read_to_string(&csv)
                .unwrap()
                .starts_with("latest_driver_version,purpose,")
        );
    }
}
