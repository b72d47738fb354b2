//! Direct HTTP lookup against the driver catalog search page.

use super::{VintageLookup, VintageMatch};
use crate::constants::{CATALOG_LAST_UPDATED_CELL, CATALOG_RESULTS_TABLE_ID};
use crate::error::{Result, RoamingError};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Catalog search over plain HTTP
#[derive(Debug, Clone)]
pub struct CatalogSearch {
    client: reqwest::Client,
    search_url: String,
}

impl CatalogSearch {
    pub fn new(search_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roaming-report/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            search_url: search_url.into(),
        })
    }
}

impl VintageLookup for CatalogSearch {
    async fn lookup(&self, query: &str) -> Result<VintageMatch> {
        let html = self
            .client
            .get(&self.search_url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("Catalog returned {} bytes for '{}'", html.len(), query);
        parse_catalog_results(&html).map_err(|reason| RoamingError::scrape(query, reason))
    }
}

fn selector(css: &str) -> std::result::Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{}': {}", css, e))
}

/// "Last updated" cell of the first result row
///
/// A page without the results table, or with a table holding no data rows,
/// is a miss rather than an error.
pub fn parse_catalog_results(html: &str) -> std::result::Result<VintageMatch, String> {
    let document = Html::parse_document(html);
    let rows = selector(&format!("#{} tr", CATALOG_RESULTS_TABLE_ID))?;
    let cells = selector("td")?;

    for row in document.select(&rows) {
        if row.value().classes().any(|c| c == "headerRow") {
            continue;
        }
        let Some(cell) = row.select(&cells).nth(CATALOG_LAST_UPDATED_CELL) else {
            continue;
        };
        let text = cell.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            continue;
        }
        return Ok(VintageMatch::found(text));
    }
    Ok(VintageMatch::missing())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
<html><body>
<table id="ctl00_catalogBody_updateMatches" class="resultsBorder">
  <tr class="headerRow">
    <td></td><td>Title</td><td>Products</td><td>Classification</td><td>Last Updated</td><td>Version</td>
  </tr>
  <tr id="row-1">
    <td></td>
    <td><a>Intel Corporation - Net - 22.1.0.3</a></td>
    <td>Windows 11</td>
    <td>Drivers (Networking)</td>
    <td>
        3/7/2024
    </td>
    <td>22.1.0.3</td>
  </tr>
  <tr id="row-2">
    <td></td><td>Older</td><td>Windows 10</td><td>Drivers</td><td>1/1/2020</td><td>21.0</td>
  </tr>
</table>
</body></html>"#;

    #[test]
    fn test_first_result_row_date() {
        let result = parse_catalog_results(RESULTS_PAGE).unwrap();
        assert_eq!(result, VintageMatch::found("3/7/2024"));
        assert_eq!(result.into_vintage(), "2024-03-07");
    }

    #[test]
    fn test_no_results_table_is_a_miss() {
        let page = "<html><body><span>We did not find any results</span></body></html>";
        assert_eq!(parse_catalog_results(page).unwrap(), VintageMatch::missing());
    }

    #[test]
    fn test_header_only_table_is_a_miss() {
        let page = r#"<table id="ctl00_catalogBody_updateMatches">
            <tr class="headerRow"><td>a</td><td>b</td><td>c</td><td>d</td><td>Last Updated</td></tr>
        </table>"#;
        assert!(!parse_catalog_results(page).unwrap().found);
    }
}
