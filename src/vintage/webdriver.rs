//! Catalog lookup through browser automation.
//!
//! Needs a running WebDriver endpoint (chromedriver). Each lookup opens its
//! own headless session, waits explicitly for the results table, and hands
//! the rendered page to the same parser the HTTP lookup uses.

use super::catalog::parse_catalog_results;
use super::{VintageLookup, VintageMatch};
use crate::constants::CATALOG_RESULTS_TABLE_ID;
use crate::error::{Result, RoamingError};
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::{debug, warn};

const RESULTS_WAIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct WebDriverCatalog {
    webdriver_url: String,
    search_url: String,
}

impl WebDriverCatalog {
    pub fn new(webdriver_url: impl Into<String>, search_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            search_url: search_url.into(),
        }
    }

    async fn open_session(&self) -> WebDriverResult<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()?;
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        WebDriver::new(&self.webdriver_url, caps).await
    }

    async fn rendered_results(&self, driver: &WebDriver, url: &str) -> WebDriverResult<String> {
        driver.goto(url).await?;
        driver
            .query(By::Id(CATALOG_RESULTS_TABLE_ID))
            .wait(RESULTS_WAIT, POLL_INTERVAL)
            .first()
            .await?;
        driver.source().await
    }
}

impl VintageLookup for WebDriverCatalog {
    async fn lookup(&self, query: &str) -> Result<VintageMatch> {
        let url = reqwest::Url::parse_with_params(&self.search_url, &[("q", query)])
            .map_err(|e| RoamingError::scrape(query, e.to_string()))?;
        let driver = self
            .open_session()
            .await
            .map_err(|e| RoamingError::scrape(query, e.to_string()))?;

        let page = self.rendered_results(&driver, url.as_str()).await;
        if let Err(e) = driver.quit().await {
            warn!("Failed to close browser session: {}", e);
        }

        let html = page.map_err(|e| RoamingError::scrape(query, e.to_string()))?;
        debug!("Rendered catalog page for '{}'", query);
        parse_catalog_results(&html).map_err(|reason| RoamingError::scrape(query, reason))
    }
}
