//! HTTP access to the monitoring API.

use crate::config::ApiConfig;
use crate::constants::ROAMING_KPI_TYPE;
use crate::error::{Result, RoamingError};
use crate::models::{Credential, TimeWindow};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// The two calls a fetch needs from the upstream API
#[allow(async_fn_in_trait)]
pub trait RoamingApi {
    /// Exchange client credentials for a bearer token
    async fn access_token(&self, credential: &Credential) -> Result<String>;

    /// Adapter/driver roaming KPIs for the account behind `token`
    async fn adapter_drivers(
        &self,
        token: &str,
        window: Option<TimeWindow>,
    ) -> Result<AdapterDriversResponse>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterDriversResponse {
    #[serde(default)]
    pub results: Vec<AdapterDriverEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterDriverEntry {
    pub driver_provider: Option<String>,
    pub driver_version: Option<String>,
    pub client_count: Option<f64>,
    #[serde(default)]
    pub types: Vec<KpiSums>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSums {
    pub good_sum: Option<f64>,
    pub critical_sum: Option<f64>,
    pub warning_sum: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// reqwest-backed API client
#[derive(Debug, Clone)]
pub struct HttpRoamingApi {
    client: reqwest::Client,
    token_url: String,
    adapter_drivers_url: String,
}

impl HttpRoamingApi {
    pub fn new(config: &ApiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token_url: config.token_url(),
            adapter_drivers_url: config.adapter_drivers_url(),
        })
    }
}

impl RoamingApi for HttpRoamingApi {
    async fn access_token(&self, credential: &Credential) -> Result<String> {
        debug!("Requesting token for {}", credential.label());
        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.expose()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoamingError::Authentication {
                client_id: credential.client_id.clone(),
                reason: format!("token endpoint returned {}", status),
            });
        }

        let body: TokenResponse = response.json().await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RoamingError::Authentication {
                client_id: credential.client_id.clone(),
                reason: "response carried no access_token".to_string(),
            })
    }

    async fn adapter_drivers(
        &self,
        token: &str,
        window: Option<TimeWindow>,
    ) -> Result<AdapterDriversResponse> {
        let mut query = vec![
            ("type", ROAMING_KPI_TYPE.to_string()),
            ("includeClientCount", "true".to_string()),
        ];
        if let Some(window) = window {
            query.push(("from", window.from_ms.to_string()));
            query.push(("to", window.to_ms.to_string()));
        }

        let response = self
            .client
            .get(&self.adapter_drivers_url)
            .header("Accept", "application/json")
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}
