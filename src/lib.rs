//! Roaming Report Library
//!
//! Batch pipeline over Wi-Fi roaming quality telemetry. Each stage reads and
//! writes plain CSV/JSON/xlsx artifacts so stages can be run alone or chained:
//!
//! - Fetching adapter/driver roaming KPIs per account from the management API
//! - Keeping a dated daily history and re-aggregating it fleet-wide
//! - Dating each driver from the vendor catalog (driver vintage)
//! - Joining aggregates with vintage into the merged analysis table
//! - Per-account bad-driver CSVs and formatted driver summary workbooks
//! - Fleet manufacturer share, total samples and critical roaming minutes

pub mod aggregate;
pub mod artifacts;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod reports;
pub mod vintage;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::RoamingConfig;
pub use credentials::{CredentialSource, TabularCredentials};
pub use error::{Result, RoamingError};
pub use fetcher::{HttpRoamingApi, RoamingApi};
pub use models::{AggregatedRecord, Credential, GoodRoamingFormula, RoamingRecord, VintageRecord};
pub use pipeline::{Pipeline, Stage, StageContext, StageOutcome};
pub use vintage::{CatalogBackend, VintageLookup, VintageMatch};
