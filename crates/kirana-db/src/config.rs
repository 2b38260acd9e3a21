//! # Application Configuration
//!
//! Store identity and database location, loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`KIRANA_*`)
//! 2. Defaults (this file)
//!
//! Configuration is read-only after startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use kirana_core::validation::{validate_gstin, validate_state_name};
use kirana_core::{StoreProfile, DEFAULT_HOME_STATE};

use crate::pool::DbConfig;

pub const ENV_DB_PATH: &str = "KIRANA_DB_PATH";
pub const ENV_STORE_NAME: &str = "KIRANA_STORE_NAME";
pub const ENV_HOME_STATE: &str = "KIRANA_HOME_STATE";
pub const ENV_GSTIN: &str = "KIRANA_GSTIN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// SQLite file. Default: `./kirana.db`
    pub database_path: PathBuf,

    /// Printed on receipts.
    pub store_name: String,

    /// State the store is registered in; decides CGST+SGST vs IGST.
    pub home_state: String,

    /// Store GSTIN, if registered.
    pub gstin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("./kirana.db"),
            store_name: "Kirana Store".to_string(),
            home_state: DEFAULT_HOME_STATE.to_string(),
            gstin: None,
        }
    }
}

impl AppConfig {
    /// Loads defaults overridden by `KIRANA_*` environment variables.
    ///
    /// ## Environment Variables
    /// - `KIRANA_DB_PATH`: database file
    /// - `KIRANA_STORE_NAME`: store name
    /// - `KIRANA_HOME_STATE`: home state (exact spelling used on invoices)
    /// - `KIRANA_GSTIN`: store GSTIN (ignored with a warning if malformed)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = AppConfig::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(name) = lookup(ENV_STORE_NAME).filter(|n| !n.trim().is_empty()) {
            config.store_name = name;
        }

        if let Some(state) = lookup(ENV_HOME_STATE) {
            match validate_state_name(&state) {
                Ok(()) => config.home_state = state,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_HOME_STATE),
            }
        }

        if let Some(gstin) = lookup(ENV_GSTIN) {
            match validate_gstin(&gstin) {
                Ok(()) => config.gstin = Some(gstin),
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_GSTIN),
            }
        }

        config
    }

    pub fn store_profile(&self) -> StoreProfile {
        StoreProfile {
            name: self.store_name.clone(),
            home_state: self.home_state.clone(),
            gstin: self.gstin.clone(),
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
    }
}
