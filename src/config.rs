// ⚙️ Run configuration
// Loaded from environment variables (an optional .env file is honoured)

use crate::error::{EngineError, Result};
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

/// Domestic region codes produced by the upstream address normalizer
pub const DEFAULT_LOCAL_REGIONS: [&str; 12] = [
    "aa", "tg", "or", "snnp", "af", "sid", "am", "gamb", "som", "bgum", "har", "ddw",
];

pub const DEFAULT_INPUT_TABLE: &str = "cleaned_transactions";
pub const DEFAULT_CASH_TYPE: &str = "cash";

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database holding the input and output relations
    pub db_path: PathBuf,

    /// Name of the cleaned transaction relation
    pub input_table: String,

    /// Optional row bound applied by the store on every read (silent truncation)
    pub read_limit: Option<usize>,

    /// Beneficiary region codes that count as domestic
    pub local_regions: BTreeSet<String>,

    /// Transaction type value treated as cash
    pub cash_type: String,

    /// Log filter (RUST_LOG)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("transactions.db"),
            input_table: DEFAULT_INPUT_TABLE.to_string(),
            read_limit: None,
            local_regions: DEFAULT_LOCAL_REGIONS.iter().map(|r| r.to_string()).collect(),
            cash_type: DEFAULT_CASH_TYPE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let db_path = lookup("RISK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let input_table = match lookup("RISK_INPUT_TABLE") {
            Some(name) if name.trim().is_empty() => {
                return Err(EngineError::InvalidConfig(
                    "RISK_INPUT_TABLE must not be empty".to_string(),
                ))
            }
            Some(name) => name.trim().to_string(),
            None => defaults.input_table,
        };

        let read_limit = match lookup("RISK_READ_LIMIT") {
            Some(raw) => {
                let limit = raw.trim().parse::<usize>().map_err(|_| {
                    EngineError::InvalidConfig(format!(
                        "RISK_READ_LIMIT must be a positive integer, got '{}'",
                        raw
                    ))
                })?;
                if limit == 0 {
                    return Err(EngineError::InvalidConfig(
                        "RISK_READ_LIMIT must be greater than zero".to_string(),
                    ));
                }
                Some(limit)
            }
            None => None,
        };

        let local_regions = match lookup("RISK_LOCAL_REGIONS") {
            Some(raw) => parse_region_list(&raw)?,
            None => defaults.local_regions,
        };

        let cash_type = lookup("RISK_CASH_TYPE")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.cash_type);

        let log_level = lookup("RUST_LOG").unwrap_or(defaults.log_level);

        Ok(Config {
            db_path,
            input_table,
            read_limit,
            local_regions,
            cash_type,
            log_level,
        })
    }
}

fn parse_region_list(raw: &str) -> Result<BTreeSet<String>> {
    let regions: BTreeSet<String> = raw
        .split(',')
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .collect();

    if regions.is_empty() {
        return Err(EngineError::InvalidConfig(
            "RISK_LOCAL_REGIONS must list at least one region code".to_string(),
        ));
    }

    Ok(regions)
}
