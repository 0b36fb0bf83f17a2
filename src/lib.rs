// Identity Risk Engine - Core Library
// Entity resolution + behavioral risk features over cleaned transactions.
// Exposes all modules for use in the CLI and tests.

pub mod error;
pub mod config;
pub mod table;
pub mod schema;       // Shape Layer - relation names + column sets
pub mod db;           // Storage collaborator (SQLite / in-memory)
pub mod entities;     // Person, Account, transactions
pub mod parties;      // Party Extractor
pub mod clustering;   // Identity Clusterer
pub mod attribution;  // Account Attributor + Transaction Re-keyer
pub mod features;     // Risk Feature Engine
pub mod pipeline;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use config::Config;
pub use table::{Table, Value};
pub use db::{import_csv, load_csv, read_csv_table, MemoryStore, SqliteStore, TableStore};
pub use entities::{Account, CleanedTransaction, Person, ResolvedTransaction};
pub use parties::{extract_parties, normalize_alias, PartyMention, PartyRole};
pub use clustering::{
    AliasEqualityRule, Clustering, DisjointSet, IdentityClusterer, MatchRule, RunSeed,
};
pub use attribution::{attribute_accounts, rekey_transactions, AccountBook, AliasDirectory};
pub use features::{
    compute_profiles, AccountAgeBucket, ActivityLog, FeatureContext, FrequencyMap,
    RiskProfile, RollingWindow,
};
pub use pipeline::{Pipeline, Resolution, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
