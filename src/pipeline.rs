// 🚦 Pipeline - strict stage order, all-or-nothing hand-off
//
// cleaned transactions → parties → clusters → persons → accounts →
// re-keyed transactions → risk profiles. Every stage runs on fully
// materialized input. Nothing is written until all four relations exist in
// memory; they then go to storage in a single replace_tables call.

use crate::attribution::{attribute_accounts, rekey_transactions, AccountBook};
use crate::clustering::{IdentityClusterer, RunSeed};
use crate::config::Config;
use crate::db::TableStore;
use crate::entities::{Account, CleanedTransaction, Person, ResolvedTransaction};
use crate::error::Result;
use crate::features::{compute_profiles, FeatureContext, RiskProfile};
use crate::parties::extract_parties;
use crate::schema::{
    select_cleaned_columns, ACCOUNT_ENTITY, PERSON_ENTITY, RESOLVED_TRANSACTIONS,
};
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub transactions: usize,
    pub mentions: usize,
    pub persons: usize,
    pub merged_clusters: usize,
    pub accounts: usize,
    pub attributed_accounts: usize,
    /// Transactions with a null fromentity or toentity
    pub unresolved_transactions: usize,
    pub profiles: usize,
    /// Partition hash, stable across seeds
    pub fingerprint: String,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "{} transactions → {} mentions → {} persons ({} merged), {} accounts ({} attributed), {} profiles",
            self.transactions,
            self.mentions,
            self.persons,
            self.merged_clusters,
            self.accounts,
            self.attributed_accounts,
            self.profiles
        )
    }
}

// ============================================================================
// RESOLUTION (in-memory result of one run)
// ============================================================================

#[derive(Debug, Clone)]
pub struct Resolution {
    pub persons: Vec<Person>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<ResolvedTransaction>,
    pub profiles: Vec<RiskProfile>,
    pub report: RunReport,
}

impl Resolution {
    /// The four output relations, in hand-off order
    pub fn to_tables(&self) -> Result<Vec<Table>> {
        Ok(vec![
            Person::to_table(&self.persons)?,
            Account::to_table(&self.accounts),
            ResolvedTransaction::to_table(&self.transactions),
            RiskProfile::to_table(&self.profiles)?,
        ])
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    input_table: String,
    clusterer: IdentityClusterer,
    seed: RunSeed,
    context: FeatureContext,
}

impl Pipeline {
    /// Random seed, alias-equality clustering, wall-clock reference instant
    pub fn new(config: &Config) -> Self {
        Pipeline {
            input_table: config.input_table.clone(),
            clusterer: IdentityClusterer::new(),
            seed: RunSeed::random(),
            context: FeatureContext::now(config),
        }
    }

    pub fn with_seed(mut self, seed: RunSeed) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_clusterer(mut self, clusterer: IdentityClusterer) -> Self {
        self.clusterer = clusterer;
        self
    }

    pub fn with_context(mut self, context: FeatureContext) -> Self {
        self.context = context;
        self
    }

    pub fn seed(&self) -> RunSeed {
        self.seed
    }

    /// Run every stage over already-parsed transactions. Pure: touches no storage.
    pub fn resolve(&self, cleaned: &[CleanedTransaction]) -> Resolution {
        let mentions = extract_parties(cleaned);
        info!(transactions = cleaned.len(), mentions = mentions.len(), "parties extracted");

        let clustering = self.clusterer.cluster(&mentions, self.seed);
        let persons = clustering.persons(&mentions);

        let accounts = attribute_accounts(cleaned, &persons, self.seed);
        let transactions = rekey_transactions(cleaned, &AccountBook::new(&accounts));
        let profiles = compute_profiles(&transactions, &persons, &accounts, &self.context);

        let report = RunReport {
            transactions: transactions.len(),
            mentions: mentions.len(),
            persons: persons.len(),
            merged_clusters: clustering.merged_count(),
            accounts: accounts.len(),
            attributed_accounts: accounts.iter().filter(|a| a.is_attributed()).count(),
            unresolved_transactions: transactions
                .iter()
                .filter(|t| t.from_entity.is_none() || t.to_entity.is_none())
                .count(),
            profiles: profiles.len(),
            fingerprint: clustering.fingerprint(),
            completed_at: Utc::now(),
        };

        Resolution {
            persons,
            accounts,
            transactions,
            profiles,
            report,
        }
    }

    /// Read the cleaned relation, resolve, and replace all four output relations
    pub fn run<S: TableStore>(&self, store: &mut S) -> Result<RunReport> {
        let available = store.columns(&self.input_table)?;
        let selected = select_cleaned_columns(&self.input_table, &available)?;

        let input = store.read_columns(&self.input_table, &selected)?;
        let cleaned = CleanedTransaction::from_table(&input)?;
        info!(table = %self.input_table, rows = cleaned.len(), "cleaned transactions loaded");

        let resolution = self.resolve(&cleaned);
        store.replace_tables(resolution.to_tables()?)?;

        info!(
            fingerprint = %resolution.report.fingerprint,
            "{}",
            resolution.report.summary()
        );
        Ok(resolution.report)
    }

    /// Recompute user_risk_profile from previously stored entity relations
    pub fn profile<S: TableStore>(&self, store: &mut S) -> Result<usize> {
        let persons = Person::from_table(&store.read_table(PERSON_ENTITY)?)?;
        let accounts = Account::from_table(&store.read_table(ACCOUNT_ENTITY)?)?;
        let transactions =
            ResolvedTransaction::from_table(&store.read_table(RESOLVED_TRANSACTIONS)?)?;

        let profiles = compute_profiles(&transactions, &persons, &accounts, &self.context);
        let count = profiles.len();
        store.replace_tables(vec![RiskProfile::to_table(&profiles)?])?;

        Ok(count)
    }
}
