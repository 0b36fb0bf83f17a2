// 🎯 Risk Feature Engine
//
// One RiskProfile per canonical person, computed from the re-keyed
// transactions plus the person and account relations. Every metric family
// lives in its own submodule and is computed independently; this module only
// joins them per person.
//
// A person without transactions still gets a row: counts and totals are 0,
// statistics and ratios are None.

pub mod activity;
pub mod amounts;
pub mod frequency;
pub mod static_features;
pub mod windows;

pub use activity::{ActivityLog, SINGLE_EVENT_LAPSE};
pub use amounts::AmountFeatures;
pub use frequency::{CategoricalProfile, FrequencyMap};
pub use static_features::{AccountAge, AccountAgeBucket, StaticFeatures};
pub use windows::{RollingWindow, WindowPeak};

use crate::config::Config;
use crate::entities::{Account, Person, ResolvedTransaction};
use crate::error::Result;
use crate::schema::{RISK_PROFILE_COLUMNS, USER_RISK_PROFILE};
use crate::table::{datetime_value, integer_value, real_value, text_value, Table, Value};
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Run-level inputs of the feature engine that do not come from data
#[derive(Debug, Clone)]
pub struct FeatureContext {
    /// Reference instant for account age
    pub as_of: NaiveDateTime,
    pub local_regions: BTreeSet<String>,
    pub cash_type: String,
}

impl FeatureContext {
    pub fn from_config(config: &Config, as_of: NaiveDateTime) -> Self {
        FeatureContext {
            as_of,
            local_regions: config.local_regions.clone(),
            cash_type: config.cash_type.clone(),
        }
    }

    /// Context with the local wall clock as reference instant
    pub fn now(config: &Config) -> Self {
        Self::from_config(config, Local::now().naive_local())
    }

    /// Case-insensitive match against the configured cash type
    pub fn is_cash(&self, transaction_type: &str) -> bool {
        transaction_type.trim().eq_ignore_ascii_case(self.cash_type.trim())
    }

    /// Case-insensitive membership in the configured domestic regions
    pub fn is_local(&self, region: &str) -> bool {
        let region = region.trim();
        self.local_regions
            .iter()
            .any(|local| local.eq_ignore_ascii_case(region))
    }
}

// ============================================================================
// RISK PROFILE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskProfile {
    pub person_id: String,

    // Static
    pub unique_aliases_used: u64,
    pub unique_phone_numbers_used: u64,
    pub unique_accounts_held: u64,
    pub account_age_days: Option<i64>,
    pub account_age_years: Option<f64>,
    pub account_age_bucket: Option<AccountAgeBucket>,

    // Volume / frequency
    pub no_of_transactions_sent: u64,
    pub no_of_transactions_received: u64,
    pub avg_transaction_amount_sent: Option<f64>,
    pub avg_transaction_amount_received: Option<f64>,
    pub std_transaction_amount_sent: Option<f64>,
    pub std_transaction_amount_received: Option<f64>,
    pub std_transaction_amount: Option<f64>,
    pub total_amount_sent: f64,
    pub total_amount_received: f64,
    pub cash_amount_sent: f64,
    pub non_cash_amount_sent: f64,

    // Rolling windows (sender side)
    pub max_freq_1hr: Option<u64>,
    pub max_freq_24hr: Option<u64>,
    pub max_freq_7d: Option<u64>,
    pub max_freq_1m: Option<u64>,
    pub max_volume_1hr: Option<f64>,
    pub max_volume_24hr: Option<f64>,
    pub max_volume_7d: Option<f64>,
    pub max_volume_1m: Option<f64>,

    // Ratios
    pub amount_received_vs_sent_ratio: Option<f64>,
    pub cash_vs_non_cash_ratio: Option<f64>,
    pub cross_border_risk: Option<u64>,
    pub night_time_transaction_ratio: Option<f64>,
    pub new_beneficiary_ratio: Option<f64>,

    // Dormancy
    pub min_time_lapse_minutes: Option<f64>,
    pub max_time_lapse_minutes: Option<f64>,
    pub avg_time_lapse_minutes: Option<f64>,
    pub last_transaction_time: Option<NaiveDateTime>,
    pub all_transaction_times: Option<ActivityLog>,

    // Categorical (sender side)
    pub prefered_branches: Option<FrequencyMap>,
    pub used_transaction_types: Option<FrequencyMap>,
    pub frequent_destinations: Option<FrequencyMap>,
    pub top_beneficiaries: Option<FrequencyMap>,
}

impl RiskProfile {
    pub fn new(person_id: String) -> Self {
        RiskProfile {
            person_id,
            ..Default::default()
        }
    }

    fn apply_static(&mut self, features: &StaticFeatures) {
        self.unique_aliases_used = features.unique_aliases_used;
        self.unique_phone_numbers_used = features.unique_phone_numbers_used;
        self.unique_accounts_held = features.unique_accounts_held;
        if let Some(age) = features.account_age {
            self.account_age_days = Some(age.days);
            self.account_age_years = Some(age.years);
            self.account_age_bucket = age.bucket;
        }
    }

    fn apply_amounts(&mut self, features: AmountFeatures) {
        self.no_of_transactions_sent = features.no_of_transactions_sent;
        self.no_of_transactions_received = features.no_of_transactions_received;
        self.avg_transaction_amount_sent = features.avg_transaction_amount_sent;
        self.avg_transaction_amount_received = features.avg_transaction_amount_received;
        self.std_transaction_amount_sent = features.std_transaction_amount_sent;
        self.std_transaction_amount_received = features.std_transaction_amount_received;
        self.std_transaction_amount = features.std_transaction_amount;
        self.total_amount_sent = features.total_amount_sent;
        self.total_amount_received = features.total_amount_received;
        self.cash_amount_sent = features.cash_amount_sent;
        self.non_cash_amount_sent = features.non_cash_amount_sent;
        self.amount_received_vs_sent_ratio = features.amount_received_vs_sent_ratio;
        self.cash_vs_non_cash_ratio = features.cash_vs_non_cash_ratio;
        self.cross_border_risk = features.cross_border_risk;
        self.night_time_transaction_ratio = features.night_time_transaction_ratio;
        self.new_beneficiary_ratio = features.new_beneficiary_ratio;
    }

    fn apply_windows(&mut self, peaks: &[WindowPeak; 4]) {
        let [hour, day, week, month] = *peaks;
        self.max_freq_1hr = Some(hour.max_count);
        self.max_freq_24hr = Some(day.max_count);
        self.max_freq_7d = Some(week.max_count);
        self.max_freq_1m = Some(month.max_count);
        self.max_volume_1hr = Some(hour.max_volume);
        self.max_volume_24hr = Some(day.max_volume);
        self.max_volume_7d = Some(week.max_volume);
        self.max_volume_1m = Some(month.max_volume);
    }

    fn apply_activity(&mut self, log: ActivityLog) {
        if let Some((min, max, avg)) = log.lapse_minutes() {
            self.min_time_lapse_minutes = Some(min);
            self.max_time_lapse_minutes = Some(max);
            self.avg_time_lapse_minutes = Some(avg);
        }
        self.last_transaction_time = log.last_time();
        self.all_transaction_times = Some(log);
    }

    fn apply_categorical(&mut self, profile: CategoricalProfile) {
        self.prefered_branches = Some(profile.prefered_branches);
        self.used_transaction_types = Some(profile.used_transaction_types);
        self.frequent_destinations = Some(profile.frequent_destinations);
        self.top_beneficiaries = Some(profile.top_beneficiaries);
    }

    /// The user_risk_profile relation; maps and the activity log become JSON text here
    pub fn to_table(profiles: &[RiskProfile]) -> Result<Table> {
        let mut table = Table::new(USER_RISK_PROFILE, &RISK_PROFILE_COLUMNS);

        let count = |v: u64| Value::Integer(v as i64);
        let optional_count = |v: Option<u64>| integer_value(v.map(|c| c as i64));
        let json_map = |m: &Option<FrequencyMap>| -> Result<Value> {
            Ok(text_value(m.as_ref().map(|m| m.to_json()).transpose()?))
        };

        for p in profiles {
            let activity = p
                .all_transaction_times
                .as_ref()
                .map(|log| log.to_json())
                .transpose()?;

            table.push_row(vec![
                Value::Text(p.person_id.clone()),
                count(p.unique_aliases_used),
                count(p.unique_phone_numbers_used),
                count(p.unique_accounts_held),
                integer_value(p.account_age_days),
                real_value(p.account_age_years),
                text_value(p.account_age_bucket.map(|b| b.label())),
                count(p.no_of_transactions_sent),
                count(p.no_of_transactions_received),
                real_value(p.avg_transaction_amount_sent),
                real_value(p.avg_transaction_amount_received),
                real_value(p.std_transaction_amount_sent),
                real_value(p.std_transaction_amount_received),
                real_value(p.std_transaction_amount),
                real_value(Some(p.total_amount_sent)),
                real_value(Some(p.total_amount_received)),
                real_value(Some(p.cash_amount_sent)),
                real_value(Some(p.non_cash_amount_sent)),
                optional_count(p.max_freq_1hr),
                optional_count(p.max_freq_24hr),
                optional_count(p.max_freq_7d),
                optional_count(p.max_freq_1m),
                real_value(p.max_volume_1hr),
                real_value(p.max_volume_24hr),
                real_value(p.max_volume_7d),
                real_value(p.max_volume_1m),
                real_value(p.amount_received_vs_sent_ratio),
                real_value(p.cash_vs_non_cash_ratio),
                optional_count(p.cross_border_risk),
                real_value(p.night_time_transaction_ratio),
                real_value(p.new_beneficiary_ratio),
                real_value(p.min_time_lapse_minutes),
                real_value(p.max_time_lapse_minutes),
                real_value(p.avg_time_lapse_minutes),
                datetime_value(p.last_transaction_time),
                text_value(activity),
                json_map(&p.prefered_branches)?,
                json_map(&p.used_transaction_types)?,
                json_map(&p.frequent_destinations)?,
                json_map(&p.top_beneficiaries)?,
            ]);
        }

        Ok(table)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Compute one profile per person, in person order
pub fn compute_profiles(
    transactions: &[ResolvedTransaction],
    persons: &[Person],
    accounts: &[Account],
    ctx: &FeatureContext,
) -> Vec<RiskProfile> {
    let mut statics = static_features::static_features(persons, accounts, ctx.as_of);
    let mut amounts = amounts::amount_features(transactions, ctx);
    let mut peaks = windows::sender_window_peaks(transactions);
    let mut logs = activity::activity_logs(transactions);
    let mut categorical = frequency::categorical_profiles(transactions);

    debug!(
        senders = peaks.len(),
        active_entities = logs.len(),
        "feature families computed"
    );

    let profiles: Vec<RiskProfile> = persons
        .iter()
        .map(|person| {
            let id = person.person_id.as_str();
            let mut profile = RiskProfile::new(person.person_id.clone());

            if let Some(features) = statics.remove(id) {
                profile.apply_static(&features);
            }
            if let Some(features) = amounts.remove(id) {
                profile.apply_amounts(features);
            }
            if let Some(window_peaks) = peaks.remove(id) {
                profile.apply_windows(&window_peaks);
            }
            if let Some(log) = logs.remove(id) {
                profile.apply_activity(log);
            }
            if let Some(maps) = categorical.remove(id) {
                profile.apply_categorical(maps);
            }
            profile
        })
        .collect();

    let active = profiles
        .iter()
        .filter(|p| p.no_of_transactions_sent + p.no_of_transactions_received > 0)
        .count();
    info!(
        profiles = profiles.len(),
        active,
        dormant = profiles.len() - active,
        "risk profiles computed"
    );

    profiles
}


#[cfg(test)]
mod tests {
    use super::test_support::{context, resolved};
    use super::*;
    use crate::attribution::{attribute_accounts, rekey_transactions, AccountBook};
    use crate::clustering::{IdentityClusterer, RunSeed};
    use crate::entities::transaction::test_support::cleaned;
    use crate::parties::extract_parties;

    #[test]
    fn test_every_person_gets_a_row() {
        let persons = vec![Person::new("P1".to_string()), Person::new("P2".to_string())];
        let txs = vec![resolved(Some("P1"), None, 10.0, "2024-01-01 10:00:00")];

        let profiles = compute_profiles(&txs, &persons, &[], &context());

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].person_id, "P1");
        assert_eq!(profiles[0].max_freq_1hr, Some(1));
        assert_eq!(profiles[0].min_time_lapse_minutes, Some(SINGLE_EVENT_LAPSE));

        let idle = &profiles[1];
        assert_eq!(idle.no_of_transactions_sent, 0);
        assert_eq!(idle.total_amount_received, 0.0);
        assert_eq!(idle.avg_transaction_amount_sent, None);
        assert_eq!(idle.max_freq_1hr, None);
        assert_eq!(idle.last_transaction_time, None);
        assert_eq!(idle.prefered_branches, None);
    }

    #[test]
    fn test_end_to_end_new_beneficiary_scaling() {
        let txs = vec![
            cleaned("t1", "abebe kebede", "A1", "x", "X1", 100.0, "2024-01-01 10:00:00"),
            cleaned("t2", "abebe kebede", "A1", "y", "Y1", 50.0, "2024-01-02 10:00:00"),
        ];
        let seed = RunSeed::from_u128(11);
        let mentions = extract_parties(&txs);
        let persons = IdentityClusterer::new().cluster(&mentions, seed).persons(&mentions);
        let accounts = attribute_accounts(&txs, &persons, seed);
        let resolved = rekey_transactions(&txs, &AccountBook::new(&accounts));

        let profiles = compute_profiles(&resolved, &persons, &accounts, &context());

        let abebe = persons.iter().position(|p| p.aliases.contains("abebe kebede")).unwrap();
        let profile = &profiles[abebe];
        assert_eq!(profile.no_of_transactions_sent, 2);
        assert_eq!(profile.new_beneficiary_ratio, Some(2.0));
        assert_eq!(profile.top_beneficiaries.as_ref().map(|m| m.len()), Some(2));
        assert_eq!(profile.unique_accounts_held, 1);
        assert_eq!(profile.max_volume_24hr, Some(100.0));
        assert_eq!(profile.max_volume_7d, Some(150.0));
        assert_eq!(profile.min_time_lapse_minutes, Some(1440.0));
    }

    #[test]
    fn test_profile_table_serializes_maps_at_boundary() {
        let persons = vec![Person::new("P1".to_string()), Person::new("P2".to_string())];
        let mut tx = resolved(Some("P1"), Some("P2"), 10.0, "2024-01-01 10:00:00");
        tx.branch_id = Some("br-1".to_string());

        let profiles = compute_profiles(&[tx], &persons, &[], &context());
        let table = RiskProfile::to_table(&profiles).unwrap();

        assert_eq!(table.name, USER_RISK_PROFILE);
        assert_eq!(table.columns().len(), RISK_PROFILE_COLUMNS.len());
        assert_eq!(table.len(), 2);

        let rows: Vec<_> = table.iter().collect();
        assert_eq!(rows[0].text("prefered_branches").as_deref(), Some(r#"{"br-1":1}"#));
        assert_eq!(rows[0].text("top_beneficiaries").as_deref(), Some(r#"{"P2":1}"#));
        assert_eq!(
            rows[1].text("all_transaction_times").as_deref(),
            Some(r#"{"2024-01-01 10:00:00":["NaT","beneficiary"]}"#)
        );
        assert_eq!(*rows[1].value("prefered_branches"), Value::Null);
        assert_eq!(*rows[1].value("no_of_transactions_sent"), Value::Integer(0));
    }
}
