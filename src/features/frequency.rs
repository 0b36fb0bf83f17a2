// 📊 Categorical frequency profiles (sender side)
//
// Per sender: transactions per branch, per transaction type, per beneficiary
// region (keys in discovery order) and counterparties ranked by count.
// Maps stay structured until the storage boundary serializes them to JSON.

use crate::entities::ResolvedTransaction;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Ordered key → count map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyMap {
    entries: Vec<(String, u64)>,
    /// Key → position in `entries`
    index: HashMap<String, usize>,
}

impl FrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence; new keys go to the end
    pub fn increment(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.index.get(key).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Descending by count; ties keep discovery order
    pub fn ranked(mut self) -> Self {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        for (slot, (key, _)) in self.entries.iter().enumerate() {
            self.index.insert(key.clone(), slot);
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for FrequencyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// The four categorical profiles of one sender
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoricalProfile {
    pub prefered_branches: FrequencyMap,
    pub used_transaction_types: FrequencyMap,
    pub frequent_destinations: FrequencyMap,
    pub top_beneficiaries: FrequencyMap,
}

/// Categorical profiles keyed by sender. Null keys are not counted.
pub fn categorical_profiles(
    transactions: &[ResolvedTransaction],
) -> HashMap<String, CategoricalProfile> {
    let mut profiles: HashMap<String, CategoricalProfile> = HashMap::new();

    for tx in transactions {
        let Some(sender) = &tx.from_entity else {
            continue;
        };
        let profile = profiles.entry(sender.clone()).or_default();

        if let Some(branch) = &tx.branch_id {
            profile.prefered_branches.increment(branch);
        }
        if let Some(kind) = &tx.transaction_type {
            profile.used_transaction_types.increment(kind);
        }
        if let Some(region) = &tx.beneficiary_address {
            profile.frequent_destinations.increment(region);
        }
        if let Some(receiver) = &tx.to_entity {
            profile.top_beneficiaries.increment(receiver);
        }
    }

    for profile in profiles.values_mut() {
        let top = std::mem::take(&mut profile.top_beneficiaries);
        profile.top_beneficiaries = top.ranked();
    }

    profiles
}
