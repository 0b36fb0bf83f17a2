// 🧾 Party Extractor - split each transaction into sender and beneficiary mentions
//
// Both sides get the same shape so the clusterer can treat them uniformly.
// Beneficiaries carry no demographics in the cleaned data, so those stay None.

use crate::entities::CleanedTransaction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Sender,
    Beneficiary,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::Sender => "sender",
            PartyRole::Beneficiary => "beneficiary",
        }
    }
}

/// One side of one transaction, viewed as evidence about a person
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyMention {
    pub alias: Option<String>,
    /// Region code
    pub location: Option<String>,
    pub phone: Option<String>,
    pub sex: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub role: PartyRole,
}

type MentionKey = (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<NaiveDate>,
    Option<String>,
);

impl PartyMention {
    pub fn sender(tx: &CleanedTransaction) -> Self {
        PartyMention {
            alias: tx.owner_name.clone(),
            location: tx.sender_address.clone(),
            phone: tx.sender_phone.clone(),
            sex: tx.sex.clone(),
            birthdate: tx.birthdate,
            occupation: tx.occupation.clone(),
            role: PartyRole::Sender,
        }
    }

    pub fn beneficiary(tx: &CleanedTransaction) -> Self {
        PartyMention {
            alias: tx.ben_full_name.clone(),
            location: tx.beneficiary_address.clone(),
            phone: tx.beneficiary_phone.clone(),
            sex: None,
            birthdate: None,
            occupation: None,
            role: PartyRole::Beneficiary,
        }
    }

    /// Alias used for matching; None when missing or blank
    pub fn alias_key(&self) -> Option<String> {
        self.alias.as_deref().and_then(normalize_alias)
    }

    /// Identity attributes without the role: two mentions with equal keys are duplicates
    fn key(&self) -> MentionKey {
        (
            self.alias.clone(),
            self.location.clone(),
            self.phone.clone(),
            self.sex.clone(),
            self.birthdate,
            self.occupation.clone(),
        )
    }
}

/// Matching form of an alias: lowercase, single-spaced. Blank aliases never match.
pub fn normalize_alias(raw: &str) -> Option<String> {
    let normalized = raw
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Extract and deduplicate party mentions.
///
/// All sender mentions come first, then beneficiary mentions, each in
/// transaction order. Exact duplicates (ignoring role) keep the first.
pub fn extract_parties(transactions: &[CleanedTransaction]) -> Vec<PartyMention> {
    let mut seen: HashSet<MentionKey> = HashSet::new();
    let mut mentions = Vec::new();

    let senders = transactions.iter().map(PartyMention::sender);
    let beneficiaries = transactions.iter().map(PartyMention::beneficiary);

    for mention in senders.chain(beneficiaries) {
        if seen.insert(mention.key()) {
            mentions.push(mention);
        }
    }

    mentions
}
