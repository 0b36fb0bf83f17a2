// 🏦 Account Attributor + Transaction Re-keyer
//
// Accounts are collected from both sides of every transaction, deduplicated
// on account number (first occurrence wins) and linked to the person whose
// alias set contains the owner name. Transactions are then rewritten so that
// sender/beneficiary accounts become canonical person ids.
//
// An alias is assumed to belong to one person: when two persons share an
// alias, the person listed first keeps it.

use crate::clustering::RunSeed;
use crate::entities::{Account, CleanedTransaction, Person, ResolvedTransaction};
use crate::parties::normalize_alias;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::info;

// ============================================================================
// ALIAS DIRECTORY
// ============================================================================

/// Normalized alias → person_id, first person wins
#[derive(Debug, Clone, Default)]
pub struct AliasDirectory {
    owners: HashMap<String, String>,
}

impl AliasDirectory {
    pub fn new(persons: &[Person]) -> Self {
        let mut owners = HashMap::new();
        for person in persons {
            for alias in &person.aliases {
                if let Some(key) = normalize_alias(alias) {
                    owners.entry(key).or_insert_with(|| person.person_id.clone());
                }
            }
        }
        AliasDirectory { owners }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        normalize_alias(name)
            .and_then(|key| self.owners.get(&key))
            .map(|id| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

// ============================================================================
// ACCOUNT ATTRIBUTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AccountMention {
    account_no: Option<String>,
    owner_name: Option<String>,
    account_type: Option<String>,
    opened_date: Option<NaiveDate>,
    closed_date: Option<NaiveDate>,
}

impl AccountMention {
    fn sender(tx: &CleanedTransaction) -> Self {
        AccountMention {
            account_no: tx.account_no.clone(),
            owner_name: tx.owner_name.clone(),
            account_type: tx.account_type.clone(),
            opened_date: tx.opened_date,
            closed_date: tx.closed_date,
        }
    }

    fn beneficiary(tx: &CleanedTransaction) -> Self {
        AccountMention {
            account_no: tx.ben_account_no.clone(),
            owner_name: tx.ben_full_name.clone(),
            account_type: None,
            opened_date: None,
            closed_date: None,
        }
    }
}

/// Build the account relation with owners resolved against the person aliases
pub fn attribute_accounts(
    transactions: &[CleanedTransaction],
    persons: &[Person],
    seed: RunSeed,
) -> Vec<Account> {
    let directory = AliasDirectory::new(persons);

    let mentions = transactions
        .iter()
        .map(AccountMention::sender)
        .chain(transactions.iter().map(AccountMention::beneficiary));

    let mut seen_numbers: HashSet<String> = HashSet::new();
    let mut accounts = Vec::new();

    for mention in mentions {
        let Some(account_no) = mention.account_no else {
            continue;
        };
        if !seen_numbers.insert(account_no.clone()) {
            continue;
        }

        let owner_entity = mention
            .owner_name
            .as_deref()
            .and_then(|name| directory.lookup(name))
            .map(String::from);

        accounts.push(Account {
            account_id: format!("ACCOUNT_{}_{}", accounts.len(), seed),
            account_no,
            owner_name: mention.owner_name,
            owner_entity,
            account_type: mention.account_type,
            opened_date: mention.opened_date,
            closed_date: mention.closed_date,
        });
    }

    let attributed = accounts.iter().filter(|a| a.is_attributed()).count();
    info!(
        accounts = accounts.len(),
        attributed,
        unattributed = accounts.len() - attributed,
        "account attribution complete"
    );

    accounts
}

// ============================================================================
// TRANSACTION RE-KEYER
// ============================================================================

/// account_no → owner_entity, first row per account number wins
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    owners: HashMap<String, Option<String>>,
}

impl AccountBook {
    pub fn new(accounts: &[Account]) -> Self {
        let mut owners = HashMap::new();
        for account in accounts {
            owners
                .entry(account.account_no.clone())
                .or_insert_with(|| account.owner_entity.clone());
        }
        AccountBook { owners }
    }

    pub fn owner_of(&self, account_no: &str) -> Option<&str> {
        self.owners.get(account_no).and_then(|o| o.as_deref())
    }
}

pub fn rekey_transactions(
    transactions: &[CleanedTransaction],
    book: &AccountBook,
) -> Vec<ResolvedTransaction> {
    let resolved: Vec<ResolvedTransaction> = transactions
        .iter()
        .map(|tx| {
            let from_entity = tx
                .account_no
                .as_deref()
                .and_then(|no| book.owner_of(no))
                .map(String::from);
            let to_entity = tx
                .ben_account_no
                .as_deref()
                .and_then(|no| book.owner_of(no))
                .map(String::from);
            ResolvedTransaction::from_cleaned(tx, from_entity, to_entity)
        })
        .collect();

    let unresolved = resolved
        .iter()
        .filter(|t| t.from_entity.is_none() || t.to_entity.is_none())
        .count();
    info!(
        transactions = resolved.len(),
        with_missing_owner = unresolved,
        "transactions re-keyed"
    );

    resolved
}
