// 📐 Shape Layer - Relation names and column sets
// Every relation the engine reads or writes is declared here, so a missing
// column is caught before any engine runs.

use crate::error::Result;
use crate::table::Table;

// ============================================================================
// RELATION NAMES
// ============================================================================

pub const PERSON_ENTITY: &str = "person_entity";
pub const ACCOUNT_ENTITY: &str = "account_entity";
pub const RESOLVED_TRANSACTIONS: &str = "identity_resolved_transactions";
pub const USER_RISK_PROFILE: &str = "user_risk_profile";

/// The four relations handed to storage at the end of a run
pub const OUTPUT_RELATIONS: [&str; 4] = [
    PERSON_ENTITY,
    ACCOUNT_ENTITY,
    RESOLVED_TRANSACTIONS,
    USER_RISK_PROFILE,
];

// ============================================================================
// INPUT: CLEANED TRANSACTIONS
// ============================================================================

/// Columns the core cannot run without
pub const CLEANED_REQUIRED: [&str; 7] = [
    "transactionid",
    "transactiondatetime",
    "amountinbirr",
    "accountno",
    "accownername",
    "benaccountno",
    "benfullname",
];

/// Columns read when present; absent ones read as NULL
pub const CLEANED_OPTIONAL: [&str; 16] = [
    "branchid",
    "branchname",
    "transactiontype",
    "conductingmanner",
    "currencytype",
    "amountincurrency",
    "sex",
    "birthdate",
    "occupation",
    "senderaddress",
    "senderphone",
    "accounttype",
    "openeddate",
    "closeddate",
    "beneficiaryaddress",
    "beneficiaryphone",
];

// ============================================================================
// OUTPUT / INTERMEDIATE RELATIONS
// ============================================================================

pub const PERSON_COLUMNS: [&str; 7] = [
    "personid",
    "aliases",
    "sex",
    "birthdate",
    "occupation",
    "location",
    "phonenumbers",
];

pub const ACCOUNT_COLUMNS: [&str; 7] = [
    "accountid",
    "accountno",
    "ownername",
    "ownerentity",
    "accounttype",
    "openeddate",
    "closeddate",
];

pub const RESOLVED_TRANSACTION_COLUMNS: [&str; 14] = [
    "transactionid",
    "fromentity",
    "toentity",
    "accountno",
    "benaccountno",
    "transactiondatetime",
    "transactiontype",
    "conductingmanner",
    "currencytype",
    "amountinbirr",
    "amountincurrency",
    "branchid",
    "branchname",
    "beneficiaryaddress",
];

pub const RISK_PROFILE_COLUMNS: [&str; 40] = [
    "personid",
    // static
    "unique_aliases_used",
    "unique_phone_numbers_used",
    "unique_accounts_held",
    "account_age_days",
    "account_age_years",
    "account_age_bucket",
    // volume / frequency
    "no_of_transactions_sent",
    "no_of_transactions_received",
    "avg_transaction_amount_sent",
    "avg_transaction_amount_received",
    "std_transaction_amount_sent",
    "std_transaction_amount_received",
    "std_transaction_amount",
    "total_amount_sent",
    "total_amount_received",
    "cash_amount_sent",
    "non_cash_amount_sent",
    // rolling windows
    "max_freq_1hr",
    "max_freq_24hr",
    "max_freq_7d",
    "max_freq_1m",
    "max_volume_1hr",
    "max_volume_24hr",
    "max_volume_7d",
    "max_volume_1m",
    // ratios
    "amount_received_vs_sent_ratio",
    "cash_vs_non_cash_ratio",
    "cross_border_risk",
    "night_time_transaction_ratio",
    "new_beneficiary_ratio",
    // dormancy
    "min_time_lapse_minutes",
    "max_time_lapse_minutes",
    "avg_time_lapse_minutes",
    "last_transaction_time",
    "all_transaction_times",
    // categorical (JSON)
    "prefered_branches",
    "used_transaction_types",
    "frequent_destinations",
    "top_beneficiaries",
];

/// Columns of the input relation to select, given what the store actually has.
///
/// Fails with `MissingColumns` when a required column is absent.
pub fn select_cleaned_columns(table: &str, available: &[String]) -> Result<Vec<&'static str>> {
    let header = Table::with_columns(table, available.to_vec());
    header.require_columns(&CLEANED_REQUIRED)?;

    Ok(CLEANED_REQUIRED
        .iter()
        .chain(CLEANED_OPTIONAL.iter())
        .copied()
        .filter(|c| header.has_column(c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_select_keeps_known_present_columns_only() {
        let mut available = names(&CLEANED_REQUIRED);
        available.push("branchid".to_string());
        available.push("some_upstream_extra".to_string());

        let selected = select_cleaned_columns("cleaned_transactions", &available).unwrap();

        assert_eq!(selected.len(), CLEANED_REQUIRED.len() + 1);
        assert!(selected.contains(&"branchid"));
        assert!(!selected.contains(&"some_upstream_extra"));
        assert!(!selected.contains(&"senderphone"));
    }

    #[test]
    fn test_select_reports_every_missing_required_column() {
        let available = names(&["transactionid", "amountinbirr", "transactiondatetime"]);

        match select_cleaned_columns("cleaned_transactions", &available) {
            Err(EngineError::MissingColumns { table, columns }) => {
                assert_eq!(table, "cleaned_transactions");
                assert_eq!(
                    columns,
                    vec!["accountno", "accownername", "benaccountno", "benfullname"]
                );
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }
}
