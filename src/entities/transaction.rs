// 💸 Transaction records - cleaned input and identity-resolved output
//
// CleanedTransaction is one row of the upstream cleaning stage.
// ResolvedTransaction is the same movement of money re-keyed to canonical
// persons: fromentity/toentity are null when the account has no owner.

use crate::error::Result;
use crate::schema::{CLEANED_REQUIRED, RESOLVED_TRANSACTIONS, RESOLVED_TRANSACTION_COLUMNS};
use crate::table::{
    datetime_value, real_value, text_value, Table, Value,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLEANED TRANSACTION (input)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedTransaction {
    // ========================================================================
    // MOVEMENT
    // ========================================================================
    pub transaction_id: String,
    pub datetime: NaiveDateTime,
    pub amount: f64,
    pub amount_in_currency: Option<f64>,
    pub currency: Option<String>,
    pub transaction_type: Option<String>,
    pub conducting_manner: Option<String>,
    pub branch_id: Option<String>,
    pub branch_name: Option<String>,

    // ========================================================================
    // SENDER SIDE
    // ========================================================================
    pub account_no: Option<String>,
    pub owner_name: Option<String>,
    pub account_type: Option<String>,
    pub opened_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub sender_address: Option<String>,
    pub sender_phone: Option<String>,

    // ========================================================================
    // BENEFICIARY SIDE
    // ========================================================================
    pub ben_account_no: Option<String>,
    pub ben_full_name: Option<String>,
    pub beneficiary_address: Option<String>,
    pub beneficiary_phone: Option<String>,
}

impl CleanedTransaction {
    /// Parse the cleaned relation.
    ///
    /// Required columns must exist; id, amount and datetime must be non-null
    /// in every row. Optional columns that are absent read as null.
    pub fn from_table(table: &Table) -> Result<Vec<CleanedTransaction>> {
        table.require_columns(&CLEANED_REQUIRED)?;

        table
            .iter()
            .map(|row| {
                Ok(CleanedTransaction {
                    transaction_id: row.require_text("transactionid")?,
                    datetime: row.require_datetime("transactiondatetime")?,
                    amount: row.require_real("amountinbirr")?,
                    amount_in_currency: row.real("amountincurrency")?,
                    currency: row.text("currencytype"),
                    transaction_type: row.text("transactiontype"),
                    conducting_manner: row.text("conductingmanner"),
                    branch_id: row.text("branchid"),
                    branch_name: row.text("branchname"),
                    account_no: row.text("accountno"),
                    owner_name: row.text("accownername"),
                    account_type: row.text("accounttype"),
                    opened_date: row.date("openeddate")?,
                    closed_date: row.date("closeddate")?,
                    sex: row.text("sex"),
                    birthdate: row.date("birthdate")?,
                    occupation: row.text("occupation"),
                    sender_address: row.text("senderaddress"),
                    sender_phone: row.text("senderphone"),
                    ben_account_no: row.text("benaccountno"),
                    ben_full_name: row.text("benfullname"),
                    beneficiary_address: row.text("beneficiaryaddress"),
                    beneficiary_phone: row.text("beneficiaryphone"),
                })
            })
            .collect()
    }
}

// ============================================================================
// RESOLVED TRANSACTION (output)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTransaction {
    pub transaction_id: String,

    /// Canonical sender; None when the sending account has no attributable owner
    pub from_entity: Option<String>,

    /// Canonical beneficiary; None when the receiving account has no attributable owner
    pub to_entity: Option<String>,

    pub account_no: Option<String>,
    pub ben_account_no: Option<String>,
    pub datetime: NaiveDateTime,
    pub transaction_type: Option<String>,
    pub conducting_manner: Option<String>,
    pub currency: Option<String>,
    pub amount: f64,
    pub amount_in_currency: Option<f64>,
    pub branch_id: Option<String>,
    pub branch_name: Option<String>,
    pub beneficiary_address: Option<String>,
}

impl ResolvedTransaction {
    /// Carry a cleaned row over with its canonical sender and beneficiary
    pub fn from_cleaned(
        tx: &CleanedTransaction,
        from_entity: Option<String>,
        to_entity: Option<String>,
    ) -> Self {
        ResolvedTransaction {
            transaction_id: tx.transaction_id.clone(),
            from_entity,
            to_entity,
            account_no: tx.account_no.clone(),
            ben_account_no: tx.ben_account_no.clone(),
            datetime: tx.datetime,
            transaction_type: tx.transaction_type.clone(),
            conducting_manner: tx.conducting_manner.clone(),
            currency: tx.currency.clone(),
            amount: tx.amount,
            amount_in_currency: tx.amount_in_currency,
            branch_id: tx.branch_id.clone(),
            branch_name: tx.branch_name.clone(),
            beneficiary_address: tx.beneficiary_address.clone(),
        }
    }

    pub fn to_table(transactions: &[ResolvedTransaction]) -> Table {
        let mut table = Table::new(RESOLVED_TRANSACTIONS, &RESOLVED_TRANSACTION_COLUMNS);

        for tx in transactions {
            table.push_row(vec![
                Value::Text(tx.transaction_id.clone()),
                text_value(tx.from_entity.as_ref()),
                text_value(tx.to_entity.as_ref()),
                text_value(tx.account_no.as_ref()),
                text_value(tx.ben_account_no.as_ref()),
                datetime_value(Some(tx.datetime)),
                text_value(tx.transaction_type.as_ref()),
                text_value(tx.conducting_manner.as_ref()),
                text_value(tx.currency.as_ref()),
                real_value(Some(tx.amount)),
                real_value(tx.amount_in_currency),
                text_value(tx.branch_id.as_ref()),
                text_value(tx.branch_name.as_ref()),
                text_value(tx.beneficiary_address.as_ref()),
            ]);
        }

        table
    }

    /// Read back a stored identity-resolved relation
    pub fn from_table(table: &Table) -> Result<Vec<ResolvedTransaction>> {
        table.require_columns(&[
            "transactionid",
            "fromentity",
            "toentity",
            "transactiondatetime",
            "amountinbirr",
        ])?;

        table
            .iter()
            .map(|row| {
                Ok(ResolvedTransaction {
                    transaction_id: row.require_text("transactionid")?,
                    from_entity: row.text("fromentity"),
                    to_entity: row.text("toentity"),
                    account_no: row.text("accountno"),
                    ben_account_no: row.text("benaccountno"),
                    datetime: row.require_datetime("transactiondatetime")?,
                    transaction_type: row.text("transactiontype"),
                    conducting_manner: row.text("conductingmanner"),
                    currency: row.text("currencytype"),
                    amount: row.require_real("amountinbirr")?,
                    amount_in_currency: row.real("amountincurrency")?,
                    branch_id: row.text("branchid"),
                    branch_name: row.text("branchname"),
                    beneficiary_address: row.text("beneficiaryaddress"),
                })
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::cleaned;
    use super::*;
    use crate::error::EngineError;

    fn cleaned_table() -> Table {
        let mut table = Table::new(
            "cleaned_transactions",
            &[
                "transactionid",
                "transactiondatetime",
                "amountinbirr",
                "accountno",
                "accownername",
                "benaccountno",
                "benfullname",
                "openeddate",
            ],
        );
        table.push_row(vec![
            Value::Text("t1".to_string()),
            Value::Text("2024-02-01 09:15:00".to_string()),
            Value::Text("1500".to_string()),
            Value::Text("1000123".to_string()),
            Value::Text("abebe kebede".to_string()),
            Value::Text("2000456".to_string()),
            Value::Text("sara tesfaye".to_string()),
            Value::Text("2015-06-30".to_string()),
        ]);
        table
    }

    #[test]
    fn test_cleaned_from_table_with_optional_columns_absent() {
        let rows = CleanedTransaction::from_table(&cleaned_table()).unwrap();

        assert_eq!(rows.len(), 1);
        let tx = &rows[0];
        assert_eq!(tx.transaction_id, "t1");
        assert_eq!(tx.amount, 1500.0);
        assert_eq!(tx.owner_name.as_deref(), Some("abebe kebede"));
        assert_eq!(tx.opened_date, NaiveDate::from_ymd_opt(2015, 6, 30));
        assert_eq!(tx.branch_id, None);
        assert_eq!(tx.beneficiary_address, None);
    }

    #[test]
    fn test_cleaned_null_amount_is_fatal() {
        let mut table = cleaned_table();
        table.push_row(vec![
            Value::Text("t2".to_string()),
            Value::Text("2024-02-01 10:00:00".to_string()),
            Value::Null,
        ]);

        match CleanedTransaction::from_table(&table) {
            Err(EngineError::InvalidValue { column, row, .. }) => {
                assert_eq!(column, "amountinbirr");
                assert_eq!(row, 1);
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_resolved_table_round_trip_keeps_null_entities() {
        let tx = cleaned("t1", "a", "acc-1", "b", "acc-2", 10.0, "2024-01-01 08:00:00");
        let resolved = vec![
            ResolvedTransaction::from_cleaned(&tx, Some("P1".to_string()), None),
        ];

        let table = ResolvedTransaction::to_table(&resolved);
        assert_eq!(table.name, "identity_resolved_transactions");
        assert_eq!(table.rows()[0][2], Value::Null);

        let back = ResolvedTransaction::from_table(&table).unwrap();
        assert_eq!(back, resolved);
    }
}
