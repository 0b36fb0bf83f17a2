// 💳 Account Entity - deduplicated account linked to its owning person
//
// "The goal is identifying the person, not the account": many accounts may
// point at one Person via owner_entity. owner_entity is None when the owner
// name matches no known alias; that is expected, not an error.

use crate::error::Result;
use crate::schema::{ACCOUNT_COLUMNS, ACCOUNT_ENTITY};
use crate::table::{date_value, text_value, Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// ACCOUNT_<row>_<seed>
    pub account_id: String,

    pub account_no: String,

    /// Owner name as written on the first mention of this account
    pub owner_name: Option<String>,

    /// Canonical person owning the account
    pub owner_entity: Option<String>,

    // Sender-side mentions only; beneficiary-side accounts leave these empty
    pub account_type: Option<String>,
    pub opened_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
}

impl Account {
    pub fn is_attributed(&self) -> bool {
        self.owner_entity.is_some()
    }

    pub fn to_table(accounts: &[Account]) -> Table {
        let mut table = Table::new(ACCOUNT_ENTITY, &ACCOUNT_COLUMNS);

        for account in accounts {
            table.push_row(vec![
                Value::Text(account.account_id.clone()),
                Value::Text(account.account_no.clone()),
                text_value(account.owner_name.as_ref()),
                text_value(account.owner_entity.as_ref()),
                text_value(account.account_type.as_ref()),
                date_value(account.opened_date),
                date_value(account.closed_date),
            ]);
        }

        table
    }

    /// Read back a stored account relation
    pub fn from_table(table: &Table) -> Result<Vec<Account>> {
        table.require_columns(&["accountid", "accountno", "ownerentity"])?;

        table
            .iter()
            .map(|row| {
                Ok(Account {
                    account_id: row.require_text("accountid")?,
                    account_no: row.require_text("accountno")?,
                    owner_name: row.text("ownername"),
                    owner_entity: row.text("ownerentity"),
                    account_type: row.text("accounttype"),
                    opened_date: row.date("openeddate")?,
                    closed_date: row.date("closeddate")?,
                })
            })
            .collect()
    }
}
