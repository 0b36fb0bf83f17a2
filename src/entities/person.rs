// 👤 Person Entity - canonical identity behind many party mentions
//
// One Person per cluster produced by the identity clusterer. Aliases and
// phone numbers accumulate across the cluster; scalar demographics keep the
// first non-null value in mention order.

use crate::error::{EngineError, Result};
use crate::parties::PartyMention;
use crate::schema::{PERSON_COLUMNS, PERSON_ENTITY};
use crate::table::{date_value, text_value, RowRef, Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// ENTITY_<n>_<seed> for merged clusters, <seed>_<mention> for singletons
    pub person_id: String,
    pub aliases: BTreeSet<String>,
    pub sex: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub phone_numbers: BTreeSet<String>,
}

impl Person {
    pub fn new(person_id: String) -> Self {
        Person {
            person_id,
            aliases: BTreeSet::new(),
            sex: None,
            birthdate: None,
            occupation: None,
            location: None,
            phone_numbers: BTreeSet::new(),
        }
    }

    /// Build a person from the mentions of one cluster (in mention order)
    pub fn from_mentions<'a, I>(person_id: String, mentions: I) -> Self
    where
        I: IntoIterator<Item = &'a PartyMention>,
    {
        let mut person = Person::new(person_id);
        for mention in mentions {
            person.absorb(mention);
        }
        person
    }

    /// Fold one more mention into this person
    pub fn absorb(&mut self, mention: &PartyMention) {
        if let Some(alias) = &mention.alias {
            self.aliases.insert(alias.clone());
        }
        if let Some(phone) = &mention.phone {
            self.phone_numbers.insert(phone.clone());
        }
        if self.sex.is_none() {
            self.sex = mention.sex.clone();
        }
        if self.birthdate.is_none() {
            self.birthdate = mention.birthdate;
        }
        if self.occupation.is_none() {
            self.occupation = mention.occupation.clone();
        }
        if self.location.is_none() {
            self.location = mention.location.clone();
        }
    }

    pub fn to_table(persons: &[Person]) -> Result<Table> {
        let mut table = Table::new(PERSON_ENTITY, &PERSON_COLUMNS);

        for person in persons {
            table.push_row(vec![
                Value::Text(person.person_id.clone()),
                Value::Text(serde_json::to_string(&person.aliases)?),
                text_value(person.sex.as_ref()),
                date_value(person.birthdate),
                text_value(person.occupation.as_ref()),
                text_value(person.location.as_ref()),
                Value::Text(serde_json::to_string(&person.phone_numbers)?),
            ]);
        }

        Ok(table)
    }

    /// Read back a stored person relation
    pub fn from_table(table: &Table) -> Result<Vec<Person>> {
        table.require_columns(&["personid", "aliases", "phonenumbers"])?;

        table
            .iter()
            .map(|row| {
                Ok(Person {
                    person_id: row.require_text("personid")?,
                    aliases: string_set(&row, "aliases")?,
                    sex: row.text("sex"),
                    birthdate: row.date("birthdate")?,
                    occupation: row.text("occupation"),
                    location: row.text("location"),
                    phone_numbers: string_set(&row, "phonenumbers")?,
                })
            })
            .collect()
    }
}

/// JSON array cell; a bare string reads as a one-element set
fn string_set(row: &RowRef<'_>, column: &str) -> Result<BTreeSet<String>> {
    let raw = match row.text(column) {
        Some(raw) => raw,
        None => return Ok(BTreeSet::new()),
    };

    if !raw.trim_start().starts_with('[') {
        return Ok(BTreeSet::from([raw]));
    }

    serde_json::from_str::<BTreeSet<String>>(&raw).map_err(|e| {
        EngineError::invalid_value(PERSON_ENTITY, column, row.index(), e.to_string())
    })
}
