// 🪪 Static features - identity breadth and account age

use crate::entities::{Account, Person};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// Two-year account age bands, right-inclusive, plus an overflow band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAgeBucket {
    /// Band n covers (2n, 2n + 2] years, n in 0..10
    Band(u8),
    Over20,
}

impl AccountAgeBucket {
    /// None for an age of zero years or less
    pub fn from_years(years: f64) -> Option<Self> {
        if years.is_nan() || years <= 0.0 {
            return None;
        }
        if years > 20.0 {
            return Some(AccountAgeBucket::Over20);
        }
        let band = ((years / 2.0).ceil() as u8).saturating_sub(1);
        Some(AccountAgeBucket::Band(band.min(9)))
    }

    pub fn label(&self) -> String {
        match self {
            AccountAgeBucket::Band(n) => {
                let low = u32::from(*n) * 2;
                format!("{} < x < {}", low, low + 2)
            }
            AccountAgeBucket::Over20 => "> 20".to_string(),
        }
    }
}

impl Serialize for AccountAgeBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountAge {
    pub days: i64,
    pub years: f64,
    pub bucket: Option<AccountAgeBucket>,
}

impl AccountAge {
    /// Age of the earliest opening date as of `as_of`, whole days
    pub fn since(opened: NaiveDate, as_of: NaiveDateTime) -> Self {
        let opened_at = opened.and_time(NaiveTime::MIN);
        let seconds = (as_of - opened_at).num_seconds();
        let days = seconds.div_euclid(86_400);
        let years = days as f64 / 365.0;
        AccountAge {
            days,
            years,
            bucket: AccountAgeBucket::from_years(years),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticFeatures {
    pub unique_aliases_used: u64,
    pub unique_phone_numbers_used: u64,
    pub unique_accounts_held: u64,
    pub account_age: Option<AccountAge>,
}

/// Static features for every person, keyed by person id
pub fn static_features(
    persons: &[Person],
    accounts: &[Account],
    as_of: NaiveDateTime,
) -> HashMap<String, StaticFeatures> {
    let mut held: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut earliest: HashMap<&str, NaiveDate> = HashMap::new();

    for account in accounts {
        let Some(owner) = account.owner_entity.as_deref() else {
            continue;
        };
        held.entry(owner).or_default().insert(account.account_no.as_str());

        if let Some(opened) = account.opened_date {
            earliest
                .entry(owner)
                .and_modify(|d| *d = (*d).min(opened))
                .or_insert(opened);
        }
    }

    persons
        .iter()
        .map(|person| {
            let id = person.person_id.as_str();
            let features = StaticFeatures {
                unique_aliases_used: person.aliases.len() as u64,
                unique_phone_numbers_used: person.phone_numbers.len() as u64,
                unique_accounts_held: held.get(id).map_or(0, |a| a.len() as u64),
                account_age: earliest.get(id).map(|opened| AccountAge::since(*opened, as_of)),
            };
            (person.person_id.clone(), features)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_datetime;

    fn account(no: &str, owner: Option<&str>, opened: Option<&str>) -> Account {
        Account {
            account_id: format!("ACCOUNT_{}", no),
            account_no: no.to_string(),
            owner_name: None,
            owner_entity: owner.map(String::from),
            account_type: None,
            opened_date: opened.and_then(crate::table::parse_date),
            closed_date: None,
        }
    }

    #[test]
    fn test_bucket_edges_are_right_inclusive() {
        assert_eq!(AccountAgeBucket::from_years(0.0), None);
        assert_eq!(AccountAgeBucket::from_years(0.5).unwrap().label(), "0 < x < 2");
        assert_eq!(AccountAgeBucket::from_years(2.0).unwrap().label(), "0 < x < 2");
        assert_eq!(AccountAgeBucket::from_years(2.01).unwrap().label(), "2 < x < 4");
        assert_eq!(AccountAgeBucket::from_years(20.0).unwrap().label(), "18 < x < 20");
        assert_eq!(AccountAgeBucket::from_years(20.5).unwrap().label(), "> 20");
    }

    #[test]
    fn test_bucket_serializes_as_label() {
        let json = serde_json::to_string(&AccountAgeBucket::Band(3)).unwrap();
        assert_eq!(json, r#""6 < x < 8""#);
    }

    #[test]
    fn test_account_age_uses_whole_days() {
        let as_of = parse_datetime("2024-01-02 18:00:00").unwrap();
        let opened = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();

        let age = AccountAge::since(opened, as_of);
        assert_eq!(age.days, 365);
        assert_eq!(age.years, 1.0);
        assert_eq!(age.bucket, Some(AccountAgeBucket::Band(0)));
    }

    #[test]
    fn test_static_features_use_earliest_account() {
        let mut person = Person::new("P1".to_string());
        person.aliases = ["abebe", "abebe k"].iter().map(|s| s.to_string()).collect();
        person.phone_numbers = ["0911"].iter().map(|s| s.to_string()).collect();
        let loner = Person::new("P2".to_string());

        let accounts = vec![
            account("A1", Some("P1"), Some("2020-01-01")),
            account("A2", Some("P1"), Some("2010-01-01")),
            account("A3", Some("P1"), None),
            account("B1", None, Some("2000-01-01")),
        ];
        let as_of = parse_datetime("2024-01-01 00:00:00").unwrap();

        let features = static_features(&[person, loner], &accounts, as_of);

        let p1 = &features["P1"];
        assert_eq!(p1.unique_aliases_used, 2);
        assert_eq!(p1.unique_phone_numbers_used, 1);
        assert_eq!(p1.unique_accounts_held, 3);
        let age = p1.account_age.unwrap();
        assert_eq!(age.days, 5113);
        assert_eq!(age.bucket, Some(AccountAgeBucket::Band(7)));

        let p2 = &features["P2"];
        assert_eq!(p2.unique_accounts_held, 0);
        assert_eq!(p2.account_age, None);
    }
}
