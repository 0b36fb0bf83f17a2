// Entity Models
//
// Canonical, run-scoped entities produced by identity resolution:
// - Person: one per identity cluster
// - Account: one per distinct account number, linked to a Person
// - ResolvedTransaction: cleaned transaction re-keyed to Persons

pub mod account;
pub mod person;
pub mod transaction;

pub use account::Account;
pub use person::Person;
pub use transaction::{CleanedTransaction, ResolvedTransaction};
