// 💰 Volume, frequency and ratio features
//
// Sent-side metrics group by fromentity, received-side by toentity.
// Transactions whose entity is null on a side are skipped on that side.

use super::FeatureContext;
use crate::entities::ResolvedTransaction;
use chrono::Timelike;
use std::collections::HashMap;

/// Mean of a sample; None when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); None below two observations
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let squares: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((squares / (values.len() - 1) as f64).sqrt())
}

/// [20:00, 06:00)
pub fn is_night(tx: &ResolvedTransaction) -> bool {
    let hour = tx.datetime.hour();
    hour >= 20 || hour < 6
}

/// Singleton-beneficiary fraction scaled by the number of transactions behind it
pub fn new_beneficiary_score(pair_counts: &HashMap<String, u64>) -> Option<f64> {
    if pair_counts.is_empty() {
        return None;
    }
    let distinct = pair_counts.len() as f64;
    let singletons = pair_counts.values().filter(|&&c| c == 1).count() as f64;
    let volume: u64 = pair_counts.values().sum();
    Some(singletons / distinct * volume as f64)
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    sent: Vec<f64>,
    received: Vec<f64>,
    cash_sent: f64,
    non_cash_sent: f64,
    cross_border: u64,
    night: u64,
    beneficiaries: HashMap<String, u64>,
}

/// Amount-derived features of one person
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmountFeatures {
    pub no_of_transactions_sent: u64,
    pub no_of_transactions_received: u64,
    pub avg_transaction_amount_sent: Option<f64>,
    pub avg_transaction_amount_received: Option<f64>,
    pub std_transaction_amount_sent: Option<f64>,
    pub std_transaction_amount_received: Option<f64>,
    /// Over sent and received amounts together
    pub std_transaction_amount: Option<f64>,
    pub total_amount_sent: f64,
    pub total_amount_received: f64,
    pub cash_amount_sent: f64,
    pub non_cash_amount_sent: f64,
    pub amount_received_vs_sent_ratio: Option<f64>,
    pub cash_vs_non_cash_ratio: Option<f64>,
    pub cross_border_risk: Option<u64>,
    pub night_time_transaction_ratio: Option<f64>,
    pub new_beneficiary_ratio: Option<f64>,
}

impl AmountFeatures {
    fn from_ledger(ledger: &Ledger) -> Self {
        let total_sent: f64 = ledger.sent.iter().sum();
        let total_received: f64 = ledger.received.iter().sum();
        let has_sent = !ledger.sent.is_empty();

        let both: Vec<f64> = ledger.sent.iter().chain(&ledger.received).copied().collect();

        AmountFeatures {
            no_of_transactions_sent: ledger.sent.len() as u64,
            no_of_transactions_received: ledger.received.len() as u64,
            avg_transaction_amount_sent: mean(&ledger.sent),
            avg_transaction_amount_received: mean(&ledger.received),
            std_transaction_amount_sent: sample_std(&ledger.sent),
            std_transaction_amount_received: sample_std(&ledger.received),
            std_transaction_amount: sample_std(&both),
            total_amount_sent: total_sent,
            total_amount_received: total_received,
            cash_amount_sent: ledger.cash_sent,
            non_cash_amount_sent: ledger.non_cash_sent,
            amount_received_vs_sent_ratio: if both.is_empty() {
                None
            } else {
                Some(total_received / (total_sent + 1.0))
            },
            cash_vs_non_cash_ratio: has_sent
                .then(|| ledger.cash_sent / (ledger.non_cash_sent + 1.0)),
            cross_border_risk: has_sent.then_some(ledger.cross_border),
            night_time_transaction_ratio: has_sent
                .then(|| ledger.night as f64 / ledger.sent.len() as f64),
            new_beneficiary_ratio: new_beneficiary_score(&ledger.beneficiaries),
        }
    }
}

/// Amount features keyed by person; persons with no transactions are absent
pub fn amount_features(
    transactions: &[ResolvedTransaction],
    ctx: &FeatureContext,
) -> HashMap<String, AmountFeatures> {
    let mut ledgers: HashMap<&str, Ledger> = HashMap::new();

    for tx in transactions {
        if let Some(sender) = tx.from_entity.as_deref() {
            let ledger = ledgers.entry(sender).or_default();
            ledger.sent.push(tx.amount);

            if tx.transaction_type.as_deref().is_some_and(|t| ctx.is_cash(t)) {
                ledger.cash_sent += tx.amount;
            } else {
                ledger.non_cash_sent += tx.amount;
            }

            // Null address is domestic
            if let Some(region) = &tx.beneficiary_address {
                if !ctx.is_local(region) {
                    ledger.cross_border += 1;
                }
            }

            if is_night(tx) {
                ledger.night += 1;
            }

            if let Some(receiver) = &tx.to_entity {
                *ledger.beneficiaries.entry(receiver.clone()).or_insert(0) += 1;
            }
        }

        if let Some(receiver) = tx.to_entity.as_deref() {
            ledgers.entry(receiver).or_default().received.push(tx.amount);
        }
    }

    ledgers
        .into_iter()
        .map(|(entity, ledger)| (entity.to_string(), AmountFeatures::from_ledger(&ledger)))
        .collect()
}
