// 💤 Dormancy / activity pattern
//
// One event stream per entity from both roles, ordered by time. Gaps between
// consecutive events give the dormancy statistics; the full stream is kept as
// an audit log.

use crate::entities::ResolvedTransaction;
use crate::parties::PartyRole;
use crate::table::DATETIME_FORMAT;
use chrono::{Duration, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, SerializeTuple, Serializer};
use std::collections::HashMap;

/// Lapse statistic for an entity with a single event
pub const SINGLE_EVENT_LAPSE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub at: NaiveDateTime,
    /// Time since the previous event of the same entity; None for the first
    pub gap: Option<Duration>,
    pub role: PartyRole,
}

/// Time-ordered event log of one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityLog {
    events: Vec<ActivityEvent>,
}

impl ActivityLog {
    pub fn events(&self) -> &[ActivityEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.events.last().map(|e| e.at)
    }

    fn gaps_in_minutes(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| e.gap)
            .map(|gap| gap.num_milliseconds() as f64 / 60_000.0)
            .collect()
    }

    /// (min, max, avg) gap in minutes, rounded to 2 decimals.
    /// None without events, the single-event sentinel with exactly one.
    pub fn lapse_minutes(&self) -> Option<(f64, f64, f64)> {
        if self.events.is_empty() {
            return None;
        }
        let gaps = self.gaps_in_minutes();
        if gaps.is_empty() {
            return Some((SINGLE_EVENT_LAPSE, SINGLE_EVENT_LAPSE, SINGLE_EVENT_LAPSE));
        }

        let min = gaps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = gaps.iter().sum::<f64>() / gaps.len() as f64;
        Some((round2(min), round2(max), round2(avg)))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Two decimals, ties to even
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// "<d> days HH:MM:SS[.ffffff]"; "NaT" when there is no previous event
pub fn gap_text(gap: Option<Duration>) -> String {
    let Some(gap) = gap else {
        return "NaT".to_string();
    };

    let total = gap.num_seconds();
    let micros = (gap - Duration::seconds(total))
        .num_microseconds()
        .unwrap_or(0);
    let days = total.div_euclid(86_400);
    let rest = total.rem_euclid(86_400);

    let mut text = format!(
        "{} days {:02}:{:02}:{:02}",
        days,
        rest / 3600,
        (rest % 3600) / 60,
        rest % 60
    );
    if micros != 0 {
        text.push_str(&format!(".{:06}", micros));
    }
    text
}

struct LogEntry<'a>(&'a ActivityEvent);

impl Serialize for LogEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&gap_text(self.0.gap))?;
        tuple.serialize_element(self.0.role.as_str())?;
        tuple.end()
    }
}

// {"<timestamp>": ["<gap>", "<role>"], ...} in event order. Two events at the
// same instant produce repeated keys.
impl Serialize for ActivityLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.events.len()))?;
        for event in &self.events {
            let key = event.at.format(DATETIME_FORMAT).to_string();
            map.serialize_entry(&key, &LogEntry(event))?;
        }
        map.end()
    }
}

/// Activity logs keyed by entity: sender events, then beneficiary events,
/// stable-sorted by time per entity
pub fn activity_logs(transactions: &[ResolvedTransaction]) -> HashMap<String, ActivityLog> {
    let mut streams: HashMap<&str, Vec<(NaiveDateTime, PartyRole)>> = HashMap::new();

    for tx in transactions {
        if let Some(sender) = tx.from_entity.as_deref() {
            streams.entry(sender).or_default().push((tx.datetime, PartyRole::Sender));
        }
    }
    for tx in transactions {
        if let Some(receiver) = tx.to_entity.as_deref() {
            streams
                .entry(receiver)
                .or_default()
                .push((tx.datetime, PartyRole::Beneficiary));
        }
    }

    streams
        .into_iter()
        .map(|(entity, mut stream)| {
            stream.sort_by_key(|(at, _)| *at);

            let mut previous: Option<NaiveDateTime> = None;
            let events = stream
                .into_iter()
                .map(|(at, role)| {
                    let gap = previous.map(|p| at - p);
                    previous = Some(at);
                    ActivityEvent { at, gap, role }
                })
                .collect();

            (entity.to_string(), ActivityLog { events })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::resolved;

    #[test]
    fn test_gap_text() {
        assert_eq!(gap_text(None), "NaT");
        assert_eq!(gap_text(Some(Duration::minutes(30))), "0 days 00:30:00");
        assert_eq!(
            gap_text(Some(Duration::days(2) + Duration::seconds(3725))),
            "2 days 01:02:05"
        );
        assert_eq!(gap_text(Some(Duration::milliseconds(1500))), "0 days 00:00:01.500000");
    }

    #[test]
    fn test_log_interleaves_roles_in_time_order() {
        let txs = vec![
            resolved(Some("P1"), Some("P2"), 1.0, "2024-01-01 10:00:00"),
            resolved(Some("P2"), Some("P1"), 1.0, "2024-01-01 09:30:00"),
            resolved(Some("P1"), None, 1.0, "2024-01-01 11:15:00"),
        ];

        let logs = activity_logs(&txs);
        let p1 = &logs["P1"];

        let roles: Vec<PartyRole> = p1.events().iter().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![PartyRole::Beneficiary, PartyRole::Sender, PartyRole::Sender]
        );
        assert_eq!(p1.lapse_minutes(), Some((30.0, 75.0, 52.5)));
        assert_eq!(
            p1.last_time(),
            crate::table::parse_datetime("2024-01-01 11:15:00")
        );
        assert_eq!(
            p1.to_json().unwrap(),
            r#"{"2024-01-01 09:30:00":["NaT","beneficiary"],"2024-01-01 10:00:00":["0 days 00:30:00","sender"],"2024-01-01 11:15:00":["0 days 01:15:00","sender"]}"#
        );
    }

    #[test]
    fn test_single_event_uses_sentinel() {
        let txs = vec![resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:00")];
        let logs = activity_logs(&txs);

        assert_eq!(logs["P1"].lapse_minutes(), Some((-1.0, -1.0, -1.0)));
        assert_eq!(ActivityLog::default().lapse_minutes(), None);
    }

    #[test]
    fn test_lapse_rounding() {
        let txs = vec![
            resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:00"),
            resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:20"),
        ];
        let logs = activity_logs(&txs);

        // 20 seconds = 0.3333 minutes
        assert_eq!(logs["P1"].lapse_minutes(), Some((0.33, 0.33, 0.33)));
    }

    #[test]
    fn test_lapse_rounds_half_to_even() {
        // 7.5 seconds = 0.125 minutes
        let txs = vec![
            resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:00"),
            resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:07.500"),
        ];
        let logs = activity_logs(&txs);

        assert_eq!(logs["P1"].lapse_minutes(), Some((0.12, 0.12, 0.12)));
        assert_eq!(round2(0.375), 0.38);
    }

    #[test]
    fn test_sub_second_events_keep_distinct_keys() {
        let txs = vec![
            resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:00.500"),
            resolved(Some("P1"), None, 1.0, "2024-01-01 10:00:00.750"),
        ];
        let logs = activity_logs(&txs);

        assert_eq!(
            logs["P1"].to_json().unwrap(),
            r#"{"2024-01-01 10:00:00.500":["NaT","sender"],"2024-01-01 10:00:00.750":["0 days 00:00:00.250000","sender"]}"#
        );
    }
}
