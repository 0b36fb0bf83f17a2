// ⏱️ Rolling windows - peak frequency and volume per sender
//
// For each sender, over its transactions in time order, a trailing window
// (T - width, T] is placed at every transaction time T. The profile keeps the
// largest count and the largest amount sum seen in any placement.

use crate::entities::ResolvedTransaction;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingWindow {
    OneHour,
    OneDay,
    SevenDays,
    ThirtyDays,
}

impl RollingWindow {
    pub const ALL: [RollingWindow; 4] = [
        RollingWindow::OneHour,
        RollingWindow::OneDay,
        RollingWindow::SevenDays,
        RollingWindow::ThirtyDays,
    ];

    pub fn width(&self) -> Duration {
        match self {
            RollingWindow::OneHour => Duration::hours(1),
            RollingWindow::OneDay => Duration::hours(24),
            RollingWindow::SevenDays => Duration::days(7),
            RollingWindow::ThirtyDays => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPeak {
    pub max_count: u64,
    pub max_volume: f64,
}

/// Peaks for one time-ordered series of (time, amount)
pub fn window_peak(events: &[(NaiveDateTime, f64)], window: RollingWindow) -> Option<WindowPeak> {
    if events.is_empty() {
        return None;
    }

    let width = window.width();
    let mut left = 0usize;
    let mut sum = 0.0f64;
    let mut peak = WindowPeak {
        max_count: 0,
        max_volume: f64::NEG_INFINITY,
    };

    for (right, &(at, amount)) in events.iter().enumerate() {
        sum += amount;

        // Drop everything at or before T - width
        let cutoff = at - width;
        while events[left].0 <= cutoff {
            sum -= events[left].1;
            left += 1;
        }

        let count = (right - left + 1) as u64;
        peak.max_count = peak.max_count.max(count);
        peak.max_volume = peak.max_volume.max(sum);
    }

    Some(peak)
}

/// Peaks for every window, keyed by sender
pub fn sender_window_peaks(
    transactions: &[ResolvedTransaction],
) -> HashMap<String, [WindowPeak; 4]> {
    let mut series: HashMap<&str, Vec<(NaiveDateTime, f64)>> = HashMap::new();
    for tx in transactions {
        if let Some(sender) = tx.from_entity.as_deref() {
            series.entry(sender).or_default().push((tx.datetime, tx.amount));
        }
    }

    series
        .into_iter()
        .filter_map(|(sender, mut events)| {
            // Stable: equal timestamps keep input order
            events.sort_by_key(|(at, _)| *at);

            let mut peaks = [WindowPeak { max_count: 0, max_volume: 0.0 }; 4];
            for (slot, window) in RollingWindow::ALL.iter().enumerate() {
                peaks[slot] = window_peak(&events, *window)?;
            }
            Some((sender.to_string(), peaks))
        })
        .collect()
}
