use serde::Serialize;
use crate::watched::WatchedEntry;

/// Aggregate figures shown above the watched list.
///
/// Averages only consider entries where the value is known; an average over
/// no known values is None.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WatchedSummary {
    pub count: usize,
    pub avg_external_rating: Option<f32>,
    pub avg_user_rating: Option<f32>,
    pub avg_runtime_minutes: Option<f32>,
}

impl WatchedSummary {
    pub fn from_entries(entries: &[WatchedEntry]) -> Self {
        Self {
            count: entries.len(),
            avg_external_rating: average(entries.iter().filter_map(|e| e.external_rating)),
            avg_user_rating: average(entries.iter().filter_map(|e| e.user_rating.map(f32::from))),
            avg_runtime_minutes: average(
                entries.iter().filter_map(|e| e.runtime_minutes.map(|m| m as f32)),
            ),
        }
    }
}

fn average(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, n) = values.fold((0.0_f32, 0_u32), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f32)
    }
}
