//! Ranking score of a live instance
//!
//! The release rank dominates: each step away from the newest release costs
//! more than any realistic posting activity can earn back. Posting activity
//! only orders instances on the same release.

use crate::instance::types::NoteChart;

/// Score of an instance on a release of rank [`BASE_RANK`]
pub const BASE_SCORE: f64 = 100_000.0;

pub const BASE_RANK: f64 = 30.0;

/// Score lost per release behind the newest
pub const RANK_PENALTY: f64 = 7_200.0;

/// `100000 - (rank - 30) * 7200`; negative for very old releases
pub fn release_score(rank: u32) -> f64 {
    BASE_SCORE - (f64::from(rank) - BASE_RANK) * RANK_PENALTY
}

/// Mean of the non-zero daily note increments, or 0 when there are none
pub fn activity_score(chart: &NoteChart) -> f64 {
    let Some(increments) = chart.daily_increments() else {
        return 0.0;
    };
    let active: Vec<f64> = increments.iter().copied().filter(|v| *v != 0.0).collect();
    if active.is_empty() {
        return 0.0;
    }
    active.iter().sum::<f64>() / active.len() as f64
}

pub fn score(rank: u32, chart: &NoteChart) -> f64 {
    release_score(rank) + activity_score(chart)
}
