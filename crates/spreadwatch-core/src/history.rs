//! Historical spread series.

use serde::{Deserialize, Serialize};

/// Response of `GET /historical`: parallel, index-aligned sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub dates: Vec<String>,
    pub spread: Vec<f64>,
    pub z_score: Vec<f64>,
    pub cumulative_pnl: Vec<f64>,
    /// Upstream sends positions as floats (`1.0`); integers are accepted too.
    pub positions: Vec<f64>,
}

impl HistoricalSeries {
    /// Lengths of every named sequence, in wire order.
    #[must_use]
    pub fn lengths(&self) -> [(&'static str, usize); 5] {
        [
            ("dates", self.dates.len()),
            ("spread", self.spread.len()),
            ("z_score", self.z_score.len()),
            ("cumulative_pnl", self.cumulative_pnl.len()),
            ("positions", self.positions.len()),
        ]
    }
}

/// One aligned row of the historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: String,
    pub spread: f64,
    pub z_score: f64,
    pub cumulative_pnl: f64,
    pub position: i64,
}
