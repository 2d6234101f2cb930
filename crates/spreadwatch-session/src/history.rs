//! Historical series loading.

use crate::error::{SessionError, SessionResult};
use spreadwatch_api::DynStrategyApi;
use spreadwatch_core::{HistoricalPoint, HistoricalSeries};
use tracing::{info, warn};

/// Fetches `/historical` and zips it into aligned points.
#[derive(Clone)]
pub struct HistoricalSeriesLoader {
    api: DynStrategyApi,
}

impl HistoricalSeriesLoader {
    pub fn new(api: DynStrategyApi) -> Self {
        Self { api }
    }

    /// One fetch, fully replacing whatever the caller held before.
    pub async fn load(&self) -> SessionResult<Vec<HistoricalPoint>> {
        let series = self.api.historical().await?;
        let points = zip_series(&series)?;
        info!(points = points.len(), "Historical series loaded");
        Ok(points)
    }
}

/// Zip the parallel sequences index-wise, preserving source order.
///
/// Fails on the first sequence whose length differs from `dates`.
pub fn zip_series(series: &HistoricalSeries) -> SessionResult<Vec<HistoricalPoint>> {
    let expected = series.dates.len();
    if let Some((field, actual)) = series
        .lengths()
        .into_iter()
        .find(|(_, len)| *len != expected)
    {
        warn!(field, expected, actual, "Historical series length mismatch");
        return Err(SessionError::MalformedSeries {
            field,
            expected,
            actual,
        });
    }

    Ok((0..expected)
        .map(|i| HistoricalPoint {
            date: series.dates[i].clone(),
            spread: series.spread[i],
            z_score: series.z_score[i],
            cumulative_pnl: series.cumulative_pnl[i],
            position: series.positions[i].round() as i64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spreadwatch_api::{ApiError, MockStrategyApi};
    use std::sync::Arc;

    fn series(n: usize) -> HistoricalSeries {
        HistoricalSeries {
            dates: (0..n).map(|i| format!("2025-01-{:02}", i + 1)).collect(),
            spread: (0..n).map(|i| i as f64 * 0.1).collect(),
            z_score: (0..n).map(|i| i as f64 - 2.0).collect(),
            cumulative_pnl: (0..n).map(|i| i as f64 * 10.0).collect(),
            positions: (0..n).map(|i| [0.0, 1.0, -1.0][i % 3]).collect(),
        }
    }

    #[test]
    fn test_zip_preserves_order() {
        let points = zip_series(&series(5)).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].date, "2025-01-01");
        assert_eq!(points[4].date, "2025-01-05");
        assert_eq!(points[2].position, -1);
        assert_eq!(points[3].z_score, 1.0);
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let mut s = series(5);
        s.cumulative_pnl.pop();
        assert_eq!(
            zip_series(&s).unwrap_err(),
            SessionError::MalformedSeries {
                field: "cumulative_pnl",
                expected: 5,
                actual: 4
            }
        );
    }

    #[test]
    fn test_empty_series() {
        assert!(zip_series(&HistoricalSeries::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_loader_fetches_once() {
        let api = Arc::new(MockStrategyApi::new());
        api.set_historical(Ok(series(3)));
        let loader = HistoricalSeriesLoader::new(api.clone());

        assert_eq!(loader.load().await.unwrap().len(), 3);
        assert_eq!(api.call_count("GET /historical"), 1);
    }

    #[tokio::test]
    async fn test_loader_propagates_request_error() {
        let api = Arc::new(MockStrategyApi::new());
        api.set_historical(Err(ApiError::Http {
            status: 400,
            message: "No data".to_string(),
        }));
        let loader = HistoricalSeriesLoader::new(api);

        assert!(matches!(
            loader.load().await,
            Err(SessionError::Request(ApiError::Http { status: 400, .. }))
        ));
    }
}
