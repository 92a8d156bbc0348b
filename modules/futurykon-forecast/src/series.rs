//! Community probability over time.
//!
//! Replays a question's predictions in chronological order, keeping a
//! running map of each user's latest probability, and emits one point per
//! prediction event reflecting everyone's latest-known belief at that instant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use futurykon_common::Prediction;

use crate::aggregate::pool_probabilities;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub pooled_probability: f64,
    pub contributor_count: usize,
}

/// What a chart should render for a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesView {
    /// No predictions yet. Render an empty state, never a synthetic point.
    NoData,
    /// Exactly one point: show it as an N=1 reading rather than a trend line.
    Single { point: SeriesPoint },
    Trend { points: Vec<SeriesPoint> },
}

/// One point per prediction, in `(created_at, seq, id)` order.
///
/// `contributor_count` never decreases: predictions are never retracted.
/// The very first point carries its probability verbatim; every later point
/// is the pooled value, so the last point always equals the live community
/// prediction.
pub fn history_series(predictions: &[Prediction]) -> Vec<SeriesPoint> {
    let mut ordered: Vec<&Prediction> = predictions.iter().collect();
    ordered.sort_by_key(|p| p.version_key());

    let mut latest: HashMap<Uuid, f64> = HashMap::new();
    let mut points = Vec::with_capacity(ordered.len());

    for prediction in ordered {
        latest.insert(prediction.user_id, prediction.probability);

        let pooled_probability = if points.is_empty() {
            prediction.probability
        } else {
            let current: Vec<f64> = latest.values().copied().collect();
            pool_probabilities(&current)
        };

        points.push(SeriesPoint {
            timestamp: prediction.created_at,
            pooled_probability,
            contributor_count: latest.len(),
        });
    }

    points
}

pub fn chart_view(mut series: Vec<SeriesPoint>) -> SeriesView {
    match series.len() {
        0 => SeriesView::NoData,
        1 => SeriesView::Single {
            point: series.remove(0),
        },
        _ => SeriesView::Trend { points: series },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn prediction(seq: i64, user: Uuid, probability: f64, minutes: i64) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            seq,
            question_id: Uuid::nil(),
            user_id: user,
            probability,
            reasoning: None,
            created_at: at(minutes),
            user_display: None,
        }
    }

    #[test]
    fn empty_log_is_empty_series_and_no_data() {
        let series = history_series(&[]);
        assert!(series.is_empty());
        assert_eq!(chart_view(series), SeriesView::NoData);
    }

    #[test]
    fn single_event_is_that_users_probability() {
        let series = history_series(&[prediction(1, Uuid::new_v4(), 73.0, 0)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].pooled_probability, 73.0);
        assert_eq!(series[0].contributor_count, 1);
        assert!(matches!(chart_view(series), SeriesView::Single { .. }));
    }

    #[test]
    fn one_point_per_event_with_running_latest() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // Shuffled input; chronological order is a(80) b(20) a(20).
        let preds = vec![
            prediction(3, a, 20.0, 30),
            prediction(1, a, 80.0, 10),
            prediction(2, b, 20.0, 20),
        ];

        let series = history_series(&preds);
        assert_eq!(series.len(), 3);

        assert_eq!(series[0].timestamp, at(10));
        assert_eq!(series[0].pooled_probability, 80.0);
        assert_eq!(series[0].contributor_count, 1);

        assert!((series[1].pooled_probability - 50.0).abs() < 1e-9);
        assert_eq!(series[1].contributor_count, 2);

        // a revised down to 20: both latest beliefs are now 20.
        assert!((series[2].pooled_probability - 20.0).abs() < 1e-9);
        assert_eq!(series[2].contributor_count, 2);

        assert!(matches!(chart_view(series), SeriesView::Trend { points } if points.len() == 3));
    }

    #[test]
    fn same_user_updates_keep_count_at_one() {
        let u = Uuid::new_v4();
        let series = history_series(&[prediction(1, u, 40.0, 0), prediction(2, u, 45.0, 1)]);
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|p| p.contributor_count == 1));
        assert!((series[1].pooled_probability - 45.0).abs() < 1e-9);
    }

    #[test]
    fn lone_forecaster_revising_to_zero_agrees_with_live_value() {
        let u = Uuid::new_v4();
        let preds = vec![prediction(1, u, 40.0, 0), prediction(2, u, 0.0, 5)];

        let series = history_series(&preds);
        let live = crate::CommunityPrediction::from_predictions(Uuid::nil(), &preds);
        assert_eq!(series[0].pooled_probability, 40.0);
        assert_eq!(
            Some(series[1].pooled_probability),
            live.community_probability
        );
        assert!(series[1].pooled_probability > 0.0);
    }

    #[test]
    fn last_point_matches_live_community_prediction() {
        let q = Uuid::nil();
        let preds: Vec<Prediction> = (0..6)
            .map(|i| prediction(i, Uuid::from_u128((i % 4) as u128 + 1), 10.0 + 13.0 * i as f64, i))
            .collect();

        let series = history_series(&preds);
        let live = crate::CommunityPrediction::from_predictions(q, &preds);
        let last = series.last().unwrap();
        assert_eq!(last.contributor_count, live.prediction_count);
        assert!((last.pooled_probability - live.community_probability.unwrap()).abs() < 1e-9);
    }
}
