use serde::{Deserialize, Serialize};
use uuid::Uuid;

use futurykon_common::Prediction;

use crate::aggregate::pool_probabilities;
use crate::grouping::latest_per_user;

/// The pooled view of a question at one moment.
///
/// `prediction_count` counts distinct users, not submissions.
/// `community_probability` is `None` when nobody has predicted yet; the
/// neutral prior is a property of the pooling function, not something to
/// show as if it were a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPrediction {
    pub question_id: Uuid,
    pub community_probability: Option<f64>,
    pub prediction_count: usize,
}

impl CommunityPrediction {
    /// Reduce a question's log to each user's latest belief and pool them.
    /// Predictions belonging to other questions are ignored.
    pub fn from_predictions(question_id: Uuid, predictions: &[Prediction]) -> Self {
        let own: Vec<Prediction> = predictions
            .iter()
            .filter(|p| p.question_id == question_id)
            .cloned()
            .collect();
        let latest = latest_per_user(&own);
        let probabilities: Vec<f64> = latest.values().map(|p| p.probability).collect();
        Self::from_latest(question_id, &probabilities)
    }

    /// Pool already-reduced current beliefs, one per user.
    pub fn from_latest(question_id: Uuid, probabilities: &[f64]) -> Self {
        Self {
            question_id,
            community_probability: (!probabilities.is_empty())
                .then(|| pool_probabilities(probabilities)),
            prediction_count: probabilities.len(),
        }
    }

    /// A single forecaster is a reading, not a consensus.
    pub fn is_single_forecast(&self) -> bool {
        self.prediction_count == 1
    }
}
