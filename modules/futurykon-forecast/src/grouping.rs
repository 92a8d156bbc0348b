//! Latest-per-user reduction over the append-only prediction log.
//!
//! The log never updates a row: a user's current belief on a question is
//! simply their prediction with the greatest version key
//! `(created_at, seq, id)`. Two predictions from one user with the same
//! timestamp are ordered by the event-store sequence number, which is
//! monotonic in insertion order, and finally by id.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use futurykon_common::{Prediction, UserDisplay};

/// One user's predictions on one question: the current belief plus every
/// older prediction, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPredictionGroup {
    pub user_id: Uuid,
    pub user_display: Option<UserDisplay>,
    pub latest: Prediction,
    pub history: Vec<Prediction>,
}

impl UserPredictionGroup {
    /// Number of predictions this user has made on the question.
    pub fn prediction_count(&self) -> usize {
        self.history.len() + 1
    }
}

/// One user's activity on one question, for a per-user overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPredictionSummary {
    pub question_id: Uuid,
    pub latest: Prediction,
    pub prediction_count: usize,
}

/// Partition predictions for a single question into one group per user.
///
/// Accepts any input order. Each group's `history` is strictly decreasing by
/// version key, and `sum(group.prediction_count()) == predictions.len()`. Groups are
/// ordered by their latest prediction, newest first.
pub fn group_by_user(predictions: &[Prediction]) -> Vec<UserPredictionGroup> {
    let mut by_user: HashMap<Uuid, Vec<&Prediction>> = HashMap::new();
    for p in predictions {
        by_user.entry(p.user_id).or_default().push(p);
    }

    let mut groups: Vec<UserPredictionGroup> = by_user
        .into_iter()
        .filter_map(|(user_id, mut preds)| {
            preds.sort_by(|a, b| b.version_key().cmp(&a.version_key()));
            let mut iter = preds.into_iter().cloned();
            let latest = iter.next()?;
            let history: Vec<Prediction> = iter.collect();
            let user_display = latest
                .user_display
                .clone()
                .or_else(|| history.iter().find_map(|p| p.user_display.clone()));
            Some(UserPredictionGroup {
                user_id,
                user_display,
                latest,
                history,
            })
        })
        .collect();

    groups.sort_by(|a, b| b.latest.version_key().cmp(&a.latest.version_key()));
    groups
}

/// Each user's current prediction.
pub fn latest_per_user(predictions: &[Prediction]) -> HashMap<Uuid, &Prediction> {
    latest_by_user(predictions.iter())
}

/// Each user's latest prediction made at or before `cutoff`.
pub fn latest_per_user_as_of(
    predictions: &[Prediction],
    cutoff: DateTime<Utc>,
) -> HashMap<Uuid, &Prediction> {
    latest_by_user(predictions.iter().filter(|p| p.created_at <= cutoff))
}

fn latest_by_user<'a>(
    predictions: impl Iterator<Item = &'a Prediction>,
) -> HashMap<Uuid, &'a Prediction> {
    let mut latest: HashMap<Uuid, &Prediction> = HashMap::new();
    for p in predictions {
        latest
            .entry(p.user_id)
            .and_modify(|current| {
                if p.version_key() > current.version_key() {
                    *current = p;
                }
            })
            .or_insert(p);
    }
    latest
}

/// Group one user's predictions by question, newest activity first.
pub fn group_by_question(predictions: &[Prediction]) -> Vec<QuestionPredictionSummary> {
    let mut by_question: HashMap<Uuid, QuestionPredictionSummary> = HashMap::new();
    for p in predictions {
        by_question
            .entry(p.question_id)
            .and_modify(|summary| {
                summary.prediction_count += 1;
                if p.version_key() > summary.latest.version_key() {
                    summary.latest = p.clone();
                }
            })
            .or_insert_with(|| QuestionPredictionSummary {
                question_id: p.question_id,
                latest: p.clone(),
                prediction_count: 1,
            });
    }

    let mut summaries: Vec<QuestionPredictionSummary> = by_question.into_values().collect();
    summaries.sort_by(|a, b| b.latest.version_key().cmp(&a.latest.version_key()));
    summaries
}
