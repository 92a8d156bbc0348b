//! Brier scoring of resolved questions and the forecaster leaderboard.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use futurykon_common::{Prediction, Question, UserDisplay};

use crate::grouping::{latest_per_user, latest_per_user_as_of};

/// Squared error between a stated percentage and the realized outcome.
/// 0.0 is perfect, 1.0 is maximally wrong.
pub fn brier_score(probability_pct: f64, outcome: bool) -> f64 {
    let p = probability_pct.clamp(0.0, 100.0) / 100.0;
    let o = if outcome { 1.0 } else { 0.0 };
    (p - o).powi(2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub user_display: Option<UserDisplay>,
    pub probability: f64,
    pub brier_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub user_display: Option<UserDisplay>,
    pub avg_brier: f64,
    pub scored_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_predictions: usize,
    pub questions_count: usize,
    pub avg_brier: Option<f64>,
}

/// Score every forecaster on a resolved question. Unresolved questions
/// produce no scores.
///
/// Each user is scored on their last prediction made at or before the close
/// date. A user who only predicted after close (possible if the write raced
/// the close) is scored on their latest prediction.
pub fn score_question(question: &Question, predictions: &[Prediction]) -> Vec<QuestionScore> {
    let Some(outcome) = question.resolution_status.outcome() else {
        return Vec::new();
    };

    let own: Vec<Prediction> = predictions
        .iter()
        .filter(|p| p.question_id == question.id)
        .cloned()
        .collect();

    let mut scored = latest_per_user_as_of(&own, question.close_date);
    for (user_id, latest) in latest_per_user(&own) {
        scored.entry(user_id).or_insert(latest);
    }

    let mut scores: Vec<QuestionScore> = scored
        .into_values()
        .map(|p| QuestionScore {
            question_id: question.id,
            user_id: p.user_id,
            user_display: p.user_display.clone(),
            probability: p.probability,
            brier_score: brier_score(p.probability, outcome),
        })
        .collect();
    scores.sort_by_key(|s| s.user_id);
    scores
}

/// Average Brier per user, best (lowest) first. Ties go to the user with
/// more scored questions, then by id.
pub fn leaderboard(scores: &[QuestionScore]) -> Vec<LeaderboardEntry> {
    let mut by_user: HashMap<Uuid, (f64, usize, Option<UserDisplay>)> = HashMap::new();
    for s in scores {
        let entry = by_user.entry(s.user_id).or_insert((0.0, 0, None));
        entry.0 += s.brier_score;
        entry.1 += 1;
        if entry.2.is_none() {
            entry.2 = s.user_display.clone();
        }
    }

    let mut entries: Vec<LeaderboardEntry> = by_user
        .into_iter()
        .map(|(user_id, (sum, count, user_display))| LeaderboardEntry {
            user_id,
            user_display,
            avg_brier: sum / count as f64,
            scored_count: count,
        })
        .collect();

    entries.sort_by(|a, b| {
        a.avg_brier
            .total_cmp(&b.avg_brier)
            .then_with(|| b.scored_count.cmp(&a.scored_count))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries
}

/// Activity summary for one user across all questions.
pub fn user_stats(user_id: Uuid, predictions: &[Prediction], scores: &[QuestionScore]) -> UserStats {
    let mine: Vec<&Prediction> = predictions.iter().filter(|p| p.user_id == user_id).collect();
    let questions: HashSet<Uuid> = mine.iter().map(|p| p.question_id).collect();

    let my_scores: Vec<f64> = scores
        .iter()
        .filter(|s| s.user_id == user_id)
        .map(|s| s.brier_score)
        .collect();
    let avg_brier =
        (!my_scores.is_empty()).then(|| my_scores.iter().sum::<f64>() / my_scores.len() as f64);

    UserStats {
        total_predictions: mine.len(),
        questions_count: questions.len(),
        avg_brier,
    }
}
