//! The forecasting kernel.
//!
//! Pure functions over prediction events: reduce each user's history to
//! their current belief, pool current beliefs into a community probability,
//! replay the log into a chartable series, gate new submissions, and score
//! resolved questions. No I/O happens here.

pub mod aggregate;
pub mod community;
pub mod grouping;
pub mod scoring;
pub mod series;
pub mod validation;

pub use aggregate::{pool_probabilities, NO_INFORMATION_PRIOR};
pub use community::CommunityPrediction;
pub use grouping::{group_by_question, group_by_user, QuestionPredictionSummary, UserPredictionGroup};
pub use scoring::{brier_score, leaderboard, score_question, user_stats, LeaderboardEntry, QuestionScore, UserStats};
pub use series::{chart_view, history_series, SeriesPoint, SeriesView};
pub use validation::{can_submit, canonical_probability, validate_submission, PredictionDraft, SubmissionError};
