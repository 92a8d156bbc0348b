//! In-memory read model folded from the event log.
//!
//! `ForecastState` is rebuilt purely from facts. Each fact is applied at most
//! once: the state tracks the highest contiguous sequence number it has seen
//! plus any facts it received ahead of that point (our own writes, reduced
//! right after persisting), so a later catch-up read skips them.
//!
//! Resolutions and suggestion reviews are final. When two instances race and
//! both record one, the fact with the lower sequence number wins regardless
//! of the order facts reach this state, so every instance converges.

use std::collections::{BTreeSet, HashMap};

use futurykon_common::{
    Event, FuturykonError, Prediction, Question, QuestionSuggestion, ResolutionStatus,
    SuggestionStatus,
};
use futurykon_events::StoredEvent;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::Reducer;

#[derive(Debug, Clone, Default)]
pub struct ForecastState {
    questions: HashMap<Uuid, Question>,
    predictions: HashMap<Uuid, Vec<Prediction>>,
    suggestions: HashMap<Uuid, QuestionSuggestion>,
    last_seq: i64,
    applied_ahead: BTreeSet<i64>,
    /// question -> seq of the resolution in force
    resolved_at_seq: HashMap<Uuid, i64>,
    /// suggestion -> seq of the review in force
    reviewed_at_seq: HashMap<Uuid, i64>,
    /// suggestion -> (seq of the approving review, question it published)
    published_from: HashMap<Uuid, (i64, Uuid)>,
}

impl ForecastState {
    /// Highest sequence number up to which every fact has been applied.
    pub fn last_seq(&self) -> i64 {
        self.last_seq
    }

    /// Mark `seq` applied. Returns false if it already was.
    fn admit(&mut self, seq: i64) -> bool {
        if seq <= self.last_seq || !self.applied_ahead.insert(seq) {
            return false;
        }
        self.advance();
        true
    }

    /// Give up on every sequence number up to `through`: they were never
    /// committed. Facts already applied beyond the hole are kept.
    pub(crate) fn skip_gap(&mut self, through: i64) {
        if through <= self.last_seq {
            return;
        }
        self.last_seq = through;
        self.applied_ahead = self.applied_ahead.split_off(&(through + 1));
        self.advance();
    }

    /// Whether a question published by the review at `review_seq` stands.
    /// A publication from an earlier review replaces one from a later review.
    fn admit_publication(&mut self, suggestion_id: Uuid, review_seq: i64, question_id: Uuid) -> bool {
        if let Some(&reviewed) = self.reviewed_at_seq.get(&suggestion_id) {
            if reviewed < review_seq {
                return false;
            }
        }
        match self.published_from.get(&suggestion_id).copied() {
            Some((earlier, _)) if earlier <= review_seq => return false,
            Some((_, superseded)) => {
                self.questions.remove(&superseded);
            }
            None => {}
        }
        self.published_from
            .insert(suggestion_id, (review_seq, question_id));
        true
    }

    /// Drop a question published by a review later than `review_seq`.
    fn withdraw_publication_after(&mut self, suggestion_id: Uuid, review_seq: i64) {
        if let Some(&(published_by, question_id)) = self.published_from.get(&suggestion_id) {
            if published_by > review_seq {
                warn!(%suggestion_id, %question_id, "question from a superseded review withdrawn");
                self.questions.remove(&question_id);
                self.published_from.remove(&suggestion_id);
            }
        }
    }

    fn advance(&mut self) {
        while self.applied_ahead.remove(&(self.last_seq + 1)) {
            self.last_seq += 1;
        }
    }

    /// Questions, newest first.
    pub fn questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.values().collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        questions
    }

    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.get(&id)
    }

    /// Every prediction on a question, in the order they were applied.
    pub fn predictions_for(&self, question_id: Uuid) -> &[Prediction] {
        self.predictions
            .get(&question_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One user's predictions across all questions.
    pub fn predictions_by_user(&self, user_id: Uuid) -> Vec<Prediction> {
        self.predictions
            .values()
            .flatten()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Suggestions, newest first, optionally filtered by status.
    pub fn suggestions(&self, status: Option<SuggestionStatus>) -> Vec<&QuestionSuggestion> {
        let mut suggestions: Vec<&QuestionSuggestion> = self
            .suggestions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .collect();
        suggestions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        suggestions
    }

    pub fn suggestion(&self, id: Uuid) -> Option<&QuestionSuggestion> {
        self.suggestions.get(&id)
    }
}

/// Folds `Event`s into `ForecastState`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastProjector;

impl ForecastProjector {
    /// Decode a stored fact and reduce it. Facts of unknown type or with a
    /// malformed payload are skipped (their sequence number is still
    /// consumed, so catch-up never stalls on them).
    pub fn apply_stored(&self, state: &mut ForecastState, stored: &StoredEvent) -> Result<(), FuturykonError> {
        match Event::from_payload(&stored.payload) {
            Ok(event) => {
                self.reduce(state, &event, stored);
                Ok(())
            }
            Err(e) => {
                state.admit(stored.seq);
                Err(FuturykonError::MalformedEvent(e))
            }
        }
    }
}

impl Reducer<Event, ForecastState> for ForecastProjector {
    fn reduce(&self, state: &mut ForecastState, event: &Event, stored: &StoredEvent) {
        if !state.admit(stored.seq) {
            debug!(seq = stored.seq, "fact already applied");
            return;
        }

        match event {
            Event::QuestionPublished {
                question_id,
                title,
                description,
                resolution_criteria,
                category,
                close_date,
                author_id,
                published_at,
                from_suggestion,
            } => {
                if let Some(suggestion_id) = from_suggestion {
                    let review_seq = stored.parent_seq.unwrap_or(stored.seq);
                    if !state.admit_publication(*suggestion_id, review_seq, *question_id) {
                        warn!(%suggestion_id, %question_id, seq = stored.seq, "publication from a superseded review; ignoring");
                        return;
                    }
                }
                state.questions.insert(
                    *question_id,
                    Question {
                        id: *question_id,
                        title: title.clone(),
                        description: description.clone(),
                        resolution_criteria: resolution_criteria.clone(),
                        category: *category,
                        close_date: *close_date,
                        created_at: *published_at,
                        resolution_status: ResolutionStatus::Pending,
                        resolution_date: None,
                        author_id: *author_id,
                    },
                );
            }

            Event::QuestionResolved {
                question_id,
                outcome,
                resolved_at,
                ..
            } => {
                let Some(question) = state.questions.get_mut(question_id) else {
                    warn!(%question_id, seq = stored.seq, "resolution for unknown question");
                    return;
                };
                if let Some(&earlier) = state.resolved_at_seq.get(question_id) {
                    if earlier < stored.seq {
                        warn!(%question_id, seq = stored.seq, earlier, "question already resolved; ignoring");
                        return;
                    }
                }
                question.resolution_status = (*outcome).into();
                question.resolution_date = Some(*resolved_at);
                state.resolved_at_seq.insert(*question_id, stored.seq);
            }

            Event::PredictionSubmitted {
                prediction_id,
                question_id,
                user_id,
                probability,
                reasoning,
                submitted_at,
                user_display,
            } => {
                state.predictions.entry(*question_id).or_default().push(Prediction {
                    id: *prediction_id,
                    seq: stored.seq,
                    question_id: *question_id,
                    user_id: *user_id,
                    probability: probability.clamp(0.0, 100.0),
                    reasoning: reasoning.clone(),
                    created_at: *submitted_at,
                    user_display: user_display.clone(),
                });
            }

            Event::SuggestionSubmitted {
                suggestion_id,
                title,
                description,
                category,
                close_date,
                suggested_by,
                submitted_at,
            } => {
                state.suggestions.insert(
                    *suggestion_id,
                    QuestionSuggestion {
                        id: *suggestion_id,
                        title: title.clone(),
                        description: description.clone(),
                        category: *category,
                        close_date: *close_date,
                        suggested_by: *suggested_by,
                        status: SuggestionStatus::Pending,
                        admin_note: None,
                        created_at: *submitted_at,
                    },
                );
            }

            Event::SuggestionReviewed {
                suggestion_id,
                approved,
                admin_note,
                ..
            } => {
                let Some(suggestion) = state.suggestions.get_mut(suggestion_id) else {
                    warn!(%suggestion_id, seq = stored.seq, "review for unknown suggestion");
                    return;
                };
                if let Some(&earlier) = state.reviewed_at_seq.get(suggestion_id) {
                    if earlier < stored.seq {
                        warn!(%suggestion_id, seq = stored.seq, earlier, "suggestion already reviewed; ignoring");
                        return;
                    }
                }
                suggestion.status = if *approved {
                    SuggestionStatus::Approved
                } else {
                    SuggestionStatus::Rejected
                };
                suggestion.admin_note = admin_note.clone();
                state.reviewed_at_seq.insert(*suggestion_id, stored.seq);
                state.withdraw_publication_after(*suggestion_id, stored.seq);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use futurykon_common::{Category, Outcome};

    fn stored(seq: i64, event: &Event) -> StoredEvent {
        StoredEvent {
            seq,
            ts: Utc::now(),
            event_type: event.event_type().to_string(),
            stream_id: Some(event.stream_id()),
            parent_seq: None,
            caused_by_seq: None,
            actor: event.actor(),
            payload: event.to_payload(),
            schema_v: 1,
        }
    }

    fn published(question_id: Uuid) -> Event {
        Event::QuestionPublished {
            question_id,
            title: "Czy Waymo ruszy w Warszawie?".into(),
            description: String::new(),
            resolution_criteria: String::new(),
            category: Category::AutonomousVehicles,
            close_date: Utc::now() + Duration::days(30),
            author_id: None,
            published_at: Utc::now(),
            from_suggestion: None,
        }
    }

    fn submitted(question_id: Uuid, user_id: Uuid, probability: f64) -> Event {
        Event::PredictionSubmitted {
            prediction_id: Uuid::new_v4(),
            question_id,
            user_id,
            probability,
            reasoning: None,
            submitted_at: Utc::now(),
            user_display: None,
        }
    }

    #[test]
    fn facts_fold_into_questions_and_predictions() {
        let q = Uuid::new_v4();
        let u = Uuid::new_v4();
        let mut state = ForecastState::default();
        let projector = ForecastProjector;

        for (seq, event) in [published(q), submitted(q, u, 30.0), submitted(q, u, 45.0)]
            .iter()
            .enumerate()
        {
            projector.apply_stored(&mut state, &stored(seq as i64 + 1, event)).unwrap();
        }

        assert_eq!(state.last_seq(), 3);
        assert!(state.question(q).is_some());
        let preds = state.predictions_for(q);
        assert_eq!(preds.len(), 2);
        assert_eq!(preds.iter().map(|p| p.seq).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(state.predictions_by_user(u).len(), 2);
    }

    #[test]
    fn replaying_a_fact_is_a_no_op() {
        let q = Uuid::new_v4();
        let mut state = ForecastState::default();
        let projector = ForecastProjector;
        let fact = stored(1, &submitted(q, Uuid::new_v4(), 50.0));

        projector.apply_stored(&mut state, &fact).unwrap();
        projector.apply_stored(&mut state, &fact).unwrap();
        assert_eq!(state.predictions_for(q).len(), 1);
    }

    #[test]
    fn facts_ahead_of_a_gap_are_not_reapplied_on_catch_up() {
        let q = Uuid::new_v4();
        let mut state = ForecastState::default();
        let projector = ForecastProjector;
        let first = stored(1, &published(q));
        let own_write = stored(3, &submitted(q, Uuid::new_v4(), 60.0));
        let other_write = stored(2, &submitted(q, Uuid::new_v4(), 40.0));

        projector.apply_stored(&mut state, &first).unwrap();
        projector.apply_stored(&mut state, &own_write).unwrap();
        assert_eq!(state.last_seq(), 1);

        // Catch-up reads 2 and 3; 3 is already in.
        projector.apply_stored(&mut state, &other_write).unwrap();
        projector.apply_stored(&mut state, &own_write).unwrap();
        assert_eq!(state.last_seq(), 3);
        assert_eq!(state.predictions_for(q).len(), 2);
    }

    #[test]
    fn resolution_updates_status() {
        let q = Uuid::new_v4();
        let mut state = ForecastState::default();
        let projector = ForecastProjector;
        let resolved_at = Utc::now();

        projector.apply_stored(&mut state, &stored(1, &published(q))).unwrap();
        let resolve = Event::QuestionResolved {
            question_id: q,
            outcome: Outcome::No,
            resolved_by: Uuid::new_v4(),
            resolved_at,
        };
        projector.apply_stored(&mut state, &stored(2, &resolve)).unwrap();

        let question = state.question(q).unwrap();
        assert_eq!(question.resolution_status, ResolutionStatus::No);
        assert_eq!(question.resolution_date, Some(resolved_at));
    }

    #[test]
    fn suggestion_review_sets_status_and_note() {
        let s = Uuid::new_v4();
        let mut state = ForecastState::default();
        let projector = ForecastProjector;
        let submitted = Event::SuggestionSubmitted {
            suggestion_id: s,
            title: "Czy UE złagodzi AI Act?".into(),
            description: None,
            category: Category::Regulation,
            close_date: Utc::now() + Duration::days(90),
            suggested_by: Uuid::new_v4(),
            submitted_at: Utc::now(),
        };
        let reviewed = Event::SuggestionReviewed {
            suggestion_id: s,
            approved: false,
            admin_note: Some("Duplikat".into()),
            reviewed_by: Uuid::new_v4(),
            reviewed_at: Utc::now(),
        };
        projector.apply_stored(&mut state, &stored(1, &submitted)).unwrap();
        assert_eq!(state.suggestions(Some(SuggestionStatus::Pending)).len(), 1);

        projector.apply_stored(&mut state, &stored(2, &reviewed)).unwrap();
        let suggestion = state.suggestion(s).unwrap();
        assert_eq!(suggestion.status, SuggestionStatus::Rejected);
        assert_eq!(suggestion.admin_note.as_deref(), Some("Duplikat"));
        assert!(state.suggestions(Some(SuggestionStatus::Pending)).is_empty());
    }

    #[test]
    fn malformed_payload_is_reported_but_consumed() {
        let mut state = ForecastState::default();
        let mut bad = stored(1, &published(Uuid::new_v4()));
        bad.payload = serde_json::json!({ "type": "something_else" });

        assert!(ForecastProjector.apply_stored(&mut state, &bad).is_err());
        assert_eq!(state.last_seq(), 1);
    }

    #[test]
    fn skipped_gap_lets_the_watermark_pass_and_keeps_facts_ahead() {
        let q = Uuid::new_v4();
        let mut state = ForecastState::default();
        let projector = ForecastProjector;
        projector.apply_stored(&mut state, &stored(1, &published(q))).unwrap();
        projector
            .apply_stored(&mut state, &stored(4, &submitted(q, Uuid::new_v4(), 20.0)))
            .unwrap();
        assert_eq!(state.last_seq(), 1);

        state.skip_gap(2);
        assert_eq!(state.last_seq(), 2);

        projector
            .apply_stored(&mut state, &stored(3, &submitted(q, Uuid::new_v4(), 70.0)))
            .unwrap();
        assert_eq!(state.last_seq(), 4);
        assert_eq!(state.predictions_for(q).len(), 2);

        state.skip_gap(1);
        assert_eq!(state.last_seq(), 4);
    }

    fn resolved(question_id: Uuid, outcome: Outcome) -> Event {
        Event::QuestionResolved {
            question_id,
            outcome,
            resolved_by: Uuid::new_v4(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn earliest_resolution_wins_in_any_arrival_order() {
        let q = Uuid::new_v4();
        let first = stored(2, &resolved(q, Outcome::Yes));
        let second = stored(3, &resolved(q, Outcome::No));

        for order in [[&first, &second], [&second, &first]] {
            let mut state = ForecastState::default();
            ForecastProjector.apply_stored(&mut state, &stored(1, &published(q))).unwrap();
            for fact in order {
                ForecastProjector.apply_stored(&mut state, fact).unwrap();
            }
            assert_eq!(state.question(q).unwrap().resolution_status, ResolutionStatus::Yes);
        }
    }

    fn suggestion_facts(s: Uuid) -> Event {
        Event::SuggestionSubmitted {
            suggestion_id: s,
            title: "Czy powstanie polski model językowy klasy GPT-5?".into(),
            description: None,
            category: Category::Business,
            close_date: Utc::now() + Duration::days(90),
            suggested_by: Uuid::new_v4(),
            submitted_at: Utc::now(),
        }
    }

    fn review(s: Uuid, approved: bool) -> Event {
        Event::SuggestionReviewed {
            suggestion_id: s,
            approved,
            admin_note: None,
            reviewed_by: Uuid::new_v4(),
            reviewed_at: Utc::now(),
        }
    }

    fn promoted(s: Uuid, question_id: Uuid) -> Event {
        Event::QuestionPublished {
            question_id,
            title: "Czy powstanie polski model językowy klasy GPT-5?".into(),
            description: String::new(),
            resolution_criteria: String::new(),
            category: Category::Business,
            close_date: Utc::now() + Duration::days(90),
            author_id: None,
            published_at: Utc::now(),
            from_suggestion: Some(s),
        }
    }

    fn child(seq: i64, parent: i64, event: &Event) -> StoredEvent {
        StoredEvent {
            parent_seq: Some(parent),
            caused_by_seq: Some(parent),
            ..stored(seq, event)
        }
    }

    #[test]
    fn racing_approvals_publish_one_question() {
        let s = Uuid::new_v4();
        let (qa, qb) = (Uuid::new_v4(), Uuid::new_v4());
        let submitted = stored(1, &suggestion_facts(s));
        let review_a = stored(2, &review(s, true));
        let review_b = stored(3, &review(s, true));
        let publish_b = child(4, 3, &promoted(s, qb));
        let publish_a = child(5, 2, &promoted(s, qa));

        // Instance B applied its own writes first, then caught up.
        let mut state = ForecastState::default();
        for fact in [&submitted, &review_b, &publish_b, &review_a, &publish_a] {
            ForecastProjector.apply_stored(&mut state, fact).unwrap();
        }
        assert_eq!(state.last_seq(), 5);
        let questions: Vec<Uuid> = state.questions().iter().map(|q| q.id).collect();
        assert_eq!(questions, vec![qa]);

        // A fresh reader sees the same board.
        let mut fresh = ForecastState::default();
        for fact in [&submitted, &review_a, &review_b, &publish_b, &publish_a] {
            ForecastProjector.apply_stored(&mut fresh, fact).unwrap();
        }
        let questions: Vec<Uuid> = fresh.questions().iter().map(|q| q.id).collect();
        assert_eq!(questions, vec![qa]);
    }

    #[test]
    fn earlier_rejection_withdraws_a_later_approval() {
        let s = Uuid::new_v4();
        let q = Uuid::new_v4();
        let mut state = ForecastState::default();
        let facts = [
            stored(1, &suggestion_facts(s)),
            stored(3, &review(s, true)),
            child(4, 3, &promoted(s, q)),
            stored(2, &review(s, false)),
        ];
        for fact in &facts {
            ForecastProjector.apply_stored(&mut state, fact).unwrap();
        }

        assert_eq!(state.suggestion(s).unwrap().status, SuggestionStatus::Rejected);
        assert!(state.question(q).is_none());
    }
}
