use chrono::{Duration, TimeZone, Utc};
use futurykon_common::Prediction;
use futurykon_forecast::{group_by_user, history_series, pool_probabilities, CommunityPrediction};
use proptest::prelude::*;
use uuid::Uuid;

fn predictions(question_id: Uuid, raw: &[(u8, f64, i64)]) -> Vec<Prediction> {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    raw.iter()
        .enumerate()
        .map(|(i, &(user, probability, minute))| Prediction {
            id: Uuid::new_v4(),
            seq: i as i64 + 1,
            question_id,
            user_id: Uuid::from_u128(user as u128 + 1),
            probability,
            reasoning: None,
            created_at: base + Duration::minutes(minute),
            user_display: None,
        })
        .collect()
}

fn log_strategy() -> impl Strategy<Value = Vec<(u8, f64, i64)>> {
    prop::collection::vec((0u8..6, 0.0f64..=100.0, 0i64..30), 1..40)
}

proptest! {
    #[test]
    fn pooled_value_stays_strictly_inside_bounds(
        ps in prop::collection::vec(0.0f64..=100.0, 1..50)
    ) {
        let pooled = pool_probabilities(&ps);
        prop_assert!(pooled > 0.0 && pooled < 100.0, "pooled {} out of (0,100)", pooled);
    }

    #[test]
    fn single_vote_pools_to_itself(p in 0.011f64..99.989) {
        let pooled = pool_probabilities(&[p]);
        prop_assert!((pooled - p).abs() < 1e-6, "pool([{}]) = {}", p, pooled);
    }

    #[test]
    fn pooling_ignores_order(
        shuffled in prop::collection::vec(0.0f64..=100.0, 1..30)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let (original, permuted) = shuffled;
        prop_assert_eq!(
            pool_probabilities(&original).to_bits(),
            pool_probabilities(&permuted).to_bits()
        );
    }

    #[test]
    fn reducer_has_one_group_per_user_and_loses_nothing(raw in log_strategy()) {
        let preds = predictions(Uuid::nil(), &raw);
        let users: std::collections::HashSet<u8> = raw.iter().map(|r| r.0).collect();

        let groups = group_by_user(&preds);
        prop_assert_eq!(groups.len(), users.len());
        prop_assert_eq!(
            groups.iter().map(|g| g.history.len() + 1).sum::<usize>(),
            preds.len()
        );
        for g in &groups {
            for older in &g.history {
                prop_assert!(older.version_key() < g.latest.version_key());
                prop_assert!(older.created_at <= g.latest.created_at);
            }
        }
    }

    #[test]
    fn latest_of_each_group_reproduces_community_prediction(raw in log_strategy()) {
        let q = Uuid::new_v4();
        let preds = predictions(q, &raw);

        let latest: Vec<f64> = group_by_user(&preds)
            .iter()
            .map(|g| g.latest.probability)
            .collect();
        let from_groups = CommunityPrediction::from_latest(q, &latest);
        let live = CommunityPrediction::from_predictions(q, &preds);

        prop_assert_eq!(from_groups.prediction_count, live.prediction_count);
        let (a, b) = (
            from_groups.community_probability.unwrap(),
            live.community_probability.unwrap(),
        );
        prop_assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn series_contributors_never_decrease(raw in log_strategy()) {
        let preds = predictions(Uuid::nil(), &raw);
        let series = history_series(&preds);

        prop_assert_eq!(series.len(), preds.len());
        for pair in series.windows(2) {
            prop_assert!(pair[0].contributor_count <= pair[1].contributor_count);
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn series_ends_at_the_live_community_value(raw in log_strategy()) {
        prop_assume!(raw.len() > 1);
        let preds = predictions(Uuid::nil(), &raw);
        let series = history_series(&preds);
        let live = CommunityPrediction::from_predictions(Uuid::nil(), &preds);

        let last = series.last().unwrap();
        prop_assert_eq!(last.contributor_count, live.prediction_count);
        prop_assert_eq!(
            last.pooled_probability.to_bits(),
            live.community_probability.unwrap().to_bits()
        );
    }
}
