// src/engine/aggregator.rs

use chrono::{DateTime, Utc};

use crate::engine::subtest::Subtest;
use crate::models::answer::Scope;
use crate::models::result::{SimulationResult, SubtestResult};
use crate::store::{ExamStore, StoreError};

/// Fixed scoring weight: each subtest is normalized to a 0-500 scale.
const SUBTEST_SCALE: f64 = 50.0 * 10.0;

/// round(correct / total * 500), round-half-up.
pub fn subtest_score(correct_count: u32, total_questions: u32) -> i64 {
    if total_questions == 0 {
        return 0;
    }
    ((correct_count as f64 / total_questions as f64) * SUBTEST_SCALE).round() as i64
}

/// Unweighted mean of the subtest scores, round-half-up.
pub fn final_score(scores: &[i64]) -> i64 {
    if scores.is_empty() {
        return 0;
    }
    let sum: i64 = scores.iter().sum();
    (sum as f64 / scores.len() as f64).round() as i64
}

/// Reads every recorded answer of the simulation, scores each subtest in
/// sequence order, persists the result keyed by (user, simulation) with
/// overwrite-on-retry, and returns it so the caller needs no second read.
///
/// Any fetch or write failure aborts the whole aggregation; no partial
/// result is ever persisted.
pub async fn aggregate(
    store: &dyn ExamStore,
    user_email: &str,
    simulation_id: i64,
    now: DateTime<Utc>,
) -> Result<SimulationResult, StoreError> {
    let mut subtest_results = Vec::with_capacity(Subtest::SEQUENCE.len());

    for subtest in Subtest::SEQUENCE {
        let scope = Scope::Simulation {
            simulation_id,
            subtest,
        };
        let records = store.fetch_answer_records(user_email, &scope).await?;
        let correct_count = records.iter().filter(|r| r.is_correct).count() as u32;
        let total_questions = subtest.question_count();

        subtest_results.push(SubtestResult {
            subtest,
            correct_count,
            total_questions,
            score: subtest_score(correct_count, total_questions),
        });
    }

    let scores: Vec<i64> = subtest_results.iter().map(|r| r.score).collect();
    let result = SimulationResult {
        simulation_id,
        subtest_results,
        final_score: final_score(&scores),
        completed_at: now,
    };

    store.write_simulation_result(user_email, &result).await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::recorder;
    use crate::models::answer::{AnswerOption, SlotKey};
    use crate::store::memory::MemoryStore;

    const USER: &str = "siti@example.com";

    async fn answer_n(store: &MemoryStore, subtest: Subtest, correct: u32, wrong: u32) {
        let scope = Scope::Simulation {
            simulation_id: 1,
            subtest,
        };
        for i in 1..=(correct + wrong) {
            store.seed_canonical_answer(scope, i, AnswerOption::A);
            let selected = if i <= correct {
                AnswerOption::A
            } else {
                AnswerOption::B
            };
            let key = SlotKey {
                user_email: USER.to_string(),
                scope,
                question_index: i,
            };
            recorder::record(store, &key, selected, Utc::now())
                .await
                .unwrap();
        }
    }

    #[test]
    fn score_arithmetic_matches_the_documented_samples() {
        assert_eq!(subtest_score(45, 90), 250);
        assert_eq!(subtest_score(15, 25), 300);
        assert_eq!(final_score(&[250, 300, 300, 350]), 300);
    }

    #[test]
    fn final_score_rounds_half_up() {
        // mean(250, 300, 300, 351) = 300.25 -> 300
        assert_eq!(final_score(&[250, 300, 300, 351]), 300);
        // mean(250, 300, 300, 352) = 300.5 -> 301
        assert_eq!(final_score(&[250, 300, 300, 352]), 301);
    }

    #[tokio::test]
    async fn scores_all_four_subtests_in_sequence_order() {
        let store = MemoryStore::new();
        answer_n(&store, Subtest::Tps, 45, 10).await;
        answer_n(&store, Subtest::Indo, 15, 5).await;

        let result = aggregate(&store, USER, 1, Utc::now()).await.unwrap();

        assert_eq!(result.subtest_results.len(), 4);
        let order: Vec<Subtest> = result.subtest_results.iter().map(|r| r.subtest).collect();
        assert_eq!(order, Subtest::SEQUENCE.to_vec());

        assert_eq!(result.subtest_results[0].correct_count, 45);
        assert_eq!(result.subtest_results[0].score, 250);
        assert_eq!(result.subtest_results[1].score, 300);
        assert_eq!(result.subtest_results[2].score, 0);
        assert_eq!(result.subtest_results[3].score, 0);
        assert_eq!(result.final_score, final_score(&[250, 300, 0, 0]));
    }

    #[tokio::test]
    async fn unanswered_simulation_scores_zero_everywhere() {
        let store = MemoryStore::new();
        let result = aggregate(&store, USER, 3, Utc::now()).await.unwrap();

        assert!(result.subtest_results.iter().all(|r| r.score == 0));
        assert_eq!(result.final_score, 0);
    }

    #[tokio::test]
    async fn retry_overwrites_the_previous_result() {
        let store = MemoryStore::new();
        answer_n(&store, Subtest::Mat, 10, 0).await;
        let first = aggregate(&store, USER, 1, Utc::now()).await.unwrap();

        answer_n(&store, Subtest::Mat, 20, 0).await;
        let second = aggregate(&store, USER, 1, Utc::now()).await.unwrap();
        assert_ne!(first.final_score, second.final_score);

        let stored = store.fetch_simulation_result(USER, 1).await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn failed_aggregation_persists_nothing() {
        let store = MemoryStore::new();
        answer_n(&store, Subtest::Tps, 5, 0).await;
        store.fail_writes(true);

        assert!(aggregate(&store, USER, 1, Utc::now()).await.is_err());
        store.fail_writes(false);
        assert!(store.fetch_simulation_result(USER, 1).await.unwrap().is_none());
    }
}
