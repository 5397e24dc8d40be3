// src/models/result.rs

use serde::{Deserialize, Serialize};

use crate::engine::subtest::Subtest;

/// Scored outcome of one subtest within a simulation.
/// `score` is normalized to a 0-500 scale: round(correct/total * 500).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtestResult {
    pub subtest: Subtest,
    pub correct_count: u32,
    pub total_questions: u32,
    pub score: i64,
}

/// Final aggregated outcome of a whole simulation, one SubtestResult per
/// subtest in sequence order. Overwritten wholesale on retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub simulation_id: i64,
    pub subtest_results: Vec<SubtestResult>,
    pub final_score: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
