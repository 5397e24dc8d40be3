// src/models/answer.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::subtest::Subtest;

/// One of the five selectable options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
    E,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 5] = [
        AnswerOption::A,
        AnswerOption::B,
        AnswerOption::C,
        AnswerOption::D,
        AnswerOption::E,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
            AnswerOption::E => "E",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerOption {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(AnswerOption::A),
            "B" => Ok(AnswerOption::B),
            "C" => Ok(AnswerOption::C),
            "D" => Ok(AnswerOption::D),
            "E" => Ok(AnswerOption::E),
            _ => Err(()),
        }
    }
}

/// Where a question (and its answer records) lives: untimed practice by
/// category, or one subtest of a numbered simulation. The four exercise
/// categories are the same four subtests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Exercise { category: Subtest },
    Simulation { simulation_id: i64, subtest: Subtest },
}

impl Scope {
    pub fn subtest(&self) -> Subtest {
        match *self {
            Scope::Exercise { category } => category,
            Scope::Simulation { subtest, .. } => subtest,
        }
    }

    /// `None` for exercise scopes.
    pub fn simulation_id(&self) -> Option<i64> {
        match *self {
            Scope::Exercise { .. } => None,
            Scope::Simulation { simulation_id, .. } => Some(simulation_id),
        }
    }
}

/// Unique key of one answer slot: one user, one scope, one question index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub user_email: String,
    pub scope: Scope,
    pub question_index: u32,
}

/// A recorded selection for one answer slot. Last write wins; there is no
/// history. `is_correct` is resolved at write time against the canonical
/// answer, with a missing canonical answer counting as incorrect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: u32,
    pub selected_option: AnswerOption,
    pub is_correct: bool,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
