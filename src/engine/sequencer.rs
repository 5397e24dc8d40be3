// src/engine/sequencer.rs

use std::collections::HashSet;

use serde::Serialize;

use crate::engine::subtest::Subtest;

/// Position within a running simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SimState {
    InSubtest {
        subtest: Subtest,
        question_index: u32,
    },
    Terminal,
}

/// Outcome of feeding one event into the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved within the same subtest.
    Moved { subtest: Subtest, question_index: u32 },
    /// Crossed into the first question of the next subtest. The previous
    /// subtest's timer anchor must be cleared by the caller.
    EnteredSubtest { from: Subtest, to: Subtest },
    /// Entered Terminal just now; result aggregation is due exactly once.
    Completed { from: Subtest },
    /// Stale or illegal event; state unchanged.
    Noop,
}

/// Explicit state machine over the fixed subtest chain.
///
/// Every event carries the subtest it was issued for; once the machine has
/// left that subtest the event is a no-op. This is what serializes
/// tick-driven expiry against user navigation: whichever runs first wins
/// and the loser does nothing.
#[derive(Debug)]
pub struct Sequencer {
    state: SimState,
    expired: HashSet<Subtest>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: SimState::InSubtest {
                subtest: Subtest::first(),
                question_index: 1,
            },
            expired: HashSet::new(),
        }
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Whether time ran out for the given subtest at some point.
    pub fn has_expired(&self, subtest: Subtest) -> bool {
        self.expired.contains(&subtest)
    }

    fn position(&self, from: Subtest) -> Option<u32> {
        match self.state {
            SimState::InSubtest {
                subtest,
                question_index,
            } if subtest == from => Some(question_index),
            _ => None,
        }
    }

    /// Leave `from` for its successor, or Terminal when there is none.
    fn leave(&mut self, from: Subtest) -> Transition {
        match from.next() {
            Some(next) => {
                self.state = SimState::InSubtest {
                    subtest: next,
                    question_index: 1,
                };
                Transition::EnteredSubtest { from, to: next }
            }
            None => {
                self.state = SimState::Terminal;
                Transition::Completed { from }
            }
        }
    }

    /// User moved forward. On the last question of a subtest this crosses
    /// into the next subtest, or Terminal after the last one. Forbidden
    /// once the subtest has expired (expiry already moved the state on).
    pub fn advance_question(&mut self, from: Subtest) -> Transition {
        let Some(index) = self.position(from) else {
            return Transition::Noop;
        };
        if self.expired.contains(&from) {
            return Transition::Noop;
        }

        if index < from.question_count() {
            let question_index = index + 1;
            self.state = SimState::InSubtest {
                subtest: from,
                question_index,
            };
            Transition::Moved {
                subtest: from,
                question_index,
            }
        } else {
            self.leave(from)
        }
    }

    /// User moved backward. Only legal above question 1 and never after
    /// time has run out for the subtest.
    pub fn retreat_question(&mut self, from: Subtest) -> Transition {
        let Some(index) = self.position(from) else {
            return Transition::Noop;
        };
        if self.expired.contains(&from) || index <= 1 {
            return Transition::Noop;
        }

        let question_index = index - 1;
        self.state = SimState::InSubtest {
            subtest: from,
            question_index,
        };
        Transition::Moved {
            subtest: from,
            question_index,
        }
    }

    /// Time ran out for `from`. Marks the subtest expired and moves on to
    /// the successor or Terminal. Idempotent: a second expiry for the same
    /// subtest, or an expiry for a subtest already left, is a no-op.
    pub fn expire(&mut self, from: Subtest) -> Transition {
        if self.position(from).is_none() {
            return Transition::Noop;
        }
        self.expired.insert(from);
        self.leave(from)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(subtest: Subtest, question_index: u32) -> SimState {
        SimState::InSubtest {
            subtest,
            question_index,
        }
    }

    #[test]
    fn starts_at_first_question_of_tps() {
        let seq = Sequencer::new();
        assert_eq!(seq.state(), state_at(Subtest::Tps, 1));
    }

    #[test]
    fn ninety_advances_cross_from_tps_into_indo() {
        let mut seq = Sequencer::new();
        for _ in 0..90 {
            seq.advance_question(Subtest::Tps);
        }
        assert_eq!(seq.state(), state_at(Subtest::Indo, 1));
    }

    #[test]
    fn advancing_past_last_mat_question_is_terminal() {
        let mut seq = Sequencer::new();
        for subtest in Subtest::SEQUENCE {
            for _ in 0..subtest.question_count() {
                seq.advance_question(subtest);
            }
        }
        assert_eq!(seq.state(), SimState::Terminal);

        // No fifth subtest, and Terminal is absorbing.
        assert_eq!(seq.advance_question(Subtest::Mat), Transition::Noop);
        assert_eq!(seq.state(), SimState::Terminal);
    }

    #[test]
    fn retreat_moves_back_but_not_before_question_one() {
        let mut seq = Sequencer::new();
        seq.advance_question(Subtest::Tps);
        seq.advance_question(Subtest::Tps);
        assert_eq!(
            seq.retreat_question(Subtest::Tps),
            Transition::Moved {
                subtest: Subtest::Tps,
                question_index: 2
            }
        );
        seq.retreat_question(Subtest::Tps);
        assert_eq!(seq.retreat_question(Subtest::Tps), Transition::Noop);
        assert_eq!(seq.state(), state_at(Subtest::Tps, 1));
    }

    #[test]
    fn expiry_moves_to_next_subtest() {
        let mut seq = Sequencer::new();
        assert_eq!(
            seq.expire(Subtest::Tps),
            Transition::EnteredSubtest {
                from: Subtest::Tps,
                to: Subtest::Indo
            }
        );
        assert!(seq.has_expired(Subtest::Tps));
        assert_eq!(seq.state(), state_at(Subtest::Indo, 1));
    }

    #[test]
    fn expiry_on_last_subtest_is_terminal() {
        let mut seq = Sequencer::new();
        seq.expire(Subtest::Tps);
        seq.expire(Subtest::Indo);
        seq.expire(Subtest::Eng);
        assert_eq!(
            seq.expire(Subtest::Mat),
            Transition::Completed { from: Subtest::Mat }
        );
        assert_eq!(seq.state(), SimState::Terminal);
    }

    #[test]
    fn the_second_of_expire_and_advance_is_a_noop() {
        // Expiry first: the queued manual advance must do nothing.
        let mut seq = Sequencer::new();
        seq.expire(Subtest::Tps);
        assert_eq!(seq.advance_question(Subtest::Tps), Transition::Noop);
        assert_eq!(seq.state(), state_at(Subtest::Indo, 1));

        // Manual crossing first: the queued expiry must do nothing.
        let mut seq = Sequencer::new();
        for _ in 0..90 {
            seq.advance_question(Subtest::Tps);
        }
        assert_eq!(seq.state(), state_at(Subtest::Indo, 1));
        assert_eq!(seq.expire(Subtest::Tps), Transition::Noop);
        assert_eq!(seq.state(), state_at(Subtest::Indo, 1));
    }

    #[test]
    fn duplicate_expiry_is_a_noop() {
        let mut seq = Sequencer::new();
        seq.expire(Subtest::Tps);
        assert_eq!(seq.expire(Subtest::Tps), Transition::Noop);
    }

    #[test]
    fn no_retreat_after_expiry() {
        let mut seq = Sequencer::new();
        seq.expire(Subtest::Tps);
        // State is now Indo/1; a stale retreat for Tps does nothing.
        assert_eq!(seq.retreat_question(Subtest::Tps), Transition::Noop);
    }
}
