// src/engine/session.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::engine::sequencer::{Sequencer, SimState, Transition};
use crate::engine::subtest::Subtest;
use crate::engine::ticker::Ticker;
use crate::engine::timer::{AnchorKey, AnchorStore, Clock};
use crate::engine::{aggregator, recorder};
use crate::models::answer::{AnswerOption, Scope, SlotKey};
use crate::models::result::SimulationResult;
use crate::store::{ExamStore, StoreError};

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    /// No session has been opened for this (user, simulation).
    SessionNotFound,
    /// The event targeted a subtest whose time has already run out.
    SubtestExpired,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Store(e) => write!(f, "{}", e),
            EngineError::SessionNotFound => write!(f, "no active session"),
            EngineError::SubtestExpired => write!(f, "time is up for this subtest"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store(err)
    }
}

/// Snapshot of a session for display: position plus remaining seconds of
/// the active subtest (absent once Terminal).
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub state: SimState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
}

/// Outcome of a navigation event.
#[derive(Debug, Serialize)]
pub struct NavOutcome {
    #[serde(flatten)]
    pub view: SessionView,
    /// False when a pending answer could not be persisted; the navigation
    /// still went through and the local selection stays as-is.
    pub answer_persisted: bool,
    /// Present only when this event completed the simulation and the
    /// aggregation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SimulationResult>,
}

/// Timer-side view of entering a question page.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionEntry {
    pub remaining_seconds: i64,
    /// True when the subtest had already expired by the time of entry; the
    /// expiry transition has been applied.
    pub time_up: bool,
    #[serde(flatten)]
    pub state: SimState,
}

/// An option the user selected but which has not been recorded yet.
/// Recorded on the next navigation event or on expiry.
#[derive(Debug, Clone, Copy)]
struct Pending {
    subtest: Subtest,
    question_index: u32,
    option: AnswerOption,
}

struct SimulationSession {
    user_email: String,
    simulation_id: i64,
    sequencer: Sequencer,
    pending: Option<Pending>,
    ticker: Option<Ticker>,
    result: Option<SimulationResult>,
    aggregation_done: bool,
}

impl SimulationSession {
    fn new(user_email: String, simulation_id: i64) -> Self {
        Self {
            user_email,
            simulation_id,
            sequencer: Sequencer::new(),
            pending: None,
            ticker: None,
            result: None,
            aggregation_done: false,
        }
    }

    fn anchor_key(&self, subtest: Subtest) -> AnchorKey {
        AnchorKey {
            user_email: self.user_email.clone(),
            simulation_id: self.simulation_id,
            subtest,
        }
    }

    fn slot_key(&self, subtest: Subtest, question_index: u32) -> SlotKey {
        SlotKey {
            user_email: self.user_email.clone(),
            scope: Scope::Simulation {
                simulation_id: self.simulation_id,
                subtest,
            },
            question_index,
        }
    }
}

/// Drives every running simulation of this process.
///
/// Owns the anchor store, the clock and the store handle; per-(user,
/// simulation) sessions live behind a tokio Mutex each, so tick-driven
/// expiry and user navigation for one session are serialized: whichever
/// acquires the lock first wins and the loser's transition no-ops inside
/// the sequencer.
pub struct SimulationEngine {
    store: Arc<dyn ExamStore>,
    anchors: Arc<AnchorStore>,
    clock: Arc<dyn Clock>,
    tick_period: Duration,
    expiry_tx: mpsc::Sender<AnchorKey>,
    sessions: StdMutex<HashMap<(String, i64), Arc<Mutex<SimulationSession>>>>,
}

impl SimulationEngine {
    pub fn new(store: Arc<dyn ExamStore>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_tick_period(store, clock, Duration::from_secs(1))
    }

    /// `tick_period` is how often tickers re-read the anchor; production
    /// uses one second.
    pub fn with_tick_period(
        store: Arc<dyn ExamStore>,
        clock: Arc<dyn Clock>,
        tick_period: Duration,
    ) -> Arc<Self> {
        let (expiry_tx, mut expiry_rx) = mpsc::channel::<AnchorKey>(32);

        let engine = Arc::new(Self {
            store,
            anchors: Arc::new(AnchorStore::new()),
            clock,
            tick_period,
            expiry_tx,
            sessions: StdMutex::new(HashMap::new()),
        });

        // Expiry dispatcher: ticker events funnel through one queue, which
        // keeps them ordered against each other.
        let weak = Arc::downgrade(&engine);
        tokio::spawn(async move {
            while let Some(key) = expiry_rx.recv().await {
                let Some(engine) = weak.upgrade() else { break };
                engine.handle_expiry(&key).await;
            }
        });

        engine
    }

    pub fn anchors(&self) -> Arc<AnchorStore> {
        self.anchors.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn open_handle(&self, user_email: &str, simulation_id: i64) -> Arc<Mutex<SimulationSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .entry((user_email.to_string(), simulation_id))
            .or_insert_with(|| {
                Arc::new(Mutex::new(SimulationSession::new(
                    user_email.to_string(),
                    simulation_id,
                )))
            })
            .clone()
    }

    fn find_handle(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Option<Arc<Mutex<SimulationSession>>> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(&(user_email.to_string(), simulation_id)).cloned()
    }

    fn view_of(&self, session: &SimulationSession) -> SessionView {
        let state = session.sequencer.state();
        let remaining_seconds = match state {
            SimState::InSubtest { subtest, .. } => Some(self.anchors.remaining(
                &session.anchor_key(subtest),
                subtest.time_limit_secs(),
                self.clock.now(),
            )),
            SimState::Terminal => None,
        };
        SessionView {
            state,
            remaining_seconds,
        }
    }

    /// Starts a new session at the first question of the first subtest, or
    /// returns the existing one unchanged (resume).
    pub async fn open_session(&self, user_email: &str, simulation_id: i64) -> SessionView {
        let handle = self.open_handle(user_email, simulation_id);
        let session = handle.lock().await;
        self.view_of(&session)
    }

    /// Starts the simulation over: clears every anchor, stops the tick
    /// loop and replaces the session with a fresh one at the first
    /// question. The next completion re-aggregates and overwrites the
    /// previously stored result.
    pub async fn restart_session(&self, user_email: &str, simulation_id: i64) -> SessionView {
        let handle = self.open_handle(user_email, simulation_id);
        let mut session = handle.lock().await;
        for subtest in Subtest::SEQUENCE {
            self.anchors.clear(&session.anchor_key(subtest));
        }
        if let Some(ticker) = session.ticker.take() {
            ticker.cancel();
        }
        *session = SimulationSession::new(user_email.to_string(), simulation_id);
        self.view_of(&session)
    }

    /// Logout: records a still-pending answer best-effort, clears every
    /// anchor, stops the tick loop and drops the in-memory session.
    /// Recorded answers and persisted results are unaffected.
    pub async fn close_session(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Result<(), EngineError> {
        let handle = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.remove(&(user_email.to_string(), simulation_id))
        }
        .ok_or(EngineError::SessionNotFound)?;
        let mut session = handle.lock().await;

        if let Some(pending) = session.pending {
            self.record_pending(&mut session, pending.subtest).await;
        }
        for subtest in Subtest::SEQUENCE {
            self.anchors.clear(&session.anchor_key(subtest));
        }
        if let Some(ticker) = session.ticker.take() {
            ticker.cancel();
        }
        Ok(())
    }

    pub async fn session_view(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Result<SessionView, EngineError> {
        let handle = self
            .find_handle(user_email, simulation_id)
            .ok_or(EngineError::SessionNotFound)?;
        let session = handle.lock().await;
        Ok(self.view_of(&session))
    }

    /// Timer side of showing a question page: anchors the countdown on
    /// first entry (idempotent across reloads), makes sure a tick loop is
    /// running, and applies the expiry transition immediately when the
    /// remaining time has already hit zero while the user was away.
    ///
    /// Only the subtest currently in progress is ever anchored or ticked.
    /// Any other subtest is served read-only: completed ones report zero
    /// remaining, future ones their full limit, and the live countdown is
    /// left untouched.
    pub async fn enter_subtest(
        &self,
        user_email: &str,
        simulation_id: i64,
        subtest: Subtest,
    ) -> Result<QuestionEntry, EngineError> {
        let handle = self
            .find_handle(user_email, simulation_id)
            .ok_or(EngineError::SessionNotFound)?;
        let mut session = handle.lock().await;

        if session.sequencer.has_expired(subtest) {
            return Ok(QuestionEntry {
                remaining_seconds: 0,
                time_up: true,
                state: session.sequencer.state(),
            });
        }

        let state = session.sequencer.state();
        let active = match state {
            SimState::InSubtest { subtest: current, .. } => current == subtest,
            SimState::Terminal => false,
        };
        if !active {
            let completed = match state {
                SimState::InSubtest { subtest: current, .. } => subtest < current,
                SimState::Terminal => true,
            };
            let remaining = if completed { 0 } else { subtest.time_limit_secs() };
            return Ok(QuestionEntry {
                remaining_seconds: remaining,
                time_up: false,
                state,
            });
        }

        let key = session.anchor_key(subtest);
        let now = self.clock.now();
        self.anchors.get_or_start(&key, now);
        let remaining = self
            .anchors
            .remaining(&key, subtest.time_limit_secs(), now);

        if remaining <= 0 {
            self.expire_locked(&mut session, subtest).await;
            return Ok(QuestionEntry {
                remaining_seconds: 0,
                time_up: true,
                state: session.sequencer.state(),
            });
        }

        self.ensure_ticker(&mut session, subtest);
        Ok(QuestionEntry {
            remaining_seconds: remaining,
            time_up: false,
            state: session.sequencer.state(),
        })
    }

    /// Marks an option as the user's current choice for the question the
    /// session is on. Not persisted yet; recording happens on the next
    /// navigation event or on expiry.
    pub async fn select(
        &self,
        user_email: &str,
        simulation_id: i64,
        subtest: Subtest,
        option: AnswerOption,
    ) -> Result<(), EngineError> {
        let handle = self
            .find_handle(user_email, simulation_id)
            .ok_or(EngineError::SessionNotFound)?;
        let mut session = handle.lock().await;

        if session.sequencer.has_expired(subtest) {
            return Err(EngineError::SubtestExpired);
        }
        let SimState::InSubtest {
            subtest: current,
            question_index,
        } = session.sequencer.state()
        else {
            return Err(EngineError::SubtestExpired);
        };
        if current != subtest {
            // Stale selection for a subtest the session has left.
            return Err(EngineError::SubtestExpired);
        }

        session.pending = Some(Pending {
            subtest,
            question_index,
            option,
        });
        Ok(())
    }

    pub async fn advance(
        &self,
        user_email: &str,
        simulation_id: i64,
        from: Subtest,
    ) -> Result<NavOutcome, EngineError> {
        self.navigate(user_email, simulation_id, from, true).await
    }

    pub async fn retreat(
        &self,
        user_email: &str,
        simulation_id: i64,
        from: Subtest,
    ) -> Result<NavOutcome, EngineError> {
        self.navigate(user_email, simulation_id, from, false).await
    }

    async fn navigate(
        &self,
        user_email: &str,
        simulation_id: i64,
        from: Subtest,
        forward: bool,
    ) -> Result<NavOutcome, EngineError> {
        let handle = self
            .find_handle(user_email, simulation_id)
            .ok_or(EngineError::SessionNotFound)?;
        let mut session = handle.lock().await;

        // The pending answer is awaited before the transition so a slow
        // write is not lost when the user leaves the page. A failed write
        // is logged and reported, never rolled back locally.
        let answer_persisted = self.record_pending(&mut session, from).await;

        let transition = if forward {
            session.sequencer.advance_question(from)
        } else {
            session.sequencer.retreat_question(from)
        };

        let mut result = None;
        match transition {
            Transition::Moved { .. } | Transition::Noop => {}
            Transition::EnteredSubtest { from, .. } => {
                self.leave_subtest(&mut session, from);
            }
            Transition::Completed { from } => {
                self.leave_subtest(&mut session, from);
                result = self.aggregate_once(&mut session).await;
            }
        }

        Ok(NavOutcome {
            view: self.view_of(&session),
            answer_persisted,
            result,
        })
    }

    /// Records the pending answer for `from`, if any. Returns false when a
    /// pending answer existed but could not be persisted; the pending
    /// selection is kept so a later event can retry it.
    async fn record_pending(&self, session: &mut SimulationSession, from: Subtest) -> bool {
        let Some(pending) = session.pending else {
            return true;
        };
        if pending.subtest != from {
            // A stale event for another subtest must not touch the live
            // selection.
            return true;
        }

        let key = session.slot_key(pending.subtest, pending.question_index);
        match recorder::record(self.store.as_ref(), &key, pending.option, self.clock.now()).await {
            Ok(_) => {
                session.pending = None;
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Answer for {} q{} not persisted, keeping local selection: {}",
                    pending.subtest,
                    pending.question_index,
                    e
                );
                false
            }
        }
    }

    /// Clears the timer anchor and stops the tick loop for a subtest the
    /// session is leaving.
    fn leave_subtest(&self, session: &mut SimulationSession, subtest: Subtest) {
        self.anchors.clear(&session.anchor_key(subtest));
        if let Some(ticker) = session.ticker.take() {
            if ticker.key().subtest == subtest {
                ticker.cancel();
            } else {
                session.ticker = Some(ticker);
            }
        }
        if session
            .pending
            .map(|p| p.subtest == subtest)
            .unwrap_or(false)
        {
            session.pending = None;
        }
    }

    fn ensure_ticker(&self, session: &mut SimulationSession, subtest: Subtest) {
        let key = session.anchor_key(subtest);
        if let Some(ticker) = &session.ticker {
            if *ticker.key() == key {
                return;
            }
            ticker.cancel();
        }
        session.ticker = Some(Ticker::spawn(
            self.anchors.clone(),
            self.clock.clone(),
            key,
            subtest.time_limit_secs(),
            self.tick_period,
            self.expiry_tx.clone(),
        ));
    }

    /// Aggregation is latched after the first success, so a completed
    /// simulation is scored at most once. A failure is logged, leaves no
    /// partial result and does not latch, which lets the result path retry
    /// once the store is reachable again.
    async fn aggregate_once(&self, session: &mut SimulationSession) -> Option<SimulationResult> {
        if session.aggregation_done {
            return None;
        }

        match aggregator::aggregate(
            self.store.as_ref(),
            &session.user_email,
            session.simulation_id,
            self.clock.now(),
        )
        .await
        {
            Ok(result) => {
                session.aggregation_done = true;
                session.result = Some(result.clone());
                Some(result)
            }
            Err(e) => {
                tracing::error!(
                    "Aggregation failed for {} simulation {}: {}",
                    session.user_email,
                    session.simulation_id,
                    e
                );
                None
            }
        }
    }

    /// Expiry transition while already holding the session lock: records a
    /// pending answer for the subtest best-effort, clears the anchor, and
    /// moves the state machine on.
    async fn expire_locked(&self, session: &mut SimulationSession, from: Subtest) {
        if !self.record_pending(session, from).await {
            // Best effort on expiry; the selection is dropped with the
            // subtest either way.
            session.pending = None;
        }

        let transition = session.sequencer.expire(from);
        match transition {
            Transition::Noop => {}
            Transition::EnteredSubtest { from, .. } => {
                self.leave_subtest(session, from);
            }
            Transition::Completed { from } => {
                self.leave_subtest(session, from);
                self.aggregate_once(session).await;
            }
            Transition::Moved { .. } => unreachable!("expire never moves within a subtest"),
        }
    }

    /// Entry point for ticker-driven expiry events.
    async fn handle_expiry(&self, key: &AnchorKey) {
        let Some(handle) = self.find_handle(&key.user_email, key.simulation_id) else {
            tracing::warn!("Expiry for unknown session {}/{}", key.user_email, key.simulation_id);
            return;
        };
        let mut session = handle.lock().await;
        tracing::info!(
            "Time is up for {} simulation {} subtest {}",
            key.user_email,
            key.simulation_id,
            key.subtest
        );
        self.expire_locked(&mut session, key.subtest).await;
    }

    /// Fetches the persisted result for this session, if any. Prefers the
    /// in-session copy so the results view needs no read round-trip right
    /// after completion. A Terminal session whose aggregation failed gets
    /// another aggregation attempt here before falling back to the store.
    pub async fn result_of(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Result<Option<SimulationResult>, EngineError> {
        if let Some(handle) = self.find_handle(user_email, simulation_id) {
            let mut session = handle.lock().await;
            if let Some(result) = &session.result {
                return Ok(Some(result.clone()));
            }
            if session.sequencer.state() == SimState::Terminal {
                if let Some(result) = self.aggregate_once(&mut session).await {
                    return Ok(Some(result));
                }
            }
        }
        Ok(self
            .store
            .fetch_simulation_result(user_email, simulation_id)
            .await?)
    }
}
