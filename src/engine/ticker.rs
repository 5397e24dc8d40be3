// src/engine/ticker.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::timer::{AnchorKey, AnchorStore, Clock};

/// The repeating one-second tick loop for one active subtest countdown.
///
/// Each tick recomputes remaining time from the anchor instead of
/// decrementing a counter, so drift from a suspended task or slow ticks
/// self-corrects. When remaining hits zero the loop sends the expiry key
/// exactly once and stops. Cancelling a ticker does NOT clear the anchor:
/// the countdown keeps running against wall-clock time.
pub struct Ticker {
    key: AnchorKey,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(
        anchors: Arc<AnchorStore>,
        clock: Arc<dyn Clock>,
        key: AnchorKey,
        time_limit_secs: i64,
        period: Duration,
        expiry_tx: mpsc::Sender<AnchorKey>,
    ) -> Ticker {
        let tick_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let remaining = anchors.remaining(&tick_key, time_limit_secs, clock.now());
                if remaining <= 0 {
                    // Fires once; breaking out of the loop is the expiry guard.
                    let _ = expiry_tx.send(tick_key).await;
                    break;
                }
            }
        });
        Ticker { key, handle }
    }

    pub fn key(&self) -> &AnchorKey {
        &self.key
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::subtest::Subtest;
    use crate::engine::timer::ManualClock;
    use chrono::Utc;

    fn key() -> AnchorKey {
        AnchorKey {
            user_email: "siti@example.com".to_string(),
            simulation_id: 1,
            subtest: Subtest::Eng,
        }
    }

    #[tokio::test]
    async fn fires_expiry_exactly_once_then_stops() {
        let clock = Arc::new(ManualClock::at(Utc::now()));
        let anchors = Arc::new(AnchorStore::new());
        anchors.get_or_start(&key(), clock.now());
        clock.advance_secs(1800);

        let (tx, mut rx) = mpsc::channel(4);
        let _ticker = Ticker::spawn(
            anchors.clone(),
            clock.clone(),
            key(),
            1800,
            Duration::from_millis(5),
            tx,
        );

        let fired = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("expiry should fire")
            .expect("channel open");
        assert_eq!(fired, key());

        // The loop stopped after firing; no second event arrives.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ticks_without_expiry_while_time_remains() {
        let clock = Arc::new(ManualClock::at(Utc::now()));
        let anchors = Arc::new(AnchorStore::new());
        anchors.get_or_start(&key(), clock.now());

        let (tx, mut rx) = mpsc::channel(4);
        let ticker = Ticker::spawn(
            anchors.clone(),
            clock.clone(),
            key(),
            1800,
            Duration::from_millis(5),
            tx,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        // Cancelling the loop leaves the anchor in place.
        ticker.cancel();
        assert!(anchors.has_anchor(&key()));
    }
}
