// src/engine/recorder.rs

use chrono::{DateTime, Utc};

use crate::models::answer::{AnswerOption, AnswerRecord, SlotKey};
use crate::store::{ExamStore, StoreError};

/// Resolves correctness for a selection and overwrites the answer record
/// for the slot.
///
/// Correctness is recomputed against the live canonical answer on every
/// call; a slot with no canonical answer records `is_correct = false`
/// (fail-safe) rather than failing. Safe to call repeatedly for the same
/// key: last write wins, the latest `recorded_at` survives.
///
/// A failed write propagates to the caller, who is expected to keep the
/// local selection visible rather than roll it back.
pub async fn record(
    store: &dyn ExamStore,
    key: &SlotKey,
    selected_option: AnswerOption,
    now: DateTime<Utc>,
) -> Result<AnswerRecord, StoreError> {
    let canonical = store
        .fetch_canonical_answer(&key.scope, key.question_index)
        .await?;
    let is_correct = canonical == Some(selected_option);

    let record = AnswerRecord {
        question_index: key.question_index,
        selected_option,
        is_correct,
        recorded_at: now,
    };

    store.write_answer_record(key, &record).await.map_err(|e| {
        tracing::error!(
            "Failed to persist answer for {} {:?} q{}: {}",
            key.user_email,
            key.scope,
            key.question_index,
            e
        );
        e
    })?;

    Ok(record)
}
