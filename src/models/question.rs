// src/models/question.rs

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::answer::AnswerOption;

/// A question row as the store returns it, before structural validation.
/// Options are keyed by raw letter so a defective row can be represented.
#[derive(Debug, Clone)]
pub struct StoredQuestion {
    pub question: String,
    pub options: BTreeMap<String, String>,
}

/// A structurally valid question: non-empty text and all five options.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub question: String,
    pub options: BTreeMap<AnswerOption, String>,
}

/// Why a stored question failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDefect(pub String);

impl TryFrom<StoredQuestion> for Question {
    type Error = QuestionDefect;

    fn try_from(raw: StoredQuestion) -> Result<Self, Self::Error> {
        if raw.question.trim().is_empty() {
            return Err(QuestionDefect("question text is missing".to_string()));
        }

        let mut options = BTreeMap::new();
        for letter in AnswerOption::ALL {
            match raw.options.get(letter.as_str()) {
                Some(text) if !text.trim().is_empty() => {
                    options.insert(letter, text.clone());
                }
                _ => {
                    return Err(QuestionDefect(format!("option {} is missing", letter)));
                }
            }
        }

        Ok(Question {
            question: raw.question,
            options,
        })
    }
}
