//! Answer grading.

use crate::{config::AnswerMatching, dao::models::AnswerStatus};

/// Grade `submitted` against the accepted answers of a question.
///
/// Both sides are trimmed; `matching` decides whether case matters. A question without accepted
/// answers can never be answered correctly.
pub fn grade(matching: AnswerMatching, submitted: &str, accepted: &[String]) -> AnswerStatus {
    let submitted = submitted.trim();
    let matched = accepted.iter().any(|candidate| {
        let candidate = candidate.trim();
        match matching {
            AnswerMatching::Exact => candidate == submitted,
            AnswerMatching::CaseInsensitive => candidate.to_lowercase() == submitted.to_lowercase(),
        }
    });

    if matched {
        AnswerStatus::Correct
    } else {
        AnswerStatus::Incorrect
    }
}
