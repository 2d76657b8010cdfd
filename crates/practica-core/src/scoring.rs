//! Scoring engine.
//!
//! A session's score is two stored numbers: the raw count of correct answers
//! and the rounded percentage. Unanswered questions are wrong and stay in the
//! denominator.

use std::collections::HashMap;

use crate::model::{AnswerOption, Question, Score, SessionQuestion};

/// `round(correct / total * 100)`, half rounding up. Zero when `total` is zero.
pub fn percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    ((200 * correct + total) / (2 * total)) as u8
}

impl Score {
    /// Build a score from a raw count. The percentage is computed here and
    /// stored alongside; it is never the input.
    pub fn from_counts(correct_count: u32, total: u32) -> Self {
        Self {
            correct_count,
            total,
            percentage: percentage(correct_count, total),
        }
    }
}

/// Whether a recorded answer matches the question's correct option.
pub fn is_correct(answer: Option<AnswerOption>, question: &Question) -> bool {
    answer == Some(question.correct)
}

/// Grade every session question against its question's correct option.
///
/// Returns the per-ordinal correctness and the session score. A session
/// question whose question can no longer be found is graded as incorrect.
pub fn grade(
    session_questions: &[SessionQuestion],
    questions: &HashMap<String, Question>,
) -> (Vec<(u32, bool)>, Score) {
    let graded: Vec<(u32, bool)> = session_questions
        .iter()
        .map(|sq| {
            let correct = questions
                .get(&sq.question_id)
                .is_some_and(|q| is_correct(sq.answer, q));
            (sq.ordinal, correct)
        })
        .collect();
    let correct_count = graded.iter().filter(|(_, c)| *c).count() as u32;
    let score = Score::from_counts(correct_count, session_questions.len() as u32);
    (graded, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::question;
    use uuid::Uuid;

    fn sq(ordinal: u32, question_id: &str, answer: Option<AnswerOption>) -> SessionQuestion {
        SessionQuestion {
            session_id: Uuid::nil(),
            ordinal,
            question_id: question_id.into(),
            topic_id: None,
            part: None,
            answer,
            is_correct: None,
            answered_at: None,
        }
    }

    #[test]
    fn percentage_rounding() {
        assert_eq!(percentage(8, 10), 80);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage(0, 7), 0);
        assert_eq!(percentage(7, 7), 100);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn count_and_percentage_are_independent_fields() {
        // 45 of 60: a raw count of 45 must not read as 45%.
        let score = Score::from_counts(45, 60);
        assert_eq!(score.correct_count, 45);
        assert_eq!(score.percentage, 75);
    }

    #[test]
    fn scenario_e_eight_of_ten() {
        let questions: HashMap<String, Question> = (1..=10)
            .map(|i| {
                let q = question(&format!("q{i}"), "CE", "1");
                (q.id.clone(), q)
            })
            .collect();
        let sqs: Vec<SessionQuestion> = (1..=10)
            .map(|i| {
                let answer = if i <= 8 {
                    Some(AnswerOption::A)
                } else {
                    Some(AnswerOption::B)
                };
                sq(i, &format!("q{i}"), answer)
            })
            .collect();
        let (graded, score) = grade(&sqs, &questions);
        assert_eq!(score.correct_count, 8);
        assert_eq!(score.total, 10);
        assert_eq!(score.percentage, 80);
        assert_eq!(graded.iter().filter(|(_, c)| *c).count(), 8);
    }

    #[test]
    fn unanswered_counts_as_incorrect() {
        let q = question("q1", "CE", "1");
        let questions = HashMap::from([(q.id.clone(), q)]);
        let sqs = vec![sq(1, "q1", Some(AnswerOption::A)), sq(2, "q1", None)];
        let (graded, score) = grade(&sqs, &questions);
        assert_eq!(graded, vec![(1, true), (2, false)]);
        assert_eq!(score.total, 2);
        assert_eq!(score.percentage, 50);
    }

    #[test]
    fn missing_question_is_graded_wrong() {
        let sqs = vec![sq(1, "gone", Some(AnswerOption::A))];
        let (_, score) = grade(&sqs, &HashMap::new());
        assert_eq!(score.correct_count, 0);
        assert_eq!(score.total, 1);
    }
}
