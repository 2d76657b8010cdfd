//! Shared bank fixture for the store integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use practica_core::catalog::Bank;
use practica_core::model::{
    AnswerOption, Article, ArticleRef, ArticleSelection, Block, ExamPart, Law, OfficialExam,
    Position, Question, ReviewStatus, Topic, TopicScope,
};

pub fn law(id: &str, articles: usize) -> Law {
    Law {
        id: id.into(),
        title: format!("Ley {id}"),
        articles: (1..=articles)
            .map(|n| Article {
                number: n.to_string(),
                title: String::new(),
            })
            .collect(),
    }
}

pub fn question(id: &str, law: &str, article: &str) -> Question {
    Question {
        id: id.into(),
        article: Some(ArticleRef::new(law, article)),
        text: format!("Enunciado {id}"),
        options: ["uno".into(), "dos".into(), "tres".into(), "cuatro".into()],
        correct: AnswerOption::A,
        explanation: format!("Explicación {id}"),
        active: true,
        review_status: ReviewStatus::Perfect,
    }
}

/// Position `aux`: topic `t1` (0.6) covers CE arts. 1-10, topic `t2` (0.4)
/// covers the whole LPAC. CE has 12 questions (10 in scope), LPAC has 8.
/// Exam `2019-aux` has parts `first` (3 questions) and `second` (2).
pub fn bank() -> Bank {
    let topics = vec![
        Topic {
            id: "t1".into(),
            name: "Constitución".into(),
            weight: 0.6,
            scopes: vec![TopicScope {
                law: "CE".into(),
                articles: ArticleSelection::Numbers((1..=10).map(|n| n.to_string()).collect()),
            }],
        },
        Topic {
            id: "t2".into(),
            name: "Procedimiento".into(),
            weight: 0.4,
            scopes: vec![TopicScope {
                law: "LPAC".into(),
                articles: ArticleSelection::WholeLaw,
            }],
        },
    ];
    let position = Position {
        id: "aux".into(),
        name: "Auxiliar Administrativo".into(),
        blocks: vec![Block {
            id: "b1".into(),
            name: "Bloque I".into(),
            weight: None,
            topics,
        }],
    };

    let mut questions: Vec<Question> = (1..=12)
        .map(|n| question(&format!("ce-{n}"), "CE", &n.to_string()))
        .collect();
    questions.extend((1..=8).map(|n| question(&format!("lpac-{n}"), "LPAC", &n.to_string())));

    let exam = OfficialExam {
        id: "2019-aux".into(),
        position_id: "aux".into(),
        date: NaiveDate::from_ymd_opt(2019, 6, 15).unwrap(),
        title: "Auxiliar 2019".into(),
        parts: vec![
            ExamPart {
                name: "first".into(),
                question_ids: vec!["ce-3".into(), "ce-1".into(), "lpac-2".into()],
            },
            ExamPart {
                name: "second".into(),
                question_ids: vec!["lpac-5".into(), "ce-7".into()],
            },
        ],
    };

    Bank {
        laws: vec![law("CE", 20), law("LPAC", 10)],
        positions: vec![position],
        questions,
        exams: vec![exam],
    }
}
