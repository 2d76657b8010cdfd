//! TOML question bank parser.
//!
//! Loads laws, positions, questions and official exams from TOML files and
//! directories, and validates the merged bank.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::catalog::Bank;
use crate::model::{
    AnswerOption, Article, ArticleRef, ArticleSelection, Block, ExamPart, Law, OfficialExam,
    Position, Question, ReviewStatus, Topic, TopicScope, WHOLE_LAW_ARTICLE,
};

/// Intermediate TOML structure for one bank file. Every section is optional
/// so content can be split across files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    #[serde(default)]
    laws: Vec<TomlLaw>,
    #[serde(default)]
    positions: Vec<TomlPosition>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    exams: Vec<TomlExam>,
}

#[derive(Debug, Deserialize)]
struct TomlLaw {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    articles: Vec<TomlArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlArticle {
    Number(String),
    Full {
        number: String,
        #[serde(default)]
        title: String,
    },
}

#[derive(Debug, Deserialize)]
struct TomlPosition {
    id: String,
    name: String,
    #[serde(default)]
    blocks: Vec<TomlBlock>,
}

#[derive(Debug, Deserialize)]
struct TomlBlock {
    id: String,
    name: String,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    topics: Vec<TomlTopic>,
}

#[derive(Debug, Deserialize)]
struct TomlTopic {
    id: String,
    name: String,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    scopes: Vec<TomlScope>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct TomlScope {
    law: String,
    /// Empty, absent, or containing `"0"` means the whole law.
    #[serde(default)]
    articles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(default)]
    law: Option<String>,
    #[serde(default)]
    article: Option<String>,
    text: String,
    options: Vec<String>,
    correct: String,
    #[serde(default)]
    explanation: String,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default = "default_review_status")]
    review_status: String,
}

fn default_true() -> bool {
    true
}

fn default_review_status() -> String {
    "pending".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlExam {
    id: String,
    position: String,
    /// ISO date, e.g. "2019-06-15".
    date: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    parts: Vec<TomlExamPart>,
}

#[derive(Debug, Deserialize)]
struct TomlExamPart {
    name: String,
    #[serde(default)]
    questions: Vec<String>,
}

/// Parse a single TOML bank file.
pub fn parse_bank_file(path: &Path) -> Result<Bank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bank file: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `Bank` (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<Bank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let laws = parsed
        .laws
        .into_iter()
        .map(|l| Law {
            id: l.id,
            title: l.title,
            articles: l
                .articles
                .into_iter()
                .map(|a| match a {
                    TomlArticle::Number(number) => Article {
                        number,
                        title: String::new(),
                    },
                    TomlArticle::Full { number, title } => Article { number, title },
                })
                .collect(),
        })
        .collect();

    let positions = parsed
        .positions
        .into_iter()
        .map(|p| Position {
            id: p.id,
            name: p.name,
            blocks: p
                .blocks
                .into_iter()
                .map(|b| Block {
                    id: b.id,
                    name: b.name,
                    weight: b.weight,
                    topics: b
                        .topics
                        .into_iter()
                        .map(|t| Topic {
                            id: t.id,
                            name: t.name,
                            weight: t.weight,
                            scopes: t
                                .scopes
                                .into_iter()
                                .map(|s| TopicScope {
                                    law: s.law,
                                    articles: ArticleSelection::from_numbers(s.articles),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            let options: [String; 4] = q.options.try_into().map_err(|opts: Vec<String>| {
                anyhow::anyhow!("question {}: expected 4 options, got {}", q.id, opts.len())
            })?;
            let correct: AnswerOption = q
                .correct
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;
            let review_status: ReviewStatus = q
                .review_status
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", q.id, e))?;
            let article = match (q.law, q.article) {
                (Some(law), Some(number)) => Some(ArticleRef::new(law, number)),
                (Some(law), None) => Some(ArticleRef::new(law, WHOLE_LAW_ARTICLE)),
                (None, Some(_)) => {
                    anyhow::bail!("question {}: article given without a law", q.id)
                }
                (None, None) => None,
            };
            Ok(Question {
                id: q.id,
                article,
                text: q.text,
                options,
                correct,
                explanation: q.explanation,
                active: q.active,
                review_status,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let exams = parsed
        .exams
        .into_iter()
        .map(|e| {
            let date = NaiveDate::parse_from_str(&e.date, "%Y-%m-%d")
                .with_context(|| format!("exam {}: invalid date '{}'", e.id, e.date))?;
            Ok(OfficialExam {
                id: e.id,
                position_id: e.position,
                date,
                title: e.title,
                parts: e
                    .parts
                    .into_iter()
                    .map(|p| ExamPart {
                        name: p.name,
                        question_ids: p.questions,
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Bank {
        laws,
        positions,
        questions,
        exams,
    })
}

/// Recursively load and merge all `.toml` bank files under a directory.
///
/// Files are visited in name order so the merged bank is reproducible.
pub fn load_bank_directory(dir: &Path) -> Result<Bank> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    let mut bank = Bank::default();
    for path in paths {
        if path.is_dir() {
            bank.merge(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            bank.merge(parse_bank_file(&path)?);
        }
    }

    Ok(bank)
}

/// Load a bank from a single file or a directory of files.
pub fn load_bank(path: &Path) -> Result<Bank> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        parse_bank_file(path)
    }
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// What the warning is about, e.g. `question q12` or `topic t3`.
    pub subject: String,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

fn duplicates<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    ids.filter(|id| !seen.insert(*id)).collect()
}

/// Validate a bank for common issues.
pub fn validate_bank(bank: &Bank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for id in duplicates(bank.laws.iter().map(|l| l.id.as_str())) {
        warnings.push(ValidationWarning::new(format!("law {id}"), "duplicate law id"));
    }
    for id in duplicates(bank.positions.iter().map(|p| p.id.as_str())) {
        warnings.push(ValidationWarning::new(
            format!("position {id}"),
            "duplicate position id",
        ));
    }
    for id in duplicates(bank.questions.iter().map(|q| q.id.as_str())) {
        warnings.push(ValidationWarning::new(
            format!("question {id}"),
            "duplicate question id",
        ));
    }
    for id in duplicates(bank.exams.iter().map(|e| e.id.as_str())) {
        warnings.push(ValidationWarning::new(format!("exam {id}"), "duplicate exam id"));
    }

    let laws: HashMap<&str, &Law> = bank.laws.iter().map(|l| (l.id.as_str(), l)).collect();

    // Curriculum
    for position in &bank.positions {
        let weighted = position.blocks.iter().filter(|b| b.weight.is_some()).count();
        if weighted != 0 && weighted != position.blocks.len() {
            warnings.push(ValidationWarning::new(
                format!("position {}", position.id),
                "some blocks declare a weight and others do not",
            ));
        }
        for block in &position.blocks {
            if block.weight.is_some_and(|w| w <= 0.0) {
                warnings.push(ValidationWarning::new(
                    format!("block {}", block.id),
                    "block weight must be positive",
                ));
            }
        }
        for id in duplicates(position.topics().map(|(_, t)| t.id.as_str())) {
            warnings.push(ValidationWarning::new(
                format!("topic {id}"),
                format!("duplicate topic id in position {}", position.id),
            ));
        }
        for (_, topic) in position.topics() {
            let subject = format!("topic {}", topic.id);
            if topic.weight <= 0.0 {
                warnings.push(ValidationWarning::new(&subject, "weight must be positive"));
            }
            if topic.scopes.is_empty() {
                warnings.push(ValidationWarning::new(&subject, "no scope entries"));
            }
            for scope in &topic.scopes {
                let Some(law) = laws.get(scope.law.as_str()) else {
                    warnings.push(ValidationWarning::new(
                        &subject,
                        format!("unknown law '{}'", scope.law),
                    ));
                    continue;
                };
                if let ArticleSelection::Numbers(numbers) = &scope.articles {
                    for number in numbers.iter().filter(|n| !law.has_article(n)) {
                        warnings.push(ValidationWarning::new(
                            &subject,
                            format!("{} art. {} does not exist", law.id, number),
                        ));
                    }
                }
            }
        }
    }

    // Questions
    for question in &bank.questions {
        let subject = format!("question {}", question.id);
        match &question.article {
            None => warnings.push(ValidationWarning::new(
                &subject,
                "no article; the question is never selected",
            )),
            Some(article) => match laws.get(article.law.as_str()) {
                None => warnings.push(ValidationWarning::new(
                    &subject,
                    format!("unknown law '{}'", article.law),
                )),
                Some(law) if !article.is_whole_law() && !law.has_article(&article.number) => {
                    warnings.push(ValidationWarning::new(
                        &subject,
                        format!("{article} does not exist"),
                    ))
                }
                Some(_) => {}
            },
        }
        if question.text.trim().is_empty() {
            warnings.push(ValidationWarning::new(&subject, "text is empty"));
        }
        if question.options.iter().any(|o| o.trim().is_empty()) {
            warnings.push(ValidationWarning::new(&subject, "an answer option is empty"));
        }
    }

    // Official exams
    let question_ids: HashSet<&str> = bank.questions.iter().map(|q| q.id.as_str()).collect();
    for exam in &bank.exams {
        let subject = format!("exam {}", exam.id);
        if bank.position(&exam.position_id).is_none() {
            warnings.push(ValidationWarning::new(
                &subject,
                format!("unknown position '{}'", exam.position_id),
            ));
        }
        if exam.parts.iter().all(|p| p.question_ids.is_empty()) {
            warnings.push(ValidationWarning::new(&subject, "no questions"));
        }
        for id in duplicates(exam.parts.iter().flat_map(|p| p.question_ids.iter().map(String::as_str))) {
            warnings.push(ValidationWarning::new(
                &subject,
                format!("question '{id}' listed more than once"),
            ));
        }
        for part in &exam.parts {
            for id in part
                .question_ids
                .iter()
                .filter(|id| !question_ids.contains(id.as_str()))
            {
                warnings.push(ValidationWarning::new(
                    &subject,
                    format!("part '{}' references unknown question '{id}'", part.name),
                ));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[[laws]]
id = "CE"
title = "Constitución Española"
articles = ["1", "2", { number = "14", title = "Igualdad" }]

[[positions]]
id = "aux"
name = "Auxiliar Administrativo"

[[positions.blocks]]
id = "b1"
name = "Organización pública"

[[positions.blocks.topics]]
id = "t1"
name = "La Constitución"
weight = 2.0
scopes = [{ law = "CE", articles = ["1", "14"] }]

[[positions.blocks.topics]]
id = "t2"
name = "Constitución completa"
scopes = [{ law = "CE" }]

[[questions]]
id = "q1"
law = "CE"
article = "14"
text = "¿Qué artículo consagra la igualdad?"
options = ["14", "15", "16", "17"]
correct = "a"
review_status = "perfect"

[[exams]]
id = "2019-aux"
position = "aux"
date = "2019-06-15"

[[exams.parts]]
name = "first"
questions = ["q1"]
"#;

    #[test]
    fn parse_valid_toml() {
        let bank = parse_bank_str(VALID_TOML, &PathBuf::from("bank.toml")).unwrap();
        assert_eq!(bank.laws.len(), 1);
        assert_eq!(bank.laws[0].articles.len(), 3);
        assert_eq!(bank.laws[0].articles[2].title, "Igualdad");

        let position = &bank.positions[0];
        let t1 = position.topic("t1").unwrap();
        assert_eq!(t1.weight, 2.0);
        assert_eq!(
            t1.scopes[0].articles,
            ArticleSelection::Numbers(vec!["1".into(), "14".into()])
        );
        let t2 = position.topic("t2").unwrap();
        assert_eq!(t2.weight, 1.0);
        assert_eq!(t2.scopes[0].articles, ArticleSelection::WholeLaw);

        let q = &bank.questions[0];
        assert_eq!(q.correct, AnswerOption::A);
        assert!(q.active);
        assert!(q.is_eligible());

        assert_eq!(bank.exams[0].date, NaiveDate::from_ymd_opt(2019, 6, 15).unwrap());
        assert_eq!(bank.exams[0].parts[0].question_ids, vec!["q1"]);
        assert!(validate_bank(&bank).is_empty());
    }

    #[test]
    fn question_defaults_and_whole_law_binding() {
        let toml = r#"
[[questions]]
id = "q9"
law = "CE"
text = "Pregunta general"
options = ["a", "b", "c", "d"]
correct = "D"
"#;
        let bank = parse_bank_str(toml, &PathBuf::from("q.toml")).unwrap();
        let q = &bank.questions[0];
        assert_eq!(q.review_status, ReviewStatus::Pending);
        assert!(q.article.as_ref().unwrap().is_whole_law());
        assert_eq!(q.correct, AnswerOption::D);
        assert!(!q.is_eligible());
    }

    #[test]
    fn wrong_option_count_is_an_error() {
        let toml = r#"
[[questions]]
id = "q1"
text = "Solo tres"
options = ["a", "b", "c"]
correct = "a"
"#;
        let err = parse_bank_str(toml, &PathBuf::from("q.toml")).unwrap_err();
        assert!(err.to_string().contains("expected 4 options"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_bank_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn validate_reports_catalog_problems() {
        let toml = r#"
[[laws]]
id = "CE"
articles = ["1"]

[[positions]]
id = "aux"
name = "Aux"

[[positions.blocks]]
id = "b1"
name = "B1"
weight = 1.0

[[positions.blocks.topics]]
id = "t1"
name = "T1"
weight = 0.0
scopes = [{ law = "CE", articles = ["99"] }, { law = "LRJSP" }]

[[positions.blocks]]
id = "b2"
name = "B2"

[[questions]]
id = "q1"
text = "Sin artículo"
options = ["a", "b", "c", "d"]
correct = "a"

[[questions]]
id = "q1"
law = "CE"
article = "5"
text = "Duplicada"
options = ["a", "b", "", "d"]
correct = "a"

[[exams]]
id = "e1"
position = "ghost"
date = "2020-01-01"

[[exams.parts]]
name = "only"
questions = ["q1", "q1", "q404"]
"#;
        let bank = parse_bank_str(toml, &PathBuf::from("bad.toml")).unwrap();
        let warnings = validate_bank(&bank);
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));
        assert!(has("duplicate question id"));
        assert!(has("some blocks declare a weight"));
        assert!(has("weight must be positive"));
        assert!(has("CE art. 99 does not exist"));
        assert!(has("unknown law 'LRJSP'"));
        assert!(has("no article"));
        assert!(has("CE art. 5 does not exist"));
        assert!(has("an answer option is empty"));
        assert!(has("unknown position 'ghost'"));
        assert!(has("listed more than once"));
        assert!(has("unknown question 'q404'"));
    }

    #[test]
    fn load_directory_merges_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_bank.toml"), VALID_TOML).unwrap();
        let nested = dir.path().join("extra");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("more.toml"),
            r#"
[[questions]]
id = "q2"
law = "CE"
article = "1"
text = "Otra"
options = ["a", "b", "c", "d"]
correct = "b"
review_status = "tech_perfect"
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let bank = load_bank_directory(dir.path()).unwrap();
        assert_eq!(bank.questions.len(), 2);
        assert_eq!(bank.positions.len(), 1);
        assert!(load_bank(&dir.path().join("a_bank.toml")).is_ok());
    }
}
