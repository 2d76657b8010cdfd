//! Core data model types for practica.
//!
//! Scope catalog (laws, articles, positions, blocks, topics), the question
//! repository's `Question`, and the session types the engine persists.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Article number used as a whole-law placeholder.
pub const WHOLE_LAW_ARTICLE: &str = "0";

// ---------------------------------------------------------------------------
// Scope catalog
// ---------------------------------------------------------------------------

/// A law, identified by its short name, with its ordered articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Law {
    /// Short name (e.g. "CE", "LPAC").
    pub id: String,
    /// Full title.
    #[serde(default)]
    pub title: String,
    /// Articles in declared order.
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl Law {
    pub fn has_article(&self, number: &str) -> bool {
        self.articles.iter().any(|a| a.number == number)
    }
}

/// One article of a law.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub number: String,
    #[serde(default)]
    pub title: String,
}

/// Reference from a question to its primary article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleRef {
    pub law: String,
    pub number: String,
}

impl ArticleRef {
    pub fn new(law: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            law: law.into(),
            number: number.into(),
        }
    }

    pub fn is_whole_law(&self) -> bool {
        self.number == WHOLE_LAW_ARTICLE
    }
}

impl fmt::Display for ArticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} art. {}", self.law, self.number)
    }
}

/// A curriculum / exam track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Position {
    /// All topics in declared order (block order, then topic order).
    pub fn topics(&self) -> impl Iterator<Item = (&Block, &Topic)> {
        self.blocks
            .iter()
            .flat_map(|b| b.topics.iter().map(move |t| (b, t)))
    }

    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics().map(|(_, t)| t).find(|t| t.id == topic_id)
    }
}

/// Thematic grouping of topics within a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub name: String,
    /// Optional declared weight of the block within its position.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// Smallest curriculum unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    /// Declared weight within the block.
    pub weight: f64,
    #[serde(default)]
    pub scopes: Vec<TopicScope>,
}

/// Binding of a topic to a law and the articles it examines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicScope {
    pub law: String,
    pub articles: ArticleSelection,
}

/// Which articles of a law a scope covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleSelection {
    WholeLaw,
    Numbers(Vec<String>),
}

impl ArticleSelection {
    /// Build a selection from a raw article list. An empty list or one
    /// containing the placeholder `"0"` means the whole law.
    pub fn from_numbers(numbers: Vec<String>) -> Self {
        if numbers.is_empty() || numbers.iter().any(|n| n == WHOLE_LAW_ARTICLE) {
            ArticleSelection::WholeLaw
        } else {
            ArticleSelection::Numbers(numbers)
        }
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// One of the four answer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub const ALL: [AnswerOption; 4] = [
        AnswerOption::A,
        AnswerOption::B,
        AnswerOption::C,
        AnswerOption::D,
    ];

    pub fn index(self) -> usize {
        match self {
            AnswerOption::A => 0,
            AnswerOption::B => 1,
            AnswerOption::C => 2,
            AnswerOption::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerOption::A => write!(f, "a"),
            AnswerOption::B => write!(f, "b"),
            AnswerOption::C => write!(f, "c"),
            AnswerOption::D => write!(f, "d"),
        }
    }
}

impl FromStr for AnswerOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" => Ok(AnswerOption::A),
            "b" => Ok(AnswerOption::B),
            "c" => Ok(AnswerOption::C),
            "d" => Ok(AnswerOption::D),
            other => Err(format!("unknown answer option: {other}")),
        }
    }
}

/// Terminal state written by the external content verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Perfect,
    TechPerfect,
    BadAnswer,
    BadExplanation,
    BadAnswerAndExplanation,
    WrongArticle,
    AllWrong,
}

impl ReviewStatus {
    /// Only approved statuses make a question eligible for selection.
    pub fn is_approved(self) -> bool {
        matches!(self, ReviewStatus::Perfect | ReviewStatus::TechPerfect)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Perfect => "perfect",
            ReviewStatus::TechPerfect => "tech_perfect",
            ReviewStatus::BadAnswer => "bad_answer",
            ReviewStatus::BadExplanation => "bad_explanation",
            ReviewStatus::BadAnswerAndExplanation => "bad_answer_and_explanation",
            ReviewStatus::WrongArticle => "wrong_article",
            ReviewStatus::AllWrong => "all_wrong",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReviewStatus::Pending),
            "perfect" => Ok(ReviewStatus::Perfect),
            "tech_perfect" => Ok(ReviewStatus::TechPerfect),
            "bad_answer" => Ok(ReviewStatus::BadAnswer),
            "bad_explanation" => Ok(ReviewStatus::BadExplanation),
            "bad_answer_and_explanation" => Ok(ReviewStatus::BadAnswerAndExplanation),
            "wrong_article" => Ok(ReviewStatus::WrongArticle),
            "all_wrong" => Ok(ReviewStatus::AllWrong),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Primary article. `None` while the question is still being ingested.
    #[serde(default)]
    pub article: Option<ArticleRef>,
    pub text: String,
    pub options: [String; 4],
    pub correct: AnswerOption,
    #[serde(default)]
    pub explanation: String,
    pub active: bool,
    pub review_status: ReviewStatus,
}

impl Question {
    /// Active, approved, and bound to an article.
    pub fn is_eligible(&self) -> bool {
        self.active && self.review_status.is_approved() && self.article.is_some()
    }
}

// ---------------------------------------------------------------------------
// Official exams
// ---------------------------------------------------------------------------

/// A frozen historical exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialExam {
    pub id: String,
    pub position_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub title: String,
    pub parts: Vec<ExamPart>,
}

/// One part of an official exam, with its questions in recorded order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamPart {
    pub name: String,
    pub question_ids: Vec<String>,
}

/// Which exam (and optionally which part) a replica session reproduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRef {
    pub exam_id: String,
    /// `None` replays every part in recorded order.
    #[serde(default)]
    pub part: Option<String>,
}

impl fmt::Display for ExamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.part {
            Some(part) => write!(f, "{}/{}", self.exam_id, part),
            None => write!(f, "{}", self.exam_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// How a session's question list was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    #[serde(rename = "practice")]
    Practice,
    #[serde(rename = "official-replica")]
    OfficialReplica,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Practice => "practice",
            SessionMode::OfficialReplica => "official-replica",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "practice" => Ok(SessionMode::Practice),
            "official-replica" | "official_replica" | "replica" => {
                Ok(SessionMode::OfficialReplica)
            }
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

/// Lifecycle state as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    InProgress,
    Completed,
    /// In progress, but idle past the staleness window. Never stored.
    Abandoned,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Final result of a completed session.
///
/// `correct_count` and `percentage` are independent fields; neither is ever
/// reconstructed from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct_count: u32,
    pub total: u32,
    pub percentage: u8,
}

/// One attempt at a generated or replicated test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub position_id: String,
    /// Number of questions requested.
    pub target_count: usize,
    pub mode: SessionMode,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub exam: Option<ExamRef>,
    /// Source session when this is a failures-only review.
    #[serde(default)]
    pub review_of: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    /// Time of the latest answer; `None` until the first one.
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<Score>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Derive the reader-facing status. `abandoned` is computed here, never stored.
    pub fn status(&self, now: DateTime<Utc>, staleness: Duration) -> SessionStatus {
        if self.is_completed() {
            return SessionStatus::Completed;
        }
        match self.last_activity_at {
            None => SessionStatus::Created,
            Some(last) if now - last > staleness => SessionStatus::Abandoned,
            Some(_) => SessionStatus::InProgress,
        }
    }

    /// Whether `caller` may read or write this session.
    ///
    /// Anonymous sessions accept any caller; owned sessions require the owner.
    pub fn is_accessible_by(&self, caller: Option<&str>) -> bool {
        match &self.user_id {
            None => true,
            Some(owner) => caller == Some(owner.as_str()),
        }
    }
}

/// One question pinned at one ordinal (1-based) of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub session_id: Uuid,
    pub ordinal: u32,
    pub question_id: String,
    /// Topic the question was drawn for in practice mode.
    #[serde(default)]
    pub topic_id: Option<String>,
    /// Exam part label in replica mode.
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default)]
    pub answer: Option<AnswerOption>,
    /// Filled in when the session is scored.
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub answered_at: Option<DateTime<Utc>>,
}

/// Per (user, question) aggregate consumed by the sampler's exclusion bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuestionHistory {
    pub user_id: String,
    pub question_id: String,
    pub attempts: u32,
    pub correct: u32,
    pub last_seen_at: DateTime<Utc>,
}

impl UserQuestionHistory {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            id: Uuid::nil(),
            position_id: "aux".into(),
            target_count: 10,
            mode: SessionMode::Practice,
            user_id: Some("u1".into()),
            exam: None,
            review_of: None,
            started_at: Utc::now(),
            last_activity_at: None,
            completed_at: None,
            score: None,
        }
    }

    #[test]
    fn answer_option_display_and_parse() {
        assert_eq!(AnswerOption::C.to_string(), "c");
        assert_eq!("B".parse::<AnswerOption>().unwrap(), AnswerOption::B);
        assert_eq!(" d ".parse::<AnswerOption>().unwrap(), AnswerOption::D);
        assert!("e".parse::<AnswerOption>().is_err());
        assert_eq!(AnswerOption::from_index(2), Some(AnswerOption::C));
        assert_eq!(AnswerOption::from_index(4), None);
    }

    #[test]
    fn only_perfect_statuses_are_approved() {
        assert!(ReviewStatus::Perfect.is_approved());
        assert!(ReviewStatus::TechPerfect.is_approved());
        assert!(!ReviewStatus::Pending.is_approved());
        assert!(!ReviewStatus::WrongArticle.is_approved());
        assert_eq!(
            "tech_perfect".parse::<ReviewStatus>().unwrap(),
            ReviewStatus::TechPerfect
        );
    }

    #[test]
    fn article_selection_placeholder_means_whole_law() {
        assert_eq!(
            ArticleSelection::from_numbers(vec![]),
            ArticleSelection::WholeLaw
        );
        assert_eq!(
            ArticleSelection::from_numbers(vec!["0".into()]),
            ArticleSelection::WholeLaw
        );
        assert_eq!(
            ArticleSelection::from_numbers(vec!["14".into()]),
            ArticleSelection::Numbers(vec!["14".into()])
        );
    }

    #[test]
    fn session_status_derivation() {
        let now = Utc::now();
        let stale = Duration::hours(24);
        let mut s = session();
        assert_eq!(s.status(now, stale), SessionStatus::Created);

        s.last_activity_at = Some(now - Duration::hours(1));
        assert_eq!(s.status(now, stale), SessionStatus::InProgress);

        s.last_activity_at = Some(now - Duration::hours(48));
        assert_eq!(s.status(now, stale), SessionStatus::Abandoned);

        s.completed_at = Some(now);
        assert_eq!(s.status(now, stale), SessionStatus::Completed);
    }

    #[test]
    fn ownership_rules() {
        let mut s = session();
        assert!(s.is_accessible_by(Some("u1")));
        assert!(!s.is_accessible_by(Some("u2")));
        assert!(!s.is_accessible_by(None));
        s.user_id = None;
        assert!(s.is_accessible_by(None));
        assert!(s.is_accessible_by(Some("anyone")));
    }

    #[test]
    fn session_mode_serde_names() {
        let json = serde_json::to_string(&SessionMode::OfficialReplica).unwrap();
        assert_eq!(json, "\"official-replica\"");
        assert_eq!(
            "practice".parse::<SessionMode>().unwrap(),
            SessionMode::Practice
        );
    }
}
