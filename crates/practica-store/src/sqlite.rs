//! SQLite backend.
//!
//! Catalog tables (laws, positions, questions, exams) are replaced per entity
//! on import and are otherwise read-only. Session tables take the write
//! traffic: answers live in their own table keyed by (session, ordinal) so an
//! autosave is a single upsert.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use practica_core::catalog::{Bank, BankSnapshot};
use practica_core::error::EngineError;
use practica_core::model::{
    AnswerOption, Article, ArticleRef, ArticleSelection, Block, ExamPart, ExamRef, Law,
    OfficialExam, Position, Question, Score, Session, SessionQuestion, Topic, TopicScope,
    UserQuestionHistory,
};
use practica_core::scoring::grade;
use practica_core::traits::{GradedSession, QuestionOutcome, QuestionRepository, SessionStore};

use crate::error::StoreError;

const SCHEMA_VERSION: &str = "1";

const QUESTION_COLUMNS: &str = "id, law_id, article, text, option_a, option_b, option_c, \
     option_d, correct, explanation, active, review_status";

const SESSION_COLUMNS: &str = "id, position_id, target_count, mode, user_id, exam_id, \
     exam_part, review_of, started_at, last_activity_at, completed_at, correct_count, \
     total, percentage";

/// Row counts written by `SqliteStore::import_bank`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub laws: usize,
    pub articles: usize,
    pub positions: usize,
    pub topics: usize,
    pub questions: usize,
    pub exams: usize,
}

/// Question bank and session store backed by SQLite.
///
/// A file database opens a fresh connection for every call, so readers run
/// beside the single WAL writer instead of queueing on one handle. Trait
/// methods run their queries on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    backend: Backend,
}

#[derive(Debug, Clone)]
enum Backend {
    File(PathBuf),
    /// A private in-memory database exists only as long as its one connection.
    Memory(Arc<Mutex<Connection>>),
}

impl Backend {
    fn run<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match self {
            Backend::File(path) => {
                let mut conn = connect(path)?;
                f(&mut conn)
            }
            Backend::Memory(conn) => {
                let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
                f(&mut conn)
            }
        }
    }
}

/// Per-connection settings; `journal_mode` is persisted by `open`.
fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")?;
    Ok(())
}

fn connect(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Writers take the lock up front so a read never has to upgrade mid-transaction.
fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

impl SqliteStore {
    /// Open (or create) a database file and install the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = connect(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrate(&conn)?;
        tracing::debug!("opened sqlite store at {}", path.display());
        Ok(Self {
            backend: Backend::File(path),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        migrate(&conn)?;
        tracing::debug!("opened sqlite store at :memory:");
        Ok(Self {
            backend: Backend::Memory(Arc::new(Mutex::new(conn))),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Memory(_) => None,
        }
    }

    /// Run `f` on the blocking pool with a connection of its own.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.run(f)).await?
    }

    /// Load a bank in one transaction. Each law, position and exam is
    /// replaced wholesale; questions are upserted by id.
    pub fn import_bank(&self, bank: &Bank) -> Result<ImportSummary, StoreError> {
        self.backend.run(|conn| {
            let tx = write_tx(conn)?;
            let mut summary = ImportSummary::default();

            for law in &bank.laws {
                import_law(&tx, law)?;
                summary.laws += 1;
                summary.articles += law.articles.len();
            }
            for position in &bank.positions {
                summary.topics += import_position(&tx, position)?;
                summary.positions += 1;
            }
            for question in &bank.questions {
                upsert_question(&tx, question)?;
                summary.questions += 1;
            }
            for exam in &bank.exams {
                import_exam(&tx, exam)?;
                summary.exams += 1;
            }

            tx.commit()?;
            tracing::info!(
                "imported {} laws, {} positions, {} questions, {} exams",
                summary.laws,
                summary.positions,
                summary.questions,
                summary.exams
            );
            Ok(summary)
        })
    }

    /// Flip a question's active flag, as the content review workflow does.
    pub fn set_question_active(&self, question_id: &str, active: bool) -> Result<(), StoreError> {
        self.backend.run(|conn| {
            let changed = conn.execute(
                "UPDATE questions SET active = ?2 WHERE id = ?1",
                params![question_id, active],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("question", question_id));
            }
            Ok(())
        })
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS laws (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS articles (
          law_id TEXT NOT NULL REFERENCES laws(id) ON DELETE CASCADE,
          number TEXT NOT NULL,
          title TEXT NOT NULL,
          seq INTEGER NOT NULL,
          PRIMARY KEY (law_id, number)
        );

        CREATE TABLE IF NOT EXISTS positions (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blocks (
          position_id TEXT NOT NULL REFERENCES positions(id) ON DELETE CASCADE,
          id TEXT NOT NULL,
          name TEXT NOT NULL,
          weight REAL,
          seq INTEGER NOT NULL,
          PRIMARY KEY (position_id, id)
        );

        CREATE TABLE IF NOT EXISTS topics (
          position_id TEXT NOT NULL,
          block_id TEXT NOT NULL,
          id TEXT NOT NULL,
          name TEXT NOT NULL,
          weight REAL NOT NULL,
          seq INTEGER NOT NULL,
          PRIMARY KEY (position_id, id),
          FOREIGN KEY (position_id, block_id) REFERENCES blocks(position_id, id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS topic_scopes (
          position_id TEXT NOT NULL,
          topic_id TEXT NOT NULL,
          seq INTEGER NOT NULL,
          law_id TEXT NOT NULL,
          articles TEXT,
          PRIMARY KEY (position_id, topic_id, seq),
          FOREIGN KEY (position_id, topic_id) REFERENCES topics(position_id, id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS questions (
          id TEXT PRIMARY KEY,
          law_id TEXT,
          article TEXT,
          text TEXT NOT NULL,
          option_a TEXT NOT NULL,
          option_b TEXT NOT NULL,
          option_c TEXT NOT NULL,
          option_d TEXT NOT NULL,
          correct TEXT NOT NULL,
          explanation TEXT NOT NULL,
          active INTEGER NOT NULL,
          review_status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS official_exams (
          id TEXT PRIMARY KEY,
          position_id TEXT NOT NULL,
          exam_date TEXT NOT NULL,
          title TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS exam_questions (
          exam_id TEXT NOT NULL REFERENCES official_exams(id) ON DELETE CASCADE,
          part TEXT NOT NULL,
          part_seq INTEGER NOT NULL,
          seq INTEGER NOT NULL,
          question_id TEXT NOT NULL,
          PRIMARY KEY (exam_id, part_seq, seq)
        );

        CREATE TABLE IF NOT EXISTS sessions (
          id TEXT PRIMARY KEY,
          position_id TEXT NOT NULL,
          target_count INTEGER NOT NULL,
          mode TEXT NOT NULL,
          user_id TEXT,
          exam_id TEXT,
          exam_part TEXT,
          review_of TEXT,
          started_at TEXT NOT NULL,
          last_activity_at TEXT,
          completed_at TEXT,
          correct_count INTEGER,
          total INTEGER,
          percentage INTEGER
        );

        CREATE TABLE IF NOT EXISTS session_questions (
          session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
          ordinal INTEGER NOT NULL,
          question_id TEXT NOT NULL,
          topic_id TEXT,
          part TEXT,
          is_correct INTEGER,
          PRIMARY KEY (session_id, ordinal)
        );

        CREATE TABLE IF NOT EXISTS answers (
          session_id TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          answer TEXT NOT NULL,
          answered_at TEXT NOT NULL,
          PRIMARY KEY (session_id, ordinal),
          FOREIGN KEY (session_id, ordinal) REFERENCES session_questions(session_id, ordinal) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS user_question_history (
          user_id TEXT NOT NULL,
          question_id TEXT NOT NULL,
          attempts INTEGER NOT NULL,
          correct INTEGER NOT NULL,
          last_seen_at TEXT NOT NULL,
          PRIMARY KEY (user_id, question_id)
        );

        CREATE INDEX IF NOT EXISTS idx_questions_law ON questions(law_id, article);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let law: Option<String> = row.get(1)?;
    let number: Option<String> = row.get(2)?;
    Ok(Question {
        id: row.get(0)?,
        article: law.zip(number).map(|(law, number)| ArticleRef { law, number }),
        text: row.get(3)?,
        options: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
        correct: parse_column(row, 8)?,
        explanation: row.get(9)?,
        active: row.get(10)?,
        review_status: parse_column(row, 11)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let id = uuid_column(row, 0)?.ok_or_else(|| conversion_error(0, "null session id".into()))?;
    let exam_id: Option<String> = row.get(5)?;
    let exam_part: Option<String> = row.get(6)?;
    let correct_count: Option<u32> = row.get(11)?;
    let total: Option<u32> = row.get(12)?;
    let percentage: Option<u8> = row.get(13)?;
    let score = match (correct_count, total, percentage) {
        (Some(correct_count), Some(total), Some(percentage)) => Some(Score {
            correct_count,
            total,
            percentage,
        }),
        _ => None,
    };
    Ok(Session {
        id,
        position_id: row.get(1)?,
        target_count: row.get::<_, i64>(2)? as usize,
        mode: parse_column(row, 3)?,
        user_id: row.get(4)?,
        exam: exam_id.map(|exam_id| ExamRef {
            exam_id,
            part: exam_part,
        }),
        review_of: uuid_column(row, 7)?,
        started_at: row.get(8)?,
        last_activity_at: row.get(9)?,
        completed_at: row.get(10)?,
        score,
    })
}

// ---------------------------------------------------------------------------
// Catalog import
// ---------------------------------------------------------------------------

fn import_law(tx: &Transaction<'_>, law: &Law) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO laws(id, title) VALUES (?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET title = excluded.title",
        params![law.id, law.title],
    )?;
    tx.execute("DELETE FROM articles WHERE law_id = ?1", params![law.id])?;
    for (seq, article) in law.articles.iter().enumerate() {
        tx.execute(
            "INSERT INTO articles(law_id, number, title, seq) VALUES (?1, ?2, ?3, ?4)",
            params![law.id, article.number, article.title, seq as i64],
        )?;
    }
    Ok(())
}

fn import_position(tx: &Transaction<'_>, position: &Position) -> Result<usize, StoreError> {
    tx.execute(
        "INSERT INTO positions(id, name) VALUES (?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        params![position.id, position.name],
    )?;
    // Cascades to topics and scopes.
    tx.execute(
        "DELETE FROM blocks WHERE position_id = ?1",
        params![position.id],
    )?;

    let mut topic_seq = 0i64;
    for (block_seq, block) in position.blocks.iter().enumerate() {
        tx.execute(
            "INSERT INTO blocks(position_id, id, name, weight, seq) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![position.id, block.id, block.name, block.weight, block_seq as i64],
        )?;
        for topic in &block.topics {
            tx.execute(
                "INSERT INTO topics(position_id, block_id, id, name, weight, seq) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![position.id, block.id, topic.id, topic.name, topic.weight, topic_seq],
            )?;
            topic_seq += 1;
            for (scope_seq, scope) in topic.scopes.iter().enumerate() {
                let articles = match &scope.articles {
                    ArticleSelection::WholeLaw => None,
                    ArticleSelection::Numbers(numbers) => Some(serde_json::to_string(numbers)?),
                };
                tx.execute(
                    "INSERT INTO topic_scopes(position_id, topic_id, seq, law_id, articles) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![position.id, topic.id, scope_seq as i64, scope.law, articles],
                )?;
            }
        }
    }
    Ok(topic_seq as usize)
}

fn upsert_question(tx: &Transaction<'_>, q: &Question) -> Result<(), StoreError> {
    let (law, article) = match &q.article {
        Some(a) => (Some(a.law.as_str()), Some(a.number.as_str())),
        None => (None, None),
    };
    tx.execute(
        "INSERT INTO questions(id, law_id, article, text, option_a, option_b, option_c, option_d, \
                               correct, explanation, active, review_status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(id) DO UPDATE SET \
           law_id = excluded.law_id, article = excluded.article, text = excluded.text, \
           option_a = excluded.option_a, option_b = excluded.option_b, \
           option_c = excluded.option_c, option_d = excluded.option_d, \
           correct = excluded.correct, explanation = excluded.explanation, \
           active = excluded.active, review_status = excluded.review_status",
        params![
            q.id,
            law,
            article,
            q.text,
            q.options[0],
            q.options[1],
            q.options[2],
            q.options[3],
            q.correct.to_string(),
            q.explanation,
            q.active,
            q.review_status.as_str(),
        ],
    )?;
    Ok(())
}

fn import_exam(tx: &Transaction<'_>, exam: &OfficialExam) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO official_exams(id, position_id, exam_date, title) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(id) DO UPDATE SET position_id = excluded.position_id, \
           exam_date = excluded.exam_date, title = excluded.title",
        params![exam.id, exam.position_id, exam.date, exam.title],
    )?;
    tx.execute(
        "DELETE FROM exam_questions WHERE exam_id = ?1",
        params![exam.id],
    )?;
    for (part_seq, part) in exam.parts.iter().enumerate() {
        for (seq, question_id) in part.question_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO exam_questions(exam_id, part, part_seq, seq, question_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![exam.id, part.name, part_seq as i64, seq as i64, question_id],
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog reads
// ---------------------------------------------------------------------------

fn load_position(conn: &Connection, position_id: &str) -> Result<Position, StoreError> {
    let name: String = conn
        .query_row(
            "SELECT name FROM positions WHERE id = ?1",
            params![position_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("position", position_id))?;

    let mut blocks: Vec<Block> = conn
        .prepare("SELECT id, name, weight FROM blocks WHERE position_id = ?1 ORDER BY seq")?
        .query_map(params![position_id], |row| {
            Ok(Block {
                id: row.get(0)?,
                name: row.get(1)?,
                weight: row.get(2)?,
                topics: Vec::new(),
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut scopes: HashMap<String, Vec<TopicScope>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT topic_id, law_id, articles FROM topic_scopes \
         WHERE position_id = ?1 ORDER BY topic_id, seq",
    )?;
    let mut rows = stmt.query(params![position_id])?;
    while let Some(row) = rows.next()? {
        let topic_id: String = row.get(0)?;
        let articles: Option<String> = row.get(2)?;
        let articles = match articles {
            None => ArticleSelection::WholeLaw,
            Some(raw) => ArticleSelection::Numbers(serde_json::from_str(&raw)?),
        };
        scopes.entry(topic_id).or_default().push(TopicScope {
            law: row.get(1)?,
            articles,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT block_id, id, name, weight FROM topics WHERE position_id = ?1 ORDER BY seq",
    )?;
    let mut rows = stmt.query(params![position_id])?;
    while let Some(row) = rows.next()? {
        let block_id: String = row.get(0)?;
        let id: String = row.get(1)?;
        let topic = Topic {
            scopes: scopes.remove(&id).unwrap_or_default(),
            id,
            name: row.get(2)?,
            weight: row.get(3)?,
        };
        let block = blocks
            .iter_mut()
            .find(|b| b.id == block_id)
            .ok_or_else(|| StoreError::Corrupt(format!("topic {} has no block", topic.id)))?;
        block.topics.push(topic);
    }

    Ok(Position {
        id: position_id.to_string(),
        name,
        blocks,
    })
}

fn load_law(conn: &Connection, law_id: &str) -> Result<Option<Law>, StoreError> {
    let Some(title) = conn
        .query_row(
            "SELECT title FROM laws WHERE id = ?1",
            params![law_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?
    else {
        return Ok(None);
    };
    let articles = conn
        .prepare("SELECT number, title FROM articles WHERE law_id = ?1 ORDER BY seq")?
        .query_map(params![law_id], |row| {
            Ok(Article {
                number: row.get(0)?,
                title: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Law {
        id: law_id.to_string(),
        title,
        articles,
    }))
}

fn load_snapshot(conn: &Connection, position_id: &str) -> Result<BankSnapshot, StoreError> {
    let position = load_position(conn, position_id)?;
    let law_ids: BTreeSet<String> = position
        .topics()
        .flat_map(|(_, t)| t.scopes.iter().map(|s| s.law.clone()))
        .collect();

    let mut laws = HashMap::new();
    let mut questions = Vec::new();
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE law_id = ?1 ORDER BY id"
    ))?;
    for law_id in &law_ids {
        if let Some(law) = load_law(conn, law_id)? {
            laws.insert(law.id.clone(), law);
        }
        let rows = stmt.query_map(params![law_id], question_from_row)?;
        for question in rows {
            questions.push(question?);
        }
    }

    Ok(BankSnapshot {
        position,
        laws,
        questions,
    })
}

fn load_exam(conn: &Connection, exam_id: &str) -> Result<OfficialExam, StoreError> {
    let (position_id, date, title): (String, NaiveDate, String) = conn
        .query_row(
            "SELECT position_id, exam_date, title FROM official_exams WHERE id = ?1",
            params![exam_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("exam", exam_id))?;

    let mut parts: Vec<ExamPart> = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT part_seq, part, question_id FROM exam_questions \
         WHERE exam_id = ?1 ORDER BY part_seq, seq",
    )?;
    let mut rows = stmt.query(params![exam_id])?;
    let mut current_seq: Option<i64> = None;
    while let Some(row) = rows.next()? {
        let part_seq: i64 = row.get(0)?;
        if current_seq != Some(part_seq) {
            parts.push(ExamPart {
                name: row.get(1)?,
                question_ids: Vec::new(),
            });
            current_seq = Some(part_seq);
        }
        if let Some(part) = parts.last_mut() {
            part.question_ids.push(row.get(2)?);
        }
    }

    Ok(OfficialExam {
        id: exam_id.to_string(),
        position_id,
        date,
        title,
        parts,
    })
}

// ---------------------------------------------------------------------------
// Session reads
// ---------------------------------------------------------------------------

fn load_session(conn: &Connection, id: Uuid) -> Result<Option<Session>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
            params![id.to_string()],
            session_from_row,
        )
        .optional()?)
}

/// `None` for an unknown session, `Some(completed_at)` otherwise.
fn completion_state(
    conn: &Connection,
    id: Uuid,
) -> Result<Option<Option<DateTime<Utc>>>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT completed_at FROM sessions WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Pinned questions with their recorded answers, in ordinal order.
fn read_session_questions(
    conn: &Connection,
    id: Uuid,
) -> Result<Vec<SessionQuestion>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT sq.ordinal, sq.question_id, sq.topic_id, sq.part, a.answer, \
                sq.is_correct, a.answered_at \
         FROM session_questions sq \
         LEFT JOIN answers a ON a.session_id = sq.session_id AND a.ordinal = sq.ordinal \
         WHERE sq.session_id = ?1 ORDER BY sq.ordinal",
    )?;
    let rows = stmt.query_map(params![id.to_string()], |row| {
        let answer: Option<String> = row.get(4)?;
        let answer = answer
            .map(|a| AnswerOption::from_str(&a).map_err(|e| conversion_error(4, e)))
            .transpose()?;
        Ok(SessionQuestion {
            session_id: id,
            ordinal: row.get(0)?,
            question_id: row.get(1)?,
            topic_id: row.get(2)?,
            part: row.get(3)?,
            answer,
            is_correct: row.get(5)?,
            answered_at: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl QuestionRepository for SqliteStore {
    async fn snapshot(&self, position_id: &str) -> Result<BankSnapshot, EngineError> {
        let position_id = position_id.to_string();
        Ok(self
            .blocking(move |conn| load_snapshot(conn, &position_id))
            .await?)
    }

    async fn questions(&self, ids: &[String]) -> Result<Vec<Question>, EngineError> {
        let ids = ids.to_vec();
        Ok(self
            .blocking(move |conn| {
                let mut stmt = conn
                    .prepare(&format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1"))?;
                let mut found = Vec::with_capacity(ids.len());
                for id in &ids {
                    if let Some(q) = stmt
                        .query_row(params![id], question_from_row)
                        .optional()?
                    {
                        found.push(q);
                    }
                }
                Ok(found)
            })
            .await?)
    }

    async fn official_exam(&self, exam_id: &str) -> Result<OfficialExam, EngineError> {
        let exam_id = exam_id.to_string();
        Ok(self.blocking(move |conn| load_exam(conn, &exam_id)).await?)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn insert_session(
        &self,
        session: &Session,
        questions: &[SessionQuestion],
    ) -> Result<(), EngineError> {
        let session = session.clone();
        let questions = questions.to_vec();
        Ok(self
            .blocking(move |conn| {
                let tx = write_tx(conn)?;
                let (exam_id, exam_part) = match &session.exam {
                    Some(exam) => (Some(exam.exam_id.as_str()), exam.part.as_deref()),
                    None => (None, None),
                };
                tx.execute(
                    &format!(
                        "INSERT INTO sessions({SESSION_COLUMNS}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                    ),
                    params![
                        session.id.to_string(),
                        session.position_id,
                        session.target_count as i64,
                        session.mode.as_str(),
                        session.user_id,
                        exam_id,
                        exam_part,
                        session.review_of.map(|id| id.to_string()),
                        session.started_at,
                        session.last_activity_at,
                        session.completed_at,
                        session.score.map(|s| s.correct_count),
                        session.score.map(|s| s.total),
                        session.score.map(|s| s.percentage),
                    ],
                )?;
                for sq in &questions {
                    tx.execute(
                        "INSERT INTO session_questions(session_id, ordinal, question_id, topic_id, part, is_correct) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            session.id.to_string(),
                            sq.ordinal,
                            sq.question_id,
                            sq.topic_id,
                            sq.part,
                            sq.is_correct,
                        ],
                    )?;
                    if let (Some(answer), Some(at)) = (sq.answer, sq.answered_at) {
                        tx.execute(
                            "INSERT INTO answers(session_id, ordinal, answer, answered_at) \
                             VALUES (?1, ?2, ?3, ?4)",
                            params![session.id.to_string(), sq.ordinal, answer.to_string(), at],
                        )?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?)
    }

    async fn session(&self, id: Uuid) -> Result<Option<Session>, EngineError> {
        Ok(self.blocking(move |conn| load_session(conn, id)).await?)
    }

    async fn session_questions(&self, id: Uuid) -> Result<Vec<SessionQuestion>, EngineError> {
        Ok(self
            .blocking(move |conn| {
                if completion_state(conn, id)?.is_none() {
                    return Err(StoreError::not_found("session", id.to_string()));
                }
                read_session_questions(conn, id)
            })
            .await?)
    }

    async fn upsert_answer(
        &self,
        id: Uuid,
        ordinal: u32,
        answer: AnswerOption,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        Ok(self
            .blocking(move |conn| {
                let tx = write_tx(conn)?;
                match completion_state(&tx, id)? {
                    None => return Err(StoreError::not_found("session", id.to_string())),
                    Some(Some(_)) => return Err(StoreError::AlreadyCompleted(id.to_string())),
                    Some(None) => {}
                }
                let pinned = tx
                    .query_row(
                        "SELECT 1 FROM session_questions WHERE session_id = ?1 AND ordinal = ?2",
                        params![id.to_string(), ordinal],
                        |_| Ok(()),
                    )
                    .optional()?;
                if pinned.is_none() {
                    return Err(StoreError::not_found("ordinal", format!("{id}#{ordinal}")));
                }
                tx.execute(
                    "INSERT INTO answers(session_id, ordinal, answer, answered_at) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(session_id, ordinal) DO UPDATE SET \
                       answer = excluded.answer, answered_at = excluded.answered_at",
                    params![id.to_string(), ordinal, answer.to_string(), at],
                )?;
                tx.execute(
                    "UPDATE sessions SET last_activity_at = ?2 WHERE id = ?1",
                    params![id.to_string(), at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?)
    }

    async fn complete_session(
        &self,
        id: Uuid,
        questions: &HashMap<String, Question>,
        at: DateTime<Utc>,
    ) -> Result<GradedSession, EngineError> {
        let questions = questions.clone();
        Ok(self
            .blocking(move |conn| {
                // The write lock is held from the answer read to the commit.
                let tx = write_tx(conn)?;
                match completion_state(&tx, id)? {
                    None => return Err(StoreError::not_found("session", id.to_string())),
                    Some(Some(_)) => return Err(StoreError::AlreadyCompleted(id.to_string())),
                    Some(None) => {}
                }
                let mut session_questions = read_session_questions(&tx, id)?;
                let (graded, score) = grade(&session_questions, &questions);

                tx.execute(
                    "UPDATE sessions SET completed_at = ?2, correct_count = ?3, total = ?4, \
                       percentage = ?5 \
                     WHERE id = ?1 AND completed_at IS NULL",
                    params![
                        id.to_string(),
                        at,
                        score.correct_count,
                        score.total,
                        score.percentage
                    ],
                )?;
                for (sq, (ordinal, correct)) in session_questions.iter_mut().zip(&graded) {
                    tx.execute(
                        "UPDATE session_questions SET is_correct = ?3 \
                         WHERE session_id = ?1 AND ordinal = ?2",
                        params![id.to_string(), ordinal, correct],
                    )?;
                    sq.is_correct = Some(*correct);
                }
                tx.commit()?;
                Ok(GradedSession {
                    score,
                    questions: session_questions,
                })
            })
            .await?)
    }

    async fn user_history(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, UserQuestionHistory>, EngineError> {
        let user_id = user_id.to_string();
        Ok(self
            .blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT question_id, attempts, correct, last_seen_at \
                     FROM user_question_history WHERE user_id = ?1",
                )?;
                let rows = stmt.query_map(params![user_id], |row| {
                    Ok(UserQuestionHistory {
                        user_id: user_id.clone(),
                        question_id: row.get(0)?,
                        attempts: row.get(1)?,
                        correct: row.get(2)?,
                        last_seen_at: row.get(3)?,
                    })
                })?;
                let mut history = HashMap::new();
                for h in rows {
                    let h = h?;
                    history.insert(h.question_id.clone(), h);
                }
                Ok(history)
            })
            .await?)
    }

    async fn record_history(
        &self,
        user_id: &str,
        outcomes: &[QuestionOutcome],
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let user_id = user_id.to_string();
        let outcomes = outcomes.to_vec();
        Ok(self
            .blocking(move |conn| {
                let tx = write_tx(conn)?;
                for outcome in &outcomes {
                    tx.execute(
                        "INSERT INTO user_question_history(user_id, question_id, attempts, correct, last_seen_at) \
                         VALUES (?1, ?2, 1, ?3, ?4) \
                         ON CONFLICT(user_id, question_id) DO UPDATE SET \
                           attempts = attempts + 1, \
                           correct = correct + excluded.correct, \
                           last_seen_at = MAX(last_seen_at, excluded.last_seen_at)",
                        params![user_id, outcome.question_id, u32::from(outcome.correct), at],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_installs_idempotently() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.backend.run(|conn| migrate(conn)).unwrap();
        let version: String = store
            .backend
            .run(|conn| {
                Ok(conn.query_row(
                    "SELECT value FROM meta WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("practica.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn unknown_question_cannot_be_deactivated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.set_question_active("nope", false).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
