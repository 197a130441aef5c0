use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use study_core::model::{Participant, QuizQuestion, QuizSession, SessionId};

use super::mapping::{
    conn, item_id_from_str, participant_id_from_str, phase_from_row, phase_to_row,
    position_from_i64, position_to_i64, ser, session_id_from_str, write_err,
};
use super::{ImmediateTx, SqliteRepository};
use crate::repository::{SessionMutation, SessionRepository, StorageError};

/// Rewrites the roster of `session`. Answers cascade with their participant.
///
/// Callers hold a write transaction so the roster read before the change is
/// still current when it is replaced.
async fn write_participants(
    db: &mut SqliteConnection,
    session: &QuizSession,
) -> Result<(), StorageError> {
    let session_id = session.id().to_string();

    sqlx::query("DELETE FROM participants WHERE session_id = ?1")
        .bind(&session_id)
        .execute(&mut *db)
        .await
        .map_err(conn)?;

    for (position, participant) in session.participants().iter().enumerate() {
        let participant_id = participant.id().to_string();
        sqlx::query(
            r"
                INSERT INTO participants (id, session_id, position, name, joined_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&participant_id)
        .bind(&session_id)
        .bind(position_to_i64("participant position", position)?)
        .bind(participant.name())
        .bind(participant.joined_at())
        .execute(&mut *db)
        .await
        .map_err(write_err)?;

        for (question_id, answer) in participant.answers() {
            sqlx::query(
                r"
                    INSERT INTO participant_answers (participant_id, question_id, answer)
                    VALUES (?1, ?2, ?3)
                ",
            )
            .bind(&participant_id)
            .bind(question_id.as_str())
            .bind(answer)
            .execute(&mut *db)
            .await
            .map_err(conn)?;
        }
    }

    Ok(())
}

async fn load_session(
    db: &mut SqliteConnection,
    id: &str,
) -> Result<Option<QuizSession>, StorageError> {
    let Some(row) = sqlx::query(
        r"
            SELECT id, title, phase, question_index, created_at
            FROM quiz_sessions
            WHERE id = ?1
        ",
    )
    .bind(id)
    .fetch_optional(&mut *db)
    .await
    .map_err(conn)?
    else {
        return Ok(None);
    };

    let session_id = session_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let phase = phase_from_row(
        &row.try_get::<String, _>("phase").map_err(ser)?,
        row.try_get("question_index").map_err(ser)?,
    )?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    let questions = load_questions(db, id).await?;
    let participants = load_participants(db, id, &questions).await?;

    QuizSession::from_persisted(session_id, title, questions, participants, phase, created_at)
        .map(Some)
        .map_err(ser)
}

async fn load_questions(
    db: &mut SqliteConnection,
    session_id: &str,
) -> Result<Vec<QuizQuestion>, StorageError> {
    let option_rows = sqlx::query(
        r"
            SELECT question_position, text
            FROM quiz_options
            WHERE session_id = ?1
            ORDER BY question_position ASC, position ASC
        ",
    )
    .bind(session_id)
    .fetch_all(&mut *db)
    .await
    .map_err(conn)?;

    let mut options: HashMap<usize, Vec<String>> = HashMap::new();
    for row in option_rows {
        let raw_position = row.try_get("question_position").map_err(ser)?;
        let position = position_from_i64("question_position", raw_position)?;
        options
            .entry(position)
            .or_default()
            .push(row.try_get("text").map_err(ser)?);
    }

    let question_rows = sqlx::query(
        r"
            SELECT position, id, question, correct_answer
            FROM quiz_questions
            WHERE session_id = ?1
            ORDER BY position ASC
        ",
    )
    .bind(session_id)
    .fetch_all(&mut *db)
    .await
    .map_err(conn)?;

    let mut questions = Vec::with_capacity(question_rows.len());
    for row in question_rows {
        let position = position_from_i64("position", row.try_get("position").map_err(ser)?)?;
        let question = QuizQuestion::new(
            item_id_from_str(row.try_get("id").map_err(ser)?)?,
            row.try_get::<String, _>("question").map_err(ser)?,
            options.remove(&position).unwrap_or_default(),
            row.try_get::<String, _>("correct_answer").map_err(ser)?,
        )
        .map_err(ser)?;
        questions.push(question);
    }

    Ok(questions)
}

async fn load_participants(
    db: &mut SqliteConnection,
    session_id: &str,
    questions: &[QuizQuestion],
) -> Result<Vec<Participant>, StorageError> {
    let answer_rows = sqlx::query(
        r"
            SELECT a.participant_id, a.question_id, a.answer
            FROM participant_answers a
            JOIN participants p ON p.id = a.participant_id
            WHERE p.session_id = ?1
        ",
    )
    .bind(session_id)
    .fetch_all(&mut *db)
    .await
    .map_err(conn)?;

    let mut answers: HashMap<String, BTreeMap<_, String>> = HashMap::new();
    for row in answer_rows {
        let participant_id: String = row.try_get("participant_id").map_err(ser)?;
        let question_id = item_id_from_str(row.try_get("question_id").map_err(ser)?)?;
        answers
            .entry(participant_id)
            .or_default()
            .insert(question_id, row.try_get("answer").map_err(ser)?);
    }

    let participant_rows = sqlx::query(
        r"
            SELECT id, name, joined_at
            FROM participants
            WHERE session_id = ?1
            ORDER BY position ASC
        ",
    )
    .bind(session_id)
    .fetch_all(&mut *db)
    .await
    .map_err(conn)?;

    let mut participants = Vec::with_capacity(participant_rows.len());
    for row in participant_rows {
        let raw_id: String = row.try_get("id").map_err(ser)?;
        let participant = Participant::from_persisted(
            participant_id_from_str(&raw_id)?,
            row.try_get::<String, _>("name").map_err(ser)?,
            answers.remove(&raw_id).unwrap_or_default(),
            row.try_get("joined_at").map_err(ser)?,
            questions,
        )
        .map_err(ser)?;
        participants.push(participant);
    }

    Ok(participants)
}

/// Reload, mutate and store one session on a connection that already holds
/// the write lock.
async fn apply_mutation(
    db: &mut SqliteConnection,
    id: SessionId,
    mutate: &mut SessionMutation<'_>,
) -> Result<QuizSession, StorageError> {
    let mut session = load_session(db, &id.to_string())
        .await?
        .ok_or(StorageError::NotFound)?;
    mutate(&mut session).map_err(StorageError::Rejected)?;

    let (phase, question_index) = phase_to_row(session.phase())?;
    sqlx::query(
        r"
            UPDATE quiz_sessions
            SET phase = ?2, question_index = ?3
            WHERE id = ?1
        ",
    )
    .bind(session.id().to_string())
    .bind(phase)
    .bind(question_index)
    .execute(&mut *db)
    .await
    .map_err(conn)?;

    write_participants(db, &session).await?;
    Ok(session)
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let session_id = session.id().to_string();
        let (phase, question_index) = phase_to_row(session.phase())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (id, title, phase, question_index, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&session_id)
        .bind(session.title())
        .bind(phase)
        .bind(question_index)
        .bind(session.created_at())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        for (position, question) in session.questions().iter().enumerate() {
            let position = position_to_i64("position", position)?;
            sqlx::query(
                r"
                    INSERT INTO quiz_questions (session_id, position, id, question, correct_answer)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(&session_id)
            .bind(position)
            .bind(question.id().as_str())
            .bind(question.question())
            .bind(question.correct_answer())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

            for (option_position, text) in question.options().iter().enumerate() {
                sqlx::query(
                    r"
                        INSERT INTO quiz_options (session_id, question_position, position, text)
                        VALUES (?1, ?2, ?3, ?4)
                    ",
                )
                .bind(&session_id)
                .bind(position)
                .bind(position_to_i64("option position", option_position)?)
                .bind(text)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        write_participants(&mut tx, session).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<QuizSession>, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        load_session(&mut db, &id.to_string()).await
    }

    async fn modify_session(
        &self,
        id: SessionId,
        mutate: &mut SessionMutation<'_>,
    ) -> Result<QuizSession, StorageError> {
        let mut tx = ImmediateTx::begin(&self.pool).await?;
        let result = apply_mutation(tx.conn()?, id, mutate).await;
        tx.finish(result).await
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<QuizSession>, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        let rows = sqlx::query(
            r"
                SELECT id
                FROM quiz_sessions
                ORDER BY created_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&mut *db)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(ser)?;
            if let Some(session) = load_session(&mut db, &id).await? {
                out.push(session);
            }
        }
        Ok(out)
    }
}
