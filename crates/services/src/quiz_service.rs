use std::sync::Arc;

use tracing::{debug, info};

use storage::repository::{SessionRepository, StorageError};
use study_core::model::{
    AnswerOutcome, HostPhase, ItemId, Participant, ParticipantId, QuizQuestion, QuizSession,
    SessionId, Standing,
};

use crate::Clock;
use crate::error::QuizServiceError;
use crate::events::{SessionEvent, SessionEvents, SessionSubscription};

/// Hosts live quiz sessions: roster, answers, leaderboard and host controls.
///
/// Every mutation goes through `SessionRepository::modify_session`, so joins
/// and answers from concurrent tasks or separate processes never overwrite
/// each other.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    events: SessionEvents,
}

#[derive(Debug, Clone, Copy)]
enum HostCommand {
    Start,
    Pause,
    Next,
    Previous,
}

impl QuizService {
    #[must_use]
    pub fn new(clock: Clock, sessions: Arc<dyn SessionRepository>) -> Self {
        Self {
            clock,
            sessions,
            events: SessionEvents::new(),
        }
    }

    /// Create and persist a session for `questions`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::ValidationFailed` for a blank title, an
    /// empty question list or duplicate question ids.
    /// Returns `QuizServiceError::Storage` if persistence fails.
    pub async fn create_session(
        &self,
        title: &str,
        questions: Vec<QuizQuestion>,
    ) -> Result<QuizSession, QuizServiceError> {
        let session = QuizSession::new(SessionId::generate(), title, questions, self.clock.now())?;
        self.sessions.insert_session(&session).await?;
        info!(
            session_id = %session.id(),
            questions = session.questions().len(),
            "quiz session created"
        );
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::SessionNotFound` if the id is unknown.
    pub async fn get_session(&self, id: SessionId) -> Result<QuizSession, QuizServiceError> {
        self.sessions
            .get_session(id)
            .await?
            .ok_or(QuizServiceError::SessionNotFound(id))
    }

    /// Most recent sessions first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn list_sessions(&self, limit: u32) -> Result<Vec<QuizSession>, QuizServiceError> {
        Ok(self.sessions.list_sessions(limit).await?)
    }

    /// Join `name` to a session. Names need not be unique.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::SessionNotFound` if the id is unknown and
    /// `QuizServiceError::ValidationFailed` for a blank name.
    pub async fn add_participant(
        &self,
        session_id: SessionId,
        name: &str,
    ) -> Result<Participant, QuizServiceError> {
        let participant = Participant::new(ParticipantId::generate(), name, self.clock.now())?;
        let joiner = participant.clone();
        self.modify(session_id, move |session| {
            session.add_participant(joiner.clone());
            Ok(())
        })
        .await?;

        info!(%session_id, participant_id = %participant.id(), "participant joined");
        self.events.publish(SessionEvent::ParticipantJoined {
            session_id,
            participant_id: participant.id(),
            name: participant.name().to_string(),
        });
        Ok(participant)
    }

    /// Record an answer. Answering the same question again replaces the
    /// earlier answer and the score is recomputed, never double counted.
    ///
    /// # Errors
    ///
    /// Returns a `*NotFound` variant when the session, participant or
    /// question does not exist.
    pub async fn submit_answer(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
        question_id: &ItemId,
        answer: &str,
    ) -> Result<AnswerOutcome, QuizServiceError> {
        let outcome = self
            .modify(session_id, |session| {
                Ok(session.submit_answer(participant_id, question_id, answer)?)
            })
            .await?;

        debug!(
            %session_id,
            %participant_id,
            %question_id,
            correct = outcome.correct,
            replaced = outcome.previous.is_some(),
            "answer recorded"
        );
        self.events.publish(SessionEvent::AnswerRecorded {
            session_id,
            participant_id,
            question_id: question_id.clone(),
            correct: outcome.correct,
            score: outcome.score,
        });
        Ok(outcome)
    }

    /// Participants by descending score; ties keep join order.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::SessionNotFound` if the id is unknown.
    pub async fn leaderboard(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Participant>, QuizServiceError> {
        let session = self.get_session(session_id).await?;
        Ok(session.leaderboard().into_iter().cloned().collect())
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::SessionNotFound` or
    /// `QuizServiceError::ParticipantNotFound`.
    pub async fn standing(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<Standing, QuizServiceError> {
        let session = self.get_session(session_id).await?;
        Ok(session.standing(participant_id)?)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Host` for an invalid transition.
    pub async fn start(&self, session_id: SessionId) -> Result<HostPhase, QuizServiceError> {
        self.host(session_id, HostCommand::Start).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Host` for an invalid transition.
    pub async fn pause(&self, session_id: SessionId) -> Result<HostPhase, QuizServiceError> {
        self.host(session_id, HostCommand::Pause).await
    }

    /// Advance to the next question, completing the session after the last one.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Host` for an invalid transition.
    pub async fn next(&self, session_id: SessionId) -> Result<HostPhase, QuizServiceError> {
        self.host(session_id, HostCommand::Next).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::Host` for an invalid transition.
    pub async fn previous(&self, session_id: SessionId) -> Result<HostPhase, QuizServiceError> {
        self.host(session_id, HostCommand::Previous).await
    }

    /// Receive pushed changes for a session instead of polling it.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::SessionNotFound` if the id is unknown.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
    ) -> Result<SessionSubscription, QuizServiceError> {
        self.get_session(session_id).await?;
        Ok(self.events.subscribe(session_id))
    }

    async fn host(
        &self,
        session_id: SessionId,
        command: HostCommand,
    ) -> Result<HostPhase, QuizServiceError> {
        let phase = self
            .modify(session_id, |session| {
                let phase = match command {
                    HostCommand::Start => session.start(),
                    HostCommand::Pause => session.pause(),
                    HostCommand::Next => session.next_question(),
                    HostCommand::Previous => session.previous_question(),
                }?;
                Ok(phase)
            })
            .await?;

        info!(%session_id, ?command, state = phase.label(), "host phase changed");
        self.events
            .publish(SessionEvent::PhaseChanged { session_id, phase });
        Ok(phase)
    }

    /// Apply `change` to the stored session atomically and return its output.
    async fn modify<T: Send>(
        &self,
        session_id: SessionId,
        mut change: impl FnMut(&mut QuizSession) -> Result<T, study_core::Error> + Send,
    ) -> Result<T, QuizServiceError> {
        let mut output = None;
        let mut mutate = |session: &mut QuizSession| -> Result<(), study_core::Error> {
            output = Some(change(session)?);
            Ok(())
        };
        self.sessions
            .modify_session(session_id, &mut mutate)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => QuizServiceError::SessionNotFound(session_id),
                StorageError::Rejected(err) => err.into(),
                other => other.into(),
            })?;
        output.ok_or_else(|| {
            StorageError::Connection("session change was not applied".into()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use study_core::model::HostError;
    use study_core::time::{fixed_clock, fixed_now};

    fn questions(count: usize) -> Vec<QuizQuestion> {
        (0..count)
            .map(|i| {
                QuizQuestion::new(
                    ItemId::synthesize("quiz", fixed_now(), i),
                    format!("Question {i}?"),
                    vec!["yes".into(), "no".into()],
                    "yes",
                )
                .unwrap()
            })
            .collect()
    }

    fn service() -> QuizService {
        QuizService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn leaderboard_orders_by_score_and_keeps_join_order_on_ties() {
        let svc = service();
        let session = svc.create_session("Biology", questions(2)).await.unwrap();
        let sid = session.id();
        let q0 = session.questions()[0].id().clone();
        let q1 = session.questions()[1].id().clone();

        let ada = svc.add_participant(sid, "Ada").await.unwrap();
        let bob = svc.add_participant(sid, "Bob").await.unwrap();
        let cy = svc.add_participant(sid, "Cy").await.unwrap();

        svc.submit_answer(sid, bob.id(), &q0, "yes").await.unwrap();
        svc.submit_answer(sid, cy.id(), &q0, "yes").await.unwrap();
        svc.submit_answer(sid, cy.id(), &q1, "yes").await.unwrap();
        svc.submit_answer(sid, ada.id(), &q0, "no").await.unwrap();

        let names: Vec<String> = svc
            .leaderboard(sid)
            .await
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Cy", "Bob", "Ada"]);

        let standing = svc.standing(sid, bob.id()).await.unwrap();
        assert_eq!(standing.rank, 2);
        assert_eq!(standing.score, 1);
        assert_eq!(standing.total_questions, 2);
    }

    #[tokio::test]
    async fn resubmitting_a_correct_answer_does_not_double_count() {
        let svc = service();
        let session = svc.create_session("Maths", questions(1)).await.unwrap();
        let sid = session.id();
        let q0 = session.questions()[0].id().clone();
        let ada = svc.add_participant(sid, "Ada").await.unwrap();

        let first = svc.submit_answer(sid, ada.id(), &q0, "yes").await.unwrap();
        let second = svc.submit_answer(sid, ada.id(), &q0, "yes").await.unwrap();
        assert_eq!(first.score, 1);
        assert_eq!(second.score, 1);
        assert_eq!(second.previous.as_deref(), Some("yes"));

        let third = svc.submit_answer(sid, ada.id(), &q0, "no").await.unwrap();
        assert!(!third.correct);
        assert_eq!(third.score, 0);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let svc = service();
        let missing = SessionId::generate();
        assert!(matches!(
            svc.get_session(missing).await,
            Err(QuizServiceError::SessionNotFound(id)) if id == missing
        ));
        assert!(svc.add_participant(missing, "Ada").await.unwrap_err().is_not_found());
        assert!(svc.leaderboard(missing).await.unwrap_err().is_not_found());

        let session = svc.create_session("Maths", questions(1)).await.unwrap();
        let q0 = session.questions()[0].id().clone();
        let stranger = ParticipantId::generate();
        assert!(matches!(
            svc.submit_answer(session.id(), stranger, &q0, "yes").await,
            Err(QuizServiceError::ParticipantNotFound(id)) if id == stranger
        ));

        let ada = svc.add_participant(session.id(), "Ada").await.unwrap();
        let bogus = ItemId::new("quiz-0-99").unwrap();
        assert!(matches!(
            svc.submit_answer(session.id(), ada.id(), &bogus, "yes").await,
            Err(QuizServiceError::QuestionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn blank_inputs_are_validation_failures() {
        let svc = service();
        assert!(matches!(
            svc.create_session("  ", questions(1)).await,
            Err(QuizServiceError::ValidationFailed(_))
        ));
        assert!(matches!(
            svc.create_session("Empty", Vec::new()).await,
            Err(QuizServiceError::ValidationFailed(_))
        ));

        let session = svc.create_session("Maths", questions(1)).await.unwrap();
        assert!(matches!(
            svc.add_participant(session.id(), "").await,
            Err(QuizServiceError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn host_walks_five_questions_and_completes_once() {
        let svc = service();
        let sid = svc.create_session("Tour", questions(5)).await.unwrap().id();

        assert!(matches!(
            svc.next(sid).await,
            Err(QuizServiceError::Host(HostError::NotStarted))
        ));
        assert_eq!(svc.start(sid).await.unwrap(), HostPhase::Active { index: 0 });
        assert_eq!(svc.previous(sid).await.unwrap(), HostPhase::Active { index: 0 });

        let mut phases = Vec::new();
        for _ in 0..5 {
            phases.push(svc.next(sid).await.unwrap());
        }
        assert_eq!(phases[3], HostPhase::Active { index: 4 });
        assert_eq!(phases[4], HostPhase::Completed);
        assert_eq!(phases.iter().filter(|p| p.is_completed()).count(), 1);

        assert!(matches!(
            svc.next(sid).await,
            Err(QuizServiceError::Host(HostError::Completed))
        ));
        assert_eq!(svc.get_session(sid).await.unwrap().phase(), HostPhase::Completed);
    }

    #[tokio::test]
    async fn pause_and_resume_keep_the_current_question() {
        let svc = service();
        let sid = svc.create_session("Tour", questions(3)).await.unwrap().id();
        svc.start(sid).await.unwrap();
        svc.next(sid).await.unwrap();

        assert_eq!(svc.pause(sid).await.unwrap(), HostPhase::Paused { index: 1 });
        assert!(matches!(
            svc.pause(sid).await,
            Err(QuizServiceError::Host(HostError::NotActive))
        ));
        assert_eq!(svc.start(sid).await.unwrap(), HostPhase::Active { index: 1 });
    }

    #[tokio::test]
    async fn subscribers_receive_joins_answers_and_phase_changes() {
        let svc = service();
        let session = svc.create_session("Live", questions(2)).await.unwrap();
        let sid = session.id();
        let q0 = session.questions()[0].id().clone();
        let mut sub = svc.subscribe(sid).await.unwrap();

        let ada = svc.add_participant(sid, "Ada").await.unwrap();
        svc.submit_answer(sid, ada.id(), &q0, "yes").await.unwrap();
        svc.start(sid).await.unwrap();

        assert_eq!(
            sub.recv().await.unwrap(),
            SessionEvent::ParticipantJoined {
                session_id: sid,
                participant_id: ada.id(),
                name: "Ada".into(),
            }
        );
        assert!(matches!(
            sub.recv().await.unwrap(),
            SessionEvent::AnswerRecorded { correct: true, score: 1, .. }
        ));
        assert_eq!(
            sub.recv().await.unwrap(),
            SessionEvent::PhaseChanged {
                session_id: sid,
                phase: HostPhase::Active { index: 0 },
            }
        );

        assert!(svc.subscribe(SessionId::generate()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn concurrent_joins_are_all_kept() {
        let svc = service();
        let sid = svc.create_session("Crowd", questions(1)).await.unwrap().id();

        let mut handles = Vec::new();
        for i in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.add_participant(sid, &format!("player {i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(svc.get_session(sid).await.unwrap().participants().len(), 8);
    }
}
