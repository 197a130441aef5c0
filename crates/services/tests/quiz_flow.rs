use std::sync::Arc;

use async_trait::async_trait;
use services::{
    AppServices, Clock, GenerationError, QuizServiceError, SessionEvent, TextGenerator,
};
use storage::repository::Storage;
use study_core::model::{HostPhase, HostError};
use study_core::time::fixed_now;

const QUIZ_REPLY: &str = r#"```json
[
  {"question": "What do plants absorb for photosynthesis?", "options": ["Light", "Sound", "Heat", "Salt"], "correctAnswer": "Light"},
  {"question": "Which gas do plants release?", "options": ["Oxygen", "Helium", "Argon", "Neon"], "correctAnswer": "Oxygen"},
  {"question": "Where does photosynthesis happen?", "options": ["Chloroplast", "Nucleus", "Ribosome", "Wall"], "correctAnswer": "Chloroplast"}
]
```"#;

struct CannedQuiz;

#[async_trait]
impl TextGenerator for CannedQuiz {
    async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok(QUIZ_REPLY.to_string())
    }
}

async fn services(db_name: &str) -> AppServices {
    let url = format!("sqlite:file:{db_name}?mode=memory&cache=shared");
    let storage = Storage::sqlite(&url).await.expect("sqlite storage");
    AppServices::with_storage(storage, Clock::fixed(fixed_now()), Arc::new(CannedQuiz))
}

#[tokio::test]
async fn generated_quiz_is_hosted_played_and_reloaded() {
    let app = services("memdb_quiz_flow").await;
    let quiz = app.quiz();

    let questions = app
        .generation()
        .generate_quiz("Plants turn light into sugar and release oxygen.", 3)
        .await
        .unwrap();
    assert_eq!(questions.len(), 3);

    let session = quiz.create_session("Photosynthesis", questions).await.unwrap();
    let sid = session.id();
    let ids: Vec<_> = session.questions().iter().map(|q| q.id().clone()).collect();
    let mut events = quiz.subscribe(sid).await.unwrap();

    let ada = quiz.add_participant(sid, "Ada").await.unwrap();
    let grace = quiz.add_participant(sid, "Grace").await.unwrap();

    quiz.start(sid).await.unwrap();
    quiz.submit_answer(sid, ada.id(), &ids[0], "Light").await.unwrap();
    quiz.submit_answer(sid, grace.id(), &ids[0], "Light").await.unwrap();
    quiz.next(sid).await.unwrap();
    quiz.submit_answer(sid, grace.id(), &ids[1], "Oxygen").await.unwrap();
    quiz.submit_answer(sid, ada.id(), &ids[1], "Helium").await.unwrap();
    quiz.pause(sid).await.unwrap();

    // A second set of services over the same database sees the same state.
    let reloaded = services("memdb_quiz_flow").await.quiz();
    let session = reloaded.get_session(sid).await.unwrap();
    assert_eq!(session.phase(), HostPhase::Paused { index: 1 });
    let board: Vec<(String, u32)> = reloaded
        .leaderboard(sid)
        .await
        .unwrap()
        .iter()
        .map(|p| (p.name().to_string(), p.score()))
        .collect();
    assert_eq!(board, vec![("Grace".into(), 2), ("Ada".into(), 1)]);

    let standing = reloaded.standing(sid, ada.id()).await.unwrap();
    assert_eq!((standing.rank, standing.total_questions), (2, 3));

    let mut joined = 0;
    let mut phases = Vec::new();
    while let Some(event) = events.try_recv() {
        match event {
            SessionEvent::ParticipantJoined { .. } => joined += 1,
            SessionEvent::PhaseChanged { phase, .. } => phases.push(phase),
            SessionEvent::AnswerRecorded { .. } => {}
        }
    }
    assert_eq!(joined, 2);
    assert_eq!(
        phases,
        vec![
            HostPhase::Active { index: 0 },
            HostPhase::Active { index: 1 },
            HostPhase::Paused { index: 1 },
        ]
    );
}

#[tokio::test]
async fn finished_quiz_rejects_further_navigation() {
    let app = services("memdb_quiz_finish").await;
    let quiz = app.quiz();
    let questions = app.generation().generate_quiz("plants", 3).await.unwrap();
    let sid = quiz.create_session("Short", questions).await.unwrap().id();

    quiz.start(sid).await.unwrap();
    for _ in 0..3 {
        quiz.next(sid).await.unwrap();
    }
    assert_eq!(quiz.get_session(sid).await.unwrap().phase(), HostPhase::Completed);
    assert!(matches!(
        quiz.previous(sid).await,
        Err(QuizServiceError::Host(HostError::Completed))
    ));
}
