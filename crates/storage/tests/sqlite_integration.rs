use chrono::Duration;
use study_core::model::{
    FlowchartData, HostPhase, ItemId, Participant, ParticipantId, QuizQuestion, QuizSession,
    SessionId,
};
use storage::repository::{FlowchartRepository, SessionRepository, StorageError};
use storage::sqlite::SqliteRepository;
use study_core::time::fixed_now;

fn build_questions() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion::new(
            ItemId::synthesize("quiz", fixed_now(), 0),
            "What does photosynthesis produce?",
            vec!["Glucose".into(), "Protein".into(), "Salt".into(), "Iron".into()],
            "Glucose",
        )
        .unwrap(),
        QuizQuestion::new(
            ItemId::synthesize("quiz", fixed_now(), 1),
            "Where does it happen?",
            vec!["Chloroplast".into(), "Nucleus".into()],
            "Chloroplast",
        )
        .unwrap(),
    ]
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_round_trips_session_roster_and_phase() {
    let repo = connect("memdb_session_roundtrip").await;

    let session =
        QuizSession::new(SessionId::generate(), "Biology", build_questions(), fixed_now()).unwrap();
    repo.insert_session(&session).await.unwrap();

    let ada = Participant::new(ParticipantId::generate(), "Ada", fixed_now()).unwrap();
    let twin = Participant::new(ParticipantId::generate(), "Ada", fixed_now()).unwrap();
    let (ada_id, twin_id) = (ada.id(), twin.id());
    let q0 = session.questions()[0].id().clone();
    let q1 = session.questions()[1].id().clone();

    let mut joiners = vec![ada, twin];
    let stored = repo
        .modify_session(session.id(), &mut |s| {
            for participant in joiners.drain(..) {
                s.add_participant(participant);
            }
            s.submit_answer(ada_id, &q0, "Glucose")?;
            s.submit_answer(ada_id, &q1, "Nucleus")?;
            s.submit_answer(twin_id, &q0, "Glucose")?;
            s.submit_answer(twin_id, &q1, "Chloroplast")?;
            s.start()?;
            s.next_question()?;
            s.pause()?;
            Ok(())
        })
        .await
        .unwrap();

    let fetched = repo.get_session(session.id()).await.unwrap().expect("stored");
    assert_eq!(fetched, stored);
    assert_eq!(fetched.phase(), HostPhase::Paused { index: 1 });
    assert_eq!(fetched.questions()[0].options().len(), 4);

    let board: Vec<ParticipantId> = fetched.leaderboard().iter().map(|p| p.id()).collect();
    assert_eq!(board, vec![twin_id, ada_id]);
    assert_eq!(fetched.participant(ada_id).unwrap().answer_for(&q1), Some("Nucleus"));
}

#[tokio::test]
async fn sqlite_reports_conflict_and_missing_sessions() {
    let repo = connect("memdb_session_errors").await;

    let session =
        QuizSession::new(SessionId::generate(), "Chemistry", build_questions(), fixed_now())
            .unwrap();
    repo.insert_session(&session).await.unwrap();
    assert!(matches!(
        repo.insert_session(&session).await,
        Err(StorageError::Conflict)
    ));

    let unknown = SessionId::generate();
    assert!(matches!(
        repo.modify_session(unknown, &mut |_| Ok(())).await,
        Err(StorageError::NotFound)
    ));
    assert!(repo.get_session(unknown).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_rolls_back_rejected_modification() {
    let repo = connect("memdb_session_rollback").await;

    let session =
        QuizSession::new(SessionId::generate(), "Physics", build_questions(), fixed_now()).unwrap();
    repo.insert_session(&session).await.unwrap();

    let ada = Participant::new(ParticipantId::generate(), "Ada", fixed_now()).unwrap();
    let mut joiner = Some(ada);
    let result = repo
        .modify_session(session.id(), &mut |s| {
            if let Some(p) = joiner.take() {
                s.add_participant(p);
            }
            s.pause()?;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(StorageError::Rejected(_))));

    let fetched = repo.get_session(session.id()).await.unwrap().expect("stored");
    assert_eq!(fetched, session);

    // The connection is usable again after the rollback.
    let stored = repo
        .modify_session(session.id(), &mut |s| {
            s.start()?;
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(stored.phase(), HostPhase::Active { index: 0 });
}

#[tokio::test]
async fn sqlite_lists_sessions_newest_first() {
    let repo = connect("memdb_session_list").await;

    for (title, offset) in [("first", 0), ("third", 120), ("second", 60)] {
        let session = QuizSession::new(
            SessionId::generate(),
            title,
            build_questions(),
            fixed_now() + Duration::seconds(offset),
        )
        .unwrap();
        repo.insert_session(&session).await.unwrap();
    }

    let titles: Vec<String> = repo
        .list_sessions(10)
        .await
        .unwrap()
        .iter()
        .map(|s| s.title().to_string())
        .collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn sqlite_flowcharts_append_in_order() {
    let repo = connect("memdb_flowcharts").await;

    let first = FlowchartData::new(
        ItemId::synthesize_single("flowchart", fixed_now()),
        "Water cycle",
        "graph TD\n    A[Evaporation] --> B[Condensation]",
        "Water evaporates and condenses.",
        fixed_now(),
    )
    .unwrap();
    let second = FlowchartData::new(
        ItemId::synthesize_single("flowchart", fixed_now() + Duration::milliseconds(1)),
        "Rock cycle",
        "graph TD\n    A[Magma] --> B[Igneous]",
        "Magma cools into igneous rock.",
        fixed_now(),
    )
    .unwrap();

    repo.append_flowchart(&first).await.unwrap();
    repo.append_flowchart(&second).await.unwrap();
    assert!(matches!(
        repo.append_flowchart(&first).await,
        Err(StorageError::Conflict)
    ));

    let all = repo.list_flowcharts().await.unwrap();
    assert_eq!(all, vec![first.clone(), second]);
    assert_eq!(repo.get_flowchart(first.id()).await.unwrap(), Some(first));
}
