use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde_json::{Value, json};

use services::{
    AppServices, Clock, QuizLoopService, QuizPhase, SessionError, StaticNetwork, StudyConfig,
};
use storage::repository::{InMemoryRepository, KeyValueStore, Storage};
use study_core::model::{
    CompletionReason, FeedbackTier, QuizProgress, ResponseSnapshot, StudyTrack,
};
use study_core::time::{fixed_clock, fixed_now};

const QUIZ_URL: &str = "http://localhost:8080/subjects/geo/rivers.json";

const OPTIONS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

fn question(n: usize) -> Value {
    let answer = OPTIONS[n % OPTIONS.len()];
    json!({
        "question": format!("Question {n}?"),
        "options": OPTIONS,
        "answer": answer,
    })
}

fn quiz_document(questions: Vec<Value>) -> ResponseSnapshot {
    let body = json!({ "topic": "Rivers", "video": "", "questions": questions });
    ResponseSnapshot::ok("application/json", body.to_string())
}

fn network_with(questions: Vec<Value>) -> Arc<StaticNetwork> {
    Arc::new(StaticNetwork::new().with_route(QUIZ_URL, quiz_document(questions)))
}

fn quiz_service(network: Arc<StaticNetwork>, repo: &InMemoryRepository) -> QuizLoopService {
    let services = AppServices::new(
        Storage::from_repository(repo.clone()),
        network,
        fixed_clock(),
        StudyConfig::default(),
    );
    services.quiz_loop().as_ref().clone().with_seed(11)
}

fn track() -> StudyTrack {
    StudyTrack::new("geo", "rivers").unwrap()
}

async fn stored_progress(repo: &InMemoryRepository) -> Option<QuizProgress> {
    let raw = repo.get("quizProgress").await.unwrap()?;
    Some(serde_json::from_str(&raw).unwrap())
}

#[tokio::test]
async fn five_questions_three_correct_two_skipped() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(network_with((0..5).map(question).collect()), &repo);
    let mut session = quiz.start(track()).await.unwrap();
    assert_eq!(session.phase(), QuizPhase::InProgress);
    assert_eq!(session.title(), Some("Rivers"));
    assert_eq!(session.video(), None);
    assert!(!session.back_navigation_visible());

    let mut last = None;
    for step in ["answer", "skip", "answer", "skip", "answer"] {
        let current = session.current_question().unwrap();
        let index = current.index;
        let correct = current.question.answer().to_owned();
        let result = if step == "answer" {
            quiz.answer(&mut session, index, &correct).await.unwrap()
        } else {
            quiz.skip(&mut session, index).await.unwrap()
        };
        assert!(result.persisted);
        last = Some(result);
    }

    let outcome = last.and_then(|step| step.outcome).unwrap();
    assert_eq!(outcome.score, 3);
    assert_eq!(outcome.attempted, 3);
    assert_eq!(outcome.wrong, 0);
    assert_eq!(outcome.unattempted, 2);
    assert!((outcome.percentage - 60.0).abs() < 1e-9);
    assert_eq!(outcome.tier, FeedbackTier::Good);
    assert_eq!(outcome.reason, CompletionReason::Finished);
    assert_eq!(
        quiz.feedback_message(&outcome).await,
        "Very good, User! You are on the right track."
    );

    assert!(session.back_navigation_visible());
    assert!(stored_progress(&repo).await.is_none());
    let history: Value =
        serde_json::from_str(&repo.get("deepStudyHistory").await.unwrap().unwrap()).unwrap();
    assert_eq!(
        history,
        json!([{
            "subject": "geo", "topic": "rivers", "score": 3, "total": 5,
            "date": "14 November 2023"
        }])
    );
}

#[tokio::test]
async fn progress_is_saved_before_the_index_moves() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(network_with((0..4).map(question).collect()), &repo);
    let mut session = quiz.start(track()).await.unwrap();

    let wrong = {
        let current = session.current_question().unwrap();
        current
            .question
            .options()
            .iter()
            .find(|opt| !current.question.is_correct(opt))
            .cloned()
            .unwrap()
    };
    let step = quiz.answer(&mut session, 0, &wrong).await.unwrap();
    let feedback = step.feedback.unwrap();
    assert!(!feedback.is_correct);
    assert_ne!(feedback.correct_answer, wrong);

    let saved = stored_progress(&repo).await.unwrap();
    assert_eq!(saved.current_index, session.current_index());
    assert_eq!((saved.score, saved.attempted_count), (0, 1));

    let err = quiz.answer(&mut session, 0, &wrong).await.unwrap_err();
    assert!(matches!(err, SessionError::QuestionLocked { .. }));
    assert_eq!(session.attempted(), 1);
}

#[tokio::test]
async fn reload_resumes_with_the_same_question_order() {
    let repo = InMemoryRepository::new();
    let network = network_with((0..6).map(question).collect());
    let quiz = quiz_service(network.clone(), &repo);

    let mut first = quiz.start(track()).await.unwrap();
    for index in 0..2 {
        let answer = first.current_question().unwrap().question.answer().to_owned();
        quiz.answer(&mut first, index, &answer).await.unwrap();
    }
    let expected_prompt = first
        .current_question()
        .unwrap()
        .question
        .prompt()
        .to_owned();

    // A different seed proves the stored order is reused, not reshuffled.
    let reloaded = quiz_service(network, &repo).with_seed(99);
    let resumed = reloaded.start(track()).await.unwrap();
    assert!(resumed.was_resumed());
    assert_eq!(resumed.current_index(), 2);
    assert_eq!((resumed.score(), resumed.attempted()), (2, 2));
    assert_eq!(
        resumed.current_question().unwrap().question.prompt(),
        expected_prompt
    );
}

#[tokio::test]
async fn progress_for_another_topic_is_ignored() {
    let repo = InMemoryRepository::new();
    let foreign = QuizProgress {
        subject: "geo".into(),
        topic: "mountains".into(),
        current_index: 3,
        score: 2,
        attempted_count: 3,
        order: None,
    };
    repo.set("quizProgress", &serde_json::to_string(&foreign).unwrap())
        .await
        .unwrap();

    let quiz = quiz_service(network_with((0..5).map(question).collect()), &repo);
    let session = quiz.start(track()).await.unwrap();
    assert!(!session.was_resumed());
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.score(), 0);
}

#[tokio::test]
async fn inconsistent_progress_starts_fresh() {
    let repo = InMemoryRepository::new();
    repo.set(
        "quizProgress",
        r#"{"subject":"geo","topic":"rivers","currentIndex":1,"score":4,"attemptedCount":1}"#,
    )
    .await
    .unwrap();

    let quiz = quiz_service(network_with((0..5).map(question).collect()), &repo);
    let session = quiz.start(track()).await.unwrap();
    assert!(!session.was_resumed());
    assert_eq!(session.score(), 0);
}

#[tokio::test]
async fn finished_progress_left_behind_does_not_record_twice() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(network_with((0..2).map(question).collect()), &repo);
    let mut session = quiz.start(track()).await.unwrap();
    quiz.skip(&mut session, 0).await.unwrap();

    // The last step's progress write lands but clearing it afterwards fails.
    let leftover = QuizProgress {
        current_index: 2,
        score: 0,
        attempted_count: 0,
        ..stored_progress(&repo).await.unwrap()
    };
    repo.set("quizProgress", &serde_json::to_string(&leftover).unwrap())
        .await
        .unwrap();
    repo.set(
        "deepStudyHistory",
        r#"[{"subject":"geo","topic":"rivers","score":0,"total":2,"date":"14 November 2023"}]"#,
    )
    .await
    .unwrap();

    let again = quiz.start(track()).await.unwrap();
    assert_eq!(again.phase(), QuizPhase::InProgress);
    assert!(!again.was_resumed());
    assert_eq!(again.current_index(), 0);
    assert!(stored_progress(&repo).await.is_none());
    let history: Vec<Value> =
        serde_json::from_str(&repo.get("deepStudyHistory").await.unwrap().unwrap()).unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn malformed_question_is_rejected_and_the_rest_load() {
    let repo = InMemoryRepository::new();
    let mut questions: Vec<Value> = (0..3).map(question).collect();
    questions.push(json!({ "question": "No answer", "options": ["a", "b"] }));
    questions.push(json!({ "question": "Bad answer", "options": ["a", "b"], "answer": "c" }));

    let quiz = quiz_service(network_with(questions), &repo);
    let session = quiz.start(track()).await.unwrap();
    assert_eq!(session.total(), 3);
    assert_eq!(session.rejected_count(), 2);
}

#[tokio::test]
async fn quiz_with_only_malformed_questions_fails_to_load() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(
        network_with(vec![json!({ "question": "x", "options": [], "answer": "x" })]),
        &repo,
    );

    let mut session = services::QuizSession::loading(track());
    let err = quiz.load(&mut session).await.unwrap_err();
    assert!(matches!(err, SessionError::NoValidQuestions { rejected: 1 }));
    assert_eq!(session.phase(), QuizPhase::Failed);
    assert!(session.failure().is_some());
}

#[tokio::test]
async fn missing_quiz_file_fails_with_friendly_message() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(Arc::new(StaticNetwork::new()), &repo);

    let err = quiz.start(track()).await.unwrap_err();
    assert!(matches!(err, SessionError::Load(_)));
    assert_eq!(
        err.user_message(),
        "The quiz for this topic has not been uploaded yet."
    );

    let err = quiz.start_from_query(Some("geo"), None).await.unwrap_err();
    assert!(matches!(err, SessionError::MissingIdentifiers(_)));
}

#[tokio::test]
async fn empty_quiz_completes_at_zero_percent() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(network_with(Vec::new()), &repo);

    let session = quiz.start(track()).await.unwrap();
    assert_eq!(session.phase(), QuizPhase::Completed);
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.total, 0);
    assert!(outcome.percentage.abs() < f64::EPSILON);
}

#[tokio::test]
async fn timeout_completes_once_and_counts_unattempted() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(network_with((0..4).map(question).collect()), &repo);
    let mut session = quiz.start(track()).await.unwrap();
    let answer = session.current_question().unwrap().question.answer().to_owned();
    quiz.answer(&mut session, 0, &answer).await.unwrap();

    assert!(quiz.check_deadline(&mut session).await.is_none());

    let late = quiz
        .clone()
        .with_clock(Clock::fixed(fixed_now() + Duration::minutes(50)));
    let outcome = late.check_deadline(&mut session).await.unwrap();
    assert_eq!(outcome.reason, CompletionReason::TimedOut);
    assert_eq!((outcome.attempted, outcome.unattempted), (1, 3));

    assert!(late.check_deadline(&mut session).await.is_none());
    assert!(matches!(
        quiz.expire(&mut session).await,
        Err(SessionError::Completed)
    ));
    assert!(matches!(
        quiz.skip(&mut session, 1).await,
        Err(SessionError::Completed)
    ));
}

#[tokio::test(start_paused = true)]
async fn timer_fires_after_the_budget() {
    let repo = InMemoryRepository::new();
    let config = StudyConfig {
        quiz_time_budget: StdDuration::from_secs(60),
        ..StudyConfig::default()
    };
    let services = AppServices::new(
        Storage::from_repository(repo.clone()),
        network_with((0..3).map(question).collect()),
        Clock::default_clock(),
        config,
    );
    let quiz = services.quiz_loop();
    let mut session = quiz.start(track()).await.unwrap();

    let started = tokio::time::Instant::now();
    quiz.wait_for_deadline(&session).await;
    assert!(started.elapsed() >= StdDuration::from_secs(59));

    let outcome = quiz.expire(&mut session).await.unwrap();
    assert_eq!(outcome.reason, CompletionReason::TimedOut);
    assert_eq!(outcome.unattempted, 3);
}

#[tokio::test]
async fn dropped_progress_write_does_not_block_the_quiz() {
    let repo = InMemoryRepository::new();
    let quiz = quiz_service(network_with((0..3).map(question).collect()), &repo);
    let mut session = quiz.start(track()).await.unwrap();

    repo.set_unavailable(true);
    let step = quiz.skip(&mut session, 0).await.unwrap();
    assert!(!step.persisted);
    assert_eq!(session.current_index(), 1);
}
