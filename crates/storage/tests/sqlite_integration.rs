use storage::PersistenceStore;
use storage::repository::{CacheStorage, KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use study_core::annotate::Point;
use study_core::model::{
    Comment, PageNumber, QuizProgress, QuizResult, RequestKey, ResponseSnapshot, StudyTrack, Theme,
};

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn key(path: &str) -> RequestKey {
    RequestKey::from_persisted(format!("GET http://localhost:8080{path}"))
}

#[tokio::test]
async fn records_overwrite_and_remove() {
    let repo = connect("memdb_records").await;

    assert_eq!(repo.get("theme").await.unwrap(), None);
    repo.set("theme", "light").await.unwrap();
    repo.set("theme", "dark").await.unwrap();
    assert_eq!(repo.get("theme").await.unwrap().as_deref(), Some("dark"));

    repo.remove("theme").await.unwrap();
    repo.remove("theme").await.unwrap();
    assert_eq!(repo.get("theme").await.unwrap(), None);
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.set("deepStudyUser", r#"{"name":"Asha"}"#).await.unwrap();
    repo.migrate().await.expect("second migrate");
    assert!(repo.get("deepStudyUser").await.unwrap().is_some());
}

#[tokio::test]
async fn caches_store_overwrite_and_delete_entries() {
    let repo = connect("memdb_caches").await;

    repo.open_cache("quiz-files-v8").await.unwrap();
    repo.open_cache("quiz-files-v9").await.unwrap();
    repo.open_cache("quiz-files-v9").await.unwrap();
    assert_eq!(
        repo.cache_names().await.unwrap(),
        vec!["quiz-files-v8", "quiz-files-v9"]
    );

    let style = key("/style.css");
    repo.put("quiz-files-v9", &style, &ResponseSnapshot::ok("text/css", "a{}"))
        .await
        .unwrap();
    repo.put("quiz-files-v9", &style, &ResponseSnapshot::ok("text/css", "b{}"))
        .await
        .unwrap();
    let cached = repo.lookup("quiz-files-v9", &style).await.unwrap().unwrap();
    assert_eq!(cached.text(), "b{}");
    assert_eq!(cached.content_type.as_deref(), Some("text/css"));
    assert_eq!(repo.keys("quiz-files-v9").await.unwrap(), vec![style.clone()]);
    assert!(repo.lookup("quiz-files-v8", &style).await.unwrap().is_none());

    assert!(repo.delete_cache("quiz-files-v9").await.unwrap());
    assert!(!repo.delete_cache("quiz-files-v9").await.unwrap());
    assert!(repo.lookup_any(&style).await.unwrap().is_none());
    assert_eq!(repo.cache_names().await.unwrap(), vec!["quiz-files-v8"]);
}

#[tokio::test]
async fn lookup_any_searches_every_cache() {
    let repo = connect("memdb_lookup_any").await;
    let offline = key("/offline.html");
    repo.open_cache("quiz-files-v8").await.unwrap();
    repo.put(
        "quiz-files-v8",
        &offline,
        &ResponseSnapshot::ok("text/html", "offline"),
    )
    .await
    .unwrap();

    let found = repo.lookup_any(&offline).await.unwrap().unwrap();
    assert_eq!(found.text(), "offline");
}

#[tokio::test]
async fn persistence_store_round_trips_over_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_persistence?mode=memory&cache=shared")
        .await
        .expect("storage");
    let store: PersistenceStore = storage.persistence();
    let track = StudyTrack::new("history", "indus_valley").unwrap();

    let comment = Comment::new(1_700_000_000_000, "Harappa", Point::new(12.5, 40.0)).unwrap();
    store
        .append_comment(&track, PageNumber::FIRST, comment.clone())
        .await
        .unwrap();
    assert_eq!(store.comments(&track, PageNumber::FIRST).await, vec![comment]);

    let progress = QuizProgress {
        subject: "history".into(),
        topic: "indus_valley".into(),
        current_index: 2,
        score: 1,
        attempted_count: 2,
        order: Some(vec![3, 1, 0, 2]),
    };
    store.save_quiz_progress(&progress).await.unwrap();
    assert_eq!(store.quiz_progress().await, Some(progress));
    store.clear_quiz_progress().await.unwrap();
    assert_eq!(store.quiz_progress().await, None);

    let result = QuizResult {
        subject: "history".into(),
        topic: "indus_valley".into(),
        score: 3,
        total: 5,
        date: "14 November 2023".into(),
    };
    store.append_history(result.clone()).await.unwrap();
    assert_eq!(store.history().await, vec![result]);

    store.save_theme(Theme::Dark).await.unwrap();
    assert_eq!(store.theme().await, Theme::Dark);
}
