//! Typed access to persisted study records.
//!
//! Reads never fail: a missing, unreadable or unparseable record is reported
//! as absent. Writes return `StorageError` so callers can surface a non-fatal
//! warning and carry on.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use study_core::RecordKey;
use study_core::model::{Comment, PageNumber, QuizProgress, QuizResult, StudyTrack, Theme, UserProfile};

use crate::repository::{KeyValueStore, StorageError};

#[derive(Clone)]
pub struct PersistenceStore {
    backend: Arc<dyn KeyValueStore>,
}

impl PersistenceStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Raw string stored under `key`, if readable.
    pub async fn read_raw(&self, key: &RecordKey) -> Option<String> {
        let name = key.to_string();
        match self.backend.get(&name).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %name, error = %err, "record read failed; treating as absent");
                None
            }
        }
    }

    /// JSON record stored under `key`; corrupt records read as absent.
    pub async fn read<T: DeserializeOwned>(&self, key: &RecordKey) -> Option<T> {
        let raw = self.read_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "corrupt record ignored");
                None
            }
        }
    }

    /// Overwrite the raw string under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the write.
    pub async fn write_raw(&self, key: &RecordKey, value: &str) -> Result<(), StorageError> {
        let name = key.to_string();
        self.backend.set(&name, value).await.inspect_err(|err| {
            tracing::warn!(key = %name, error = %err, "record write dropped");
        })
    }

    /// Serialize `value` as JSON and overwrite `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        key: &RecordKey,
        value: &T,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.write_raw(key, &raw).await
    }

    /// Entries of the JSON list under `key` that parse as `T`.
    ///
    /// Entries of another shape are skipped, not dropped from storage.
    pub async fn read_list<T: DeserializeOwned>(&self, key: &RecordKey) -> Vec<T> {
        let entries: Vec<Value> = self.read(key).await.unwrap_or_default();
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "skipping unreadable list entry");
                    None
                }
            })
            .collect()
    }

    /// Push `item` onto the JSON list under `key`.
    ///
    /// Existing entries are kept as stored, whatever their shape. A missing
    /// record, or one that is not a JSON list, starts empty. Returns the new
    /// list length.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the updated list cannot be written.
    pub async fn append<T: Serialize>(
        &self,
        key: &RecordKey,
        item: T,
    ) -> Result<usize, StorageError> {
        let mut entries: Vec<Value> = self.read(key).await.unwrap_or_default();
        let item = serde_json::to_value(item)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        entries.push(item);
        self.write(key, &entries).await?;
        Ok(entries.len())
    }

    /// Delete `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the removal.
    pub async fn remove(&self, key: &RecordKey) -> Result<(), StorageError> {
        let name = key.to_string();
        self.backend.remove(&name).await.inspect_err(|err| {
            tracing::warn!(key = %name, error = %err, "record removal dropped");
        })
    }

    //
    // ─── PAGE RECORDS ──────────────────────────────────────────────────────────
    //

    pub async fn content_snapshot(&self, track: &StudyTrack, page: PageNumber) -> Option<String> {
        self.read_raw(&RecordKey::content(track, page)).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be written.
    pub async fn save_content_snapshot(
        &self,
        track: &StudyTrack,
        page: PageNumber,
        markup: &str,
    ) -> Result<(), StorageError> {
        self.write_raw(&RecordKey::content(track, page), markup).await
    }

    pub async fn comments(&self, track: &StudyTrack, page: PageNumber) -> Vec<Comment> {
        self.read_list(&RecordKey::comments(track, page)).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the comment list cannot be written.
    pub async fn append_comment(
        &self,
        track: &StudyTrack,
        page: PageNumber,
        comment: Comment,
    ) -> Result<usize, StorageError> {
        self.append(&RecordKey::comments(track, page), comment).await
    }

    //
    // ─── QUIZ RECORDS ──────────────────────────────────────────────────────────
    //

    pub async fn quiz_progress(&self) -> Option<QuizProgress> {
        self.read(&RecordKey::QuizProgress).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the progress record cannot be written.
    pub async fn save_quiz_progress(&self, progress: &QuizProgress) -> Result<(), StorageError> {
        self.write(&RecordKey::QuizProgress, progress).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the progress record cannot be removed.
    pub async fn clear_quiz_progress(&self) -> Result<(), StorageError> {
        self.remove(&RecordKey::QuizProgress).await
    }

    pub async fn history(&self) -> Vec<QuizResult> {
        self.read_list(&RecordKey::History).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the history cannot be written.
    pub async fn append_history(&self, result: QuizResult) -> Result<usize, StorageError> {
        self.append(&RecordKey::History, result).await
    }

    //
    // ─── PREFERENCES ───────────────────────────────────────────────────────────
    //

    /// Stored theme; unknown values read as the default.
    pub async fn theme(&self) -> Theme {
        self.read_raw(&RecordKey::Theme)
            .await
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the theme cannot be written.
    pub async fn save_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.write_raw(&RecordKey::Theme, theme.as_str()).await
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.read(&RecordKey::User).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be written.
    pub async fn save_user(&self, profile: &UserProfile) -> Result<(), StorageError> {
        self.write(&RecordKey::User, profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use study_core::annotate::Point;

    fn store(repo: &InMemoryRepository) -> PersistenceStore {
        PersistenceStore::new(Arc::new(repo.clone()))
    }

    fn track() -> StudyTrack {
        StudyTrack::new("history", "indus_valley").unwrap()
    }

    #[tokio::test]
    async fn comments_append_in_order_per_page() {
        let repo = InMemoryRepository::new();
        let store = store(&repo);
        let page1 = PageNumber::FIRST;
        let page2 = page1.next();

        for (id, text) in [(1, "first"), (2, "second")] {
            let comment = Comment::new(id, text, Point::new(1.0, 2.0)).unwrap();
            store.append_comment(&track(), page1, comment).await.unwrap();
        }

        let texts: Vec<String> = store
            .comments(&track(), page1)
            .await
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(store.comments(&track(), page2).await.is_empty());
        assert!(
            repo.get("comments_history_indus_valley_1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn corrupt_records_read_as_absent() {
        let repo = InMemoryRepository::new();
        repo.set("quizProgress", "{not json").await.unwrap();
        repo.set("theme", "purple").await.unwrap();
        let store = store(&repo);

        assert!(store.quiz_progress().await.is_none());
        assert_eq!(store.theme().await, Theme::Light);
    }

    #[tokio::test]
    async fn append_recovers_from_corrupt_list() {
        let repo = InMemoryRepository::new();
        repo.set("deepStudyHistory", "oops").await.unwrap();
        let store = store(&repo);
        let result = QuizResult {
            subject: "s".into(),
            topic: "t".into(),
            score: 1,
            total: 2,
            date: "1 January 2024".into(),
        };
        assert_eq!(store.append_history(result.clone()).await.unwrap(), 1);
        assert_eq!(store.history().await, vec![result]);
    }

    #[tokio::test]
    async fn append_keeps_entries_of_unexpected_shape() {
        let repo = InMemoryRepository::new();
        repo.set(
            "deepStudyHistory",
            r#"[{"subject":"s","topic":"t","score":1,"total":2,"date":"1 January 2024"},{"legacy":true}]"#,
        )
        .await
        .unwrap();
        let store = store(&repo);
        assert_eq!(store.history().await.len(), 1);

        let result = QuizResult {
            subject: "s".into(),
            topic: "u".into(),
            score: 2,
            total: 2,
            date: "2 January 2024".into(),
        };
        assert_eq!(store.append_history(result.clone()).await.unwrap(), 3);

        let raw: Value =
            serde_json::from_str(&repo.get("deepStudyHistory").await.unwrap().unwrap()).unwrap();
        assert_eq!(raw[1], serde_json::json!({ "legacy": true }));
        let history = store.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], result);
    }

    #[tokio::test]
    async fn failed_writes_are_reported_not_panicking() {
        let repo = InMemoryRepository::new();
        let store = store(&repo);
        repo.set_unavailable(true);

        assert!(store.save_theme(Theme::Dark).await.is_err());
        assert!(store.user().await.is_none());

        repo.set_unavailable(false);
        store.save_theme(Theme::Dark).await.unwrap();
        assert_eq!(store.theme().await, Theme::Dark);
        assert_eq!(repo.get("theme").await.unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn content_snapshot_is_stored_verbatim() {
        let repo = InMemoryRepository::new();
        let store = store(&repo);
        let markup = r#"<p><span class="word highlighted">Indus</span></p>"#;
        store
            .save_content_snapshot(&track(), PageNumber::FIRST, markup)
            .await
            .unwrap();
        assert_eq!(
            store.content_snapshot(&track(), PageNumber::FIRST).await.as_deref(),
            Some(markup)
        );
    }
}
