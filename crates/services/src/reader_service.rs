use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use storage::PersistenceStore;
use study_core::annotate::{Rect, comment_anchor};
use study_core::model::{Comment, PageNumber, Request, StudyTrack};

use crate::Clock;
use crate::config::StudyConfig;
use crate::error::{ContentError, NetworkError};
use crate::offline::Fetcher;

/// Shape of `{root}/{subject}/{topic}/info.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct TopicInfo {
    #[serde(rename = "totalFiles")]
    total_files: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// A saved snapshot carrying the learner's highlights.
    Snapshot,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNavigation {
    pub has_prev: bool,
    pub has_next: bool,
}

/// The page a learner is reading, with its annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSession {
    track: StudyTrack,
    total_pages: u32,
    page: PageNumber,
    markup: String,
    source: PageSource,
    comments: Vec<Comment>,
}

impl ReaderSession {
    #[must_use]
    pub fn track(&self) -> &StudyTrack {
        &self.track
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    #[must_use]
    pub fn page(&self) -> PageNumber {
        self.page
    }

    #[must_use]
    pub fn markup(&self) -> &str {
        &self.markup
    }

    #[must_use]
    pub fn source(&self) -> PageSource {
        self.source
    }

    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Heading text for the topic.
    #[must_use]
    pub fn heading(&self) -> String {
        self.track.display_topic()
    }

    #[must_use]
    pub fn navigation(&self) -> PageNavigation {
        PageNavigation {
            has_prev: self.page.value() > 1,
            has_next: self.page.value() < self.total_pages,
        }
    }
}

/// Result of adding a comment; `persisted` is false when the write was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentAdded {
    pub comment: Comment,
    pub persisted: bool,
}

/// Loads paginated study content and keeps per-page annotations.
#[derive(Clone)]
pub struct ReaderService {
    clock: Clock,
    network: Arc<dyn Fetcher>,
    store: PersistenceStore,
    config: StudyConfig,
}

impl ReaderService {
    #[must_use]
    pub fn new(
        clock: Clock,
        network: Arc<dyn Fetcher>,
        store: PersistenceStore,
        config: StudyConfig,
    ) -> Self {
        Self {
            clock,
            network,
            store,
            config,
        }
    }

    /// Open a topic from page query parameters and load its first page.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::MissingIdentifiers` if subject or topic is
    /// absent, or any error from [`ReaderService::open_track`].
    pub async fn open(
        &self,
        subject: Option<&str>,
        topic: Option<&str>,
    ) -> Result<ReaderSession, ContentError> {
        let track = StudyTrack::from_query(subject, topic)?;
        self.open_track(track).await
    }

    /// Read the topic's page count and load page 1.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` if the topic info or the first page cannot be loaded.
    pub async fn open_track(&self, track: StudyTrack) -> Result<ReaderSession, ContentError> {
        let total_pages = self.topic_info(&track).await?.total_files;
        let page = PageNumber::FIRST;
        let (markup, source) = self.page_markup(&track, page, total_pages).await?;
        let comments = self.store.comments(&track, page).await;
        Ok(ReaderSession {
            track,
            total_pages,
            page,
            markup,
            source,
            comments,
        })
    }

    /// Replace the session's page with `page`. The session is untouched on error.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::PageOutOfRange` or `ContentError::Page`.
    pub async fn load_page(
        &self,
        session: &mut ReaderSession,
        page: PageNumber,
    ) -> Result<(), ContentError> {
        let (markup, source) = self
            .page_markup(&session.track, page, session.total_pages)
            .await?;
        session.comments = self.store.comments(&session.track, page).await;
        session.page = page;
        session.markup = markup;
        session.source = source;
        Ok(())
    }

    /// Load the following page. Returns false when already on the last page.
    ///
    /// # Errors
    ///
    /// Same as [`ReaderService::load_page`].
    pub async fn next_page(&self, session: &mut ReaderSession) -> Result<bool, ContentError> {
        if !session.navigation().has_next {
            return Ok(false);
        }
        self.load_page(session, session.page.next()).await?;
        Ok(true)
    }

    /// Load the preceding page. Returns false when already on the first page.
    ///
    /// # Errors
    ///
    /// Same as [`ReaderService::load_page`].
    pub async fn previous_page(&self, session: &mut ReaderSession) -> Result<bool, ContentError> {
        let Some(previous) = session.page.previous() else {
            return Ok(false);
        };
        self.load_page(session, previous).await?;
        Ok(true)
    }

    /// Save `markup` (with highlight state) as the current page's snapshot.
    ///
    /// Returns whether the snapshot was persisted.
    pub async fn save_snapshot(&self, session: &mut ReaderSession, markup: impl Into<String>) -> bool {
        session.markup = markup.into();
        session.source = PageSource::Snapshot;
        self.store
            .save_content_snapshot(&session.track, session.page, &session.markup)
            .await
            .is_ok()
    }

    /// Attach a comment to the current page, anchored beside `selection`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Comment` if `text` is blank.
    pub async fn add_comment(
        &self,
        session: &mut ReaderSession,
        text: &str,
        selection: &Rect,
        container: &Rect,
    ) -> Result<CommentAdded, ContentError> {
        let anchor = comment_anchor(selection, container);
        let comment = Comment::new(self.clock.timestamp_millis(), text, anchor)?;
        let persisted = self
            .store
            .append_comment(&session.track, session.page, comment.clone())
            .await
            .is_ok();
        session.comments.push(comment.clone());
        Ok(CommentAdded { comment, persisted })
    }

    //
    // ─── LOADING ───────────────────────────────────────────────────────────────
    //

    async fn topic_info(&self, track: &StudyTrack) -> Result<TopicInfo, ContentError> {
        let request = Request::resolve(&self.config.origin, &self.config.topic_info_path(track))
            .map_err(|err| ContentError::Info(err.into()))?;
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(ContentError::Info)?;
        if !response.is_success() {
            return Err(ContentError::Info(NetworkError::Status {
                status: response.status,
                url: request.url().to_string(),
            }));
        }
        serde_json::from_slice(&response.body).map_err(|err| ContentError::MalformedInfo(err.to_string()))
    }

    async fn page_markup(
        &self,
        track: &StudyTrack,
        page: PageNumber,
        total_pages: u32,
    ) -> Result<(String, PageSource), ContentError> {
        if page.value() > total_pages {
            return Err(ContentError::PageOutOfRange {
                page,
                total: total_pages,
            });
        }

        if let Some(snapshot) = self.store.content_snapshot(track, page).await {
            debug!(track = ?track, %page, "serving saved page snapshot");
            return Ok((snapshot, PageSource::Snapshot));
        }

        let request = Request::resolve(&self.config.origin, &self.config.page_path(track, page))
            .map_err(|err| ContentError::Page {
                page,
                source: err.into(),
            })?;
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|source| ContentError::Page { page, source })?;
        if !response.is_success() {
            warn!(track = ?track, %page, status = response.status, "page fetch failed");
            return Err(ContentError::Page {
                page,
                source: NetworkError::Status {
                    status: response.status,
                    url: request.url().to_string(),
                },
            });
        }
        Ok((response.text(), PageSource::Network))
    }
}
