//! Persisted key namespace.
//!
//! The exact key strings are shared with previously stored data and must not
//! change: `content_{subject}_{topic}_{page}`, `comments_{subject}_{topic}_{page}`,
//! `quizProgress`, `deepStudyHistory`, `theme`, `deepStudyUser`.

use std::fmt;

use crate::model::{PageNumber, StudyTrack};

/// Record kinds stored by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Content,
    Comments,
    QuizProgress,
    History,
    Theme,
    User,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Content => "content",
            RecordKind::Comments => "comments",
            RecordKind::QuizProgress => "quizProgress",
            RecordKind::History => "deepStudyHistory",
            RecordKind::Theme => "theme",
            RecordKind::User => "deepStudyUser",
        }
    }
}

/// Composite key for a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Content { track: StudyTrack, page: PageNumber },
    Comments { track: StudyTrack, page: PageNumber },
    QuizProgress,
    History,
    Theme,
    User,
}

impl RecordKey {
    #[must_use]
    pub fn content(track: &StudyTrack, page: PageNumber) -> Self {
        Self::Content {
            track: track.clone(),
            page,
        }
    }

    #[must_use]
    pub fn comments(track: &StudyTrack, page: PageNumber) -> Self {
        Self::Comments {
            track: track.clone(),
            page,
        }
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordKey::Content { .. } => RecordKind::Content,
            RecordKey::Comments { .. } => RecordKind::Comments,
            RecordKey::QuizProgress => RecordKind::QuizProgress,
            RecordKey::History => RecordKind::History,
            RecordKey::Theme => RecordKind::Theme,
            RecordKey::User => RecordKind::User,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Content { track, page } | RecordKey::Comments { track, page } => write!(
                f,
                "{}_{}_{}_{}",
                self.kind().as_str(),
                track.subject(),
                track.topic(),
                page
            ),
            _ => f.write_str(self.kind().as_str()),
        }
    }
}
