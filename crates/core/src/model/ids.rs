use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrackError {
    #[error("subject is missing")]
    MissingSubject,

    #[error("topic is missing")]
    MissingTopic,
}

/// A subject + topic pair; every persisted study record is namespaced by it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudyTrack {
    subject: String,
    topic: String,
}

impl StudyTrack {
    /// Build a track from raw identifiers (typically query parameters).
    ///
    /// # Errors
    ///
    /// Returns `TrackError` if either identifier is blank.
    pub fn new(subject: impl Into<String>, topic: impl Into<String>) -> Result<Self, TrackError> {
        let subject = subject.into().trim().to_owned();
        let topic = topic.into().trim().to_owned();
        if subject.is_empty() {
            return Err(TrackError::MissingSubject);
        }
        if topic.is_empty() {
            return Err(TrackError::MissingTopic);
        }
        Ok(Self { subject, topic })
    }

    /// Build a track from optional identifiers, as read from a URL query.
    ///
    /// # Errors
    ///
    /// Returns `TrackError` if either identifier is absent or blank.
    pub fn from_query(subject: Option<&str>, topic: Option<&str>) -> Result<Self, TrackError> {
        let subject = subject.ok_or(TrackError::MissingSubject)?;
        let topic = topic.ok_or(TrackError::MissingTopic)?;
        Self::new(subject, topic)
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Topic formatted for headings: underscores become spaces, upper-cased.
    #[must_use]
    pub fn display_topic(&self) -> String {
        self.topic.replace('_', " ").to_uppercase()
    }
}

impl fmt::Debug for StudyTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StudyTrack({}/{})", self.subject, self.topic)
    }
}

/// One-based page number within a topic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageNumber(u32);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    /// Creates a page number, returning `None` for zero.
    #[must_use]
    pub fn new(page: u32) -> Option<Self> {
        (page > 0).then_some(Self(page))
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        Self::new(self.0 - 1)
    }

    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageNumber({})", self.0)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_rejects_blank_identifiers() {
        assert_eq!(StudyTrack::new(" ", "t").unwrap_err(), TrackError::MissingSubject);
        assert_eq!(StudyTrack::new("s", "").unwrap_err(), TrackError::MissingTopic);
        assert_eq!(
            StudyTrack::from_query(Some("history"), None).unwrap_err(),
            TrackError::MissingTopic
        );
    }

    #[test]
    fn display_topic_is_heading_style() {
        let track = StudyTrack::new("history", "indus_valley").unwrap();
        assert_eq!(track.display_topic(), "INDUS VALLEY");
    }

    #[test]
    fn page_number_is_one_based() {
        assert!(PageNumber::new(0).is_none());
        assert_eq!(PageNumber::FIRST.previous(), None);
        assert_eq!(PageNumber::FIRST.next().value(), 2);
    }
}
