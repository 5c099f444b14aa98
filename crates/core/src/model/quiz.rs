use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::StudyTrack;

//
// ─── RESUMABLE PROGRESS ────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress belongs to {subject}/{topic}")]
    OtherTrack { subject: String, topic: String },

    #[error("score ({score}) exceeds attempted count ({attempted})")]
    ScoreAboveAttempted { score: u32, attempted: u32 },

    #[error("attempted count ({attempted}) exceeds current index ({index})")]
    AttemptedAboveIndex { attempted: u32, index: usize },

    #[error("current index ({index}) exceeds question count ({total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("every one of the {total} questions was already answered or skipped")]
    AlreadyFinished { total: usize },
}

/// Singleton record that lets a quiz continue after a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
    pub subject: String,
    pub topic: String,
    pub current_index: usize,
    pub score: u32,
    #[serde(default)]
    pub attempted_count: u32,
    /// Question permutation used by the session, as indices into the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<usize>>,
}

impl QuizProgress {
    #[must_use]
    pub fn belongs_to(&self, track: &StudyTrack) -> bool {
        self.subject == track.subject() && self.topic == track.topic()
    }

    /// Check that this record can seed a session for `track` with `total` questions.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` when the record is for another track, its
    /// counters break `score <= attempted <= index <= total`, or it points
    /// past the last question (the quiz already finished).
    pub fn check_resumable(&self, track: &StudyTrack, total: usize) -> Result<(), ProgressError> {
        if !self.belongs_to(track) {
            return Err(ProgressError::OtherTrack {
                subject: self.subject.clone(),
                topic: self.topic.clone(),
            });
        }
        if self.score > self.attempted_count {
            return Err(ProgressError::ScoreAboveAttempted {
                score: self.score,
                attempted: self.attempted_count,
            });
        }
        let attempted = usize::try_from(self.attempted_count).unwrap_or(usize::MAX);
        if attempted > self.current_index {
            return Err(ProgressError::AttemptedAboveIndex {
                attempted: self.attempted_count,
                index: self.current_index,
            });
        }
        if self.current_index > total {
            return Err(ProgressError::IndexOutOfRange {
                index: self.current_index,
                total,
            });
        }
        if self.current_index == total {
            return Err(ProgressError::AlreadyFinished { total });
        }
        Ok(())
    }

    /// The stored permutation, if it is a valid permutation of `0..total`.
    #[must_use]
    pub fn order_for(&self, total: usize) -> Option<Vec<usize>> {
        let order = self.order.as_ref()?;
        if order.len() != total {
            return None;
        }
        let mut seen = vec![false; total];
        for &idx in order {
            if idx >= total || seen[idx] {
                return None;
            }
            seen[idx] = true;
        }
        Some(order.clone())
    }
}

//
// ─── HISTORY ───────────────────────────────────────────────────────────────────
//

/// Immutable record of a finished quiz, appended to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub subject: String,
    pub topic: String,
    pub score: u32,
    pub total: u32,
    pub date: String,
}

impl QuizResult {
    /// Percentage score, 0 when the quiz had no questions.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        percentage(self.score, self.total)
    }
}

fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(total) * 100.0
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Every question was answered or skipped.
    Finished,
    /// The wall-clock budget ran out.
    TimedOut,
}

/// Feedback band chosen from the final percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTier {
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl FeedbackTier {
    #[must_use]
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 80.0 {
            FeedbackTier::Excellent
        } else if pct >= 60.0 {
            FeedbackTier::Good
        } else if pct >= 40.0 {
            FeedbackTier::Fair
        } else {
            FeedbackTier::NeedsWork
        }
    }

    #[must_use]
    pub fn message(self, name: &str) -> String {
        match self {
            FeedbackTier::Excellent => format!("Bravo, {name}! Excellent performance!"),
            FeedbackTier::Good => format!("Very good, {name}! You are on the right track."),
            FeedbackTier::Fair => "Good effort, practise a little more.".to_owned(),
            FeedbackTier::NeedsWork => format!("{name}, you need more hard work."),
        }
    }
}

/// Final statistics for a completed quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizOutcome {
    pub total: u32,
    pub attempted: u32,
    pub score: u32,
    pub wrong: u32,
    pub unattempted: u32,
    pub percentage: f64,
    pub tier: FeedbackTier,
    pub reason: CompletionReason,
}

impl QuizOutcome {
    #[must_use]
    pub fn compute(total: u32, attempted: u32, score: u32, reason: CompletionReason) -> Self {
        let percentage = percentage(score, total);
        Self {
            total,
            attempted,
            score,
            wrong: attempted.saturating_sub(score),
            unattempted: total.saturating_sub(attempted),
            percentage,
            tier: FeedbackTier::from_percentage(percentage),
            reason,
        }
    }
}

//
// ─── MILESTONES ────────────────────────────────────────────────────────────────
//

/// Scores that trigger a celebratory toast when reached exactly.
pub const MILESTONE_SCORES: [u32; 3] = [5, 10, 15];

/// Transient notification for reaching a milestone score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    score: u32,
}

impl Milestone {
    /// Returns a milestone if `score` is exactly one of `MILESTONE_SCORES`.
    #[must_use]
    pub fn for_score(score: u32) -> Option<Self> {
        MILESTONE_SCORES
            .contains(&score)
            .then_some(Self { score })
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn message(&self, name: &str) -> String {
        match self.score {
            5 => format!("Well done, {name}!"),
            10 => format!("Superb, {name}!"),
            _ => format!("Outstanding performance, {name}!"),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(index: usize, score: u32, attempted: u32) -> QuizProgress {
        QuizProgress {
            subject: "geo".into(),
            topic: "rivers".into(),
            current_index: index,
            score,
            attempted_count: attempted,
            order: None,
        }
    }

    #[test]
    fn progress_uses_camel_case_keys() {
        let json = serde_json::to_value(progress(2, 1, 2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subject": "geo", "topic": "rivers",
                "currentIndex": 2, "score": 1, "attemptedCount": 2
            })
        );
    }

    #[test]
    fn legacy_progress_without_attempted_count_parses() {
        let parsed: QuizProgress = serde_json::from_str(
            r#"{"subject":"geo","topic":"rivers","currentIndex":3,"score":2}"#,
        )
        .unwrap();
        assert_eq!(parsed.attempted_count, 0);
    }

    #[test]
    fn resumable_check_enforces_track_and_invariants() {
        let track = StudyTrack::new("geo", "rivers").unwrap();
        let other = StudyTrack::new("geo", "mountains").unwrap();

        assert!(progress(2, 1, 2).check_resumable(&track, 5).is_ok());
        assert!(matches!(
            progress(2, 1, 2).check_resumable(&other, 5),
            Err(ProgressError::OtherTrack { .. })
        ));
        assert!(matches!(
            progress(2, 3, 2).check_resumable(&track, 5),
            Err(ProgressError::ScoreAboveAttempted { .. })
        ));
        assert!(matches!(
            progress(1, 1, 2).check_resumable(&track, 5),
            Err(ProgressError::AttemptedAboveIndex { .. })
        ));
        assert!(matches!(
            progress(6, 1, 2).check_resumable(&track, 5),
            Err(ProgressError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            progress(5, 3, 4).check_resumable(&track, 5),
            Err(ProgressError::AlreadyFinished { total: 5 })
        ));
    }

    #[test]
    fn stored_order_must_be_a_permutation() {
        let mut p = progress(0, 0, 0);
        p.order = Some(vec![2, 0, 1]);
        assert_eq!(p.order_for(3), Some(vec![2, 0, 1]));
        assert_eq!(p.order_for(4), None);
        p.order = Some(vec![0, 0, 1]);
        assert_eq!(p.order_for(3), None);
    }

    #[test]
    fn outcome_handles_empty_quiz() {
        let outcome = QuizOutcome::compute(0, 0, 0, CompletionReason::Finished);
        assert!(outcome.percentage.abs() < f64::EPSILON);
        assert_eq!(outcome.tier, FeedbackTier::NeedsWork);
    }

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(FeedbackTier::from_percentage(80.0), FeedbackTier::Excellent);
        assert_eq!(FeedbackTier::from_percentage(79.9), FeedbackTier::Good);
        assert_eq!(FeedbackTier::from_percentage(60.0), FeedbackTier::Good);
        assert_eq!(FeedbackTier::from_percentage(40.0), FeedbackTier::Fair);
        assert_eq!(FeedbackTier::from_percentage(39.0), FeedbackTier::NeedsWork);
    }

    #[test]
    fn milestones_are_exact_scores() {
        assert!(Milestone::for_score(4).is_none());
        assert!(Milestone::for_score(6).is_none());
        assert_eq!(Milestone::for_score(10).map(|m| m.score()), Some(10));
        assert_eq!(Milestone::for_score(5).unwrap().message("Asha"), "Well done, Asha!");
    }
}
