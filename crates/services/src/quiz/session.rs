use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use study_core::model::{
    CompletionReason, Milestone, Question, QuestionSet, QuizOutcome, QuizProgress, StudyTrack,
};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Loading,
    InProgress,
    Completed,
    /// Loading failed; the session shows an error and accepts no input.
    Failed,
}

/// The question currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedQuestion<'a> {
    /// Zero-based position; pass it back to `answer` / `skip`.
    pub index: usize,
    pub total: usize,
    pub question: &'a Question,
}

impl PresentedQuestion<'_> {
    /// One-based number for display.
    #[must_use]
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub selected: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

/// A validated move past the current question, not yet applied.
///
/// The caller persists `progress()` first and then commits, so storage never
/// lags behind the visible index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    from_index: usize,
    score: u32,
    attempted: u32,
    feedback: Option<AnswerFeedback>,
    progress: QuizProgress,
}

impl Advance {
    #[must_use]
    pub fn progress(&self) -> &QuizProgress {
        &self.progress
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&AnswerFeedback> {
        self.feedback.as_ref()
    }
}

/// In-memory state of one quiz attempt.
#[derive(Debug, Clone)]
pub struct QuizSession {
    track: StudyTrack,
    phase: QuizPhase,
    title: Option<String>,
    video: Option<String>,
    questions: Vec<Question>,
    order: Vec<usize>,
    rejected: usize,
    current: usize,
    score: u32,
    attempted: u32,
    resumed: bool,
    deadline: Option<DateTime<Utc>>,
    milestones: BTreeSet<u32>,
    outcome: Option<QuizOutcome>,
    failure: Option<String>,
}

impl QuizSession {
    #[must_use]
    pub fn loading(track: StudyTrack) -> Self {
        Self {
            track,
            phase: QuizPhase::Loading,
            title: None,
            video: None,
            questions: Vec::new(),
            order: Vec::new(),
            rejected: 0,
            current: 0,
            score: 0,
            attempted: 0,
            resumed: false,
            deadline: None,
            milestones: BTreeSet::new(),
            outcome: None,
            failure: None,
        }
    }

    /// Move from `Loading` to `InProgress` with the questions laid out in `order`.
    ///
    /// `order` must be a permutation of the set's question indices. Counters
    /// come from `resume` when given; the caller has already checked it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotLoading` if the session already started.
    pub fn begin(
        &mut self,
        set: QuestionSet,
        order: Vec<usize>,
        resume: Option<&QuizProgress>,
        started_at: DateTime<Utc>,
        budget: Duration,
    ) -> Result<(), SessionError> {
        if self.phase != QuizPhase::Loading {
            return Err(SessionError::NotLoading);
        }

        let QuestionSet {
            topic,
            video,
            questions,
            rejected,
        } = set;
        let mut slots: Vec<Option<Question>> = questions.into_iter().map(Some).collect();
        self.questions = order
            .iter()
            .filter_map(|&idx| slots.get_mut(idx).and_then(Option::take))
            .collect();
        self.order = order;
        self.title = Some(topic).filter(|t| !t.trim().is_empty());
        self.video = video;
        self.rejected = rejected.len();

        if let Some(progress) = resume {
            self.current = progress.current_index.min(self.questions.len());
            self.score = progress.score;
            self.attempted = progress.attempted_count;
            self.resumed = true;
        }

        self.deadline = Some(started_at + budget);
        self.phase = QuizPhase::InProgress;
        Ok(())
    }

    /// Enter the terminal `Failed` phase.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.phase = QuizPhase::Failed;
        self.failure = Some(reason.into());
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn track(&self) -> &StudyTrack {
        &self.track
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn video(&self) -> Option<&str> {
        self.video.as_deref()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn attempted(&self) -> u32 {
        self.attempted
    }

    /// Questions dropped as malformed while loading.
    #[must_use]
    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    #[must_use]
    pub fn was_resumed(&self) -> bool {
        self.resumed
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&QuizOutcome> {
        self.outcome.as_ref()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == QuizPhase::Completed
    }

    /// The back link is hidden while a quiz is running.
    #[must_use]
    pub fn back_navigation_visible(&self) -> bool {
        self.phase != QuizPhase::InProgress
    }

    /// Time left before the budget runs out, zero once it has.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let deadline = self.deadline?;
        Some((deadline - now).max(Duration::zero()))
    }

    #[must_use]
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.phase == QuizPhase::InProgress && self.deadline.is_some_and(|d| now >= d)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<PresentedQuestion<'_>> {
        if self.phase != QuizPhase::InProgress {
            return None;
        }
        self.questions
            .get(self.current)
            .map(|question| PresentedQuestion {
                index: self.current,
                total: self.questions.len(),
                question,
            })
    }

    /// Snapshot of the resumable counters at the current position.
    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        self.progress_at(self.current, self.score, self.attempted)
    }

    fn progress_at(&self, index: usize, score: u32, attempted: u32) -> QuizProgress {
        QuizProgress {
            subject: self.track.subject().to_owned(),
            topic: self.track.topic().to_owned(),
            current_index: index,
            score,
            attempted_count: attempted,
            order: Some(self.order.clone()),
        }
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Validate an answer to the question at `index`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionLocked` if `index` is not the question on
    /// screen, `SessionError::UnknownOption` if `choice` is not one of its
    /// options, or a phase error if the quiz is not running.
    pub fn prepare_answer(&self, index: usize, choice: &str) -> Result<Advance, SessionError> {
        let question = self.presented(index)?;
        if !question.options().iter().any(|opt| opt == choice) {
            return Err(SessionError::UnknownOption {
                choice: choice.to_owned(),
            });
        }

        let is_correct = question.is_correct(choice);
        let score = self.score + u32::from(is_correct);
        let attempted = self.attempted + 1;
        Ok(Advance {
            from_index: index,
            score,
            attempted,
            feedback: Some(AnswerFeedback {
                selected: choice.to_owned(),
                correct_answer: question.answer().to_owned(),
                is_correct,
            }),
            progress: self.progress_at(index + 1, score, attempted),
        })
    }

    /// Validate skipping the question at `index`.
    ///
    /// # Errors
    ///
    /// Same guards as [`QuizSession::prepare_answer`].
    pub fn prepare_skip(&self, index: usize) -> Result<Advance, SessionError> {
        self.presented(index)?;
        Ok(Advance {
            from_index: index,
            score: self.score,
            attempted: self.attempted,
            feedback: None,
            progress: self.progress_at(index + 1, self.score, self.attempted),
        })
    }

    /// Apply a prepared advance. Returns a milestone reached by this answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionLocked` if the session moved since the
    /// advance was prepared.
    pub fn commit(&mut self, advance: Advance) -> Result<Option<Milestone>, SessionError> {
        self.presented(advance.from_index)?;

        let gained = advance.score > self.score;
        self.score = advance.score;
        self.attempted = advance.attempted;
        self.current = advance.from_index + 1;

        if !gained {
            return Ok(None);
        }
        Ok(Milestone::for_score(self.score).filter(|m| self.milestones.insert(m.score())))
    }

    /// Finish the quiz and compute its outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if it already finished, or
    /// `SessionError::NotInProgress` if it never started.
    pub fn complete(&mut self, reason: CompletionReason) -> Result<QuizOutcome, SessionError> {
        match self.phase {
            QuizPhase::InProgress => {}
            QuizPhase::Completed => return Err(SessionError::Completed),
            QuizPhase::Loading | QuizPhase::Failed => return Err(SessionError::NotInProgress),
        }

        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let outcome = QuizOutcome::compute(total, self.attempted, self.score, reason);
        self.phase = QuizPhase::Completed;
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// True once every question has been answered or skipped.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.current >= self.questions.len()
    }

    fn presented(&self, index: usize) -> Result<&Question, SessionError> {
        match self.phase {
            QuizPhase::InProgress => {}
            QuizPhase::Completed => return Err(SessionError::Completed),
            QuizPhase::Loading | QuizPhase::Failed => return Err(SessionError::NotInProgress),
        }
        if index != self.current {
            return Err(SessionError::QuestionLocked {
                requested: index,
                current: self.current,
            });
        }
        self.questions
            .get(index)
            .ok_or(SessionError::QuestionLocked {
                requested: index,
                current: self.current,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::QuestionRecord;
    use study_core::time::fixed_now;

    fn question(prompt: &str, answer: &str) -> Question {
        QuestionRecord {
            kind: None,
            question: prompt.into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            answer: answer.into(),
            statements: None,
            list1: None,
            list2: None,
        }
        .validate()
        .unwrap()
    }

    fn set(n: usize) -> QuestionSet {
        QuestionSet {
            topic: "Rivers".into(),
            video: None,
            questions: (0..n).map(|i| question(&format!("q{i}"), "a")).collect(),
            rejected: Vec::new(),
        }
    }

    fn started(n: usize) -> QuizSession {
        let mut session = QuizSession::loading(StudyTrack::new("geo", "rivers").unwrap());
        session
            .begin(set(n), (0..n).rev().collect(), None, fixed_now(), Duration::minutes(50))
            .unwrap();
        session
    }

    #[test]
    fn questions_follow_given_order() {
        let session = started(3);
        let first = session.current_question().unwrap();
        assert_eq!(first.question.prompt(), "q2");
        assert_eq!(first.number(), 1);
        assert_eq!(session.progress().order, Some(vec![2, 1, 0]));
    }

    #[test]
    fn answer_is_one_shot_per_question() {
        let mut session = started(3);
        let advance = session.prepare_answer(0, "a").unwrap();
        assert_eq!(advance.progress().current_index, 1);
        session.commit(advance).unwrap();

        let err = session.prepare_answer(0, "b").unwrap_err();
        assert!(matches!(
            err,
            SessionError::QuestionLocked {
                requested: 0,
                current: 1
            }
        ));
        assert_eq!(session.score(), 1);
        assert_eq!(session.attempted(), 1);
    }

    #[test]
    fn stale_advance_cannot_be_committed_twice() {
        let mut session = started(2);
        let advance = session.prepare_skip(0).unwrap();
        session.commit(advance.clone()).unwrap();
        assert!(session.commit(advance).is_err());
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn unknown_choice_is_rejected_without_advancing() {
        let session = started(2);
        assert!(matches!(
            session.prepare_answer(0, "z"),
            Err(SessionError::UnknownOption { .. })
        ));
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn score_never_exceeds_attempted_or_index() {
        let mut session = started(6);
        for (idx, choice) in ["a", "b", "skip", "a", "c", "skip"].iter().enumerate() {
            let advance = if *choice == "skip" {
                session.prepare_skip(idx).unwrap()
            } else {
                session.prepare_answer(idx, choice).unwrap()
            };
            session.commit(advance).unwrap();
            assert!(session.score() <= session.attempted());
            assert!(session.attempted() as usize <= session.current_index());
        }
        assert!(session.exhausted());
        let outcome = session.complete(CompletionReason::Finished).unwrap();
        assert_eq!((outcome.score, outcome.wrong, outcome.unattempted), (2, 2, 2));
    }

    #[test]
    fn milestone_fires_once_per_score() {
        let mut session = started(12);
        let mut fired = Vec::new();
        for idx in 0..5 {
            let advance = session.prepare_answer(idx, "a").unwrap();
            if let Some(m) = session.commit(advance).unwrap() {
                fired.push(m.score());
            }
        }
        // Wrong answers keep the score at 5 and must not re-fire.
        for idx in 5..7 {
            let advance = session.prepare_answer(idx, "b").unwrap();
            assert!(session.commit(advance).unwrap().is_none());
        }
        assert_eq!(fired, vec![5]);
    }

    #[test]
    fn completion_fires_once() {
        let mut session = started(1);
        session.complete(CompletionReason::TimedOut).unwrap();
        assert!(matches!(
            session.complete(CompletionReason::Finished),
            Err(SessionError::Completed)
        ));
        assert!(session.back_navigation_visible());
        assert!(session.current_question().is_none());
    }

    #[test]
    fn deadline_is_budget_after_start() {
        let session = started(1);
        let later = fixed_now() + Duration::minutes(50);
        assert!(!session.deadline_passed(fixed_now()));
        assert!(session.deadline_passed(later));
        assert_eq!(session.remaining(later), Some(Duration::zero()));
    }
}
