use std::sync::Arc;

use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use storage::PersistenceStore;
use study_core::model::{
    CompletionReason, Milestone, ProgressError, QuizOutcome, QuizProgress, QuizResult, StudyTrack,
    UserProfile,
};

use super::loader::load_question_set;
use super::session::{AnswerFeedback, QuizPhase, QuizSession};
use super::shuffle::shuffled_order;
use crate::Clock;
use crate::config::StudyConfig;
use crate::error::SessionError;
use crate::offline::Fetcher;

/// Result of answering or skipping a single question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizStep {
    /// Present for answers, absent for skips.
    pub feedback: Option<AnswerFeedback>,
    pub milestone: Option<Milestone>,
    /// False when the progress write was dropped; the quiz continues regardless.
    pub persisted: bool,
    pub outcome: Option<QuizOutcome>,
}

/// Orchestrates quiz loading, persisted answering and completion.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    network: Arc<dyn Fetcher>,
    store: PersistenceStore,
    config: StudyConfig,
    seed: Option<u64>,
}

impl QuizLoopService {
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
            seed: None,
        }
    }

    /// Use a deterministic shuffle.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Load the quiz for `subject`/`topic` as read from a page query.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingIdentifiers` if either is absent, or any
    /// error from [`QuizLoopService::start`].
    pub async fn start_from_query(
        &self,
        subject: Option<&str>,
        topic: Option<&str>,
    ) -> Result<QuizSession, SessionError> {
        let track = StudyTrack::from_query(subject, topic)?;
        self.start(track).await
    }

    /// Load the quiz for `track` and begin it, resuming stored progress when it
    /// belongs to this track.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the quiz cannot be loaded.
    pub async fn start(&self, track: StudyTrack) -> Result<QuizSession, SessionError> {
        let mut session = QuizSession::loading(track);
        self.load(&mut session).await?;
        Ok(session)
    }

    /// Drive a `Loading` session to `InProgress`, or to `Failed` on error.
    ///
    /// A quiz with no questions, or resumed past its last question, completes
    /// immediately; the outcome is returned in that case.
    ///
    /// # Errors
    ///
    /// Returns the load error after moving the session to `Failed`.
    pub async fn load(&self, session: &mut QuizSession) -> Result<Option<QuizOutcome>, SessionError> {
        if session.phase() != QuizPhase::Loading {
            return Err(SessionError::NotLoading);
        }

        let set =
            match load_question_set(self.network.as_ref(), &self.config, session.track()).await {
                Ok(set) => set,
                Err(err) => {
                    warn!(track = ?session.track(), error = %err, "quiz load failed");
                    session.fail(err.user_message());
                    return Err(err);
                }
            };

        let total = set.questions.len();
        let resume = self.resumable_progress(session.track(), total).await;
        let order = resume
            .as_ref()
            .and_then(|p| p.order_for(total))
            .unwrap_or_else(|| self.shuffled(total));

        let budget = Duration::from_std(self.config.quiz_time_budget)
            .unwrap_or_else(|_| Duration::minutes(50));
        session.begin(set, order, resume.as_ref(), self.clock.now(), budget)?;
        info!(
            track = ?session.track(),
            total,
            resumed = session.was_resumed(),
            index = session.current_index(),
            "quiz started"
        );

        if session.exhausted() {
            return self
                .finish(session, CompletionReason::Finished)
                .await
                .map(Some);
        }
        Ok(None)
    }

    /// Answer the question at `index` with `choice`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionLocked` when `index` is not the current
    /// question (including a second answer to the same question), and phase
    /// errors when the quiz is not running.
    pub async fn answer(
        &self,
        session: &mut QuizSession,
        index: usize,
        choice: &str,
    ) -> Result<QuizStep, SessionError> {
        let advance = session.prepare_answer(index, choice)?;
        let feedback = advance.feedback().cloned();
        let persisted = self.persist(advance.progress()).await;
        let milestone = session.commit(advance)?;
        if let Some(m) = milestone {
            info!(score = m.score(), "milestone reached");
        }
        self.after_advance(session, feedback, milestone, persisted)
            .await
    }

    /// Skip the question at `index` without counting it as attempted.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::answer`].
    pub async fn skip(&self, session: &mut QuizSession, index: usize) -> Result<QuizStep, SessionError> {
        let advance = session.prepare_skip(index)?;
        let persisted = self.persist(advance.progress()).await;
        session.commit(advance)?;
        self.after_advance(session, None, None, persisted).await
    }

    /// Complete the quiz because its time budget ran out.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the quiz already finished.
    pub async fn expire(&self, session: &mut QuizSession) -> Result<QuizOutcome, SessionError> {
        self.finish(session, CompletionReason::TimedOut).await
    }

    /// Expire the quiz if the clock is past its deadline.
    pub async fn check_deadline(&self, session: &mut QuizSession) -> Option<QuizOutcome> {
        if !session.deadline_passed(self.clock.now()) {
            return None;
        }
        self.expire(session).await.ok()
    }

    /// Sleep until the session's deadline; returns at once if already past.
    pub async fn wait_for_deadline(&self, session: &QuizSession) {
        let Some(remaining) = session.remaining(self.clock.now()) else {
            return;
        };
        if let Ok(remaining) = remaining.to_std() {
            tokio::time::sleep(remaining).await;
        }
    }

    /// Name shown in feedback and milestone messages.
    pub async fn display_name(&self) -> String {
        let profile = self.store.user().await;
        UserProfile::display_name(profile.as_ref()).to_owned()
    }

    /// Feedback line for a finished quiz, addressed to the stored user.
    pub async fn feedback_message(&self, outcome: &QuizOutcome) -> String {
        outcome.tier.message(&self.display_name().await)
    }

    pub async fn milestone_message(&self, milestone: Milestone) -> String {
        milestone.message(&self.display_name().await)
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    async fn after_advance(
        &self,
        session: &mut QuizSession,
        feedback: Option<AnswerFeedback>,
        milestone: Option<Milestone>,
        persisted: bool,
    ) -> Result<QuizStep, SessionError> {
        let outcome = if session.exhausted() {
            Some(self.finish(session, CompletionReason::Finished).await?)
        } else {
            None
        };
        Ok(QuizStep {
            feedback,
            milestone,
            persisted,
            outcome,
        })
    }

    async fn finish(
        &self,
        session: &mut QuizSession,
        reason: CompletionReason,
    ) -> Result<QuizOutcome, SessionError> {
        let outcome = session.complete(reason)?;
        let result = QuizResult {
            subject: session.track().subject().to_owned(),
            topic: session.track().topic().to_owned(),
            score: outcome.score,
            total: outcome.total,
            date: self.clock.history_date(),
        };

        if self.store.append_history(result).await.is_err() {
            warn!(track = ?session.track(), "quiz result was not saved to history");
        }
        if self.store.clear_quiz_progress().await.is_err() {
            warn!(track = ?session.track(), "stale quiz progress was not cleared");
        }

        info!(
            track = ?session.track(),
            score = outcome.score,
            total = outcome.total,
            reason = ?reason,
            "quiz completed"
        );
        Ok(outcome)
    }

    async fn persist(&self, progress: &QuizProgress) -> bool {
        self.store.save_quiz_progress(progress).await.is_ok()
    }

    async fn resumable_progress(&self, track: &StudyTrack, total: usize) -> Option<QuizProgress> {
        let stored = self.store.quiz_progress().await?;
        match stored.check_resumable(track, total) {
            Ok(()) => Some(stored),
            Err(ProgressError::OtherTrack { subject, topic }) => {
                debug!(%subject, %topic, "ignoring progress saved for another quiz");
                None
            }
            Err(ProgressError::AlreadyFinished { total }) => {
                debug!(track = ?track, total, "discarding progress of a finished quiz");
                // A failure here was already logged by the store.
                let _ = self.store.clear_quiz_progress().await;
                None
            }
            Err(err) => {
                warn!(track = ?track, error = %err, "ignoring inconsistent quiz progress");
                None
            }
        }
    }

    fn shuffled(&self, len: usize) -> Vec<usize> {
        match self.seed {
            Some(seed) => shuffled_order(len, &mut StdRng::seed_from_u64(seed)),
            None => shuffled_order(len, &mut rand::rng()),
        }
    }
}
