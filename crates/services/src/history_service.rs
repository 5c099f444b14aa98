use storage::PersistenceStore;
use study_core::model::{QuizResult, StudyTrack};

/// Aggregate figures over every finished quiz.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySummary {
    pub attempts: usize,
    pub total_score: u32,
    pub total_questions: u32,
    pub best_percentage: f64,
    pub average_percentage: f64,
}

/// Read-only view over the quiz history log.
#[derive(Clone)]
pub struct HistoryService {
    store: PersistenceStore,
}

impl HistoryService {
    #[must_use]
    pub fn new(store: PersistenceStore) -> Self {
        Self { store }
    }

    /// Every result in the order it was recorded.
    pub async fn list(&self) -> Vec<QuizResult> {
        self.store.history().await
    }

    /// Most recent first, capped at `limit`.
    pub async fn recent(&self, limit: usize) -> Vec<QuizResult> {
        let mut results = self.list().await;
        results.reverse();
        results.truncate(limit);
        results
    }

    pub async fn latest_for(&self, track: &StudyTrack) -> Option<QuizResult> {
        self.list()
            .await
            .into_iter()
            .rev()
            .find(|r| r.subject == track.subject() && r.topic == track.topic())
    }

    pub async fn summary(&self) -> HistorySummary {
        summarize(&self.list().await)
    }
}

fn summarize(results: &[QuizResult]) -> HistorySummary {
    if results.is_empty() {
        return HistorySummary::default();
    }

    let percentages: Vec<f64> = results.iter().map(QuizResult::percentage).collect();
    let best = percentages.iter().copied().fold(0.0_f64, f64::max);
    #[allow(clippy::cast_precision_loss)]
    let average = percentages.iter().sum::<f64>() / percentages.len() as f64;

    HistorySummary {
        attempts: results.len(),
        total_score: results.iter().map(|r| r.score).sum(),
        total_questions: results.iter().map(|r| r.total).sum(),
        best_percentage: best,
        average_percentage: average,
    }
}
