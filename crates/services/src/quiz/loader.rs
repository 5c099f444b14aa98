use tracing::{debug, warn};
use url::Url;

use study_core::model::{QuestionSet, QuizDocument, Request, StudyTrack};

use crate::config::StudyConfig;
use crate::error::{NetworkError, SessionError};
use crate::offline::Fetcher;

/// Fetch and validate the quiz document for `track`.
///
/// Individually malformed questions are dropped and logged. A document whose
/// questions were all rejected fails; a document with no questions at all is
/// returned as an empty set.
///
/// # Errors
///
/// Returns `SessionError::Load` for network failures or non-success statuses,
/// `SessionError::MalformedData` if the document is not valid JSON of the
/// expected shape, and `SessionError::NoValidQuestions` if nothing survived
/// validation.
pub async fn load_question_set(
    network: &dyn Fetcher,
    config: &StudyConfig,
    track: &StudyTrack,
) -> Result<QuestionSet, SessionError> {
    let request = quiz_request(&config.origin, &config.quiz_path(track))?;
    let response = network.fetch(&request).await?;
    if !response.is_success() {
        return Err(NetworkError::Status {
            status: response.status,
            url: request.url().to_string(),
        }
        .into());
    }

    let document: QuizDocument = serde_json::from_slice(&response.body)
        .map_err(|err| SessionError::MalformedData(err.to_string()))?;
    let set = document.into_question_set();

    for rejected in &set.rejected {
        warn!(
            track = ?track,
            index = rejected.index,
            error = %rejected.error,
            "dropping malformed question"
        );
    }
    if set.questions.is_empty() && !set.rejected.is_empty() {
        return Err(SessionError::NoValidQuestions {
            rejected: set.rejected.len(),
        });
    }

    debug!(track = ?track, questions = set.questions.len(), "quiz loaded");
    Ok(set)
}

fn quiz_request(origin: &Url, path: &str) -> Result<Request, SessionError> {
    Request::resolve(origin, path).map_err(|err| SessionError::Load(err.into()))
}
