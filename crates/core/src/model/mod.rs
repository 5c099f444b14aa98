mod comment;
mod ids;
mod prefs;
mod question;
mod quiz;
mod request;

pub use comment::{Comment, CommentError};
pub use ids::{PageNumber, StudyTrack, TrackError};
pub use prefs::{Theme, ThemeParseError, UserProfile};
pub use question::{
    MatchList, Question, QuestionError, QuestionKind, QuestionRecord, QuestionSet, QuizDocument,
    RejectedQuestion,
};
pub use quiz::{
    CompletionReason, FeedbackTier, Milestone, ProgressError, QuizOutcome, QuizProgress,
    QuizResult, MILESTONE_SCORES,
};
pub use request::{CacheVersion, Request, RequestError, RequestKey, RequestMode, ResponseSnapshot};
