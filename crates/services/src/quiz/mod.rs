mod loader;
mod session;
mod shuffle;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::SessionError;
pub use loader::load_question_set;
pub use session::{Advance, AnswerFeedback, PresentedQuestion, QuizPhase, QuizSession};
pub use shuffle::{shuffle_in_place, shuffled_order};
pub use workflow::{QuizLoopService, QuizStep};
