use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyPrompt,

    #[error("question has no options")]
    NoOptions,

    #[error("answer {answer:?} is not one of the options")]
    AnswerNotInOptions { answer: String },

    #[error("answer {answer:?} matches more than one option")]
    AmbiguousAnswer { answer: String },

    #[error("malformed question: {0}")]
    Malformed(String),
}

//
// ─── WIRE SHAPE ────────────────────────────────────────────────────────────────
//

/// A labelled list used by match-the-lists questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchList {
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Question as it appears in a quiz data file, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list1: Option<MatchList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list2: Option<MatchList>,
}

impl QuestionRecord {
    /// Validate the record into a presentable question.
    ///
    /// A `statement` or `match` record without its extra lists is kept as a
    /// plain question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are no options, or
    /// the answer does not match exactly one option.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.question.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if self.options.is_empty() {
            return Err(QuestionError::NoOptions);
        }

        let mut matches = self
            .options
            .iter()
            .enumerate()
            .filter(|(_, opt)| **opt == self.answer)
            .map(|(idx, _)| idx);
        let answer_index = matches.next().ok_or_else(|| QuestionError::AnswerNotInOptions {
            answer: self.answer.clone(),
        })?;
        if matches.next().is_some() {
            return Err(QuestionError::AmbiguousAnswer {
                answer: self.answer,
            });
        }

        let kind = match (self.kind.as_deref(), self.statements, self.list1, self.list2) {
            (Some("statement"), Some(statements), _, _) => QuestionKind::Statements(statements),
            (Some("match"), _, Some(left), Some(right)) => QuestionKind::Match { left, right },
            _ => QuestionKind::Plain,
        };

        Ok(Question {
            prompt: self.question,
            options: self.options,
            answer_index,
            kind,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    Plain,
    Statements(Vec<String>),
    Match { left: MatchList, right: MatchList },
}

/// A validated multiple-choice question.
///
/// Options keep the order of the source file; only the question list is
/// shuffled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    answer_index: usize,
    kind: QuestionKind,
}

impl Question {
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.options[self.answer_index]
    }

    #[must_use]
    pub fn answer_index(&self) -> usize {
        self.answer_index
    }

    #[must_use]
    pub fn is_correct(&self, choice: &str) -> bool {
        self.answer() == choice
    }
}

//
// ─── QUIZ DOCUMENT ─────────────────────────────────────────────────────────────
//

/// Top-level shape of `{subject}/{topic}.json`.
///
/// Questions are kept as raw JSON so one malformed entry can be rejected
/// without failing the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizDocument {
    pub topic: String,
    #[serde(default)]
    pub video: Option<String>,
    pub questions: Vec<serde_json::Value>,
}

/// A question dropped during validation, with its position in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedQuestion {
    pub index: usize,
    pub error: QuestionError,
}

/// Validated contents of a quiz document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    pub topic: String,
    pub video: Option<String>,
    pub questions: Vec<Question>,
    pub rejected: Vec<RejectedQuestion>,
}

impl QuizDocument {
    /// Validate every question, separating usable ones from rejected ones.
    #[must_use]
    pub fn into_question_set(self) -> QuestionSet {
        let mut questions = Vec::with_capacity(self.questions.len());
        let mut rejected = Vec::new();

        for (index, raw) in self.questions.into_iter().enumerate() {
            let parsed = serde_json::from_value::<QuestionRecord>(raw)
                .map_err(|err| QuestionError::Malformed(err.to_string()))
                .and_then(QuestionRecord::validate);
            match parsed {
                Ok(question) => questions.push(question),
                Err(error) => rejected.push(RejectedQuestion { index, error }),
            }
        }

        QuestionSet {
            topic: self.topic,
            video: self.video.filter(|v| !v.trim().is_empty()),
            questions,
            rejected,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
