//! Shared pieces for the quizdown crates: the workspace error type, question
//! bank records and logging setup.

pub mod bank;
pub mod error;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::bank::{Answer, Chapter, Choice, CorrectAnswer, InputType, Question, Subject};
pub use crate::error::QuizError;
