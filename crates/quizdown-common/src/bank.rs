//! Question bank records.
//!
//! Chapter files are JSON, either `{ "questions": [...] }` or the same object
//! wrapped in a one-element array. Subject lists describe which chapter files
//! exist for each subject.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::QuizError;

/// How a question accepts answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Exactly one choice.
    #[default]
    Radio,
    /// Any subset of choices.
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub text: String,
}

/// The stored correct answer.
///
/// Multi-select questions store either a list of values or a run of
/// single-character values (`"ac"` means `a` and `c`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    One(String),
    Many(Vec<String>),
}

impl CorrectAnswer {
    /// Sorted list of correct values, splitting a packed string for
    /// multi-select questions.
    pub fn values(&self, input_type: InputType) -> Vec<String> {
        let mut values = match (self, input_type) {
            (Self::Many(values), _) => values.clone(),
            (Self::One(value), InputType::Checkbox) => {
                value.chars().map(|c| c.to_string()).collect()
            }
            (Self::One(value), InputType::Radio) => vec![value.clone()],
        };
        values.sort();
        values
    }

    pub fn display(&self) -> String {
        match self {
            Self::One(value) => value.clone(),
            Self::Many(values) => values.join(", "),
        }
    }
}

/// A user's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub correct_answer: CorrectAnswer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub input_type: InputType,
}

impl Question {
    /// Whether `answer` is exactly the correct answer. Multi-select answers
    /// compare as sets.
    pub fn is_correct(&self, answer: &Answer) -> bool {
        match (self.input_type, answer) {
            (InputType::Checkbox, Answer::Multiple(selected)) => {
                let mut selected = selected.clone();
                selected.sort();
                selected == self.correct_answer.values(InputType::Checkbox)
            }
            (InputType::Checkbox, Answer::Single(value)) => {
                self.is_correct(&Answer::Multiple(vec![value.clone()]))
            }
            (InputType::Radio, Answer::Single(value)) => match &self.correct_answer {
                CorrectAnswer::One(correct) => correct == value,
                CorrectAnswer::Many(_) => false,
            },
            (InputType::Radio, Answer::Multiple(_)) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    /// Number of questions in the chapter file.
    pub q: usize,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Deserialize)]
struct ChapterFile {
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChapterDocument {
    Wrapped(Vec<ChapterFile>),
    Bare(ChapterFile),
}

/// Parse a chapter file's JSON text into its questions.
pub fn parse_questions(json: &str) -> Result<Vec<Question>, serde_json::Error> {
    let doc: ChapterDocument = serde_json::from_str(json)?;
    Ok(match doc {
        ChapterDocument::Wrapped(files) => files
            .into_iter()
            .next()
            .map(|file| file.questions)
            .unwrap_or_default(),
        ChapterDocument::Bare(file) => file.questions,
    })
}

pub fn load_questions(path: impl AsRef<Path>) -> Result<Vec<Question>, QuizError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| QuizError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_questions(&json).map_err(|source| QuizError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_subjects(path: impl AsRef<Path>) -> Result<Vec<Subject>, QuizError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| QuizError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| QuizError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = r#"[{
        "questions": [
            {
                "text": "What is `1 + 1`?",
                "choices": [{"value": "a", "text": "1"}, {"value": "b", "text": "2"}],
                "correctAnswer": "b",
                "inputType": "radio"
            },
            {
                "text": "Pick the primes",
                "choices": [
                    {"value": "a", "text": "2"},
                    {"value": "b", "text": "4"},
                    {"value": "c", "text": "5"}
                ],
                "correctAnswer": "ca",
                "explanation": "$4 = 2 \\cdot 2$",
                "inputType": "checkbox"
            }
        ]
    }]"#;

    #[test]
    fn parses_wrapped_chapter() {
        let questions = parse_questions(CHAPTER).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].input_type, InputType::Radio);
        assert_eq!(questions[1].explanation.as_deref(), Some("$4 = 2 \\cdot 2$"));
    }

    #[test]
    fn parses_bare_chapter() {
        let json = r#"{"questions": [{"text": "t", "correctAnswer": ["a"], "inputType": "checkbox"}]}"#;
        let questions = parse_questions(json).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(
            questions[0].correct_answer,
            CorrectAnswer::Many(vec!["a".into()])
        );
    }

    #[test]
    fn input_type_defaults_to_radio() {
        let json = r#"{"questions": [{"text": "t", "correctAnswer": "a"}]}"#;
        let questions = parse_questions(json).unwrap();
        assert_eq!(questions[0].input_type, InputType::Radio);
        assert!(questions[0].choices.is_empty());
    }

    #[test]
    fn radio_answer_must_match_exactly() {
        let questions = parse_questions(CHAPTER).unwrap();
        assert!(questions[0].is_correct(&Answer::Single("b".into())));
        assert!(!questions[0].is_correct(&Answer::Single("a".into())));
        assert!(!questions[0].is_correct(&Answer::Multiple(vec!["b".into()])));
    }

    #[test]
    fn checkbox_answer_compares_as_set() {
        let questions = parse_questions(CHAPTER).unwrap();
        let q = &questions[1];
        assert!(q.is_correct(&Answer::Multiple(vec!["a".into(), "c".into()])));
        assert!(q.is_correct(&Answer::Multiple(vec!["c".into(), "a".into()])));
        assert!(!q.is_correct(&Answer::Multiple(vec!["a".into()])));
        assert!(!q.is_correct(&Answer::Multiple(vec![
            "a".into(),
            "b".into(),
            "c".into()
        ])));
    }

    #[test]
    fn loads_subjects_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");
        std::fs::write(
            &path,
            r#"[{"id": "java1", "name": "Java 1", "path": "data/java1",
                "chapters": [{"id": "1", "name": "Intro", "q": 45, "file": "data/java1/chapter1.json"}]}]"#,
        )
        .unwrap();
        let subjects = load_subjects(&path).unwrap();
        assert_eq!(subjects[0].chapters[0].q, 45);
        assert_eq!(subjects[0].description, "");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_questions("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, QuizError::Read { .. }));
    }
}
