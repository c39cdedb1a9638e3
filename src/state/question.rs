use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single flashcard of the question bank.
///
/// Field names on the wire follow the browser client (`qId`, `question`,
/// `answer`) so records written by either client are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Stable identifier, unique within the bank.
    #[serde(rename = "qId")]
    pub id: u32,
    /// Text shown to the players.
    #[serde(rename = "question")]
    pub prompt: String,
    /// Answer accepted as correct.
    #[serde(rename = "answer")]
    pub expected_answer: String,
}

impl Question {
    /// Build a question from its parts.
    pub fn new(id: u32, prompt: impl Into<String>, expected_answer: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            expected_answer: expected_answer.into(),
        }
    }

    /// Whether `answer` matches the expected answer, ignoring surrounding
    /// whitespace and letter case.
    pub fn accepts(&self, answer: &str) -> bool {
        normalize(answer) == normalize(&self.expected_answer)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_are_compared_case_insensitively() {
        let question = Question::new(3, "Largest planet?", "Jupiter");
        assert!(question.accepts("jupiter"));
        assert!(question.accepts("  JUPITER \n"));
        assert!(!question.accepts("Saturn"));
        assert!(!question.accepts(""));
    }

    #[test]
    fn serializes_with_browser_field_names() {
        let question = Question::new(2, "5 + 7 = ?", "12");
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "qId": 2, "question": "5 + 7 = ?", "answer": "12" })
        );
    }
}
