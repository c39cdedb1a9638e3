//! Application-level configuration loading, including the question bank.

use std::{collections::HashSet, env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::question::Question;

/// Default location on disk where binaries look for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FLASHCARD_FRENZY_CONFIG_PATH";

/// Reasons a configuration document is refused.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for [`RawConfig`].
    #[error("invalid configuration document")]
    Parse(#[from] serde_json::Error),
    /// A match needs at least one question.
    #[error("question bank is empty")]
    EmptyBank,
    /// Question ids identify cards in stored records and must be unique.
    #[error("question id {0} appears more than once")]
    DuplicateQuestion(u32),
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    questions: Vec<Question>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in question bank.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        count = app_config.questions.len(),
                        "loaded question bank from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and check a configuration document.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(contents)?;
        Self::try_from(raw)
    }

    /// Ordered question bank every match is played with.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            questions: default_questions(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single card inside the configuration file.
struct RawQuestion {
    id: u32,
    prompt: String,
    answer: String,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        if value.questions.is_empty() {
            return Err(ConfigError::EmptyBank);
        }

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(value.questions.len());
        for raw in value.questions {
            if !seen.insert(raw.id) {
                return Err(ConfigError::DuplicateQuestion(raw.id));
            }
            questions.push(Question::new(raw.id, raw.prompt, raw.answer));
        }

        Ok(Self { questions })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in question bank shipped with the binaries.
fn default_questions() -> Vec<Question> {
    vec![
        Question::new(1, "Capital of France?", "Paris"),
        Question::new(2, "5 + 7 = ?", "12"),
        Question::new(3, "Largest planet?", "Jupiter"),
        Question::new(4, "OOP stands for?", "Object Oriented Programming"),
        Question::new(5, "SQL stands for?", "Structured Query Language"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bank_has_five_cards() {
        let config = AppConfig::default();
        assert_eq!(config.questions().len(), 5);
        assert_eq!(config.questions()[0].expected_answer, "Paris");
    }

    #[test]
    fn parses_question_bank() {
        let config = AppConfig::from_json_str(
            r#"{"questions":[
                {"id":7,"prompt":"HTML is used for?","answer":"Structuring web pages"},
                {"id":8,"prompt":"Python is interpreted or compiled?","answer":"Interpreted"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(config.questions().len(), 2);
        assert_eq!(config.questions()[1].id, 8);
        assert!(config.questions()[1].accepts(" interpreted "));
    }

    #[test]
    fn rejects_empty_or_ambiguous_banks() {
        assert!(matches!(
            AppConfig::from_json_str(r#"{"questions":[]}"#),
            Err(ConfigError::EmptyBank)
        ));
        assert!(matches!(
            AppConfig::from_json_str(
                r#"{"questions":[{"id":1,"prompt":"a","answer":"b"},{"id":1,"prompt":"c","answer":"d"}]}"#
            ),
            Err(ConfigError::DuplicateQuestion(1))
        ));
        assert!(matches!(
            AppConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
