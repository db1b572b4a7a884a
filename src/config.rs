//! Application-level configuration loading: quiz rules, unit-of-work policy and fixtures.

use std::{
    env, fs,
    io::ErrorKind,
    path::PathBuf,
    time::{Duration, SystemTime},
};

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::models::{PlayerEntity, QuestionEntity};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PAIR_QUIZ_CONFIG_PATH";

const DEFAULT_QUESTIONS_PER_GAME: usize = 5;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How submitted answers are compared with the accepted answers once both are trimmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMatching {
    /// Byte-for-byte equality.
    #[default]
    Exact,
    /// Equality after Unicode lowercasing.
    CaseInsensitive,
}

/// Rules every game is played with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRules {
    /// Number of questions drawn per game, and number of answers each player gives.
    pub questions_per_game: usize,
    /// How submitted answers are compared with accepted ones.
    pub answer_matching: AnswerMatching,
}

impl Default for QuizRules {
    fn default() -> Self {
        Self {
            questions_per_game: DEFAULT_QUESTIONS_PER_GAME,
            answer_matching: AnswerMatching::default(),
        }
    }
}

/// Retry and timeout policy applied to every unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionPolicy {
    /// Attempts made when the storage reports a write conflict. Always at least 1.
    pub max_attempts: u32,
    /// Upper bound for a single attempt, commit excluded.
    pub timeout: Duration,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Seed data loaded into the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    /// Question bank, drafts included.
    pub questions: Vec<QuestionEntity>,
    /// Player accounts.
    pub players: Vec<PlayerEntity>,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    rules: QuizRules,
    transaction: TransactionPolicy,
    fixtures: Fixtures,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        questions_per_game = app_config.rules.questions_per_game,
                        fixture_questions = app_config.fixtures.questions.len(),
                        "loaded quiz configuration"
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

    /// Parse a configuration document. Missing sections keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Build a configuration from explicit parts.
    pub fn new(rules: QuizRules, transaction: TransactionPolicy, fixtures: Fixtures) -> Self {
        Self {
            rules,
            transaction,
            fixtures,
        }
    }

    /// Rules every game is played with.
    pub fn rules(&self) -> &QuizRules {
        &self.rules
    }

    /// Retry and timeout policy of units of work.
    pub fn transaction(&self) -> TransactionPolicy {
        self.transaction
    }

    /// Seed data of the in-memory store.
    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: QuizRules::default(),
            transaction: TransactionPolicy::default(),
            fixtures: default_fixtures(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    rules: RawRules,
    transaction: RawTransaction,
    fixtures: Option<RawFixtures>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRules {
    questions_per_game: Option<usize>,
    answer_matching: AnswerMatching,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTransaction {
    max_attempts: Option<u32>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFixtures {
    questions: Vec<RawQuestion>,
    players: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    id: Option<Uuid>,
    body: String,
    accepted_answers: Vec<String>,
    #[serde(default = "default_published")]
    published: bool,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: Uuid,
    login: String,
}

fn default_published() -> bool {
    true
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let questions_per_game = match value.rules.questions_per_game {
            Some(0) => {
                warn!("questions_per_game must be positive; using the default");
                DEFAULT_QUESTIONS_PER_GAME
            }
            Some(count) => count,
            None => DEFAULT_QUESTIONS_PER_GAME,
        };

        let transaction = TransactionPolicy {
            max_attempts: value
                .transaction
                .max_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            timeout: value
                .transaction
                .timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        };

        let fixtures = value
            .fixtures
            .map(Into::into)
            .unwrap_or_else(default_fixtures);

        Self {
            rules: QuizRules {
                questions_per_game,
                answer_matching: value.rules.answer_matching,
            },
            transaction,
            fixtures,
        }
    }
}

impl From<RawFixtures> for Fixtures {
    fn from(value: RawFixtures) -> Self {
        let now = SystemTime::now();
        Self {
            questions: value
                .questions
                .into_iter()
                .map(|raw| QuestionEntity {
                    id: raw.id.unwrap_or_else(Uuid::new_v4),
                    body: raw.body,
                    accepted_answers: raw.accepted_answers,
                    published: raw.published,
                    created_at: now,
                    updated_at: None,
                })
                .collect(),
            players: value
                .players
                .into_iter()
                .map(|raw| PlayerEntity {
                    id: raw.id,
                    login: raw.login,
                })
                .collect(),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in question bank and players shipped with the binary.
fn default_fixtures() -> Fixtures {
    let now = SystemTime::now();
    let question = |body: &str, answers: &[&str]| QuestionEntity {
        id: Uuid::new_v4(),
        body: body.to_owned(),
        accepted_answers: answers.iter().map(|answer| (*answer).to_owned()).collect(),
        published: true,
        created_at: now,
        updated_at: None,
    };

    Fixtures {
        questions: vec![
            question("How many continents are there?", &["7", "seven"]),
            question("What is the chemical symbol of gold?", &["Au"]),
            question("Which planet is known as the red planet?", &["Mars"]),
            question("What is 12 multiplied by 12?", &["144"]),
            question("Who wrote 'Hamlet'?", &["Shakespeare", "William Shakespeare"]),
            question("What is the capital of Japan?", &["Tokyo"]),
            question("How many sides does a hexagon have?", &["6", "six"]),
            question("What is the largest ocean on Earth?", &["Pacific", "Pacific Ocean"]),
        ],
        players: vec![
            PlayerEntity {
                id: Uuid::from_u128(0x0c8f_5a4e_3b1d_4f0a_9c1e_6a7b_8d9e_0f01),
                login: "alice".into(),
            },
            PlayerEntity {
                id: Uuid::from_u128(0x0c8f_5a4e_3b1d_4f0a_9c1e_6a7b_8d9e_0f02),
                login: "bob".into(),
            },
        ],
    }
}
