//! Application-level configuration loading, including the fallback question pool.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{questions::fallback, state::room::OPTION_COUNT};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BRAINBREAK_BACK_CONFIG_PATH";
/// Environment variable that overrides the generator endpoint from the file.
const GENERATOR_URL_ENV: &str = "BRAINBREAK_BACK_GENERATOR_URL";
/// Generator request timeout applied when the file does not set one.
const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Endpoint of the question-generation service; `None` disables it and
    /// every batch comes from the fallback pool.
    pub generator_url: Option<String>,
    /// Timeout applied to generation requests.
    pub generator_timeout: Duration,
    /// Pool used whenever generation fails.
    pub fallback_questions: Vec<fallback::FallbackEntry>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        fallback_questions = app_config.fallback_questions.len(),
                        "loaded configuration"
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
        };

        if let Ok(url) = env::var(GENERATOR_URL_ENV) {
            if !url.trim().is_empty() {
                config.generator_url = Some(url);
            }
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generator_url: None,
            generator_timeout: Duration::from_secs(DEFAULT_GENERATOR_TIMEOUT_SECS),
            fallback_questions: fallback::default_pool(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    generator: Option<RawGenerator>,
    #[serde(default)]
    fallback_questions: Vec<fallback::FallbackEntry>,
}

#[derive(Debug, Deserialize)]
/// Generator section of the configuration file.
struct RawGenerator {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let (generator_url, timeout_secs) = match value.generator {
            Some(generator) => (generator.url, generator.timeout_secs),
            None => (None, None),
        };

        let fallback_questions: Vec<fallback::FallbackEntry> = value
            .fallback_questions
            .into_iter()
            .filter(|entry| {
                let valid = entry.correct_index < OPTION_COUNT;
                if !valid {
                    warn!(text = %entry.text, "dropping fallback question with out-of-range answer");
                }
                valid
            })
            .collect();

        Self {
            generator_url,
            generator_timeout: Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_GENERATOR_TIMEOUT_SECS),
            ),
            fallback_questions: if fallback_questions.is_empty() {
                fallback::default_pool()
            } else {
                fallback_questions
            },
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
