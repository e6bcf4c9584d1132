//! Process configuration from environment variables

use crate::llm::{OpenAIConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::relay;
use crate::session::TurnSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8765;
const DEFAULT_MAX_TOKENS: u32 = 50;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_OUTBOUND_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub photo_dir: PathBuf,
    pub public_url: String,
    pub openai: OpenAIConfig,
    pub turn: TurnSettings,
    pub broadcast_capacity: usize,
    pub persona_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty values take the default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
        let data_dir = PathBuf::from(home).join(".photo-chat");

        let port = parse_or(&var, "PHOTO_CHAT_PORT", DEFAULT_PORT);
        let public_url = var("PHOTO_CHAT_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let timeout_secs = parse_or(&var, "PHOTO_CHAT_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS);
        let openai = OpenAIConfig {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let broadcast_capacity =
            parse_or(&var, "PHOTO_CHAT_BROADCAST_CAPACITY", relay::DEFAULT_CAPACITY).max(1);

        Self {
            port,
            db_path: var("PHOTO_CHAT_DB_PATH")
                .map_or_else(|| data_dir.join("photo_chat.db"), PathBuf::from),
            photo_dir: var("PHOTO_CHAT_PHOTO_DIR")
                .map_or_else(|| data_dir.join("photos"), PathBuf::from),
            public_url,
            openai,
            turn: TurnSettings {
                max_tokens: Some(parse_or(&var, "PHOTO_CHAT_MAX_TOKENS", DEFAULT_MAX_TOKENS)),
                temperature: Some(parse_or(&var, "PHOTO_CHAT_TEMPERATURE", DEFAULT_TEMPERATURE)),
                outbound_capacity: parse_or(
                    &var,
                    "PHOTO_CHAT_OUTBOUND_CAPACITY",
                    DEFAULT_OUTBOUND_CAPACITY,
                )
                .max(1),
            },
            broadcast_capacity,
            persona_file: var("PHOTO_CHAT_PERSONA_FILE").map(PathBuf::from),
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "Unparseable setting, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("HOME", "/home/alice")]);
        assert_eq!(cfg.port, 8765);
        assert_eq!(cfg.db_path, PathBuf::from("/home/alice/.photo-chat/photo_chat.db"));
        assert_eq!(cfg.photo_dir, PathBuf::from("/home/alice/.photo-chat/photos"));
        assert_eq!(cfg.public_url, "http://localhost:8765");
        assert_eq!(cfg.openai.model, "gpt-3.5-turbo");
        assert_eq!(cfg.openai.api_key, None);
        assert_eq!(cfg.openai.timeout, Duration::from_secs(60));
        assert_eq!(cfg.turn.max_tokens, Some(50));
        assert_eq!(cfg.turn.temperature, Some(0.1));
        assert_eq!(cfg.broadcast_capacity, 32);
        assert_eq!(cfg.turn.outbound_capacity, 32);
        assert!(cfg.persona_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("PHOTO_CHAT_PORT", "9000"),
            ("PHOTO_CHAT_DB_PATH", "/data/chat.db"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://gateway/v1"),
            ("PHOTO_CHAT_TEMPERATURE", "0.7"),
            ("PHOTO_CHAT_BROADCAST_CAPACITY", "4"),
            ("PHOTO_CHAT_OUTBOUND_CAPACITY", "0"),
        ]);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.public_url, "http://localhost:9000");
        assert_eq!(cfg.db_path, PathBuf::from("/data/chat.db"));
        assert_eq!(cfg.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.openai.base_url, "http://gateway/v1");
        assert_eq!(cfg.turn.temperature, Some(0.7));
        assert_eq!(cfg.broadcast_capacity, 4);
        assert_eq!(cfg.turn.outbound_capacity, 1);
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let cfg = config(&[
            ("PHOTO_CHAT_PORT", "eighty"),
            ("PHOTO_CHAT_MAX_TOKENS", "-3"),
            ("OPENAI_API_KEY", "  "),
        ]);
        assert_eq!(cfg.port, 8765);
        assert_eq!(cfg.turn.max_tokens, Some(50));
        assert_eq!(cfg.openai.api_key, None);
    }
}
