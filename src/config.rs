use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 900;
pub const DEFAULT_RL_WINDOW_SECONDS: i64 = 30;
pub const DEFAULT_RL_LIMIT: usize = 15;
pub const DEFAULT_PORT: u16 = 10000;

/// Runtime configuration, read once at startup.
///
/// Optional API keys disable the corresponding lookup service when absent;
/// the bot token is the only hard requirement.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub owner_id: Option<i64>,
    pub tmdb_api_key: Option<String>,
    pub omdb_api_key: Option<String>,
    pub webhook_secret: String,
    pub cache_ttl_seconds: i64,
    pub rl_window_seconds: i64,
    pub rl_limit: usize,
    pub port: u16,
    pub base_url: Option<String>,
    pub audit_url: Option<String>,
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} is not a valid number: {:?}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = match optional("BOT_TOKEN") {
            Some(t) => t,
            None => anyhow::bail!("Missing required environment variable: BOT_TOKEN"),
        };
        let owner_id = match optional("BOT_OWNER_ID") {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .with_context(|| format!("BOT_OWNER_ID is not a valid id: {:?}", raw))?,
            ),
            None => None,
        };

        Ok(Self {
            bot_token,
            owner_id,
            tmdb_api_key: optional("TMDB_API_KEY"),
            omdb_api_key: optional("OMDB_API_KEY"),
            webhook_secret: optional("WEBHOOK_SECRET").unwrap_or_else(|| "wh_dev".to_string()),
            cache_ttl_seconds: parsed("CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?,
            rl_window_seconds: parsed("RL_WINDOW_SECONDS", DEFAULT_RL_WINDOW_SECONDS)?,
            rl_limit: parsed("RL_LIMIT", DEFAULT_RL_LIMIT)?,
            port: parsed("PORT", DEFAULT_PORT)?,
            base_url: optional("WEBHOOK_URL").map(|u| u.trim_end_matches('/').to_string()),
            audit_url: optional("AUDIT_URL"),
        })
    }
}
