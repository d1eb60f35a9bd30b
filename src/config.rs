use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::{debug, info};

use crate::error::ConfigError;
use crate::models::OptionSet;

const DEFAULT_OPTIONS: [&str; 5] = [
    "বাংলাদেশ জাতীয়তাবাদী দল - বি.এন.পি",
    "বাংলাদেশ আওয়ামী লীগ",
    "জাতীয় নাগরিক পার্টি - এনসিপি",
    "বাংলাদেশ জামায়াতে ইসলামী",
    "জাতীয় পার্টি",
];

const DEFAULT_RANK_IMAGES: [&str; 5] = [
    "https://i.imgflip.com/2/1bij.jpg",
    "https://i.imgflip.com/2/2fm6x.jpg",
    "https://i.imgflip.com/2/5c7lwq.jpg",
    "https://i.imgflip.com/2/1o00in.jpg",
    "https://i.imgflip.com/2/1g8my4.jpg",
];

const LIST_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// Read straight from `APP_ENV`, before the rest of the config, so the
    /// logger can start first.
    pub fn from_env() -> Self {
        Self::parse(env::var("APP_ENV").ok().as_deref())
    }

    // Used when RUST_LOG is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Environment::Production => "info",
            Environment::Development => "debug",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub title: String,
    pub options: OptionSet,
    pub rank_images: Vec<String>,
    pub refresh_secs: u64,
    pub max_connections: u32,
    pub storage_timeout: Duration,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::parse(lookup("APP_ENV").as_deref());

        let options = match lookup("POLL_OPTIONS") {
            Some(raw) => OptionSet::new(split_list(&raw)),
            None => OptionSet::new(DEFAULT_OPTIONS),
        }
        .map_err(|message| ConfigError::Invalid {
            key: "POLL_OPTIONS",
            message,
        })?;

        let storage_timeout_secs: u64 = parse_or(&lookup, "STORAGE_TIMEOUT_SECS", 5)?;
        if storage_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "STORAGE_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: string_or(&lookup, "DATABASE_URL", "sqlite:voting.db"),
            host: string_or(&lookup, "HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 5000)?,
            environment,
            title: string_or(&lookup, "POLL_TITLE", "Opinion Poll"),
            options,
            // Set but empty turns the images off.
            rank_images: lookup("POLL_RANK_IMAGES")
                .map(|raw| split_list(&raw))
                .unwrap_or_else(|| DEFAULT_RANK_IMAGES.iter().map(|s| s.to_string()).collect()),
            refresh_secs: parse_or(&lookup, "POLL_REFRESH_SECS", 5)?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            storage_timeout: Duration::from_secs(storage_timeout_secs),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Image for a 1-based rank; ranks past the end reuse the last image.
    pub fn rank_image(&self, rank: usize) -> Option<&str> {
        if rank == 0 {
            return None;
        }
        self.rank_images
            .get(rank - 1)
            .or_else(|| self.rank_images.last())
            .map(String::as_str)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
