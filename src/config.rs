//! Settings read from the environment.

use crate::http::DEFAULT_USER_AGENT;

/// Environment variable holding the API base URL, e.g. `https://api.example.com`.
pub const BASE_URL_ENV: &str = "CONFIG_BASEURL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix for every endpoint. Empty when unset; requests then fail with
    /// an invalid URL instead of going somewhere unexpected.
    pub base_url: String,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_ENV).unwrap_or_default();
        Self {
            base_url: base_url.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
