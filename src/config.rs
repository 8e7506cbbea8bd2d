use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::address::validate_author;
use crate::client::DEFAULT_FETCH_TIMEOUT;

pub const ENV_STORE_DIR: &str = "NOSTRBOOK_STORE_DIR";
pub const ENV_AUTHOR: &str = "NOSTRBOOK_AUTHOR";
pub const ENV_FETCH_TIMEOUT_MS: &str = "NOSTRBOOK_FETCH_TIMEOUT_MS";
pub const ENV_LIST_LIMIT: &str = "NOSTRBOOK_LIST_LIMIT";

const DEFAULT_STORE_DIR: &str = "nostrbook-store";
pub const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store_dir: PathBuf,
    pub author: Option<String>,
    pub fetch_timeout: Duration,
    pub list_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            author: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset and blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(dir) = get(ENV_STORE_DIR) {
            config.store_dir = PathBuf::from(dir);
        }
        if let Some(author) = get(ENV_AUTHOR) {
            config.author = Some(parse_author(&author).with_context(|| {
                format!("invalid {ENV_AUTHOR}={author:?}. expected a 64 character hex public key")
            })?);
        }
        if let Some(raw) = get(ENV_FETCH_TIMEOUT_MS) {
            let ms = raw.parse::<u64>().with_context(|| {
                format!("invalid {ENV_FETCH_TIMEOUT_MS}={raw:?}. expected milliseconds")
            })?;
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = get(ENV_LIST_LIMIT) {
            let limit = raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| {
                    format!("invalid {ENV_LIST_LIMIT}={raw:?}. expected a positive integer")
                })?;
            config.list_limit = limit;
        }
        Ok(config)
    }

    /// Applies `--store` / `--author` flags on top of the environment.
    pub fn with_overrides(
        mut self,
        store_dir: Option<&str>,
        author: Option<&str>,
    ) -> anyhow::Result<Self> {
        if let Some(dir) = store_dir {
            self.store_dir = PathBuf::from(dir);
        }
        if let Some(author) = author {
            self.author = Some(parse_author(author).context("invalid --author")?);
        }
        Ok(self)
    }

    pub fn require_author(&self) -> anyhow::Result<&str> {
        self.author.as_deref().with_context(|| {
            format!("an author public key is required; set {ENV_AUTHOR} or pass --author")
        })
    }
}

fn parse_author(raw: &str) -> anyhow::Result<String> {
    let author = raw.trim().to_ascii_lowercase();
    validate_author(&author)?;
    Ok(author)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const AUTHOR: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[]))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.fetch_timeout, Duration::from_millis(3000));
        assert!(config.require_author().is_err());
        Ok(())
    }

    #[test]
    fn reads_every_variable() -> anyhow::Result<()> {
        let upper = AUTHOR.to_ascii_uppercase();
        let config = Config::from_lookup(lookup(&[
            (ENV_STORE_DIR, "/tmp/books"),
            (ENV_AUTHOR, upper.as_str()),
            (ENV_FETCH_TIMEOUT_MS, "500"),
            (ENV_LIST_LIMIT, "5"),
        ]))?;
        assert_eq!(config.store_dir, PathBuf::from("/tmp/books"));
        assert_eq!(config.require_author()?, AUTHOR);
        assert_eq!(config.fetch_timeout, Duration::from_millis(500));
        assert_eq!(config.list_limit, 5);
        Ok(())
    }

    #[test]
    fn rejects_invalid_values() {
        let err = Config::from_lookup(lookup(&[(ENV_LIST_LIMIT, "0")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains(ENV_LIST_LIMIT));
        assert!(Config::from_lookup(lookup(&[(ENV_AUTHOR, "npub1xyz")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_FETCH_TIMEOUT_MS, "soon")])).is_err());
    }

    #[test]
    fn cli_overrides_win() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[(ENV_STORE_DIR, "env")]))?
            .with_overrides(Some("flag"), Some(AUTHOR))?;
        assert_eq!(config.store_dir, PathBuf::from("flag"));
        assert_eq!(config.author.as_deref(), Some(AUTHOR));
        Ok(())
    }
}
