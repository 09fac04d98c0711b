use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::model::AgeRange;
use crate::store::{DeleteMode, StoreKind, StoreOptions};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub store: StoreKind,
    /// SQLite file, only read when `store` is `Sqlite`.
    pub db_path: PathBuf,
    pub delete_mode: DeleteMode,
    pub unique_names: bool,
    pub seed: bool,
    pub ages: AgeRange,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = get("STUDENTD_BIND")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse::<SocketAddr>()
            .context("STUDENTD_BIND must be a socket address like 127.0.0.1:8080")?;

        let store = match get("STUDENTD_STORE").as_deref().map(str::trim) {
            None | Some("memory") => StoreKind::Memory,
            Some("sqlite") => StoreKind::Sqlite,
            Some(other) => bail!("STUDENTD_STORE must be 'memory' or 'sqlite', got '{other}'"),
        };

        let db_path = get("STUDENTD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("students.sqlite3"));

        let soft_delete = parse_bool(get("STUDENTD_SOFT_DELETE"), false)
            .context("STUDENTD_SOFT_DELETE must be true or false")?;
        let unique_names = parse_bool(get("STUDENTD_UNIQUE_NAMES"), true)
            .context("STUDENTD_UNIQUE_NAMES must be true or false")?;
        let seed =
            parse_bool(get("STUDENTD_SEED"), true).context("STUDENTD_SEED must be true or false")?;

        let defaults = AgeRange::default();
        let min = parse_i64(get("STUDENTD_MIN_AGE"), defaults.min)
            .context("STUDENTD_MIN_AGE must be an integer")?;
        let max = parse_i64(get("STUDENTD_MAX_AGE"), defaults.max)
            .context("STUDENTD_MAX_AGE must be an integer")?;
        if min > max {
            bail!("STUDENTD_MIN_AGE ({min}) must not exceed STUDENTD_MAX_AGE ({max})");
        }

        Ok(Config {
            bind,
            store,
            db_path,
            delete_mode: if soft_delete {
                DeleteMode::Soft
            } else {
                DeleteMode::Hard
            },
            unique_names,
            seed,
            ages: AgeRange { min, max },
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            delete_mode: self.delete_mode,
            unique_names: self.unique_names,
        }
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => bail!("invalid boolean '{other}'"),
        },
    }
}

fn parse_i64(value: Option<String>, default: i64) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(v) => Ok(v.trim().parse::<i64>()?),
    }
}
