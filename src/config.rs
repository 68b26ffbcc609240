use std::env;

use anyhow::{Context, Result};

use crate::reputation::{PointCatalog, ScoredAction};

/// Default parallelism for the counter reconciliation sweep.
pub const DEFAULT_RECONCILE_CONCURRENCY: usize = 8;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Point values for every scorable action, after env overrides
    pub catalog: PointCatalog,
    /// How many subjects the reconciliation sweep checks at once
    pub reconcile_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default. A variable that is set but doesn't parse is
    /// an error rather than silently falling back.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut catalog = PointCatalog::default();
        for action in ScoredAction::ALL {
            let key = format!("PRESTIGE_POINTS_{}", action.as_str());
            if let Some(raw) = lookup(&key) {
                let points: i64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be an integer, got {raw:?}"))?;
                catalog = catalog.with_override(action, points);
            }
        }

        let reconcile_concurrency = match lookup("PRESTIGE_RECONCILE_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<usize>().with_context(|| {
                format!("PRESTIGE_RECONCILE_CONCURRENCY must be a positive integer, got {raw:?}")
            })?,
            None => DEFAULT_RECONCILE_CONCURRENCY,
        };
        if reconcile_concurrency == 0 {
            anyhow::bail!("PRESTIGE_RECONCILE_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            db_path: lookup("PRESTIGE_DB_PATH").unwrap_or_else(|| "./prestige.db".to_string()),
            catalog,
            reconcile_concurrency,
        })
    }
}
