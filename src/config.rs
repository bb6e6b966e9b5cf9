use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_START_YEAR: i32 = 2024;
pub const DEFAULT_END_YEAR: i32 = 2028;

/// Runtime settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub database_url: Option<String>,
    pub roster_path: Option<PathBuf>,
    pub fiscal_start_year: i32,
    pub fiscal_end_year: i32,
    pub insight_proxy_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let year = |key: &str, default: i32| -> anyhow::Result<i32> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a year, got {raw:?}")),
                None => Ok(default),
            }
        };

        Ok(Self {
            environment: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
            database_url: lookup("DATABASE_URL"),
            roster_path: lookup("ROSTER_PATH").map(PathBuf::from),
            fiscal_start_year: year("FISCAL_START_YEAR", DEFAULT_START_YEAR)?,
            fiscal_end_year: year("FISCAL_END_YEAR", DEFAULT_END_YEAR)?,
            insight_proxy_url: lookup("INSIGHT_PROXY_URL"),
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.fiscal_start_year, DEFAULT_START_YEAR);
        assert_eq!(cfg.fiscal_end_year, DEFAULT_END_YEAR);
        assert!(!cfg.is_production());
        assert!(cfg.database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("APP_ENV", "production"),
            ("FISCAL_START_YEAR", "2026"),
            ("DATABASE_URL", "postgres://localhost/kpi"),
        ])
        .unwrap();
        assert!(cfg.is_production());
        assert_eq!(cfg.fiscal_start_year, 2026);
        assert_eq!(cfg.database_url().unwrap(), "postgres://localhost/kpi");
    }

    #[test]
    fn rejects_bad_year() {
        assert!(config(&[("FISCAL_END_YEAR", "soon")]).is_err());
    }
}
