// src/config.rs

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, Months, NaiveDate};
use strum::IntoEnumIterator;
use thiserror::Error;
use url::Url;

use crate::cli::Cli;
use crate::core::api::DEFAULT_API_URL;
use crate::core::auth::Authenticator;
use crate::core::collector::pool::default_workers;
use crate::core::models::{DateRange, Module};

pub const TOKEN_VAR: &str = "CYMULATE_XTOKEN";
pub const CLIENT_VAR: &str = "CLIENTE";
pub const API_URL_VAR: &str = "CYMULATE_API_URL";

/// Value shipped in the sample `.env`; never a real token.
pub const PLACEHOLDER_TOKEN: &str = "SUA_CHAVE_AQUI";
pub const DEFAULT_CLIENT: &str = "ELOPAR";
const DEFAULT_RANGE_MONTHS: u32 = 6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CYMULATE_XTOKEN is not set (environment or .env)")]
    MissingToken,

    #[error("CYMULATE_XTOKEN still holds the placeholder value, put your API token in .env")]
    PlaceholderToken,

    #[error("CYMULATE_XTOKEN contains characters that cannot be sent in an HTTP header")]
    InvalidToken,

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid API URL {url:?}: {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Everything a run needs, resolved once from the command line, the process
/// environment and `.env`. Components receive it by reference and never read
/// the environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    pub client: String,
    pub auth: Authenticator,
    pub api_url: Url,
    pub range: DateRange,
    /// True when neither date was given and the six-month default applies.
    pub default_range: bool,
    pub modules: Vec<Module>,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub timeout: Duration,
    pub retry_once: bool,
    pub skip_inventory: bool,
}

impl Config {
    /// Resolves the configuration against the process environment (with
    /// `.env` already loaded by `main`) and today's local date.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::from_sources(cli, |key| std::env::var(key).ok(), Local::now().date_naive())
    }

    pub fn from_sources(
        cli: &Cli,
        lookup: impl Fn(&str) -> Option<String>,
        today: NaiveDate,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let token = var(TOKEN_VAR).ok_or(ConfigError::MissingToken)?;
        if token == PLACEHOLDER_TOKEN {
            return Err(ConfigError::PlaceholderToken);
        }
        let auth = Authenticator::new(&token)?;

        let client = var(CLIENT_VAR).unwrap_or_else(|| DEFAULT_CLIENT.to_string());
        let api_url =
            parse_api_url(&var(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string()))?;

        let fallback = default_range(today);
        let range = DateRange::new(
            cli.start_date.unwrap_or(fallback.start),
            cli.end_date.unwrap_or(fallback.end),
        );
        if range.start > range.end {
            return Err(ConfigError::InvalidRange { start: range.start, end: range.end });
        }

        let mut modules: Vec<Module> = Vec::new();
        for module in &cli.modules {
            if !modules.contains(module) {
                modules.push(*module);
            }
        }
        if modules.is_empty() {
            modules = Module::iter().collect();
        }

        Ok(Self {
            client,
            auth,
            api_url,
            range,
            default_range: range == fallback,
            modules,
            output_dir: cli.output_dir.clone(),
            workers: cli.workers.unwrap_or_else(default_workers).max(1),
            timeout: Duration::from_secs(cli.timeout.max(1)),
            retry_once: cli.retry_once,
            skip_inventory: cli.skip_inventory,
        })
    }
}

/// Six calendar months back from `today`, through `today`.
pub fn default_range(today: NaiveDate) -> DateRange {
    let start = today
        .checked_sub_months(Months::new(DEFAULT_RANGE_MONTHS))
        .unwrap_or(today);
    DateRange::new(start, today)
}

/// Parses the API root, making sure it ends with `/` so endpoint paths are
/// joined below it rather than replacing its last segment.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') { raw.to_string() } else { format!("{raw}/") };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidApiUrl {
        url: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 31).unwrap()
    }

    fn resolve(args: &[&str], vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let cli = Cli::parse_from(std::iter::once("cymulate-export").chain(args.iter().copied()));
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(&cli, |key| vars.get(key).cloned(), today())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(resolve(&[], &[]), Err(ConfigError::MissingToken)));
        assert!(matches!(resolve(&[], &[(TOKEN_VAR, "   ")]), Err(ConfigError::MissingToken)));
        assert!(matches!(
            resolve(&[], &[(TOKEN_VAR, PLACEHOLDER_TOKEN)]),
            Err(ConfigError::PlaceholderToken)
        ));
    }

    #[test]
    fn defaults_cover_six_months_and_every_module() {
        let config = resolve(&[], &[(TOKEN_VAR, "tok")]).unwrap();
        assert_eq!(config.client, DEFAULT_CLIENT);
        assert_eq!(config.range.start, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(config.range.end, today());
        assert!(config.default_range);
        assert_eq!(config.modules.len(), 7);
        assert_eq!(config.modules[0], Module::ImmediateThreats);
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert!(config.workers >= 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = resolve(
            &[
                "-s", "2024-01-01", "-e", "2024-01-31", "-m", "edr", "-m", "edr", "-m", "mail",
                "-w", "0",
            ],
            &[(TOKEN_VAR, "tok"), (CLIENT_VAR, "ACME"), (API_URL_VAR, "http://localhost:9000/api")],
        )
        .unwrap();
        assert_eq!(config.client, "ACME");
        assert!(!config.default_range);
        assert_eq!(config.modules, [Module::Edr, Module::Mail]);
        assert_eq!(config.workers, 1);
        assert_eq!(config.api_url.as_str(), "http://localhost:9000/api/");
        assert_eq!(
            config.api_url.join("v1/environments").unwrap().as_str(),
            "http://localhost:9000/api/v1/environments"
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = resolve(&["-s", "2024-02-01", "-e", "2024-01-01"], &[(TOKEN_VAR, "tok")]);
        assert!(matches!(result, Err(ConfigError::InvalidRange { .. })));
    }

    #[test]
    fn bad_api_url_is_rejected() {
        let result = resolve(&[], &[(TOKEN_VAR, "tok"), (API_URL_VAR, "not a url")]);
        assert!(matches!(result, Err(ConfigError::InvalidApiUrl { .. })));
    }

    #[test]
    fn default_range_clamps_to_month_end() {
        let range = default_range(NaiveDate::from_ymd_opt(2023, 8, 31).unwrap());
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
    }
}
