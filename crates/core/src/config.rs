use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::insights::RuleOrder;
use crate::recommend::{OutOfDomainPolicy, RecommendSettings};

pub const DEFAULT_CONFIG_FILE: &str = "flatwise.toml";
pub const NESTED_CONFIG_FILE: &str = "config/flatwise.toml";

const MAX_PAGE_SIZE: usize = 100;
const MAX_DEADLINE_MS: u64 = 60_000;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub data: DataConfig,
    pub recommend: RecommendConfig,
    pub insights: InsightsConfig,
    pub logging: LoggingConfig,
}

/// Locations of the pre-built artifacts loaded at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct DataConfig {
    pub listings: PathBuf,
    pub network: PathBuf,
    pub categories: PathBuf,
    pub criteria: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecommendConfig {
    pub page_size: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InsightsConfig {
    pub rule_order: RuleOrder,
    pub seed: Option<u64>,
    /// Per-listing budget in milliseconds; 0 disables the deadline.
    pub deadline_ms: u64,
    pub out_of_domain: OutOfDomainPolicy,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub listings_path: Option<PathBuf>,
    pub network_path: Option<PathBuf>,
    pub categories_path: Option<PathBuf>,
    pub criteria_path: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub rule_order: Option<RuleOrder>,
    pub seed: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                listings: PathBuf::from("data/resale_flat_prices.csv"),
                network: PathBuf::from("data/bayesian_network.json"),
                categories: PathBuf::from("data/category_bins.json"),
                criteria: PathBuf::from("config/mcda_criteria.json"),
            },
            recommend: RecommendConfig { page_size: crate::ranking::DEFAULT_PAGE_SIZE },
            insights: InsightsConfig {
                rule_order: RuleOrder::Priority,
                seed: None,
                deadline_ms: 500,
                out_of_domain: OutOfDomainPolicy::Fallback,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Pipeline settings derived from the `[recommend]` and `[insights]` sections.
    pub fn recommend_settings(&self) -> RecommendSettings {
        RecommendSettings {
            page_size: self.recommend.page_size,
            rule_order: self.insights.rule_order,
            seed: self.insights.seed,
            deadline: (self.insights.deadline_ms > 0)
                .then(|| Duration::from_millis(self.insights.deadline_ms)),
            out_of_domain: self.insights.out_of_domain,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(data) = patch.data {
            if let Some(listings) = data.listings {
                self.data.listings = listings;
            }
            if let Some(network) = data.network {
                self.data.network = network;
            }
            if let Some(categories) = data.categories {
                self.data.categories = categories;
            }
            if let Some(criteria) = data.criteria {
                self.data.criteria = criteria;
            }
        }

        if let Some(recommend) = patch.recommend {
            if let Some(page_size) = recommend.page_size {
                self.recommend.page_size = page_size;
            }
        }

        if let Some(insights) = patch.insights {
            if let Some(rule_order) = insights.rule_order {
                self.insights.rule_order = rule_order;
            }
            if let Some(seed) = insights.seed {
                self.insights.seed = Some(seed);
            }
            if let Some(deadline_ms) = insights.deadline_ms {
                self.insights.deadline_ms = deadline_ms;
            }
            if let Some(out_of_domain) = insights.out_of_domain {
                self.insights.out_of_domain = out_of_domain;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FLATWISE_DATA_LISTINGS") {
            self.data.listings = PathBuf::from(value);
        }
        if let Some(value) = read_env("FLATWISE_DATA_NETWORK") {
            self.data.network = PathBuf::from(value);
        }
        if let Some(value) = read_env("FLATWISE_DATA_CATEGORIES") {
            self.data.categories = PathBuf::from(value);
        }
        if let Some(value) = read_env("FLATWISE_DATA_CRITERIA") {
            self.data.criteria = PathBuf::from(value);
        }

        if let Some(value) = read_env("FLATWISE_RECOMMEND_PAGE_SIZE") {
            self.recommend.page_size = parse_usize("FLATWISE_RECOMMEND_PAGE_SIZE", &value)?;
        }

        if let Some(value) = read_env("FLATWISE_INSIGHTS_RULE_ORDER") {
            self.insights.rule_order = value.parse().map_err(ConfigError::Validation)?;
        }
        if let Some(value) = read_env("FLATWISE_INSIGHTS_SEED") {
            self.insights.seed = Some(parse_u64("FLATWISE_INSIGHTS_SEED", &value)?);
        }
        if let Some(value) = read_env("FLATWISE_INSIGHTS_DEADLINE_MS") {
            self.insights.deadline_ms = parse_u64("FLATWISE_INSIGHTS_DEADLINE_MS", &value)?;
        }
        if let Some(value) = read_env("FLATWISE_INSIGHTS_OUT_OF_DOMAIN") {
            self.insights.out_of_domain = value.parse().map_err(ConfigError::Validation)?;
        }

        let log_level =
            read_env("FLATWISE_LOGGING_LEVEL").or_else(|| read_env("FLATWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FLATWISE_LOGGING_FORMAT").or_else(|| read_env("FLATWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(listings) = overrides.listings_path {
            self.data.listings = listings;
        }
        if let Some(network) = overrides.network_path {
            self.data.network = network;
        }
        if let Some(categories) = overrides.categories_path {
            self.data.categories = categories;
        }
        if let Some(criteria) = overrides.criteria_path {
            self.data.criteria = criteria;
        }
        if let Some(page_size) = overrides.page_size {
            self.recommend.page_size = page_size;
        }
        if let Some(rule_order) = overrides.rule_order {
            self.insights.rule_order = rule_order;
        }
        if let Some(seed) = overrides.seed {
            self.insights.seed = Some(seed);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_data(&self.data)?;
        validate_recommend(&self.recommend)?;
        validate_insights(&self.insights)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `load` would read: the explicit path when it exists, else
/// `flatwise.toml`, else `config/flatwise.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_data(data: &DataConfig) -> Result<(), ConfigError> {
    let paths = [
        ("data.listings", &data.listings),
        ("data.network", &data.network),
        ("data.categories", &data.categories),
        ("data.criteria", &data.criteria),
    ];
    for (key, path) in paths {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }

    let listings_csv =
        data.listings.extension().map(|ext| ext.eq_ignore_ascii_case("csv")).unwrap_or(false);
    if !listings_csv {
        return Err(ConfigError::Validation(
            "data.listings must point at a `.csv` file".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommend(recommend: &RecommendConfig) -> Result<(), ConfigError> {
    if recommend.page_size == 0 || recommend.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "recommend.page_size must be in range 1..={MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

fn validate_insights(insights: &InsightsConfig) -> Result<(), ConfigError> {
    if insights.deadline_ms > MAX_DEADLINE_MS {
        return Err(ConfigError::Validation(format!(
            "insights.deadline_ms must be in range 0..={MAX_DEADLINE_MS} (0 disables the deadline)"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    data: Option<DataPatch>,
    recommend: Option<RecommendPatch>,
    insights: Option<InsightsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataPatch {
    listings: Option<PathBuf>,
    network: Option<PathBuf>,
    categories: Option<PathBuf>,
    criteria: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecommendPatch {
    page_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct InsightsPatch {
    rule_order: Option<RuleOrder>,
    seed: Option<u64>,
    deadline_ms: Option<u64>,
    out_of_domain: Option<OutOfDomainPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
