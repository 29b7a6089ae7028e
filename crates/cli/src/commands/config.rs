use std::env;
use std::fs;
use std::path::Path;

use flatwise_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let seed = config.insights.seed.map(|seed| seed.to_string());
    let deadline = match config.insights.deadline_ms {
        0 => "disabled".to_string(),
        millis => format!("{millis}ms"),
    };

    let fields: Vec<(&str, String, &[&str])> = vec![
        ("data.listings", config.data.listings.display().to_string(), &["FLATWISE_DATA_LISTINGS"][..]),
        ("data.network", config.data.network.display().to_string(), &["FLATWISE_DATA_NETWORK"][..]),
        (
            "data.categories",
            config.data.categories.display().to_string(),
            &["FLATWISE_DATA_CATEGORIES"][..],
        ),
        ("data.criteria", config.data.criteria.display().to_string(), &["FLATWISE_DATA_CRITERIA"][..]),
        (
            "recommend.page_size",
            config.recommend.page_size.to_string(),
            &["FLATWISE_RECOMMEND_PAGE_SIZE"][..],
        ),
        (
            "insights.rule_order",
            config.insights.rule_order.to_string(),
            &["FLATWISE_INSIGHTS_RULE_ORDER"][..],
        ),
        ("insights.seed", seed.unwrap_or_else(|| "<unset>".to_string()), &["FLATWISE_INSIGHTS_SEED"][..]),
        ("insights.deadline_ms", deadline, &["FLATWISE_INSIGHTS_DEADLINE_MS"][..]),
        (
            "insights.out_of_domain",
            config.insights.out_of_domain.to_string(),
            &["FLATWISE_INSIGHTS_OUT_OF_DOMAIN"][..],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["FLATWISE_LOGGING_LEVEL", "FLATWISE_LOG_LEVEL"][..],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["FLATWISE_LOGGING_FORMAT", "FLATWISE_LOG_FORMAT"][..],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        fields
            .into_iter()
            .map(|(key, value, env_keys)| render_line(key, &value, source(key, env_keys))),
    );

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = set_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
