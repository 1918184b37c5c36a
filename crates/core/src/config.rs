use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::policy::PolicyConfig;

/// Application configuration, assembled in layers: built-in defaults, an
/// optional TOML file, `MATZIP_*` environment variables, then programmatic
/// overrides. Validation runs once over the merged result.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub search: SearchBackendConfig,
    pub llm: LlmConfig,
    pub resolver: PolicyConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SearchBackendConfig {
    pub base_url: String,
    pub index: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub search_base_url: Option<String>,
    pub search_index: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub log_level: Option<String>,
    pub max_attempts: Option<u32>,
    pub min_results_threshold: Option<u64>,
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
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchBackendConfig {
                base_url: "http://localhost:9200".to_owned(),
                index: "restaurants".to_owned(),
                timeout_secs: 10,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.anthropic.com".to_owned(),
                model: "claude-3-sonnet-20240229".to_owned(),
                timeout_secs: 30,
            },
            resolver: PolicyConfig::default(),
            server: ServerConfig { bind_address: "127.0.0.1".to_owned(), port: 8080 },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    search: Option<SearchPatch>,
    llm: Option<LlmPatch>,
    resolver: Option<ResolverPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    base_url: Option<String>,
    index: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolverPatch {
    max_attempts: Option<u32>,
    min_results_threshold: Option<u64>,
    widened_limit: Option<u32>,
    default_limit: Option<u32>,
    default_query: Option<String>,
    max_detail_name_chars: Option<usize>,
    min_price_band_width: Option<i64>,
    max_plausible_min_price: Option<i64>,
    generic_keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("matzip.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(search) = patch.search {
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(index) = search.index {
                self.search.index = index;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(resolver) = patch.resolver {
            if let Some(max_attempts) = resolver.max_attempts {
                self.resolver.max_attempts = max_attempts;
            }
            if let Some(threshold) = resolver.min_results_threshold {
                self.resolver.min_results_threshold = threshold;
            }
            if let Some(widened_limit) = resolver.widened_limit {
                self.resolver.widened_limit = widened_limit;
            }
            if let Some(default_limit) = resolver.default_limit {
                self.resolver.default_limit = default_limit;
            }
            if let Some(default_query) = resolver.default_query {
                self.resolver.default_query = default_query;
            }
            if let Some(chars) = resolver.max_detail_name_chars {
                self.resolver.max_detail_name_chars = chars;
            }
            if let Some(width) = resolver.min_price_band_width {
                self.resolver.min_price_band_width = width;
            }
            if let Some(floor) = resolver.max_plausible_min_price {
                self.resolver.max_plausible_min_price = floor;
            }
            if let Some(keywords) = resolver.generic_keywords {
                self.resolver.generic_keywords = keywords;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("MATZIP_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }
        if let Some(value) = read_env("MATZIP_SEARCH_INDEX") {
            self.search.index = value;
        }
        if let Some(value) = read_env("MATZIP_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("MATZIP_SEARCH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MATZIP_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("MATZIP_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("MATZIP_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("MATZIP_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MATZIP_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MATZIP_RESOLVER_MAX_ATTEMPTS") {
            self.resolver.max_attempts = parse_u32("MATZIP_RESOLVER_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("MATZIP_RESOLVER_MIN_RESULTS_THRESHOLD") {
            self.resolver.min_results_threshold =
                parse_u64("MATZIP_RESOLVER_MIN_RESULTS_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("MATZIP_RESOLVER_GENERIC_KEYWORDS") {
            self.resolver.generic_keywords = value
                .split(',')
                .map(str::trim)
                .filter(|kw| !kw.is_empty())
                .map(str::to_owned)
                .collect();
        }

        if let Some(value) = read_env("MATZIP_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MATZIP_SERVER_PORT") {
            self.server.port = parse_u16("MATZIP_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("MATZIP_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("MATZIP_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.search_base_url {
            self.search.base_url = base_url;
        }
        if let Some(index) = overrides.search_index {
            self.search.index = index;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.resolver.max_attempts = max_attempts;
        }
        if let Some(threshold) = overrides.min_results_threshold {
            self.resolver.min_results_threshold = threshold;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.search.base_url.starts_with("http://")
            && !self.search.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "search.base_url must be an http(s) URL".to_owned(),
            ));
        }
        if self.search.index.trim().is_empty() {
            return Err(ConfigError::Validation("search.index must not be empty".to_owned()));
        }
        if self.search.timeout_secs == 0 || self.search.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "search.timeout_secs must be in range 1..=300".to_owned(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_owned()));
        }
        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be in range 1..=300".to_owned(),
            ));
        }
        if let Some(api_key) = &self.llm.api_key {
            if api_key.expose_secret().trim().is_empty() {
                return Err(ConfigError::Validation(
                    "llm.api_key must not be blank when set".to_owned(),
                ));
            }
        }

        if self.resolver.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "resolver.max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.resolver.min_results_threshold == 0 {
            return Err(ConfigError::Validation(
                "resolver.min_results_threshold must be at least 1".to_owned(),
            ));
        }
        if self.resolver.default_query.trim().is_empty() {
            return Err(ConfigError::Validation(
                "resolver.default_query must not be empty".to_owned(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must not be zero".to_owned()));
        }

        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("matzip.toml"), PathBuf::from("config/matzip.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().expect("defaults should be valid");
    }

    #[test]
    fn overrides_take_precedence() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                search_index: Some("yeouido_restaurants".to_owned()),
                max_attempts: Some(5),
                min_results_threshold: Some(3),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load should succeed");

        assert_eq!(config.search.index, "yeouido_restaurants");
        assert_eq!(config.resolver.max_attempts, 5);
        assert_eq!(config.resolver.min_results_threshold, 3);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/matzip.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn zero_attempts_fails_validation() {
        let mut config = AppConfig::default();
        config.resolver.max_attempts = 0;
        let error = config.validate().expect_err("should fail");
        assert!(error.to_string().contains("max_attempts"));
    }

    #[test]
    fn non_http_backend_url_fails_validation() {
        let mut config = AppConfig::default();
        config.search.base_url = "ftp://example.com".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("json".parse::<LogFormat>().expect("json"), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().expect("compact"), LogFormat::Compact);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
