use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{AssistantError, SecretValue, require_env};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "AIRESEARCH_CONFIG";

/// Tokens a single run typically consumes across all LLM calls.
const TOKENS_PER_RUN: u64 = 2_000;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Defaults adjusted for a named deployment profile.
    pub fn for_profile(profile: Profile) -> Self {
        let mut config = Self::default();
        match profile {
            Profile::Development => {
                config.mode = Mode::Demo;
                config.search.max_results = 3;
                config.llm.temperature = 0.5;
            }
            Profile::Production => {
                config.mode = Mode::Live;
                config.search.max_results = 10;
                config.llm.temperature = 0.7;
                config.logging.level = "warn".to_string();
            }
            Profile::Test => {
                config.mode = Mode::Demo;
                config.search.max_results = 2;
                config.report.output_dir = PathBuf::from("tests/test_reports");
            }
        }
        config
    }

    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, AssistantError> {
        require_env(&self.llm.api_key_env)
    }

    /// Rough USD cost of `runs` pipeline runs; demo mode never calls the LLM.
    pub fn estimate_cost(&self, runs: u32) -> CostEstimate {
        let tokens = match self.mode {
            Mode::Demo => 0,
            Mode::Live => TOKENS_PER_RUN * u64::from(runs),
        };
        CostEstimate {
            runs,
            tokens,
            usd: tokens as f64 / 1_000.0 * self.llm.cost_per_1k_tokens,
        }
    }

    pub fn validate(&self) -> Result<(), AssistantError> {
        if self.search.max_results == 0 {
            return Err(invalid("search.max_results must be at least 1"));
        }
        if self.search.queries_per_topic == 0 {
            return Err(invalid("search.queries_per_topic must be at least 1"));
        }
        if self.analysis.max_findings == 0 {
            return Err(invalid("analysis.max_findings must be at least 1"));
        }
        if self.analysis.max_context_chars == 0 {
            return Err(invalid("analysis.max_context_chars must be at least 1"));
        }
        for (field, value) in [
            ("llm.temperature", self.llm.temperature),
            ("analysis.temperature", self.analysis.temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(invalid(&format!("{field} must be within [0, 2]")));
            }
        }

        if self.mode == Mode::Live {
            if self.llm.api_key_env.trim().is_empty() {
                return Err(invalid(
                    "llm.api_key_env must reference an environment variable",
                ));
            }
            // Ensure the key exists at load time to discourage inline secrets.
            require_env(&self.llm.api_key_env)?;
        }
        Ok(())
    }
}

fn invalid(message: &str) -> AssistantError {
    AssistantError::InvalidConfiguration(message.to_string())
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `AIRESEARCH_CONFIG` environment variable.
    /// 3. `config.toml` in the current working directory, or built-in
    ///    defaults when that file does not exist.
    pub fn load(path: Option<PathBuf>) -> Result<Config, AssistantError> {
        Self::load_with_base(path, Config::default())
    }

    /// Like [`ConfigLoader::load`], but missing keys fall back to `base`
    /// instead of the built-in defaults.
    pub fn load_with_base(path: Option<PathBuf>, base: Config) -> Result<Config, AssistantError> {
        let config = Self::load_unvalidated(path, base)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve and merge configuration without validating it, so callers can
    /// apply overrides (such as forcing demo mode) before [`Config::validate`].
    pub fn load_unvalidated(
        path: Option<PathBuf>,
        base: Config,
    ) -> Result<Config, AssistantError> {
        match resolve_path(path) {
            Some(candidate) => {
                let raw = fs::read_to_string(&candidate)
                    .map_err(|err| AssistantError::config_io(candidate.clone(), err))?;
                Self::parse_with_base(&raw, base)
            }
            None => Ok(base),
        }
    }

    /// Parse TOML without validating it.
    pub fn parse(raw: &str) -> Result<Config, AssistantError> {
        Self::parse_with_base(raw, Config::default())
    }

    fn parse_with_base(raw: &str, base: Config) -> Result<Config, AssistantError> {
        let mut merged = toml::Value::try_from(&base)
            .map_err(|err| AssistantError::InvalidConfiguration(err.to_string()))?;
        let overrides: toml::Value = toml::from_str(raw)
            .map_err(|err| AssistantError::InvalidConfiguration(err.to_string()))?;
        merge_toml(&mut merged, overrides);
        merged
            .try_into()
            .map_err(|err: toml::de::Error| AssistantError::InvalidConfiguration(err.to_string()))
    }
}

fn merge_toml(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn resolve_path(path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return Some(PathBuf::from(from_env));
        }
    }

    let default = Path::new(DEFAULT_CONFIG_PATH);
    default.exists().then(|| default.to_path_buf())
}

/// Offline demo data and deterministic stages, or real search and LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Demo,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
    Test,
}

impl FromStr for Profile {
    type Err = AssistantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "production" | "prod" => Ok(Profile::Production),
            "test" => Ok(Profile::Test),
            other => Err(AssistantError::InvalidConfiguration(format!(
                "unknown profile '{other}' (expected development, production or test)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub cost_per_1k_tokens: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
            max_tokens: 2_000,
            timeout_secs: 60,
            cost_per_1k_tokens: 0.0015,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    DuckDuckGo,
    Demo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStrategyKind {
    #[default]
    Templated,
    Generated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: SearchBackend,
    pub max_results: usize,
    pub queries_per_topic: usize,
    pub query_strategy: QueryStrategyKind,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchBackend::DuckDuckGo,
            max_results: 5,
            queries_per_topic: 3,
            query_strategy: QueryStrategyKind::Templated,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_findings: usize,
    pub max_keywords: usize,
    pub max_context_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_findings: 5,
            max_keywords: 10,
            max_context_chars: 3_000,
            temperature: 0.5,
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub save: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/reports"),
            save: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub persist_runs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            persist_runs: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub runs: u32,
    pub tokens: u64,
    pub usd: f64,
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run(s), ~{} tokens, ${:.4} USD",
            self.runs, self.tokens, self.usd
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ConfigLoader::parse(
            r#"
            mode = "demo"

            [search]
            max_results = 7
            provider = "demo"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Demo);
        assert_eq!(config.search.max_results, 7);
        assert_eq!(config.search.provider, SearchBackend::Demo);
        assert_eq!(config.search.queries_per_topic, 3);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_override_profile_base() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[analysis]\nmax_findings = 2\n").unwrap();

        let config =
            ConfigLoader::load_with_base(Some(path), Config::for_profile(Profile::Test)).unwrap();
        assert_eq!(config.analysis.max_findings, 2);
        assert_eq!(config.search.max_results, 2);
        assert_eq!(config.report.output_dir, PathBuf::from("tests/test_reports"));
    }

    #[test]
    fn unvalidated_load_defers_the_api_key_check() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "mode = \"live\"\n[llm]\napi_key_env = \"AIRESEARCH_CONFIG_TEST_UNSET_KEY\"\n",
        )
        .unwrap();

        let err = ConfigLoader::load_with_base(Some(path.clone()), Config::default()).unwrap_err();
        assert!(matches!(err, AssistantError::MissingSecret(_)));

        let mut config = ConfigLoader::load_unvalidated(Some(path), Config::default()).unwrap();
        assert_eq!(config.mode, Mode::Live);
        config.mode = Mode::Demo;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let err = ConfigLoader::load(Some(PathBuf::from("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, AssistantError::ConfigIo { .. }));
    }

    #[test]
    fn validation_rejects_zero_limits_and_bad_temperature() {
        let mut config = Config::default();
        config.search.max_results = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn live_mode_requires_api_key() {
        let mut config = Config::default();
        config.mode = Mode::Live;
        config.llm.api_key_env = "AIRESEARCH_TEST_KEY_ABSENT".to_string();
        unsafe {
            std::env::remove_var("AIRESEARCH_TEST_KEY_ABSENT");
        }
        assert!(matches!(
            config.validate(),
            Err(AssistantError::MissingSecret(_))
        ));
    }

    #[test]
    fn profiles_and_cost_estimate() {
        assert_eq!("prod".parse::<Profile>().unwrap(), Profile::Production);
        assert!("staging".parse::<Profile>().is_err());

        let dev = Config::for_profile(Profile::Development);
        assert_eq!(dev.mode, Mode::Demo);
        assert_eq!(dev.estimate_cost(10).usd, 0.0);

        let prod = Config::for_profile(Profile::Production);
        assert_eq!(prod.search.max_results, 10);
        let estimate = prod.estimate_cost(10);
        assert_eq!(estimate.tokens, 20_000);
        assert!((estimate.usd - 0.03).abs() < 1e-9);
    }
}
