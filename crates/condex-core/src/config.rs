//! Engine configuration

use crate::error::{CoreError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment overrides, e.g. `CONDEX_MAX_IDS_QUERY_COUNT`
pub const ENV_PREFIX: &str = "CONDEX";

/// What a contextualization failure means for the condition being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextualizationPolicy {
    /// The condition does not match: `false` on eval, match-none on compile
    #[default]
    NoMatch,
    /// The error propagates to the caller
    Abort,
}

/// How the past-event evaluator handles a subject without a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PastEventFallback {
    /// Count matching events with a live query
    #[default]
    LiveQuery,
    /// Trust the counters: no counter means no events
    CounterOnly,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest identifier set the ids query builder accepts
    pub max_ids_query_count: usize,

    /// Longest parent-condition chain followed before failing
    pub max_parent_depth: usize,

    pub contextualization_failure: ContextualizationPolicy,

    pub past_event_fallback: PastEventFallback,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ids_query_count: 5000,
            max_parent_depth: 1000,
            contextualization_failure: ContextualizationPolicy::NoMatch,
            past_event_fallback: PastEventFallback::LiveQuery,
        }
    }
}

impl EngineConfig {
    pub fn with_max_ids_query_count(mut self, max: usize) -> Self {
        self.max_ids_query_count = max;
        self
    }

    pub fn with_max_parent_depth(mut self, max: usize) -> Self {
        self.max_parent_depth = max;
        self
    }

    pub fn with_contextualization_failure(mut self, policy: ContextualizationPolicy) -> Self {
        self.contextualization_failure = policy;
        self
    }

    pub fn with_past_event_fallback(mut self, fallback: PastEventFallback) -> Self {
        self.past_event_fallback = fallback;
        self
    }

    /// Parse a YAML document; missing fields keep their defaults
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Defaults, then the optional YAML file, then `CONDEX_*` environment
    /// variables
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_layered(path, None)
    }

    /// Same as [`EngineConfig::load`] with an explicit environment map
    /// instead of the process environment
    pub fn load_layered(
        path: Option<&Path>,
        environment: Option<::config::Map<String, String>>,
    ) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder().add_source(
            ::config::Config::try_from(&Self::default())
                .context("Failed to seed default configuration")?,
        );
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(environment),
        );

        let config: Self = builder
            .build()
            .context("Failed to build engine configuration")?
            .try_deserialize()
            .context("Failed to deserialize engine configuration")?;
        config.validate()?;
        log::debug!("Engine configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_ids_query_count == 0 {
            return Err(CoreError::Config(
                "max_ids_query_count must be greater than 0".to_string(),
            ));
        }
        if self.max_parent_depth == 0 {
            return Err(CoreError::Config(
                "max_parent_depth must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
