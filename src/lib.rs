//! Repository Social Graph
//!
//! Contributor collaboration analytics:
//! - Relation graphs (comments, issue closures, reviews/merges) built from mined events
//! - Integrated graph as a configurable weighted sum of the relations
//! - Centralities, PageRank, clustering, assortativity via petgraph / rustworkx-core
//! - Community detection by weighted label propagation
//! - Gephi-compatible CSV export

pub mod gephi;
pub mod graph;
pub mod ingest;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use graph::{AnalyticsConfig, RelationCoefficients, RelationKind, TimeWindow};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    /// Relation kind → coefficient for the integrated graph
    pub coefficients: RelationCoefficients,
    pub analytics: AnalyticsConfig,
    pub window: WindowYamlConfig,
}

/// Time window section (RFC 3339 timestamps)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WindowYamlConfig {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub coefficients: RelationCoefficients,
    pub analytics: AnalyticsConfig,
    pub window: TimeWindow,
}

/// Parse an env var when set; a malformed value is an error, not a silent default.
fn env_override<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "social-graph.yaml" in CWD and falls back
    /// to env vars / defaults when that file is absent or unreadable. An
    /// explicit path must exist and parse.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if the implicit file is not found)
        let yaml = Self::load_yaml(yaml_path)?;

        // 2. Apply env var overrides
        let mut analytics = yaml.analytics;
        if let Some(v) = env_override("SOCIAL_GRAPH_PAGERANK_DAMPING")? {
            analytics.pagerank_damping = v;
        }
        if let Some(v) = env_override("SOCIAL_GRAPH_PAGERANK_TOLERANCE")? {
            analytics.pagerank_tolerance = v;
        }
        if let Some(v) = env_override("SOCIAL_GRAPH_PAGERANK_MAX_ITERATIONS")? {
            analytics.pagerank_max_iterations = v;
        }
        if let Some(v) = env_override("SOCIAL_GRAPH_LPA_MAX_ROUNDS")? {
            analytics.label_propagation_max_rounds = v;
        }

        let mut coefficients = yaml.coefficients;
        for (var, kind) in [
            ("SOCIAL_GRAPH_COEF_COMMENT", RelationKind::Comment),
            ("SOCIAL_GRAPH_COEF_CLOSURE", RelationKind::Closure),
            ("SOCIAL_GRAPH_COEF_REVIEW_MERGE", RelationKind::ReviewMerge),
        ] {
            if let Some(v) = env_override(var)? {
                coefficients.set(kind, v);
            }
        }

        Ok(Self {
            coefficients,
            analytics,
            window: TimeWindow {
                since: yaml.window.since,
                until: yaml.window.until,
            },
        })
    }

    /// Apply command-line overrides, which win over env vars and YAML.
    pub fn apply_cli_overrides(
        &mut self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        top_n: Option<usize>,
    ) {
        if since.is_some() {
            self.window.since = since;
        }
        if until.is_some() {
            self.window.until = until;
        }
        if let Some(n) = top_n {
            self.analytics.top_n = n;
        }
    }

    /// Load and parse the YAML config file.
    ///
    /// An explicit path that is missing or malformed is an error. The implicit
    /// `social-graph.yaml` is optional: any failure there yields defaults.
    fn load_yaml(yaml_path: Option<&Path>) -> Result<YamlConfig> {
        if let Some(path) = yaml_path {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config = serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            tracing::info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        let path = Path::new("social-graph.yaml");
        let config = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        };
        Ok(config)
    }
}
