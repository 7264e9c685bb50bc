//! Relay configuration.
//!
//! One file describes any number of deployments; each deployment is a pool
//! of worker instances fed from one traffic queue.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::instance::instance_name;

/// Log level per component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: component_name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

/// Configuration for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment name, e.g. "staging"
    pub name: String,
    /// Number of worker instances in the pool
    pub pool_size: usize,
    /// Queue consumed for traffic and used for requeues
    pub traffic_queue: String,
    /// Queues whose batches are logged and acked without dispatch
    #[serde(default)]
    pub diagnostic_queues: Vec<String>,
    /// Prefix of logical instance names (`{namespace}/{index}`)
    #[serde(default = "default_namespace")]
    pub instance_namespace: String,
    /// Base URL of each instance; `{index}` is replaced by the instance index
    pub endpoint_template: String,
    /// Per-delivery timeout enforced by the HTTP transport
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_namespace() -> String {
    "container".into()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl DeploymentConfig {
    /// Create a config with defaults for the optional fields.
    pub fn new(
        name: impl Into<String>,
        pool_size: usize,
        traffic_queue: impl Into<String>,
        endpoint_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pool_size,
            traffic_queue: traffic_queue.into(),
            diagnostic_queues: vec![],
            instance_namespace: default_namespace(),
            endpoint_template: endpoint_template.into(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `true` if batches from `queue` take the diagnostic pass-through.
    pub fn is_diagnostic(&self, queue: &str) -> bool {
        self.diagnostic_queues.iter().any(|q| q == queue)
    }

    /// Logical name of instance `index`.
    pub fn instance_name(&self, index: usize) -> String {
        instance_name(&self.instance_namespace, index)
    }

    /// Base URL of instance `index`.
    pub fn endpoint(&self, index: usize) -> String {
        self.endpoint_template.replace("{index}", &index.to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            deployment: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(invalid("pool_size must be at least 1"));
        }
        if self.traffic_queue.trim().is_empty() {
            return Err(invalid("traffic_queue must not be empty"));
        }
        if self.is_diagnostic(&self.traffic_queue) {
            return Err(invalid("traffic_queue cannot also be a diagnostic queue"));
        }
        if self.pool_size > 1 && !self.endpoint_template.contains("{index}") {
            return Err(invalid("endpoint_template must contain `{index}`"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
}

impl RelayConfig {
    /// Load from a `.json`, `.yaml` or `.yml` file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_yaml(&text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for deployment in &self.deployments {
            deployment.validate()?;
            if !seen.insert(deployment.name.as_str()) {
                return Err(ConfigError::DuplicateDeployment(deployment.name.clone()));
            }
        }
        Ok(())
    }

    pub fn deployment(&self, name: &str) -> Result<&DeploymentConfig, ConfigError> {
        self.deployments
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::UnknownDeployment(name.to_string()))
    }
}
