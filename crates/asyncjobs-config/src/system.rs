//! System configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable naming a KDL configuration file.
pub const CONFIG_PATH_ENV: &str = "ASYNCJOBS_CONFIG";

// Table names end up inside SQL statements, so only plain identifiers pass.
static TABLE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

/// System-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub executor: ExecutorConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::invalid(
                "store.backend",
                format!("unknown backend: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Table (namespace) holding job records.
    pub table: String,
    /// Connection URL, required for the postgres backend.
    pub url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            table: "jobs".to_string(),
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Largest permitted `seconds` value.
    pub timeout: u64,
    /// Maximum number of invocations running at once.
    pub max_concurrency: usize,
}

/// Room for the store write after the longest permitted wait.
const EXECUTION_GRACE_SECS: u64 = 10;

impl ExecutorConfig {
    /// Hard limit for one invocation, after which it is abandoned.
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.saturating_add(EXECUTION_GRACE_SECS))
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: 300,
            max_concurrency: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Extra attempts after an abnormal termination.
    pub retry_attempts: u32,
    /// Pause before a retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Invocations older than this (seconds) are failed without running.
    pub max_event_age: u64,
    /// Time limit for one failure recording, in seconds.
    pub failure_timeout: u64,
}

impl DispatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_event_age(&self) -> Duration {
        Duration::from_secs(self.max_event_age)
    }

    pub fn failure_timeout(&self) -> Duration {
        Duration::from_secs(self.failure_timeout)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 0,
            retry_delay_ms: 1000,
            max_event_age: 21600,
            failure_timeout: 5,
        }
    }
}

impl SystemConfig {
    /// Load configuration: optional KDL file, then process environment.
    ///
    /// When `path` is `None` the file named by `ASYNCJOBS_CONFIG` is used, if set.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok();
        let path = path.or(env_path.as_deref().map(Path::new));

        let content = path.map(std::fs::read_to_string).transpose()?;
        Self::resolve(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build configuration from optional KDL text and an environment lookup.
    ///
    /// Validation runs once, after the overrides are applied.
    pub fn resolve<F>(kdl: Option<&str>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match kdl {
            Some(kdl) => parse_unvalidated(kdl)?,
            None => SystemConfig::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("BIND_ADDR") {
            self.server.bind = bind;
        }
        if let Some(table) = lookup("TABLE_NAME") {
            self.store.table = table;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.store.url = Some(url);
            self.store.backend = StoreBackend::Postgres;
        }
        if let Some(backend) = lookup("STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }
        if let Some(timeout) = lookup("TIMEOUT") {
            self.executor.timeout = parse_env_number("TIMEOUT", &timeout)?;
        }
        if let Some(max) = lookup("MAX_CONCURRENCY") {
            self.executor.max_concurrency = parse_env_number("MAX_CONCURRENCY", &max)?;
        }
        if let Some(retries) = lookup("RETRY_ATTEMPTS") {
            self.dispatch.retry_attempts = parse_env_number("RETRY_ATTEMPTS", &retries)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.executor.timeout == 0 {
            return Err(ConfigError::invalid(
                "executor.timeout",
                "must be at least 1 second",
            ));
        }
        if self.executor.max_concurrency == 0 {
            return Err(ConfigError::invalid(
                "executor.max-concurrency",
                "must be at least 1",
            ));
        }
        if !TABLE_NAME_REGEX.is_match(&self.store.table) {
            return Err(ConfigError::invalid(
                "store.table",
                format!("not a valid table name: {}", self.store.table),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.store.url.is_none() {
            return Err(ConfigError::MissingField("store.url".to_string()));
        }
        Ok(())
    }
}

fn parse_env_number<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("not a number: {}", value)))
}

/// Parse system configuration from KDL text.
///
/// Unknown nodes are ignored; missing sections keep their defaults.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let config = parse_unvalidated(kdl)?;
    config.validate()?;
    Ok(config)
}

fn parse_unvalidated(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SystemConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "server" => {
                if let Some(bind) = child_string(node, "bind") {
                    config.server.bind = bind;
                }
            }
            "store" => {
                if let Some(backend) = child_string(node, "backend") {
                    config.store.backend = backend.parse()?;
                }
                if let Some(table) = child_string(node, "table") {
                    config.store.table = table;
                }
                if let Some(url) = child_string(node, "url") {
                    config.store.url = Some(url);
                }
            }
            "executor" => {
                if let Some(timeout) = child_integer(node, "timeout", "executor.timeout")? {
                    config.executor.timeout = timeout;
                }
                if let Some(max) =
                    child_integer(node, "max-concurrency", "executor.max-concurrency")?
                {
                    config.executor.max_concurrency = max;
                }
            }
            "dispatch" => {
                if let Some(retries) =
                    child_integer(node, "retry-attempts", "dispatch.retry-attempts")?
                {
                    config.dispatch.retry_attempts = retries;
                }
                if let Some(delay) =
                    child_integer(node, "retry-delay-ms", "dispatch.retry-delay-ms")?
                {
                    config.dispatch.retry_delay_ms = delay;
                }
                if let Some(age) = child_integer(node, "max-event-age", "dispatch.max-event-age")?
                {
                    config.dispatch.max_event_age = age;
                }
                if let Some(timeout) =
                    child_integer(node, "failure-timeout", "dispatch.failure-timeout")?
                {
                    config.dispatch.failure_timeout = timeout;
                }
            }
            _ => {}
        }
    }

    Ok(config)
}

// Helper functions for extracting values from KDL nodes

fn child_node<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
}

fn first_arg(node: &KdlNode) -> Option<&kdl::KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn child_string(node: &KdlNode, name: &str) -> Option<String> {
    child_node(node, name)
        .and_then(first_arg)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn child_integer<T: TryFrom<i128>>(
    node: &KdlNode,
    name: &str,
    field: &str,
) -> ConfigResult<Option<T>> {
    let Some(value) = child_node(node, name).and_then(first_arg) else {
        return Ok(None);
    };
    let number = value
        .as_integer()
        .ok_or_else(|| ConfigError::invalid(field, "expected an integer"))?;
    T::try_from(number)
        .map(Some)
        .map_err(|_| ConfigError::invalid(field, format!("out of range: {}", number)))
}
