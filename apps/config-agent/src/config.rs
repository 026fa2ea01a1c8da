//! Agent configuration
//!
//! Loaded from a TOML file (or single-subscription flags) merged with
//! `CONFIG_AGENT_`-prefixed environment overrides for the `source` and
//! `writer` sections, e.g. `CONFIG_AGENT_SOURCE__POLL_INTERVAL=2s`.

use anyhow::{bail, Context, Result};
use config_publish::Selectors;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "CONFIG_AGENT_";

/// Top-level agent configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// One entry per delivered configuration
    #[serde(default)]
    pub config_list: Vec<Subscription>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub writer: WriterConfig,
}

/// One watched configuration and where it lands on this host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subscription {
    /// Selector string, e.g. `app=billing,env=prod,dc=eu1`
    #[serde(default)]
    pub selectors: String,

    #[serde(default)]
    pub optional_selectors: String,

    pub group: String,

    pub key: String,

    /// File overwritten with the configuration value
    pub output: PathBuf,

    /// Executable run after every successful write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<PathBuf>,
}

impl Subscription {
    /// Configured hook, treating an empty path as none
    pub fn hook(&self) -> Option<&Path> {
        self.hook
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Where published artifacts are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Pause between polls of the artifact store
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl SourceConfig {
    /// Store settings for the read-only connection
    pub fn store_config(&self) -> config_publish::Config {
        config_publish::Config {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            ..config_publish::Config::default()
        }
    }
}

/// File writer and hook supervision settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriterConfig {
    /// Write attempts per event before it is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Deadline after which a running hook is killed
    #[serde(default = "default_hook_timeout", with = "humantime_serde")]
    pub hook_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            hook_timeout: default_hook_timeout(),
        }
    }
}

fn default_database_url() -> String {
    config_publish::Config::default().database_url
}

fn default_max_connections() -> u32 {
    2
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> usize {
    10
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_hook_timeout() -> Duration {
    Duration::from_secs(60)
}

impl AgentConfig {
    /// Load from a TOML file, or from a single subscription when no file is
    /// given, then apply environment overrides.
    pub fn load(path: Option<&Path>, single: Option<Subscription>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AgentConfig::default()));

        match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file {} does not exist", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(subscription) = single {
                    figment = figment.merge(Serialized::default("config_list", vec![subscription]));
                }
            }
        }

        Self::extract(figment.merge(env_overrides()))
            .with_context(|| match path {
                Some(path) => format!("invalid agent config {}", path.display()),
                None => "invalid agent config".to_string(),
            })
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::extract(
            Figment::from(Serialized::defaults(AgentConfig::default())).merge(Toml::string(toml)),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    /// Reject subscriptions the agent could never deliver
    pub fn validate(&self) -> Result<()> {
        if self.config_list.is_empty() {
            bail!("no configuration subscriptions given");
        }
        if self.writer.max_attempts == 0 {
            bail!("writer.max_attempts must be at least 1");
        }

        let mut outputs = HashSet::new();
        for (idx, sub) in self.config_list.iter().enumerate() {
            if sub.group.trim().is_empty() {
                bail!("config_list[{idx}]: group must not be empty");
            }
            if sub.key.trim().is_empty() {
                bail!("config_list[{idx}]: key must not be empty");
            }
            if sub.output.as_os_str().is_empty() {
                bail!("config_list[{idx}]: output must not be empty");
            }
            Selectors::parse(&sub.selectors)
                .with_context(|| format!("config_list[{idx}]: invalid selectors"))?;
            Selectors::parse(&sub.optional_selectors)
                .with_context(|| format!("config_list[{idx}]: invalid optional_selectors"))?;
            if !outputs.insert(sub.output.as_path()) {
                bail!(
                    "config_list[{idx}]: output {} is already used by another subscription",
                    sub.output.display()
                );
            }
        }
        Ok(())
    }
}

// Hook processes receive CONFIG_AGENT_GROUP and friends, so only section
// keys are taken from the environment.
fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            key.starts_with("source__") || key.starts_with("writer__")
        })
        .split("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SUBSCRIPTIONS: &str = r#"
        [[config_list]]
        selectors = "app=billing,env=prod,dc=eu1"
        group = "db"
        key = "pool.toml"
        output = "/etc/billing/pool.toml"
        hook = "/usr/local/bin/reload-billing"

        [[config_list]]
        selectors = "app=billing,env=prod,dc=eu1"
        group = "cache"
        key = "redis.toml"
        output = "/etc/billing/redis.toml"
        hook = ""

        [source]
        poll_interval = "2s"

        [writer]
        retry_delay = "250ms"
    "#;

    #[test]
    fn parses_config_list_and_sections() {
        let cfg = AgentConfig::from_toml_str(TWO_SUBSCRIPTIONS).unwrap();

        assert_eq!(cfg.config_list.len(), 2);
        assert_eq!(cfg.config_list[0].group, "db");
        assert_eq!(
            cfg.config_list[0].hook(),
            Some(Path::new("/usr/local/bin/reload-billing"))
        );
        assert_eq!(cfg.config_list[1].hook(), None);
        assert_eq!(cfg.source.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.writer.retry_delay, Duration::from_millis(250));
        assert_eq!(cfg.writer.max_attempts, 10);
        assert_eq!(cfg.writer.hook_timeout, Duration::from_secs(60));
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_subscription_fields() {
        let err = AgentConfig::from_toml_str(
            r#"
            [[config_list]]
            group = "db"
            key = "pool.toml"
            output = "/tmp/pool.toml"
            outptu = "/tmp/typo"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unknown_sections() {
        let err = AgentConfig::from_toml_str(
            r#"
            [[config_list]]
            group = "db"
            key = "pool.toml"
            output = "/tmp/pool.toml"

            [sourc]
            poll_interval = "2s"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("sourc"), "{err:#}");
    }

    #[test]
    fn rejects_duplicate_outputs() {
        let mut cfg = AgentConfig::from_toml_str(TWO_SUBSCRIPTIONS).unwrap();
        cfg.config_list[1].output = cfg.config_list[0].output.clone();

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn rejects_bad_selectors_and_empty_fields() {
        let base = AgentConfig::from_toml_str(TWO_SUBSCRIPTIONS).unwrap();

        let mut bad_sel = base.clone();
        bad_sel.config_list[0].selectors = "app".to_string();
        assert!(bad_sel.validate().is_err());

        let mut empty_key = base.clone();
        empty_key.config_list[0].key = " ".to_string();
        assert!(empty_key.validate().is_err());

        let empty = AgentConfig::default();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn single_subscription_without_file() {
        let sub = Subscription {
            selectors: "app=billing".to_string(),
            optional_selectors: String::new(),
            group: "db".to_string(),
            key: "pool.toml".to_string(),
            output: PathBuf::from("/tmp/pool.toml"),
            hook: None,
        };

        let cfg = AgentConfig::load(None, Some(sub.clone())).unwrap();
        assert_eq!(cfg.config_list, vec![sub]);
        assert_eq!(cfg.writer, WriterConfig::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AgentConfig::load(Some(Path::new("/nonexistent/agent.toml")), None);
        assert!(err.is_err());
    }
}
