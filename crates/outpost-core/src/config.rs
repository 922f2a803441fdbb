//! Configuration loading and typed config structures for the capture agent.
//!
//! The canonical configuration lives in `outpost-config.yaml`. Every field has
//! a default matching the reference behaviour, so an empty file (or no file at
//! all) yields a working planner once an identity is supplied. A handful of
//! settings can be overridden through the environment, which always wins over
//! the YAML:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PLAYER_ADDRESS` | `identity.address` |
//! | `CACHE_SIZE` | `dispatch.argument_cache_size` |
//! | `MAIN_LOOP_SLEEP_MS` | `schedule.cycle_interval_ms` |
//! | `DRAGONFLY_URL`, then `REDIS_URL` | `infrastructure.dragonfly_url` |
//! | `GRAPH_URL_HTTP` | `infrastructure.graph_url` |
//! | `RELAY_URL` | `infrastructure.relay_url` |
//! | `PROVER_URL` | `infrastructure.prover_url` |

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use outpost_types::{AssetType, Identity};
use serde::Deserialize;

use crate::defaults::GameConstants;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutpostConfig {
    /// Controlling identity.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Candidate and move selection policy.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Argument building and submission.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Cycle timing.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Game constants used to synthesize never-claimed assets.
    #[serde(default)]
    pub constants: GameConstants,
}

impl OutpostConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults. Environment
    /// overrides apply in both cases.
    ///
    /// # Errors
    ///
    /// Same as [`OutpostConfig::from_file`] when the file exists.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        Self::parse("")
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// An empty string yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_with(yaml, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a YAML string, resolving overrides through
    /// `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`OutpostConfig::parse`].
    pub fn parse_with(
        yaml: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides to every section. `lookup` maps a variable name to
    /// its value.
    pub fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("PLAYER_ADDRESS") {
            self.identity.address = Some(val);
        }
        if let Some(val) = number(lookup("CACHE_SIZE")) {
            self.dispatch.argument_cache_size = val;
        }
        if let Some(val) = number(lookup("MAIN_LOOP_SLEEP_MS")) {
            self.schedule.cycle_interval_ms = val;
        }
        self.infrastructure.apply_overrides(lookup);
    }

    /// Check value ranges the planner relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let planner = &self.planner;
        if !(planner.commit_percent > 0.0 && planner.commit_percent <= 100.0) {
            return Err(invalid("planner.commit_percent", "must be in (0, 100]"));
        }
        if !(0.0..=1.0).contains(&planner.reserve_threshold) {
            return Err(invalid("planner.reserve_threshold", "must be in [0, 1]"));
        }
        if !(planner.commit_fraction > 0.0 && planner.commit_fraction <= 1.0) {
            return Err(invalid("planner.commit_fraction", "must be in (0, 1]"));
        }
        if planner.query_limit == 0 {
            return Err(invalid("planner.query_limit", "must be positive"));
        }
        if self.schedule.cycle_interval_ms == 0 {
            return Err(invalid("schedule.cycle_interval_ms", "must be positive"));
        }
        Ok(())
    }

    /// The controlling identity, if configured.
    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(Identity::new)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

fn number<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|val| val.trim().parse().ok())
}

/// Controlling identity configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityConfig {
    /// Account address the agent plays for.
    #[serde(default)]
    pub address: Option<String>,
}

/// Candidate filtering and move ranking policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    /// Commitment percentage used to compute discovery reach.
    #[serde(default = "default_commit_percent")]
    pub commit_percent: f64,

    /// Fraction of cap a source must exceed before it may send anything.
    #[serde(default = "default_reserve_threshold")]
    pub reserve_threshold: f64,

    /// Fraction of current resources committed per move.
    #[serde(default = "default_commit_fraction")]
    pub commit_fraction: f64,

    /// Maximum number of owned assets per level before targets of that level
    /// are ignored. Levels without an entry are unlimited.
    #[serde(default = "default_level_caps")]
    pub level_caps: BTreeMap<u32, usize>,

    /// How many levels below the source a target may be.
    #[serde(default = "default_levels_below")]
    pub levels_below: u32,

    /// How many levels above the source a target may be.
    #[serde(default = "default_levels_above")]
    pub levels_above: u32,

    /// Asset types never worth attacking.
    #[serde(default = "default_excluded_types")]
    pub excluded_types: Vec<AssetType>,

    /// Page size for state queries.
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,

    /// Side length of the location grid used to speed up discovery.
    #[serde(default = "default_grid_cell_size")]
    pub grid_cell_size: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            commit_percent: default_commit_percent(),
            reserve_threshold: default_reserve_threshold(),
            commit_fraction: default_commit_fraction(),
            level_caps: default_level_caps(),
            levels_below: default_levels_below(),
            levels_above: default_levels_above(),
            excluded_types: default_excluded_types(),
            query_limit: default_query_limit(),
            grid_cell_size: default_grid_cell_size(),
        }
    }
}

const fn default_commit_percent() -> f64 {
    50.0
}

const fn default_reserve_threshold() -> f64 {
    0.75
}

const fn default_commit_fraction() -> f64 {
    0.5
}

fn default_level_caps() -> BTreeMap<u32, usize> {
    BTreeMap::from([(0, 5), (1, 7), (2, 10)])
}

const fn default_levels_below() -> u32 {
    1
}

const fn default_levels_above() -> u32 {
    2
}

fn default_excluded_types() -> Vec<AssetType> {
    vec![AssetType::Reservoir]
}

const fn default_query_limit() -> usize {
    1000
}

const fn default_grid_cell_size() -> u32 {
    crate::index::DEFAULT_CELL_SIZE
}

/// Argument building and submission settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for each query, argument build, and submission call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Deadline for an accepted action to be confirmed.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,

    /// Number of argument payloads kept in the LRU cache. Zero disables it.
    #[serde(default = "default_argument_cache_size")]
    pub argument_cache_size: usize,

    /// How long a journaled action blocks its source after a restart.
    #[serde(default = "default_journal_ttl_seconds")]
    pub journal_ttl_seconds: u64,

    /// Whether pending actions are journaled to Dragonfly.
    #[serde(default = "default_journal_enabled")]
    pub journal_enabled: bool,

    /// Address of the game contract move calls are sent to.
    #[serde(default)]
    pub target_contract: String,
}

impl DispatchConfig {
    /// Deadline for a single external call.
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Deadline for confirmation.
    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    /// Journal entry lifetime.
    pub const fn journal_ttl(&self) -> Duration {
        Duration::from_secs(self.journal_ttl_seconds)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            argument_cache_size: default_argument_cache_size(),
            journal_ttl_seconds: default_journal_ttl_seconds(),
            journal_enabled: default_journal_enabled(),
            target_contract: String::new(),
        }
    }
}

const fn default_call_timeout_ms() -> u64 {
    30_000
}

const fn default_confirmation_timeout_ms() -> u64 {
    300_000
}

const fn default_argument_cache_size() -> usize {
    10_000
}

const fn default_journal_ttl_seconds() -> u64 {
    900
}

const fn default_journal_enabled() -> bool {
    true
}

/// Cycle timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// Milliseconds between cycle starts.
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Stop after this many cycles. Zero runs until stopped.
    #[serde(default)]
    pub max_cycles: u64,
}

impl ScheduleConfig {
    /// Interval between cycle starts.
    pub const fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            max_cycles: 0,
        }
    }
}

const fn default_cycle_interval_ms() -> u64 {
    20_000
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Dragonfly (Redis-compatible) URL holding explored chunks and the
    /// pending-action journal.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// GraphQL endpoint of the state query service.
    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    /// Transaction relay base URL.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Proof builder base URL.
    #[serde(default = "default_prover_url")]
    pub prover_url: String,

    /// Dragonfly list holding the explored chunks.
    #[serde(default = "default_chunks_key")]
    pub chunks_key: String,

    /// Dragonfly hash holding the pending-action journal.
    #[serde(default = "default_journal_key")]
    pub journal_key: String,
}

impl InfrastructureConfig {
    /// Apply endpoint overrides. `DRAGONFLY_URL` wins over `REDIS_URL`.
    pub fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DRAGONFLY_URL").or_else(|| lookup("REDIS_URL")) {
            self.dragonfly_url = val;
        }
        if let Some(val) = lookup("GRAPH_URL_HTTP") {
            self.graph_url = val;
        }
        if let Some(val) = lookup("RELAY_URL") {
            self.relay_url = val;
        }
        if let Some(val) = lookup("PROVER_URL") {
            self.prover_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: default_dragonfly_url(),
            graph_url: default_graph_url(),
            relay_url: default_relay_url(),
            prover_url: default_prover_url(),
            chunks_key: default_chunks_key(),
            journal_key: default_journal_key(),
        }
    }
}

fn default_dragonfly_url() -> String {
    String::from("redis://localhost:6379")
}

fn default_graph_url() -> String {
    String::from("http://localhost:8000/subgraphs/name/df")
}

fn default_relay_url() -> String {
    String::from("http://localhost:8545")
}

fn default_prover_url() -> String {
    String::from("http://localhost:8080")
}

fn default_chunks_key() -> String {
    String::from("explorer:chunks")
}

fn default_journal_key() -> String {
    String::from("outpost:pending")
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_match_reference_policy() {
        let config = OutpostConfig::default();
        assert_eq!(config.planner.commit_percent, 50.0);
        assert_eq!(config.planner.reserve_threshold, 0.75);
        assert_eq!(config.planner.commit_fraction, 0.5);
        assert_eq!(config.planner.level_caps.get(&0), Some(&5));
        assert_eq!(config.planner.level_caps.get(&1), Some(&7));
        assert_eq!(config.planner.level_caps.get(&2), Some(&10));
        assert_eq!(config.planner.level_caps.get(&3), None);
        assert_eq!(config.planner.excluded_types, vec![AssetType::Reservoir]);
        assert_eq!(config.planner.query_limit, 1000);
        assert_eq!(config.dispatch.argument_cache_size, 10_000);
        assert_eq!(config.schedule.cycle_interval_ms, 20_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_yaml_keeps_defaults() {
        let yaml = r"
planner:
  reserve_threshold: 0.6
  level_caps:
    4: 2
  excluded_types: [reservoir, ruins]
dispatch:
  target_contract: '0xabc'
  journal_enabled: false
logging:
  json: true
";
        let config = OutpostConfig::parse_with(yaml, no_env).unwrap();
        assert_eq!(config.planner.reserve_threshold, 0.6);
        assert_eq!(config.planner.commit_fraction, 0.5);
        assert_eq!(config.planner.level_caps.len(), 1);
        assert_eq!(config.planner.level_caps.get(&4), Some(&2));
        assert_eq!(
            config.planner.excluded_types,
            vec![AssetType::Reservoir, AssetType::Ruins]
        );
        assert_eq!(config.dispatch.target_contract, "0xabc");
        assert!(!config.dispatch.journal_enabled);
        assert_eq!(config.dispatch.call_timeout(), Duration::from_secs(30));
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn shipped_sample_matches_defaults() {
        let yaml = include_str!("../../../outpost-config.yaml");
        let config = OutpostConfig::parse_with(yaml, no_env).unwrap();
        assert_eq!(config.planner, PlannerConfig::default());
        assert_eq!(config.dispatch.argument_cache_size, 10_000);
        assert_eq!(config.schedule, ScheduleConfig::default());
    }

    #[test]
    fn empty_yaml_is_default_policy() {
        let config = OutpostConfig::parse_with("", no_env).unwrap();
        assert_eq!(config.planner, PlannerConfig::default());
        assert_eq!(config.constants, GameConstants::default());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let result = OutpostConfig::parse_with("planner:\n  reserve_threshold: 1.5\n", no_env);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "planner.reserve_threshold",
                ..
            })
        ));

        let result = OutpostConfig::parse_with("planner:\n  query_limit: 0\n", no_env);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = OutpostConfig::parse_with("planner: [unclosed", no_env);
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("PLAYER_ADDRESS", "0xBEEF"),
            ("CACHE_SIZE", " 7 "),
            ("MAIN_LOOP_SLEEP_MS", "not a number"),
            ("REDIS_URL", "redis://cache:6379"),
            ("RELAY_URL", "http://relay:9000"),
        ]
        .into_iter()
        .collect();
        let lookup = |name: &str| vars.get(name).map(|val| (*val).to_owned());

        let yaml = "schedule:\n  cycle_interval_ms: 5000\n";
        let config = OutpostConfig::parse_with(yaml, lookup).unwrap();
        assert_eq!(config.identity(), Some(Identity::new("beef")));
        assert_eq!(config.dispatch.argument_cache_size, 7);
        assert_eq!(config.schedule.cycle_interval_ms, 5000);
        assert_eq!(config.infrastructure.dragonfly_url, "redis://cache:6379");
        assert_eq!(config.infrastructure.relay_url, "http://relay:9000");
        assert_eq!(config.infrastructure.prover_url, default_prover_url());
    }

    #[test]
    fn dragonfly_url_wins_over_redis_url() {
        let lookup = |name: &str| match name {
            "DRAGONFLY_URL" => Some("redis://dragonfly:6379".to_owned()),
            "REDIS_URL" => Some("redis://other:6379".to_owned()),
            _ => None,
        };
        let config = OutpostConfig::parse_with("", lookup).unwrap();
        assert_eq!(config.infrastructure.dragonfly_url, "redis://dragonfly:6379");
    }

    #[test]
    fn overrides_are_validated() {
        let lookup = |name: &str| (name == "MAIN_LOOP_SLEEP_MS").then(|| "0".to_owned());
        let result = OutpostConfig::parse_with("", lookup);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "schedule.cycle_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn blank_identity_is_absent() {
        let mut config = OutpostConfig::default();
        config.identity.address = Some("  ".to_owned());
        assert_eq!(config.identity(), None);
        config.identity.address = Some("0xABCD".to_owned());
        assert_eq!(config.identity(), Some(Identity::new("abcd")));
    }
}
