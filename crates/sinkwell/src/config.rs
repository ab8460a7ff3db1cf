//! Configuration types.
//!
//! Everything is defaulted so a minimal config just works; only specify
//! what you need to change. Construction-time validation lives in
//! [`Config::validate`]: a broker mode with an empty broker list or topic
//! is rejected before any worker is spawned.
//!
//! # Example
//!
//! ```toml
//! mode = "async-file"
//!
//! [file]
//! path = "app.log"
//! rotation = "daily"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::logger::Level;
use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Default log file path when none is configured.
pub const DEFAULT_LOG_PATH: &str = "log.log";

/// Default write-buffer capacity (1 MiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default maximum broker message size (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Default cap on publish attempts per record (0 disables the cap).
pub const DEFAULT_MAX_PUBLISH_ATTEMPTS: u32 = 5;

/// Top-level logger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delivery mode.
    pub mode: SinkMode,

    /// Minimum level that produces a record.
    /// Default: debug (everything)
    pub level: Level,

    /// Header fields prepended to each message.
    pub header: HeaderConfig,

    /// Record queue capacity for the async modes. An explicit zero is used
    /// verbatim and yields an always-full queue.
    /// Default: 10000
    pub queue_capacity: usize,

    /// File sink settings (sync and async file modes).
    pub file: FileConfig,

    /// Broker sink settings (broker modes).
    pub broker: BrokerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: SinkMode::SyncFile,
            level: Level::Debug,
            header: HeaderConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            file: FileConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

impl Config {
    /// Validate cross-field requirements.
    ///
    /// Broker modes require a non-empty broker list and topic. File-only
    /// settings are always valid: every field has a usable default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.uses_broker() {
            if self.broker.brokers.is_empty() {
                return Err(ConfigError::EmptyBrokerList);
            }
            if self.broker.topic.is_empty() {
                return Err(ConfigError::EmptyTopic);
            }
        }
        Ok(())
    }
}

/// How records are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkMode {
    /// Write each record to the file under a lock, on the caller's task.
    #[default]
    SyncFile,

    /// Queue records to a background buffered file sink.
    AsyncFile,

    /// Queue records to a background broker-publishing sink.
    AsyncBroker,

    /// Queue each record to both an async file sink and a broker sink.
    /// The two sinks own separate queues; ordering holds within each sink
    /// but not across them.
    AsyncFileAndBroker,
}

impl SinkMode {
    /// Whether this mode runs a file sink (sync or async).
    pub fn uses_file(&self) -> bool {
        !matches!(self, SinkMode::AsyncBroker)
    }

    /// Whether this mode runs a broker sink.
    pub fn uses_broker(&self) -> bool {
        matches!(self, SinkMode::AsyncBroker | SinkMode::AsyncFileAndBroker)
    }
}

/// Header fields prepended to each message, each individually gated.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Prepend the local timestamp.
    /// Default: true
    pub timestamp: bool,

    /// Prepend the level name, e.g. `[INFO]`.
    /// Default: true
    pub level: bool,

    /// Prepend the process id, e.g. `[4711]`.
    /// Default: false
    pub pid: bool,

    /// Prepend the caller location.
    /// Default: off
    pub caller: CallerStyle,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            timestamp: true,
            level: true,
            pid: false,
            caller: CallerStyle::Off,
        }
    }
}

/// How the caller location is rendered in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerStyle {
    /// No caller information.
    #[default]
    Off,
    /// File basename and line, e.g. `main.rs:42`.
    Short,
    /// Full path and line.
    Long,
}

/// File sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Log file base path. Rotated files append `.YYYYMMDD` or
    /// `.YYYYMMDDHH` to this path.
    /// Default: "log.log"
    pub path: PathBuf,

    /// Write-buffer capacity in bytes.
    /// Default: 1 MiB
    pub buffer_capacity: usize,

    /// File rotation mode.
    /// Default: none
    pub rotation: RotationMode,

    /// Periodic flush interval, bounding data loss on crash to roughly
    /// one interval of traffic.
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            rotation: RotationMode::None,
            flush_interval: Duration::from_secs(1),
        }
    }
}

/// Time-based log-file rotation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Single fixed file, never rotated.
    #[default]
    None,
    /// New file per calendar day, suffix `YYYYMMDD`.
    Daily,
    /// New file per hour, suffix `YYYYMMDDHH`.
    Hourly,
}

impl RotationMode {
    /// Rotation key / file-name suffix for the given instant, or `None`
    /// when rotation is disabled. The suffix embeds full date precision,
    /// so equal keys always mean the same calendar bucket.
    pub fn suffix(&self, now: DateTime<Local>) -> Option<String> {
        let format = match self {
            RotationMode::None => return None,
            RotationMode::Daily => "%Y%m%d",
            RotationMode::Hourly => "%Y%m%d%H",
        };
        Some(now.format(format).to_string())
    }

    /// Full file path for the given instant: the base path, or
    /// `base + "." + suffix` when rotation is enabled.
    pub fn path_for(&self, base: &Path, now: DateTime<Local>) -> PathBuf {
        match self.suffix(now) {
            Some(suffix) => PathBuf::from(format!("{}.{}", base.display(), suffix)),
            None => base.to_path_buf(),
        }
    }
}

/// Broker sink settings.
///
/// `compression`, `acks`, and `version` deserialize from free-form strings
/// and fall back to a safe default when the value is unrecognized, rather
/// than failing the whole config load.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker connection list. Required (non-empty) for broker modes.
    pub brokers: Vec<String>,

    /// Topic every record is published to. Required for broker modes.
    pub topic: String,

    /// Broker protocol version. Unrecognized values fall back to the
    /// latest known version.
    #[serde(deserialize_with = "de_version")]
    pub version: String,

    /// Compression codec. Unrecognized values fall back to none.
    #[serde(deserialize_with = "de_compression")]
    pub compression: Compression,

    /// Acknowledgment mode. Unrecognized values fall back to all-replicas.
    #[serde(deserialize_with = "de_ack_mode")]
    pub acks: AckMode,

    /// Maximum message size in bytes, passed through to the client.
    /// Default: 1 MiB
    pub max_message_bytes: usize,

    /// Publish attempts per record before it is dropped with a diagnostic.
    /// Zero disables the cap and retries forever.
    /// Default: 5
    pub max_publish_attempts: u32,

    /// Delay before a failed record is re-submitted to the queue.
    /// Default: 0 (immediate)
    #[serde(with = "humantime_serde")]
    pub publish_backoff: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topic: String::new(),
            version: LATEST_PROTOCOL_VERSION.to_string(),
            compression: Compression::None,
            acks: AckMode::AllReplicas,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_publish_attempts: DEFAULT_MAX_PUBLISH_ATTEMPTS,
            publish_backoff: Duration::ZERO,
        }
    }
}

/// Compression codec selector handed to the publish client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// No compression (default, and the fallback for unrecognized names).
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    /// Parse a codec name, falling back to `None` when unrecognized.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "gzip" => Compression::Gzip,
            "snappy" => Compression::Snappy,
            "lz4" => Compression::Lz4,
            "zstd" => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }
}

/// Acknowledgment mode selector handed to the publish client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// Fire and forget.
    None,
    /// Wait for the partition leader only.
    LeaderOnly,
    /// Wait for the full in-sync replica set (default, and the fallback
    /// for unrecognized names).
    #[default]
    AllReplicas,
}

impl AckMode {
    /// Parse an ack-mode name, falling back to `AllReplicas` when
    /// unrecognized.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "none" => AckMode::None,
            "leader-only" | "leader" => AckMode::LeaderOnly,
            _ => AckMode::AllReplicas,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::None => "none",
            AckMode::LeaderOnly => "leader-only",
            AckMode::AllReplicas => "all-replicas",
        }
    }
}

/// Protocol versions the publish client is known to speak.
pub const KNOWN_PROTOCOL_VERSIONS: &[&str] = &[
    "0.8.2.0", "0.8.2.1", "0.8.2.2", "0.9.0.0", "0.9.0.1", "0.10.0.0",
    "0.10.0.1", "0.10.1.0", "0.10.1.1", "0.10.2.0", "0.10.2.1", "0.11.0.0",
    "0.11.0.1", "0.11.0.2", "1.0.0.0", "1.1.0.0", "1.1.1.0", "2.0.0.0",
    "2.0.1.0", "2.1.0.0", "2.2.0.0", "2.3.0.0", "2.4.0.0", "2.5.0.0",
];

/// Newest entry in [`KNOWN_PROTOCOL_VERSIONS`].
pub const LATEST_PROTOCOL_VERSION: &str = "2.5.0.0";

/// Normalize a protocol version string, falling back to the latest known
/// version when unrecognized.
pub fn normalize_version(version: &str) -> &'static str {
    KNOWN_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|known| *known == version)
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

fn de_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_version(&raw).to_string())
}

fn de_compression<'de, D>(deserializer: D) -> Result<Compression, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(Compression::from_name(&raw))
}

fn de_ack_mode<'de, D>(deserializer: D) -> Result<AckMode, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(AckMode::from_name(&raw))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
