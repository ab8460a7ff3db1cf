use super::*;

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.mode, SinkMode::SyncFile);
    assert_eq!(config.level, Level::Debug);
    assert_eq!(config.queue_capacity, 10000);
    assert_eq!(config.file.path, PathBuf::from("log.log"));
    assert_eq!(config.file.buffer_capacity, 1024 * 1024);
    assert_eq!(config.file.rotation, RotationMode::None);
    assert_eq!(config.file.flush_interval, Duration::from_secs(1));
    assert_eq!(config.broker.max_message_bytes, 1024 * 1024);
    assert_eq!(config.broker.max_publish_attempts, 5);
    assert_eq!(config.broker.publish_backoff, Duration::ZERO);
    assert_eq!(config.broker.acks, AckMode::AllReplicas);
    assert_eq!(config.broker.compression, Compression::None);
    assert_eq!(config.broker.version, "2.5.0.0");
}

#[test]
fn test_header_defaults() {
    let header = HeaderConfig::default();
    assert!(header.timestamp);
    assert!(header.level);
    assert!(!header.pid);
    assert_eq!(header.caller, CallerStyle::Off);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validate_file_modes_need_no_broker() {
    for mode in [SinkMode::SyncFile, SinkMode::AsyncFile] {
        let config = Config {
            mode,
            ..Config::default()
        };
        config.validate().expect("file modes have usable defaults");
    }
}

#[test]
fn test_validate_rejects_empty_broker_list() {
    let config = Config {
        mode: SinkMode::AsyncBroker,
        broker: BrokerConfig {
            topic: "logs".into(),
            ..BrokerConfig::default()
        },
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::EmptyBrokerList)
    ));
}

#[test]
fn test_validate_rejects_empty_topic() {
    let config = Config {
        mode: SinkMode::AsyncFileAndBroker,
        broker: BrokerConfig {
            brokers: vec!["broker-1:9092".into()],
            ..BrokerConfig::default()
        },
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::EmptyTopic)));
}

#[test]
fn test_validate_accepts_complete_broker_config() {
    let config = Config {
        mode: SinkMode::AsyncBroker,
        broker: BrokerConfig {
            brokers: vec!["broker-1:9092".into(), "broker-2:9092".into()],
            topic: "logs".into(),
            ..BrokerConfig::default()
        },
        ..Config::default()
    };
    config.validate().expect("complete broker config");
}

// =============================================================================
// Selector fallbacks
// =============================================================================

#[test]
fn test_compression_from_name() {
    assert_eq!(Compression::from_name("gzip"), Compression::Gzip);
    assert_eq!(Compression::from_name("SNAPPY"), Compression::Snappy);
    assert_eq!(Compression::from_name("lz4"), Compression::Lz4);
    assert_eq!(Compression::from_name("zstd"), Compression::Zstd);
    assert_eq!(Compression::from_name("none"), Compression::None);
}

#[test]
fn test_compression_falls_back_to_none() {
    assert_eq!(Compression::from_name("brotli"), Compression::None);
    assert_eq!(Compression::from_name(""), Compression::None);
}

#[test]
fn test_ack_mode_from_name() {
    assert_eq!(AckMode::from_name("none"), AckMode::None);
    assert_eq!(AckMode::from_name("leader-only"), AckMode::LeaderOnly);
    assert_eq!(AckMode::from_name("leader"), AckMode::LeaderOnly);
    assert_eq!(AckMode::from_name("all-replicas"), AckMode::AllReplicas);
}

#[test]
fn test_ack_mode_falls_back_to_all_replicas() {
    assert_eq!(AckMode::from_name("quorum"), AckMode::AllReplicas);
    assert_eq!(AckMode::from_name(""), AckMode::AllReplicas);
}

#[test]
fn test_version_normalization() {
    assert_eq!(normalize_version("0.10.2.0"), "0.10.2.0");
    assert_eq!(normalize_version("2.4.0.0"), "2.4.0.0");
    // Unrecognized versions fall back to the latest known.
    assert_eq!(normalize_version("9.9.9.9"), "2.5.0.0");
    assert_eq!(normalize_version(""), "2.5.0.0");
}

// =============================================================================
// Rotation paths
// =============================================================================

fn local_time(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Local> {
    use chrono::TimeZone;
    Local
        .with_ymd_and_hms(y, mo, d, h, 30, 0)
        .single()
        .expect("unambiguous local time")
}

#[test]
fn test_rotation_none_has_no_suffix() {
    let now = local_time(2020, 7, 1, 9);
    assert_eq!(RotationMode::None.suffix(now), None);
    assert_eq!(
        RotationMode::None.path_for(Path::new("log.log"), now),
        PathBuf::from("log.log")
    );
}

#[test]
fn test_rotation_daily_suffix() {
    let now = local_time(2020, 7, 1, 9);
    assert_eq!(RotationMode::Daily.suffix(now).as_deref(), Some("20200701"));
    assert_eq!(
        RotationMode::Daily.path_for(Path::new("base"), now),
        PathBuf::from("base.20200701")
    );
}

#[test]
fn test_rotation_hourly_suffix() {
    let now = local_time(2020, 7, 1, 9);
    assert_eq!(
        RotationMode::Hourly.suffix(now).as_deref(),
        Some("2020070109")
    );
    assert_eq!(
        RotationMode::Hourly.path_for(Path::new("base"), now),
        PathBuf::from("base.2020070109")
    );
}

#[test]
fn test_rotation_key_changes_only_at_boundaries() {
    let nine = local_time(2020, 7, 1, 9);
    let ten = local_time(2020, 7, 1, 10);

    let key_a = RotationMode::Hourly.suffix(nine);
    let key_b = RotationMode::Hourly.suffix(nine + chrono::Duration::minutes(10));
    let key_c = RotationMode::Hourly.suffix(ten);

    assert_eq!(key_a, key_b);
    assert_ne!(key_a, key_c);

    // Daily keys ignore the hour change.
    assert_eq!(
        RotationMode::Daily.suffix(nine),
        RotationMode::Daily.suffix(ten)
    );
}

// =============================================================================
// TOML deserialization
// =============================================================================

#[test]
fn test_toml_minimal_config() {
    let config: Config = toml::from_str("").expect("empty config");
    assert_eq!(config.mode, SinkMode::SyncFile);
    assert_eq!(config.queue_capacity, 10000);
}

#[test]
fn test_toml_full_config() {
    let config: Config = toml::from_str(
        r#"
        mode = "async-file-and-broker"
        level = "warn"
        queue_capacity = 500

        [header]
        timestamp = false
        pid = true
        caller = "short"

        [file]
        path = "service.log"
        buffer_capacity = 4096
        rotation = "hourly"
        flush_interval = "250ms"

        [broker]
        brokers = ["broker-1:9092"]
        topic = "service-logs"
        version = "2.4.0.0"
        compression = "snappy"
        acks = "leader-only"
        max_publish_attempts = 3
        publish_backoff = "50ms"
        "#,
    )
    .expect("full config");

    assert_eq!(config.mode, SinkMode::AsyncFileAndBroker);
    assert_eq!(config.level, Level::Warn);
    assert_eq!(config.queue_capacity, 500);
    assert!(!config.header.timestamp);
    assert!(config.header.pid);
    assert_eq!(config.header.caller, CallerStyle::Short);
    assert_eq!(config.file.path, PathBuf::from("service.log"));
    assert_eq!(config.file.buffer_capacity, 4096);
    assert_eq!(config.file.rotation, RotationMode::Hourly);
    assert_eq!(config.file.flush_interval, Duration::from_millis(250));
    assert_eq!(config.broker.version, "2.4.0.0");
    assert_eq!(config.broker.compression, Compression::Snappy);
    assert_eq!(config.broker.acks, AckMode::LeaderOnly);
    assert_eq!(config.broker.max_publish_attempts, 3);
    assert_eq!(config.broker.publish_backoff, Duration::from_millis(50));
    config.validate().expect("valid");
}

#[test]
fn test_toml_unrecognized_selectors_fall_back() {
    let config: Config = toml::from_str(
        r#"
        mode = "async-broker"

        [broker]
        brokers = ["broker-1:9092"]
        topic = "logs"
        version = "0.0.0.0"
        compression = "brotli"
        acks = "quorum"
        "#,
    )
    .expect("config with unknown selector values");

    assert_eq!(config.broker.version, "2.5.0.0");
    assert_eq!(config.broker.compression, Compression::None);
    assert_eq!(config.broker.acks, AckMode::AllReplicas);
}

#[test]
fn test_toml_explicit_zero_queue_capacity_is_kept() {
    let config: Config = toml::from_str("queue_capacity = 0").expect("config");
    assert_eq!(config.queue_capacity, 0);
}
