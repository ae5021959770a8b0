use memtier_core::config::{parse, parse_env};
use memtier_core::log_level::parse_log_level;
use memtier_core::message::{LineClass, classify_line, describe_tier};
use memtier_core::policy::parse_policy;
use memtier_core::{ConfigError, KindName, LogLevel};

// Declarations rejected by the preload library, with the ERROR body written
// for each.
const REJECTED: &[(&str, &str)] = &[
    ("DRAM:A", "Unsupported ratio: A"),
    ("DRAM", "Ratio not provided"),
    ("DRAM:-1", "Unsupported ratio: -1"),
    ("2", "Unsupported kind: 2"),
    ("a1b2:10", "Unsupported kind: a1b2"),
    ("FS_DAX:/tmp/:-1:1", "Unsupported pmem_size format: -1"),
    (
        "FS_DAX:/tmp/:-9223372036854775808:1",
        "Unsupported pmem_size format: -9223372036854775808",
    ),
    ("FS_DAX:/tmp/:as:1", "Unsupported pmem_size format: as"),
    ("FS_DAX:/tmp/:8191P:1", "Unsupported pmem_size format: 8191P"),
    ("FS_DAX:/tmp/:10G:-1", "Unsupported ratio: -1"),
    ("FS_DAX:/tmp/:10G:a", "Unsupported ratio: a"),
];

#[test]
fn rejected_declarations_report_exact_messages() {
    for (declaration, message) in REJECTED {
        let err = parse(declaration).expect_err(declaration);
        assert_eq!(err.to_string(), *message, "declaration={declaration}");
    }
}

#[test]
fn accepted_declarations_describe_themselves() {
    for (declaration, kinds) in [
        ("DRAM:1", vec![KindName::Dram]),
        ("FS_DAX:/tmp/:10G:1", vec![KindName::FsDax]),
        ("FS_DAX:/tmp/:N/A:1", vec![KindName::FsDax]),
        ("DRAM:1;FS_DAX:/tmp/:100M:4", vec![KindName::Dram, KindName::FsDax]),
    ] {
        let config = parse(declaration).unwrap();
        let got: Vec<KindName> = config.tiers().iter().map(|t| t.kind()).collect();
        assert_eq!(got, kinds);

        // Every description line is recognised as a tiering line.
        for tier in config.tiers() {
            for message in describe_tier(tier) {
                let line = format!("{}{message}", message.level().prefix());
                assert!(
                    matches!(classify_line(&line), LineClass::Init(_)),
                    "unrecognised: {line}"
                );
            }
        }
    }
}

#[test]
fn environment_values() {
    assert_eq!(parse_env(None), Err(ConfigError::MissingConfig));
    assert_eq!(parse_log_level(None), Ok(LogLevel::Error));
    for raw in ["-1", "4"] {
        let err = parse_log_level(Some(raw)).unwrap_err();
        let line = format!("{}{err}", LogLevel::Error.prefix());
        assert_eq!(
            line,
            format!("MEMKIND_MEM_TIERING_LOG_ERROR: Wrong value of MEMKIND_MEM_TIERING_LOG_LEVEL={raw}")
        );
    }
    assert!(parse_policy(Some("LRU")).is_err());
}
