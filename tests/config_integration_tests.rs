//! Integration tests for ConfigStore and the configuration codecs
//!
//! These tests verify:
//! - Default configuration generation on first load
//! - Saving, importing and exporting across both formats
//! - Corrupt files surfacing as errors
//! - Round trips preserving rule and listen-directory order

use autoclassify::config::{self, ConfigFormat};
use autoclassify::{ConfigStore, TransferConfig, TransferError};
use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_first_load_writes_builtin() {
    let (_temp_dir, dir) = create_test_config_dir();
    let path = dir.join("data/transfer_config.fvv");
    let store = ConfigStore::new(&path).unwrap();

    let config = store.load().unwrap();

    assert_eq!(*config, TransferConfig::builtin());
    assert!(path.exists());

    // What was written reads back as the same configuration
    let reread = config::read_config_file(&path).unwrap();
    assert_eq!(reread, TransferConfig::builtin());
}

#[test]
fn test_corrupt_file_is_not_replaced() {
    let (_temp_dir, dir) = create_test_config_dir();
    let path = dir.join("transfer_config.fvv");
    fs::write(&path, "Name = \"unterminated\nDelay = 5\n").unwrap();

    let store = ConfigStore::new(&path).unwrap();
    let result = store.load();

    assert!(matches!(result, Err(TransferError::Parse { format: "FVV", .. })));
    // The broken file is left for the user to fix
    assert!(fs::read_to_string(&path).unwrap().contains("unterminated"));
}

#[test]
fn test_import_json_into_fvv_store() {
    let (_temp_dir, dir) = create_test_config_dir();
    let store = ConfigStore::new(dir.join("transfer_config.fvv")).unwrap();
    assert_ok!(store.load());

    let import_path = dir.join("shared.json");
    fs::write(
        &import_path,
        r#"{
            "name": "共享配置",
            "delay": "15",
            "subApp": "false",
            "classifyDirectory": "/out",
            "suffixRules": { "图片": ["jpg"], "文档": ["pdf"] }
        }"#,
    )
    .unwrap();

    let imported = store.import(&import_path).unwrap();
    assert_eq!(imported.name, "共享配置");
    assert_eq!(imported.delay, 15);
    assert!(!imported.sub_app);
    // Absent keys fall back to defaults
    assert!(imported.ignore_no_suffix);
    assert_eq!(imported.default_type, "其他");

    // Persisted in the store's own format
    let persisted = config::read_config_file(store.config_path()).unwrap();
    assert_eq!(persisted, *imported);
}

#[test]
fn test_export_to_both_formats() {
    let (_temp_dir, dir) = create_test_config_dir();
    let store = ConfigStore::new(dir.join("transfer_config.json")).unwrap();
    store.load().unwrap();

    for format in ConfigFormat::ALL {
        let target = dir.join(format!("export.{}", format.extension()));
        store.export(&target).unwrap();
        assert_eq!(
            config::read_config_file(&target).unwrap(),
            *store.current(),
            "{format} export differs"
        );
    }

    assert_err!(store.export(&dir.join("export.ini")));
}

#[test]
fn test_reset_to_default() {
    let (_temp_dir, dir) = create_test_config_dir();
    let store = ConfigStore::new(dir.join("transfer_config.fvv")).unwrap();
    store.load().unwrap();

    store
        .update(TransferConfig {
            delay: 5,
            ..TransferConfig::builtin()
        })
        .unwrap();
    assert_eq!(store.current().delay, 5);

    store.reset_to_default().unwrap();
    assert_eq!(*store.current(), TransferConfig::builtin());
    assert_eq!(
        config::read_config_file(store.config_path()).unwrap().delay,
        60
    );
}

#[test]
fn test_ensure_classify_directory_rejects_file() {
    let (_temp_dir, dir) = create_test_config_dir();
    let store = ConfigStore::new(dir.join("transfer_config.fvv")).unwrap();

    let occupied = dir.join("out");
    fs::write(&occupied, b"not a directory").unwrap();
    store
        .update(TransferConfig {
            classify_directory: occupied,
            ..TransferConfig::default()
        })
        .unwrap();

    assert!(matches!(
        store.ensure_classify_directory(),
        Err(TransferError::Storage { .. })
    ));
}

fn label() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_\u{4e00}-\u{4e2f}][a-zA-Z0-9_ .\u{4e00}-\u{4e2f}]{0,7}"
}

fn suffix() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,5}"
}

fn template() -> impl Strategy<Value = String> {
    "(\\{storage\\}|\\{androidData\\}|/sdcard)(/[a-zA-Z0-9_ \u{4e00}-\u{4e2f}]{1,8}){0,3}"
}

fn rule_map(
    key: impl Strategy<Value = String>,
    value: impl Strategy<Value = String>,
) -> impl Strategy<Value = IndexMap<String, Vec<String>>> {
    prop::collection::vec((key, prop::collection::vec(value, 0..4)), 0..6)
        .prop_map(|entries| entries.into_iter().collect())
}

prop_compose! {
    fn arbitrary_config()(
        name in "[^\"]{0,12}",
        classify_directory in "/[a-zA-Z0-9/ \u{4e00}-\u{4e2f}]{1,20}",
        delay in any::<u32>(),
        flags in any::<(bool, bool, bool, bool)>(),
        default_type in label(),
        listen_directories in rule_map(label(), template()),
        rec_list in prop::collection::vec(template(), 0..3),
        suffix_rules in rule_map(label(), suffix()),
        ignore_list in prop::collection::vec(suffix(), 0..5),
    ) -> TransferConfig {
        TransferConfig {
            name,
            classify_directory: Utf8PathBuf::from(classify_directory),
            delay,
            multi_user: flags.0,
            sub_app: flags.1,
            sub_time: flags.2,
            ignore_no_suffix: flags.3,
            default_type,
            listen_directories,
            rec_list,
            suffix_rules,
            ignore_list: ignore_list.into_iter().collect::<IndexSet<_>>(),
            ..TransferConfig::default()
        }
    }
}

proptest! {
    #[test]
    fn prop_round_trip_preserves_config(config in arbitrary_config()) {
        for format in ConfigFormat::ALL {
            let text = config::serialize(&config, format);
            let parsed = config::parse(&text, format).unwrap();
            prop_assert_eq!(&parsed, &config, "{} round trip", format);

            // Order is part of the meaning
            prop_assert!(parsed.suffix_rules.keys().eq(config.suffix_rules.keys()));
            prop_assert!(parsed.listen_directories.keys().eq(config.listen_directories.keys()));
        }
    }
}
