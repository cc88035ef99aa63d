use super::fvv;
use crate::error::{Result, TransferError};
use crate::models::TransferConfig;
use camino::Utf8Path;
use std::fmt;
use std::fs;

/// Textual formats a configuration can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    /// Legacy structured-text format.
    Fvv,
    Json,
}

impl ConfigFormat {
    pub const ALL: [ConfigFormat; 2] = [ConfigFormat::Fvv, ConfigFormat::Json];

    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("fvv") => Ok(Self::Fvv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            _ => Err(TransferError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Fvv => "fvv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fvv => "FVV",
            Self::Json => "JSON",
        })
    }
}

/// Parse configuration text in the given format.
pub fn parse(text: &str, format: ConfigFormat) -> Result<TransferConfig> {
    match format {
        ConfigFormat::Fvv => fvv::parse(text).map_err(|e| TransferError::Parse {
            format: "FVV",
            source: Box::new(e),
        }),
        ConfigFormat::Json => serde_json::from_str(text).map_err(|e| TransferError::Parse {
            format: "JSON",
            source: Box::new(e),
        }),
    }
}

/// Serialize a configuration; map and list order is kept as-is.
pub fn serialize(config: &TransferConfig, format: ConfigFormat) -> String {
    match format {
        ConfigFormat::Fvv => fvv::serialize(config),
        // Plain data with string keys only, so serialization cannot fail.
        ConfigFormat::Json => serde_json::to_string_pretty(config).unwrap_or_default(),
    }
}

/// Read a configuration file, choosing the codec by extension.
pub fn read_config_file(path: &Utf8Path) -> Result<TransferConfig> {
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|e| TransferError::storage(path, e))?;
    parse(&content, format)
}

/// Write a configuration file, choosing the codec by extension.
pub fn write_config_file(config: &TransferConfig, path: &Utf8Path) -> Result<()> {
    let format = ConfigFormat::from_path(path)?;
    fs::write(path, serialize(config, format)).map_err(|e| TransferError::storage(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Utf8Path::new("a/config.fvv")).unwrap(),
            ConfigFormat::Fvv
        );
        assert_eq!(
            ConfigFormat::from_path(Utf8Path::new("CONFIG.JSON")).unwrap(),
            ConfigFormat::Json
        );
        assert!(matches!(
            ConfigFormat::from_path(Utf8Path::new("config.yaml")),
            Err(TransferError::UnsupportedFormat(_))
        ));
        assert!(ConfigFormat::from_path(Utf8Path::new("config")).is_err());
    }

    #[test]
    fn test_json_defaults_for_absent_fields() {
        let config = parse(r#"{ "name": "x", "delay": 5 }"#, ConfigFormat::Json).unwrap();
        assert_eq!(config.name, "x");
        assert_eq!(config.delay, 5);
        assert!(config.sub_app);
        assert_eq!(config.default_type, "其他");
        assert_eq!(config.ignore_list.len(), 5);
    }

    #[test]
    fn test_json_lenient_scalars() {
        let config = parse(
            r#"{ "delay": "later", "subApp": 3, "ignoreNoSuffix": "FALSE", "classifyDirectory": "" }"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(config.delay, 60);
        assert!(config.sub_app);
        assert!(!config.ignore_no_suffix);
        assert_eq!(
            config.classify_directory,
            Utf8PathBuf::from("/storage/emulated/0/文件分类")
        );
    }

    #[test]
    fn test_json_keeps_rule_order() {
        let config = parse(
            r#"{ "suffixRules": { "z": ["a"], "b": ["c"], "m": ["d"] } }"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let labels: Vec<&String> = config.suffix_rules.keys().collect();
        assert_eq!(labels, ["z", "b", "m"]);

        let text = serialize(&config, ConfigFormat::Json);
        let z = text.find("\"z\"").unwrap();
        let b = text.find("\"b\"").unwrap();
        let m = text.find("\"m\"").unwrap();
        assert!(z < b && b < m);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse("{ not json", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, TransferError::Parse { format: "JSON", .. }));
    }

    #[test]
    fn test_file_helpers_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let config = TransferConfig::builtin();

        for format in ConfigFormat::ALL {
            let path = dir.join(format!("config.{}", format.extension()));
            write_config_file(&config, &path).unwrap();
            assert_eq!(read_config_file(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let err = read_config_file(Utf8Path::new("/nonexistent/dir/config.fvv")).unwrap_err();
        assert!(matches!(err, TransferError::Storage { .. }));
    }
}
