use super::placeholders::PathPlaceholders;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize};

/// Marker inside a category label that is replaced by the file's base name.
pub const NAME_PLACEHOLDER: &str = "[name]";

pub const DEFAULT_NAME: &str = "默认配置";
pub const DEFAULT_AUTHOR: &str = "MaterialFiles";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_CLASSIFY_DIRECTORY: &str = "/storage/emulated/0/文件分类";
pub const DEFAULT_DELAY_SECS: u32 = 60;
pub const DEFAULT_TYPE: &str = "其他";
pub const DEFAULT_IGNORE_LIST: [&str; 5] = ["bak", "aria", "tmp", "cache", "log"];

/// Classification configuration snapshot.
///
/// A loaded snapshot is never mutated in place: monitoring sessions and the
/// jobs they schedule share it through an `Arc`, and a settings change swaps
/// in a whole new value.
///
/// `suffix_rules` and `listen_directories` are `IndexMap`s because their
/// order is the rule priority and the origin lookup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferConfig {
    pub name: String,
    pub author: String,
    pub version: String,

    #[serde(deserialize_with = "lenient::classify_directory")]
    pub classify_directory: Utf8PathBuf,

    /// Settle delay in seconds.
    #[serde(deserialize_with = "lenient::delay")]
    pub delay: u32,

    #[serde(deserialize_with = "lenient::flag_default_false")]
    pub multi_user: bool,

    #[serde(deserialize_with = "lenient::flag_default_true")]
    pub sub_app: bool,

    #[serde(deserialize_with = "lenient::flag_default_false")]
    pub sub_time: bool,

    pub default_type: String,

    #[serde(deserialize_with = "lenient::flag_default_true")]
    pub ignore_no_suffix: bool,

    pub listen_directories: IndexMap<String, Vec<String>>,
    pub rec_list: Vec<String>,
    pub suffix_rules: IndexMap<String, Vec<String>>,
    pub ignore_list: IndexSet<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            version: DEFAULT_VERSION.to_string(),
            classify_directory: Utf8PathBuf::from(DEFAULT_CLASSIFY_DIRECTORY),
            delay: DEFAULT_DELAY_SECS,
            multi_user: false,
            sub_app: true,
            sub_time: false,
            default_type: DEFAULT_TYPE.to_string(),
            ignore_no_suffix: true,
            listen_directories: IndexMap::new(),
            rec_list: Vec::new(),
            suffix_rules: IndexMap::new(),
            ignore_list: DEFAULT_IGNORE_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One directory the monitor should watch, after placeholder expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub path: Utf8PathBuf,
    pub recursive: bool,
}

impl TransferConfig {
    /// Built-in configuration used on first start and by reset.
    pub fn builtin() -> Self {
        let mut listen_directories = IndexMap::new();
        listen_directories.insert("下载".to_string(), strings(&["{storage}/Download"]));
        listen_directories.insert(
            "QQ".to_string(),
            strings(&["{androidData}/com.tencent.mobileqq/Tencent/QQfile_recv"]),
        );
        listen_directories.insert(
            "微信".to_string(),
            strings(&["{androidData}/com.tencent.mm/MicroMsg/Download"]),
        );

        let mut suffix_rules = IndexMap::new();
        suffix_rules.insert("压缩包".to_string(), strings(&["zip", "rar", "7z", "tar", "gz"]));
        suffix_rules.insert(
            "程序".to_string(),
            strings(&["exe", "msi", "bat", "sh", "cmd", "jar"]),
        );
        suffix_rules.insert(
            "视频".to_string(),
            strings(&["mp4", "mkv", "avi", "mov", "wmv", "flv"]),
        );
        suffix_rules.insert(
            "文档".to_string(),
            strings(&["doc", "docx", "pdf", "txt", "xls", "xlsx", "ppt", "pptx"]),
        );
        suffix_rules.insert("安装包".to_string(), strings(&["apk", "apks", "xapk", "ipa"]));
        suffix_rules.insert("音频".to_string(), strings(&["mp3", "wav", "flac", "aac", "ogg"]));
        suffix_rules.insert(
            "图片".to_string(),
            strings(&["jpg", "jpeg", "png", "gif", "bmp", "webp"]),
        );
        suffix_rules.insert(
            "代码".to_string(),
            strings(&["java", "py", "js", "html", "css", "json", "xml", "kt"]),
        );
        suffix_rules.insert("其他".to_string(), strings(&["bin", "dat"]));

        Self {
            listen_directories,
            suffix_rules,
            ..Self::default()
        }
    }

    /// Whether a listen template was marked for recursive watching.
    ///
    /// Matches the raw template string, not its expansion.
    pub fn is_recursive(&self, template: &str) -> bool {
        self.rec_list.iter().any(|t| t == template)
    }

    /// Expand every listen template into the set of directories to watch.
    ///
    /// Duplicate expansions collapse into one target, recursive if any of the
    /// templates that produced it is recursive.
    pub fn watch_targets(&self, placeholders: &PathPlaceholders) -> Vec<WatchTarget> {
        let mut targets: IndexMap<Utf8PathBuf, bool> = IndexMap::new();
        for template in self.listen_directories.values().flatten() {
            let path = Utf8PathBuf::from(placeholders.expand(template));
            let recursive = self.is_recursive(template);
            let entry = targets.entry(path).or_insert(false);
            *entry |= recursive;
        }

        targets
            .into_iter()
            .map(|(path, recursive)| WatchTarget { path, recursive })
            .collect()
    }

    /// Origin label of the first listen template whose expansion contains `path`.
    ///
    /// Containment is tested per path component rather than as a string
    /// prefix, so `/sd/inbox-other/x` does not belong to a `/sd/inbox`
    /// template.
    pub fn origin_label(&self, path: &Utf8Path, placeholders: &PathPlaceholders) -> Option<&str> {
        self.listen_directories
            .iter()
            .find(|(_, templates)| {
                templates
                    .iter()
                    .any(|t| path.starts_with(placeholders.expand(t)))
            })
            .map(|(label, _)| label.as_str())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Field deserializers that fall back to the default instead of rejecting
/// the whole document when a scalar has the wrong type.
mod lenient {
    use super::*;
    use serde_json::Value;

    pub fn delay<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let delay = match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(delay.unwrap_or(DEFAULT_DELAY_SECS))
    }

    pub fn classify_directory<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Utf8PathBuf, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) if !s.is_empty() => Utf8PathBuf::from(s),
            _ => Utf8PathBuf::from(DEFAULT_CLASSIFY_DIRECTORY),
        })
    }

    pub fn flag_default_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        flag(deserializer, true)
    }

    pub fn flag_default_false<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<bool, D::Error> {
        flag(deserializer, false)
    }

    fn flag<'de, D: Deserializer<'de>>(deserializer: D, default: bool) -> Result<bool, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(b) => b,
            Value::String(s) => parse_flag(&s).unwrap_or(default),
            _ => default,
        })
    }
}

/// Parse a textual boolean the way both config formats accept it.
pub(crate) fn parse_flag(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
