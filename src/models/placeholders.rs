use indexmap::IndexMap;

/// Lookup table for `{token}` placeholders in listen-directory templates.
///
/// The host supplies the values; nothing here knows where storage lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPlaceholders {
    tokens: IndexMap<String, String>,
}

impl PathPlaceholders {
    /// Platform primary storage root.
    pub const STORAGE: &'static str = "storage";

    /// Per-application external data root.
    pub const ANDROID_DATA: &'static str = "androidData";

    pub fn new() -> Self {
        Self::default()
    }

    /// Table with both standard tokens set.
    pub fn standard(storage_root: &str, android_data_root: &str) -> Self {
        Self::new()
            .with(Self::STORAGE, storage_root)
            .with(Self::ANDROID_DATA, android_data_root)
    }

    pub fn with(mut self, token: &str, value: &str) -> Self {
        self.tokens.insert(token.to_string(), value.to_string());
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(|v| v.as_str())
    }

    /// Substitute every known `{token}`; unknown tokens are left as written.
    pub fn expand(&self, template: &str) -> String {
        let mut expanded = template.to_string();
        for (token, value) in &self.tokens {
            let pattern = format!("{{{}}}", token);
            if expanded.contains(&pattern) {
                expanded = expanded.replace(&pattern, value);
            }
        }
        expanded
    }
}
