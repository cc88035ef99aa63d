//! FVV structured-text config format.
//!
//! The grammar is a flat sequence of assignments in any order:
//!
//! ```text
//! Name = "My rules"
//! Delay = 30
//! RecList = [ "{storage}/Download" ]
//! SuffixList = {
//!   图片 = ["jpg", "png"]
//!   文档 = ["pdf"]
//! }
//! ```
//!
//! Limitations kept on purpose for compatibility with the legacy tool:
//! string literals have no escape sequences (the next `"` always ends the
//! literal) and maps are one level deep, holding only lists.

use crate::models::{NAME_PLACEHOLDER, TransferConfig};
use crate::models::config::{
    DEFAULT_AUTHOR, DEFAULT_CLASSIFY_DIRECTORY, DEFAULT_DELAY_SECS, DEFAULT_NAME, DEFAULT_TYPE,
    DEFAULT_VERSION, parse_flag,
};
use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;
use thiserror::Error;

/// Splits FVV text into tokens. Every non-whitespace character starts one
/// of the alternatives, so consecutive matches cover the whole input.
/// Bare words may embed the `[name]` category placeholder.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s*(?:"([^"]*)("?)|((?:\[name\]|[^\s"=\[\]{},])+)|([=\[\]{},]))"#)
        .expect("Invalid FVV token regex")
});

const KEY_NAME: &str = "Name";
const KEY_AUTHOR: &str = "Author";
const KEY_VERSION: &str = "Version";
const KEY_CLASSIFY: &str = "Classify";
const KEY_DELAY: &str = "Delay";
const KEY_MULTI_USER: &str = "MultiUser";
const KEY_SUB_APP: &str = "SubApp";
const KEY_SUB_TIME: &str = "SubTime";
const KEY_DEFAULT_TYPE: &str = "DefaultType";
const KEY_IGNORE_NO_SUFFIX: &str = "IgnoreNoSuffix";
const KEY_LISTEN_LIST: &str = "ListenList";
const KEY_REC_LIST: &str = "RecList";
const KEY_SUFFIX_LIST: &str = "SuffixList";
const KEY_IGNORE_SUFFIX_LIST: &str = "IgnoreSuffixList";
const KEY_IGNORE_NAME_LIST: &str = "IgnoreNameList";

/// Malformed FVV token structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("at byte {offset}: {message}")]
pub struct FvvSyntaxError {
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Str(&'a str),
    Bare(&'a str),
    Equals,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Scalar(String),
    List(Vec<String>),
    Map(IndexMap<String, Vec<String>>),
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token<'_>)>, FvvSyntaxError> {
    let mut tokens = Vec::new();

    for caps in TOKEN_PATTERN.captures_iter(text) {
        let (offset, token) = if let Some(s) = caps.get(1) {
            if caps.get(2).is_none_or(|q| q.is_empty()) {
                return Err(FvvSyntaxError {
                    offset: s.start() - 1,
                    message: "unterminated string literal".to_string(),
                });
            }
            (s.start() - 1, Token::Str(s.as_str()))
        } else if let Some(b) = caps.get(3) {
            (b.start(), Token::Bare(b.as_str()))
        } else if let Some(p) = caps.get(4) {
            let token = match p.as_str() {
                "=" => Token::Equals,
                "[" => Token::OpenBracket,
                "]" => Token::CloseBracket,
                "{" => Token::OpenBrace,
                "}" => Token::CloseBrace,
                _ => Token::Comma,
            };
            (p.start(), token)
        } else {
            continue;
        };
        tokens.push((offset, token));
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).map(|(_, t)| *t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> FvvSyntaxError {
        FvvSyntaxError {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_equals(&mut self, key: &str) -> Result<(), FvvSyntaxError> {
        match self.next() {
            Some(Token::Equals) => Ok(()),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("expected '=' after '{}'", key)))
            }
        }
    }

    fn key(&mut self) -> Result<&'a str, FvvSyntaxError> {
        match self.next() {
            Some(Token::Bare(k)) | Some(Token::Str(k)) => Ok(k),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("expected a key"))
            }
        }
    }

    fn document(&mut self) -> Result<IndexMap<String, Value>, FvvSyntaxError> {
        let mut entries = IndexMap::new();
        while self.peek().is_some() {
            let key = self.key()?;
            self.expect_equals(key)?;
            let value = self.value()?;
            // First assignment of a key wins.
            entries.entry(key.to_string()).or_insert(value);
        }
        Ok(entries)
    }

    fn value(&mut self) -> Result<Value, FvvSyntaxError> {
        match self.peek() {
            Some(Token::Str(s)) | Some(Token::Bare(s)) => {
                self.pos += 1;
                Ok(Value::Scalar(s.to_string()))
            }
            Some(Token::OpenBracket) => self.list().map(Value::List),
            Some(Token::OpenBrace) => self.map().map(Value::Map),
            _ => Err(self.error("expected a value")),
        }
    }

    fn list(&mut self) -> Result<Vec<String>, FvvSyntaxError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            match self.next() {
                Some(Token::CloseBracket) => return Ok(items),
                Some(Token::Str(s)) | Some(Token::Bare(s)) => items.push(s.to_string()),
                Some(Token::Comma) => {}
                None => return Err(self.error("unterminated list")),
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error("lists may only contain strings"));
                }
            }
        }
    }

    fn map(&mut self) -> Result<IndexMap<String, Vec<String>>, FvvSyntaxError> {
        self.pos += 1;
        let mut entries = IndexMap::new();
        loop {
            match self.peek() {
                Some(Token::CloseBrace) => {
                    self.pos += 1;
                    return Ok(entries);
                }
                Some(Token::Comma) => self.pos += 1,
                None => return Err(self.error("unterminated map")),
                Some(_) => {
                    let key = self.key()?;
                    self.expect_equals(key)?;
                    match self.peek() {
                        Some(Token::OpenBracket) => {
                            let items = self.list()?;
                            entries.entry(key.to_string()).or_insert(items);
                        }
                        Some(Token::OpenBrace) => {
                            return Err(self.error("maps cannot be nested"));
                        }
                        _ => return Err(self.error("map entries must be lists")),
                    }
                }
            }
        }
    }
}

/// Parse FVV text into a configuration.
///
/// Missing keys, unparsable numbers/booleans and values of the wrong shape
/// fall back to defaults; only broken token structure is an error.
pub fn parse(text: &str) -> Result<TransferConfig, FvvSyntaxError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
        end: text.len(),
    };
    let entries = parser.document()?;

    let scalar = |key: &str| match entries.get(key) {
        Some(Value::Scalar(s)) => Some(s.as_str()),
        _ => None,
    };
    let list = |key: &str| match entries.get(key) {
        Some(Value::List(items)) => Some(items),
        _ => None,
    };
    let map = |key: &str| match entries.get(key) {
        Some(Value::Map(m)) => Some(m.clone()),
        _ => None,
    };
    let flag = |key: &str, default: bool| scalar(key).and_then(parse_flag).unwrap_or(default);
    let text_or = |key: &str, default: &str| scalar(key).unwrap_or(default).to_string();

    let classify_directory = scalar(KEY_CLASSIFY)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CLASSIFY_DIRECTORY);

    let ignore_suffixes = list(KEY_IGNORE_SUFFIX_LIST);
    let ignore_names = list(KEY_IGNORE_NAME_LIST);
    let ignore_list: IndexSet<String> = if ignore_suffixes.is_none() && ignore_names.is_none() {
        TransferConfig::default().ignore_list
    } else {
        ignore_suffixes
            .into_iter()
            .chain(ignore_names)
            .flatten()
            .cloned()
            .collect()
    };

    Ok(TransferConfig {
        name: text_or(KEY_NAME, DEFAULT_NAME),
        author: text_or(KEY_AUTHOR, DEFAULT_AUTHOR),
        version: text_or(KEY_VERSION, DEFAULT_VERSION),
        classify_directory: Utf8PathBuf::from(classify_directory),
        delay: scalar(KEY_DELAY)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_DELAY_SECS),
        multi_user: flag(KEY_MULTI_USER, false),
        sub_app: flag(KEY_SUB_APP, true),
        sub_time: flag(KEY_SUB_TIME, false),
        default_type: text_or(KEY_DEFAULT_TYPE, DEFAULT_TYPE),
        ignore_no_suffix: flag(KEY_IGNORE_NO_SUFFIX, true),
        listen_directories: map(KEY_LISTEN_LIST).unwrap_or_default(),
        rec_list: list(KEY_REC_LIST).cloned().unwrap_or_default(),
        suffix_rules: map(KEY_SUFFIX_LIST).unwrap_or_default(),
        ignore_list,
    })
}

/// Keys are written bare when the legacy reader can take them that way.
fn write_key(out: &mut String, key: &str) {
    let bare = !key.is_empty()
        && !key
            .replace(NAME_PLACEHOLDER, "")
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '=' | '[' | ']' | '{' | '}' | ','));
    if bare {
        out.push_str(key);
    } else {
        let _ = write!(out, "\"{}\"", key);
    }
}

fn quoted_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serialize a configuration as FVV text.
pub fn serialize(config: &TransferConfig) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{} = \"{}\"", KEY_NAME, config.name);
    let _ = writeln!(out, "{} = \"{}\"", KEY_AUTHOR, config.author);
    let _ = writeln!(out, "{} = \"{}\"", KEY_VERSION, config.version);
    let _ = writeln!(out, "{} = \"{}\"", KEY_CLASSIFY, config.classify_directory);
    let _ = writeln!(out, "{} = {}", KEY_DELAY, config.delay);
    let _ = writeln!(out, "{} = {}", KEY_MULTI_USER, config.multi_user);
    let _ = writeln!(out, "{} = {}", KEY_SUB_APP, config.sub_app);
    let _ = writeln!(out, "{} = {}", KEY_SUB_TIME, config.sub_time);
    let _ = writeln!(out, "{} = \"{}\"", KEY_DEFAULT_TYPE, config.default_type);
    let _ = writeln!(out, "{} = {}", KEY_IGNORE_NO_SUFFIX, config.ignore_no_suffix);

    let _ = writeln!(out, "{} = {{", KEY_LISTEN_LIST);
    for (label, paths) in &config.listen_directories {
        out.push_str("  ");
        write_key(&mut out, label);
        out.push_str(" = [\n");
        for path in paths {
            let _ = writeln!(out, "    \"{}\"", path);
        }
        out.push_str("  ]\n");
    }
    out.push_str("}\n");

    let _ = writeln!(out, "{} = [", KEY_REC_LIST);
    for path in &config.rec_list {
        let _ = writeln!(out, "  \"{}\"", path);
    }
    out.push_str("]\n");

    let _ = writeln!(out, "{} = {{", KEY_SUFFIX_LIST);
    for (category, suffixes) in &config.suffix_rules {
        out.push_str("  ");
        write_key(&mut out, category);
        let _ = writeln!(out, " = [{}]", quoted_list(suffixes));
    }
    out.push_str("}\n");

    let _ = writeln!(
        out,
        "{} = [{}]",
        KEY_IGNORE_SUFFIX_LIST,
        quoted_list(&config.ignore_list)
    );
    let _ = writeln!(out, "{} = []", KEY_IGNORE_NAME_LIST);

    out
}
