use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::environment;
use crate::filesystem::{self, FilesystemError, WriteOptions};

/// Error type for loading and saving properties files.
#[derive(Debug, Error)]
pub enum PropertiesError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// An in-memory set of `key=value` properties, ordered by key.
///
/// Properties are read from and written to the Java-style `.properties`
/// text format:
///
/// ```text
/// # comment
/// ! also a comment
/// website = https\://en.wikipedia.org/
/// key\ with\ spaces : value
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertiesFile {
    properties: BTreeMap<String, String>,
}

impl PropertiesFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses properties from text.
    ///
    /// Parsing never fails: a line without separator becomes a key with an
    /// empty value.
    pub fn parse(content: &str) -> Self {
        Self {
            properties: parse_properties_string(content),
        }
    }

    /// Loads properties from a file, replacing the current ones.
    ///
    /// Invalid UTF-8 sequences are replaced with `U+FFFD`. On error the
    /// current properties are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `PropertiesError` if the file cannot be read.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PropertiesError> {
        let content = filesystem::read_file_lossy(&path)?;
        self.replace_with(&content, path.as_ref());
        Ok(())
    }

    /// Loads properties from a UTF-8 file, replacing the current ones.
    ///
    /// # Errors
    ///
    /// Returns `PropertiesError` if the file cannot be read or is not UTF-8.
    pub fn load_utf8<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PropertiesError> {
        let content = filesystem::read_file(&path)?;
        self.replace_with(&content, path.as_ref());
        Ok(())
    }

    fn replace_with(&mut self, content: &str, path: &Path) {
        self.properties = parse_properties_string(content);
        tracing::debug!(path = %path.display(), count = self.properties.len(), "loaded properties");
    }

    /// Writes all properties to a file as `key=value` lines, in key order.
    ///
    /// The file is overwritten in place; an interrupted save can leave a
    /// partially written file.
    ///
    /// # Errors
    ///
    /// Returns `PropertiesError` if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PropertiesError> {
        let content = self.to_string();
        filesystem::write_file(&path, &content, WriteOptions::default())?;
        tracing::debug!(path = %path.as_ref().display(), count = self.properties.len(), "saved properties");
        Ok(())
    }

    /// Same as [`PropertiesFile::save`]; files are always written as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `PropertiesError` if the file cannot be written.
    pub fn save_utf8<P: AsRef<Path>>(&self, path: P) -> Result<(), PropertiesError> {
        self.save(path)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Inserts `key` or overwrites its value.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Removes `key`, returning its former value. Removing a missing key is not an error.
    pub fn delete_key(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    pub fn clear(&mut self) {
        self.properties.clear();
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterates over the properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for PropertiesFile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for PropertiesFile {
    /// Formats the properties in the `.properties` text format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eol = environment::line_separator();
        for (key, value) in &self.properties {
            write!(f, "{}={}{}", escape_key(key), escape_value(value), eol)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertiesFile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Parses a multi-line string into a map of properties.
///
/// Ignores empty lines and lines starting with `#` or `!` (comments).
/// Later definitions of a key replace earlier ones.
pub fn parse_properties_string(content: &str) -> BTreeMap<String, String> {
    logical_lines(content)
        .into_iter()
        .map(|line| parse_line(&line))
        .collect()
}

/// Joins continued physical lines and drops blanks and comments.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut physical = content.lines();

    while let Some(line) = physical.next() {
        let trimmed = trim_format_start(line);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::from(trimmed);
        while has_dangling_backslash(&logical) {
            logical.pop();
            match physical.next() {
                Some(next) => logical.push_str(trim_format_start(next)),
                None => break,
            }
        }
        lines.push(logical);
    }
    lines
}

/// Whitespace separating tokens in the format: space, tab and form feed.
///
/// Other Unicode whitespace is content and survives parsing.
fn is_format_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{0C}')
}

fn trim_format_start(s: &str) -> &str {
    s.trim_start_matches(is_format_whitespace)
}

/// True when the line ends with an odd number of backslashes.
fn has_dangling_backslash(line: &str) -> bool {
    let trailing = line.bytes().rev().take_while(|b| *b == b'\\').count();
    trailing % 2 == 1
}

/// Splits a logical line into an unescaped key and value.
fn parse_line(line: &str) -> (String, String) {
    let (raw_key, raw_value) = split_line(line);
    let key = unescape(trim_unescaped_end(trim_format_start(raw_key)));
    let value = unescape(trim_format_start(raw_value));
    (key, value)
}

/// Trims trailing whitespace that is not part of an escape such as `\ `.
fn trim_unescaped_end(raw: &str) -> &str {
    let mut end = raw.len();
    while let Some(c) = raw[..end].chars().next_back() {
        if !is_format_whitespace(c) {
            break;
        }
        let before = &raw[..end - c.len_utf8()];
        if has_dangling_backslash(before) {
            break;
        }
        end -= c.len_utf8();
    }
    &raw[..end]
}

/// Splits at the first `=` or `:` not preceded by an escaping backslash.
fn split_line(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], &line[i + 1..]),
            _ => {}
        }
    }
    (line, "")
}

/// Resolves the escapes understood by the format.
///
/// Unknown escapes, `\uXXXX` included, are kept verbatim.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(e @ ('\\' | '=' | ':' | ' ' | '#' | '!')) => out.push(e),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{0C}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape_control(c: char, out: &mut String) -> bool {
    let escaped = match c {
        '\\' => "\\\\",
        '\t' => "\\t",
        '\n' => "\\n",
        '\r' => "\\r",
        '\u{0C}' => "\\f",
        _ => return false,
    };
    out.push_str(escaped);
    true
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, c) in key.chars().enumerate() {
        if escape_control(c, &mut out) {
            continue;
        }
        match c {
            '=' | ':' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut leading = true;
    for c in value.chars() {
        if c == ' ' && leading {
            out.push_str("\\ ");
            continue;
        }
        leading = false;
        if !escape_control(c, &mut out) {
            out.push(c);
        }
    }
    out
}
