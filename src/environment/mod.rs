use std::collections::BTreeMap;
use thiserror::Error;

/// Represents errors that can occur when modifying environment variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    /// The variable name was empty.
    #[error("Variable name is empty")]
    EmptyName,
    /// The variable name contains `=` or a NUL character.
    #[error("Invalid variable name: {0:?}")]
    InvalidName(String),
    /// The variable value contains a NUL character.
    #[error("Invalid value for variable {0:?}")]
    InvalidValue(String),
}

/// Access to a table of environment variables.
///
/// `SystemEnvironment` talks to the process environment, `MemoryEnvironment`
/// keeps its own table so callers can inject a controlled environment.
pub trait Environment {
    /// Returns the value of `name`, or `None` if the variable is not defined.
    fn var(&self, name: &str) -> Option<String>;

    /// Defines or overwrites `name`.
    fn set_var(&mut self, name: &str, value: &str) -> Result<(), EnvironmentError>;

    /// Undefines `name`. Removing an undefined variable is not an error.
    fn remove_var(&mut self, name: &str) -> Result<(), EnvironmentError>;

    /// Returns the names of all defined variables.
    fn var_names(&self) -> Vec<String>;
}

fn validate_name(name: &str) -> Result<(), EnvironmentError> {
    if name.is_empty() {
        return Err(EnvironmentError::EmptyName);
    }
    if name.contains('=') || name.contains('\0') {
        return Err(EnvironmentError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_value(name: &str, value: &str) -> Result<(), EnvironmentError> {
    if value.contains('\0') {
        return Err(EnvironmentError::InvalidValue(name.to_string()));
    }
    Ok(())
}

/// The environment of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        if validate_name(name).is_err() {
            return None;
        }
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }

    fn set_var(&mut self, name: &str, value: &str) -> Result<(), EnvironmentError> {
        validate_name(name)?;
        validate_value(name, value)?;
        tracing::debug!(name, "setting environment variable");
        // SAFETY: name and value were validated above. Callers must not modify the
        // environment while another thread reads it.
        unsafe { std::env::set_var(name, value) };
        Ok(())
    }

    fn remove_var(&mut self, name: &str) -> Result<(), EnvironmentError> {
        validate_name(name)?;
        tracing::debug!(name, "removing environment variable");
        // SAFETY: see `set_var`.
        unsafe { std::env::remove_var(name) };
        Ok(())
    }

    fn var_names(&self) -> Vec<String> {
        std::env::vars_os()
            .map(|(name, _)| name.to_string_lossy().into_owned())
            .collect()
    }
}

/// An environment table held in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryEnvironment {
    vars: BTreeMap<String, String>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the environment of the current process.
    pub fn from_system() -> Self {
        let vars = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Environment for MemoryEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn set_var(&mut self, name: &str, value: &str) -> Result<(), EnvironmentError> {
        validate_name(name)?;
        validate_value(name, value)?;
        self.vars.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_var(&mut self, name: &str) -> Result<(), EnvironmentError> {
        validate_name(name)?;
        self.vars.remove(name);
        Ok(())
    }

    fn var_names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}

/// Returns the value of a process environment variable.
///
/// An undefined variable and an empty or invalid name all yield an empty string.
pub fn get_var(name: &str) -> String {
    SystemEnvironment.var(name).unwrap_or_default()
}

/// Defines a process environment variable.
pub fn set_var(name: &str, value: &str) -> Result<(), EnvironmentError> {
    SystemEnvironment.set_var(name, value)
}

/// Expands variable references found in `text`.
///
/// Recognizes `${NAME}`, `$NAME` and `%NAME%`. `%NAME%` also matches names
/// that differ only in case, the way Windows resolves them. References to
/// undefined variables are kept as written.
pub fn expand<E: Environment + ?Sized>(env: &E, text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(['$', '%']) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        match expand_reference(env, tail) {
            Some((value, consumed)) => {
                output.push_str(&value);
                rest = &tail[consumed..];
            }
            None => {
                // Not a reference; keep the marker and move on.
                let marker = &tail[..1];
                output.push_str(marker);
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

/// Resolves the reference at the start of `tail`, returning its value and
/// how many bytes of `tail` it spans.
fn expand_reference<E: Environment + ?Sized>(env: &E, tail: &str) -> Option<(String, usize)> {
    if let Some(after) = tail.strip_prefix("${") {
        let end = after.find('}')?;
        let name = &after[..end];
        return env.var(name).map(|v| (v, end + 3));
    }
    if let Some(after) = tail.strip_prefix('$') {
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            return None;
        }
        return env.var(&after[..len]).map(|v| (v, len + 1));
    }
    if let Some(after) = tail.strip_prefix('%') {
        let end = after.find('%')?;
        let name = &after[..end];
        if name.is_empty() {
            return None;
        }
        let value = env.var(name).or_else(|| {
            env.var_names()
                .into_iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(name))
                .and_then(|candidate| env.var(&candidate))
        });
        return value.map(|v| (v, end + 2));
    }
    None
}

/// Returns true when the current process uses 32-bit pointers.
pub fn is_process_32bit() -> bool {
    cfg!(target_pointer_width = "32")
}

/// Returns true when the current process uses 64-bit pointers.
pub fn is_process_64bit() -> bool {
    cfg!(target_pointer_width = "64")
}

/// Returns the line separator of the current platform.
pub fn line_separator() -> &'static str {
    if cfg!(windows) { "\r\n" } else { "\n" }
}
