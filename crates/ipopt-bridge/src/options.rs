//! Native solver options loaded from TOML or command-line text.
//!
//! Options are stored in `~/.ipopt-bridge/options.toml` as a flat table:
//!
//! ```toml
//! [options]
//! tol = 1e-8
//! max_iter = 500
//! mu_strategy = "adaptive"
//! ```
//!
//! Every entry is forwarded verbatim; the native solver decides whether a key
//! is valid.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::native::NativeSolver;
use crate::problem::Problem;

/// A native option value.
///
/// Untagged: TOML integers become `Int`, floats `Number`, strings `Str`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i32),
    Number(f64),
    Str(String),
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Number(v)
    }
}

impl From<f32> for OptionValue {
    fn from(v: f32) -> Self {
        OptionValue::Number(f64::from(v))
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Number(v) => write!(f, "{v:e}"),
            OptionValue::Str(v) => f.write_str(v),
        }
    }
}

impl FromStr for OptionValue {
    type Err = std::convert::Infallible;

    /// Integer if it parses as one, then a number, else the raw string.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i32>() {
            return Ok(OptionValue::Int(v));
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(OptionValue::Number(v));
        }
        Ok(OptionValue::Str(s.to_string()))
    }
}

/// Split `key=value` text into an option entry.
pub fn parse_assignment(text: &str) -> Result<(String, OptionValue)> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("expected key=value, got {text:?}")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Config(format!("missing option name in {text:?}")));
    }
    let value = match value.parse::<OptionValue>() {
        Ok(value) => value,
        Err(never) => match never {},
    };
    Ok((key.to_string(), value))
}

/// A set of native options to apply to a problem before solving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub options: BTreeMap<String, OptionValue>,
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the default config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ipopt-bridge"))
    }

    /// Get the default options file path.
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("options.toml"))
    }

    /// Load options from the default location.
    ///
    /// Returns an empty set if the file doesn't exist.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load options from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save options to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Set one option, replacing any earlier value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.options.insert(key.into(), value.into());
    }

    /// Parse and insert `key=value` text.
    pub fn insert_assignment(&mut self, text: &str) -> Result<()> {
        let (key, value) = parse_assignment(text)?;
        self.options.insert(key, value);
        Ok(())
    }

    /// Entries of `other` override entries of `self`.
    pub fn merge(&mut self, other: SolverOptions) {
        self.options.extend(other.options);
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Forward every entry to `problem`, in key order.
    pub fn apply<S: NativeSolver>(&self, problem: &mut Problem<S>) -> Result<()> {
        for (key, value) in &self.options {
            problem.set_option(key, value.clone())?;
        }
        Ok(())
    }
}
