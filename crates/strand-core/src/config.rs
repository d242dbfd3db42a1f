use crate::errors::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Upper bound on recursive placeholder substitution. Chains deeper than
/// this are treated as circular.
const MAX_RESOLUTION_DEPTH: usize = 20;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("placeholder regex must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Boolean,
    Integer,
    Float,
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    pub key: String,
    pub raw: String,
    pub value_type: ValueType,
}

impl ConfigValue {
    pub fn new(key: impl Into<String>, raw: impl Into<String>) -> Self {
        ConfigValue {
            key: key.into(),
            raw: raw.into(),
            value_type: ValueType::String,
        }
    }

    pub fn typed(key: impl Into<String>, raw: impl Into<String>, value_type: ValueType) -> Self {
        ConfigValue {
            key: key.into(),
            raw: raw.into(),
            value_type,
        }
    }
}

#[derive(Debug, Clone)]
struct Layer {
    name: String,
    values: HashMap<String, ConfigValue>,
}

/// Ordered stack of named configuration layers, least specific first.
/// A lookup returns the value from the most specific layer defining the key;
/// within one layer a later insert overwrites.
///
/// The store is assembled up front during context construction and read-only
/// afterwards, so shared readers need no locking.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    layers: Vec<Layer>,
}

impl ConfigStore {
    pub fn new() -> Self {
        ConfigStore::default()
    }

    /// Appends an empty layer, making it the most specific one. Adding a
    /// layer that already exists is a no-op.
    pub fn add_layer(&mut self, name: &str) {
        if !self.layers.iter().any(|l| l.name == name) {
            self.layers.push(Layer {
                name: name.to_string(),
                values: HashMap::new(),
            });
        }
    }

    /// Inserts or overrides a value in the named layer. The layer is created
    /// (appended, i.e. most specific) if it does not exist yet.
    pub fn add(&mut self, layer: &str, value: ConfigValue) {
        self.add_layer(layer);
        if let Some(l) = self.layers.iter_mut().find(|l| l.name == layer) {
            l.values.insert(value.key.clone(), value);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup_raw(key).is_some()
    }

    /// The name of the most specific layer defining `key`.
    pub fn provenance(&self, key: &str) -> Option<&str> {
        self.layers
            .iter()
            .rev()
            .find(|l| l.values.contains_key(key))
            .map(|l| l.name.as_str())
    }

    fn lookup_raw(&self, key: &str) -> Option<&ConfigValue> {
        self.layers.iter().rev().find_map(|l| l.values.get(key))
    }

    /// The unresolved text of `key`. Used for values that are deliberately
    /// left to the scheduler's own expansion, like `$PBS_JOBID`.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.lookup_raw(key).map(|v| v.raw.as_str())
    }

    /// Resolves `key` from the most specific layer defining it, substituting
    /// `$NAME` / `${NAME}` placeholders recursively. Undefined names fall
    /// back to the process environment. Circular references are an error for
    /// the key, never silently defaulted.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = self
            .lookup_raw(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        let mut chain = vec![key.to_string()];
        self.substitute(key, &value.raw, &mut chain)
    }

    fn substitute(&self, key: &str, raw: &str, chain: &mut Vec<String>) -> Result<String> {
        if chain.len() > MAX_RESOLUTION_DEPTH {
            return Err(ConfigError::CircularReference {
                key: key.to_string(),
                chain: chain.clone(),
            });
        }

        let mut out = String::new();
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(raw) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let name = match caps.get(1).or_else(|| caps.get(2)) {
                Some(m) => m.as_str(),
                None => continue,
            };

            out.push_str(&raw[last..whole.start()]);
            last = whole.end();

            if chain.iter().any(|c| c == name) {
                let mut cycle = chain.clone();
                cycle.push(name.to_string());
                return Err(ConfigError::CircularReference {
                    key: name.to_string(),
                    chain: cycle,
                });
            }

            if let Some(referenced) = self.lookup_raw(name) {
                let raw_ref = referenced.raw.clone();
                chain.push(name.to_string());
                let resolved = self.substitute(name, &raw_ref, chain)?;
                chain.pop();
                out.push_str(&resolved);
            } else if let Ok(env_value) = std::env::var(name) {
                out.push_str(&env_value);
            } else {
                return Err(ConfigError::UnresolvedPlaceholder {
                    key: key.to_string(),
                    name: name.to_string(),
                });
            }
        }
        out.push_str(&raw[last..]);
        Ok(out)
    }

    /// Typed accessor with a caller-supplied default. A missing key or an
    /// unparseable value is recoverable: it logs and returns the default.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Ok(v) => match v.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    tracing::warn!(
                        "Configuration value '{}' = '{}' is not a boolean, using default {}",
                        key,
                        other,
                        default
                    );
                    default
                }
            },
            Err(ConfigError::MissingKey(_)) => default,
            Err(e) => {
                tracing::warn!("Could not resolve '{}' ({}), using default {}", key, e, default);
                default
            }
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get_parsed(key, default)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get_parsed(key, default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get_parsed(key, default)
    }

    fn get_parsed<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        match self.get(key) {
            Ok(v) => v.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Configuration value '{}' = '{}' did not parse, using default {}",
                    key,
                    v,
                    default
                );
                default
            }),
            Err(ConfigError::MissingKey(_)) => default,
            Err(e) => {
                tracing::warn!("Could not resolve '{}' ({}), using default {}", key, e, default);
                default
            }
        }
    }

    /// Path accessor; applies tilde expansion after placeholder resolution.
    pub fn get_path(&self, key: &str) -> Result<PathBuf> {
        let resolved = self.get(key)?;
        Ok(PathBuf::from(shellexpand::tilde(&resolved).into_owned()))
    }
}
