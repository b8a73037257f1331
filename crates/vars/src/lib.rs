//! Variable tables and `${...}` placeholder substitution.
//!
//! Values read from configuration documents may contain placeholders such as
//! `${pool.size}`. [`substitute`] resolves them against a [`Variables`] table;
//! [`SharedVariables`] lets many readers observe one table that can be swapped
//! as a whole at runtime.
//!
//! ```
//! use confpath_vars::{Variables, substitute};
//!
//! let vars = Variables::from_iter([("host", "db.local")]);
//! assert_eq!(substitute("jdbc://${host}/app", Some(&vars)), "jdbc://db.local/app");
//! assert_eq!(substitute("jdbc://${host}/app", None), "jdbc://${host}/app");
//! ```

pub mod token;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

pub use token::TokenScanner;

/// Table key that switches on `${key:default}` handling when set to `true`.
pub const ENABLE_DEFAULT_VALUE_KEY: &str = "confpath.vars.enable-default-value";

/// Table key that overrides the separator between a key and its default value.
pub const DEFAULT_VALUE_SEPARATOR_KEY: &str = "confpath.vars.default-value-separator";

const DEFAULT_VALUE_SEPARATOR: &str = ":";

const PLACEHOLDER: TokenScanner<'static> = TokenScanner::new("${", "}");

/// An ordered key/value table used to resolve placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables {
    entries: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn default_value_separator(&self) -> Option<&str> {
        let enabled = self
            .get(ENABLE_DEFAULT_VALUE_KEY)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        enabled.then(|| {
            self.get(DEFAULT_VALUE_SEPARATOR_KEY)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_VALUE_SEPARATOR)
        })
    }

    fn resolve(&self, content: &str) -> String {
        if let Some(separator) = self.default_value_separator()
            && let Some((key, default)) = content.split_once(separator)
        {
            return self.get(key).unwrap_or(default).to_string();
        }
        match self.get(content) {
            Some(value) => value.to_string(),
            None => {
                log::trace!("Placeholder '${{{}}}' has no variable, leaving it in place", content);
                unresolved(content)
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Variables {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl From<BTreeMap<String, String>> for Variables {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

fn unresolved(content: &str) -> String {
    format!("${{{}}}", content)
}

/// Resolves `${...}` placeholders in `text`.
///
/// Without a table every placeholder is kept as written, though escape
/// sequences are still processed. Unknown keys are kept as `${key}`.
pub fn substitute(text: &str, variables: Option<&Variables>) -> String {
    PLACEHOLDER.replace(text, |content| match variables {
        Some(vars) => vars.resolve(content),
        None => unresolved(content),
    })
}

/// A variable table shared by reference between many readers.
///
/// Cloning the handle shares the same slot. [`SharedVariables::replace`] swaps
/// the whole table at once, so a reader holding a [`snapshot`](Self::snapshot)
/// never sees a partially updated table.
#[derive(Debug, Clone, Default)]
pub struct SharedVariables {
    slot: Arc<RwLock<Option<Arc<Variables>>>>,
}

impl SharedVariables {
    pub fn new(variables: Option<Variables>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(variables.map(Arc::new))),
        }
    }

    /// The table as it is right now.
    pub fn snapshot(&self) -> Option<Arc<Variables>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the table for every holder of this handle.
    pub fn replace(&self, variables: Option<Variables>) {
        let next = variables.map(Arc::new);
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Substitutes placeholders in `text` against the current table.
    pub fn substitute(&self, text: &str) -> String {
        let current = self.snapshot();
        substitute(text, current.as_deref())
    }

    /// True when both handles point at the same slot.
    pub fn same_slot(&self, other: &SharedVariables) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}
