//! Named method parameters: `key=value` tokens with typed, on-demand coercion

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SearchError};

/// An ordered set of `key=value` parameters.
///
/// A repeated key keeps its first position but takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a sequence of `key=value` tokens.
    pub fn parse<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Params::new();
        for token in tokens {
            let token = token.as_ref();
            let (key, value) = token
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| SearchError::MalformedParam {
                    token: token.to_string(),
                })?;
            params.set(key, value);
        }
        Ok(params)
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`Params::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Read a required parameter.
    pub fn get<T: ParamValue>(&self, key: &str) -> Result<T> {
        let raw = self.get_raw(key).ok_or_else(|| SearchError::MissingParam {
            key: key.to_string(),
        })?;
        coerce(key, raw)
    }

    /// Read an optional parameter, falling back to `default` when absent.
    pub fn get_or<T: ParamValue>(&self, key: &str, default: T) -> Result<T> {
        match self.get_raw(key) {
            Some(raw) => coerce(key, raw),
            None => Ok(default),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses a comma-separated list, e.g. `"NN=11,indexThreadQty=4"`.
impl FromStr for Params {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        Params::parse(s.split(',').map(str::trim).filter(|t| !t.is_empty()))
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

fn coerce<T: ParamValue>(key: &str, raw: &str) -> Result<T> {
    T::parse_value(raw).ok_or_else(|| SearchError::invalid_param(key, raw, T::EXPECTED))
}

/// A type a parameter value can be coerced into.
pub trait ParamValue: Sized {
    /// Human readable type name used in error messages.
    const EXPECTED: &'static str;

    fn parse_value(raw: &str) -> Option<Self>;
}

macro_rules! impl_param_value {
    ($($t:ty => $expected:expr),* $(,)?) => {
        $(
            impl ParamValue for $t {
                const EXPECTED: &'static str = $expected;

                fn parse_value(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )*
    };
}

impl_param_value! {
    usize => "a non-negative integer",
    u32 => "a non-negative integer",
    u64 => "a non-negative integer",
    i32 => "an integer",
    i64 => "an integer",
}

impl ParamValue for f32 {
    const EXPECTED: &'static str = "a number";

    fn parse_value(raw: &str) -> Option<Self> {
        raw.parse::<f32>().ok().filter(|x| x.is_finite())
    }
}

impl ParamValue for f64 {
    const EXPECTED: &'static str = "a number";

    fn parse_value(raw: &str) -> Option<Self> {
        raw.parse::<f64>().ok().filter(|x| x.is_finite())
    }
}

impl ParamValue for bool {
    const EXPECTED: &'static str = "a boolean";

    fn parse_value(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }
}

impl ParamValue for String {
    const EXPECTED: &'static str = "a string";

    fn parse_value(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

/// Tracks which parameters a method actually read.
///
/// Methods read their parameters through the manager; once they are done,
/// [`ParamManager::check_unused`] reports keys nobody asked for, so that a
/// misspelled parameter fails loudly instead of being ignored.
#[derive(Debug)]
pub struct ParamManager<'p> {
    params: &'p Params,
    consumed: HashSet<String>,
}

impl<'p> ParamManager<'p> {
    pub fn new(params: &'p Params) -> Self {
        Self {
            params,
            consumed: HashSet::new(),
        }
    }

    pub fn get<T: ParamValue>(&mut self, key: &str) -> Result<T> {
        self.consumed.insert(key.to_string());
        self.params.get(key)
    }

    pub fn get_or<T: ParamValue>(&mut self, key: &str, default: T) -> Result<T> {
        self.consumed.insert(key.to_string());
        self.params.get_or(key, default)
    }

    /// Like [`get`](Self::get), but an absent key is `None` rather than an error.
    pub fn get_opt<T: ParamValue>(&mut self, key: &str) -> Result<Option<T>> {
        self.consumed.insert(key.to_string());
        if self.params.contains_key(key) {
            self.params.get(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Fail with [`SearchError::UnknownParams`] if any key was never read.
    pub fn check_unused(&self) -> Result<()> {
        let unused: Vec<String> = self
            .params
            .keys()
            .filter(|k| !self.consumed.contains(*k))
            .map(str::to_string)
            .collect();
        if unused.is_empty() {
            Ok(())
        } else {
            Err(SearchError::UnknownParams { keys: unused })
        }
    }
}
