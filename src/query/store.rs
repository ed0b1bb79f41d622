//! Typed, per-request view over the raw query parameters.
//!
//! Raw `key=value` pairs are parsed once, by key, into a [`ParamValue`].
//! Pipeline stages then read them back through [`QueryStore::get`] and
//! [`QueryStore::get_if`], and publish computed values for later stages with
//! [`QueryStore::update`].
//!
//! Reads never fail. A key that is absent, that failed to parse, whose value
//! has a different type than the accessor asks for, or whose value is
//! rejected by the validator all yield the caller's default.
//!
//! # Ordering
//!
//! `update` is how stages talk to each other: geometry resolution overwrites
//! `w`/`h` with resolved pixel counts, page resolution writes back `n` and
//! `page`, and so on. Stages must run in pipeline order; nothing in the
//! types enforces it.

use std::collections::HashMap;

use tracing::debug;

use super::{Coordinate, ImageType, Output};

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Bool(bool),
    Float(f32),
    Coordinate(Coordinate),
    Output(Output),
    ImageType(ImageType),
    IntList(Vec<i32>),
    Text(String),
}

/// Types that can be read back out of a [`ParamValue`].
pub trait FromParam: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
}

macro_rules! param_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromParam for $ty {
                fn from_param(value: &ParamValue) -> Option<Self> {
                    match value {
                        ParamValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::$variant(value)
                }
            }
        )*
    };
}

param_conversions! {
    i32 => Int,
    bool => Bool,
    f32 => Float,
    Coordinate => Coordinate,
    Output => Output,
    ImageType => ImageType,
    Vec<i32> => IntList,
    String => Text,
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

// =============================================================================
// Parameter Kinds
// =============================================================================

/// Declared semantic type of each known query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Int,
    Bool,
    Float,
    Coordinate,
    Output,
    IntList,
    Text,
}

fn param_kind(key: &str) -> ParamKind {
    match key {
        "w" | "h" => ParamKind::Coordinate,
        "ro" | "page" | "n" | "trim" | "q" | "l" | "loop" => ParamKind::Int,
        "flip" | "flop" | "precrop" | "il" | "af" | "ll" => ParamKind::Bool,
        "dpr" => ParamKind::Float,
        "output" => ParamKind::Output,
        "delay" => ParamKind::IntList,
        _ => ParamKind::Text,
    }
}

fn parse_int(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i32>() {
        return Some(v);
    }
    let v: f64 = raw.parse().ok()?;
    (v.is_finite() && v.abs() <= i32::MAX as f64).then_some(v.trunc() as i32)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Parse a raw query value according to the declared type of `key`.
pub fn parse_value(key: &str, raw: &str) -> Option<ParamValue> {
    match param_kind(key) {
        ParamKind::Int => parse_int(raw).map(ParamValue::Int),
        ParamKind::Bool => parse_bool(raw).map(ParamValue::Bool),
        ParamKind::Float => raw
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ParamValue::Float),
        ParamKind::Coordinate => Coordinate::parse(raw).map(ParamValue::Coordinate),
        ParamKind::Output => Output::from_name(raw.trim()).map(ParamValue::Output),
        ParamKind::IntList => raw
            .split(',')
            .map(parse_int)
            .collect::<Option<Vec<_>>>()
            .map(ParamValue::IntList),
        ParamKind::Text => Some(ParamValue::Text(raw.to_string())),
    }
}

// =============================================================================
// QueryStore
// =============================================================================

/// Request-scoped parameter store.
#[derive(Debug, Clone, Default)]
pub struct QueryStore {
    values: HashMap<String, ParamValue>,
}

impl QueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from decoded `key=value` pairs.
    ///
    /// Values that fail to parse for their key's declared type are dropped,
    /// which makes them indistinguishable from absent keys. Later duplicates
    /// win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = HashMap::new();
        for (key, raw) in pairs {
            let key = key.as_ref();
            match parse_value(key, raw.as_ref()) {
                Some(value) => {
                    values.insert(key.to_string(), value);
                }
                None => {
                    debug!(key, raw = raw.as_ref(), "Ignoring unparseable query parameter");
                }
            }
        }
        Self { values }
    }

    /// Parse a raw (percent-encoded) query string such as `"w=300&output=webp"`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Get the value for `key`, or `default` when absent or of another type.
    pub fn get<T: FromParam>(&self, key: &str, default: T) -> T {
        self.values
            .get(key)
            .and_then(T::from_param)
            .unwrap_or(default)
    }

    /// Like [`get`](Self::get), but a value failing `predicate` is treated as
    /// absent.
    pub fn get_if<T, P>(&self, key: &str, predicate: P, default: T) -> T
    where
        T: FromParam,
        P: FnOnce(&T) -> bool,
    {
        match self.values.get(key).and_then(T::from_param) {
            Some(value) if predicate(&value) => value,
            _ => default,
        }
    }

    /// Text value of `key`, if present and textual.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Overwrite or insert a value for downstream stages.
    pub fn update(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
