use std::fmt;

/// A single codec option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Text(&'static str),
    IntList(Vec<i32>),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&'static str> for OptionValue {
    fn from(value: &'static str) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<i32>> for OptionValue {
    fn from(value: Vec<i32>) -> Self {
        OptionValue::IntList(value)
    }
}

impl From<Access> for OptionValue {
    fn from(value: Access) -> Self {
        OptionValue::Text(value.as_str())
    }
}

/// Decoder access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Top-to-bottom, single pass
    Sequential,
    /// Whole image available, needed by trim
    Random,
}

impl Access {
    pub const fn as_str(self) -> &'static str {
        match self {
            Access::Sequential => "sequential",
            Access::Random => "random",
        }
    }
}

/// Ordered key/value options passed to load and save calls.
///
/// Setting an existing key replaces its value in place, so the order is the
/// order in which keys were first set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecOptions {
    entries: Vec<(&'static str, OptionValue)>,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn set(mut self, key: &'static str, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<OptionValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Append every entry of `other`, replacing keys that already exist.
    pub fn extend(&mut self, other: CodecOptions) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(OptionValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(OptionValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&'static str> {
        match self.get(key) {
            Some(OptionValue::Text(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_ints(&self, key: &str) -> Option<&[i32]> {
        match self.get(key) {
            Some(OptionValue::IntList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Text(v) => f.write_str(v),
            OptionValue::IntList(v) => {
                let parts: Vec<String> = v.iter().map(|d| d.to_string()).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}
