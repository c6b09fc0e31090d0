use crate::error::ImpalaError;
use std::{
    collections::{btree_map, BTreeMap},
    fmt,
};

/// Value of a [`Record`] entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Scalar diagnostics such as a loss.
    Scalar(f32),

    /// Per-step values such as state values of a batch.
    Array1(Vec<f32>),

    /// Text, for example a formatted summary of a distribution.
    String(String),
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{}", v),
            Self::Array1(v) => write!(f, "{:?}", v),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Named values reported by a learning step, kept in the order of keys.
///
/// ```rust
/// use impala_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("loss", 0.5);
/// record.insert("grad_norm", RecordValue::Scalar(0.95));
/// assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
/// assert_eq!(record.to_string(), "grad_norm: 0.95, loss: 0.5");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(BTreeMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Creates a record with a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        let mut record = Self::empty();
        record.insert(name, RecordValue::Scalar(value));
        record
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a value, replacing the previous one of the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Iterates over entries in the order of keys.
    pub fn iter(&self) -> btree_map::Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns the value of `k`.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records. Values of `record` win on shared keys.
    pub fn merge(mut self, record: Record) -> Self {
        self.0.extend(record.0);
        self
    }

    /// Returns the scalar of `k`.
    pub fn get_scalar(&self, k: &str) -> Result<f32, ImpalaError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(ImpalaError::RecordValueTypeError("Scalar".to_string())),
            None => Err(ImpalaError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the array of `k`.
    pub fn get_array1(&self, k: &str) -> Result<&[f32], ImpalaError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.as_slice()),
            Some(_) => Err(ImpalaError::RecordValueTypeError("Array1".to_string())),
            None => Err(ImpalaError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the text of `k`.
    pub fn get_string(&self, k: &str) -> Result<&str, ImpalaError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.as_str()),
            Some(_) => Err(ImpalaError::RecordValueTypeError("String".to_string())),
            None => Err(ImpalaError::RecordKeyError(k.to_string())),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Formats entries as `key: value` separated by commas, in the order of keys.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}
