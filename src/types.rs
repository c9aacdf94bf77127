use std::fmt;

use indexmap::IndexMap;

use crate::schema::{self, LineKind};

/// The primitive kinds a header field may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Str,
}

/// A single typed header value
///
/// `Empty` is the placeholder inserted when a field has to exist structurally
/// (because another field depends on it) but nobody supplied a value yet.
/// Numeric values compare by magnitude, so `Int(360) == Float(360.0)`.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Empty,
}

impl Value {
    /// True for the placeholder and for empty strings
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Int(_) => Some(ValueKind::Int),
            Value::Float(_) => Some(ValueKind::Float),
            Value::Str(_) => Some(ValueKind::Str),
            Value::Empty => None,
        }
    }

    /// Integer view; whole floats convert, fractional ones do not
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Empty, Value::Empty) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::Empty => Ok(()),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// The value stored under one field name, shaped by the field's line kind
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Record-level value, or a signal-level value to broadcast to every signal
    Scalar(Value),
    /// One value per signal line
    PerSignal(Vec<Value>),
    /// One value per segment line
    PerSegment(Vec<Value>),
    /// Free-text comment lines
    PerComment(Vec<String>),
}

impl FieldValue {
    /// Number of values held; a scalar counts as one
    pub fn len(&self) -> usize {
        match self {
            FieldValue::Scalar(_) => 1,
            FieldValue::PerSignal(v) | FieldValue::PerSegment(v) => v.len(),
            FieldValue::PerComment(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// The per-signal or per-segment sequence, if this is one
    pub fn values(&self) -> Option<&[Value]> {
        match self {
            FieldValue::PerSignal(v) | FieldValue::PerSegment(v) => Some(v),
            _ => None,
        }
    }

    /// Value for one signal/segment index; scalars answer for every index
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::PerSignal(v) | FieldValue::PerSegment(v) => v.get(index),
            FieldValue::PerComment(_) => None,
        }
    }

    /// Re-shapes a value according to the line kind that owns the field
    fn tagged(self, kind: LineKind) -> Self {
        match (kind, self) {
            (LineKind::Signal, FieldValue::PerSegment(v)) => FieldValue::PerSignal(v),
            (LineKind::Segment, FieldValue::PerSignal(v)) => FieldValue::PerSegment(v),
            (LineKind::Comment, FieldValue::Scalar(v)) => FieldValue::PerComment(vec![v.to_string()]),
            (LineKind::Comment, FieldValue::PerSignal(v))
            | (LineKind::Comment, FieldValue::PerSegment(v)) => {
                FieldValue::PerComment(v.iter().map(|c| c.to_string()).collect())
            }
            (_, other) => other,
        }
    }
}

macro_rules! field_value_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Scalar(v.into())
                }
            }
        )*
    };
}

field_value_from_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, &str, String);

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Scalar(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::PerSignal(v.into_iter().map(Into::into).collect())
    }
}

/// The runtime field mapping of one header
///
/// Keys are schema field names. Inserting resolves the `gain`/`nsampseg`
/// aliases and re-tags sequences by the owning line kind, so a sequence
/// stored under `seglen` is always [`FieldValue::PerSegment`].
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{RecordFields, FieldValue, Value};
///
/// let fields = RecordFields::new()
///     .with("recordname", "rec1")
///     .with("nsig", 2)
///     .with("gain", vec![200.0, 400.0]);
///
/// assert_eq!(fields.nsig(), Some(2));
/// assert!(fields.contains("adcgain"));
/// assert_eq!(
///     fields.get("adcgain").and_then(|g| g.get(1)),
///     Some(&Value::Float(400.0))
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFields {
    fields: IndexMap<String, FieldValue>,
}

impl RecordFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, returning whatever the field held before
    ///
    /// Once the mapping declares several segments, `filename` is stored as
    /// `segname`.
    pub fn insert<V: Into<FieldValue>>(&mut self, name: &str, value: V) -> Option<FieldValue> {
        let name = match schema::canonical_name(name) {
            "filename" if self.is_multi_segment() => "segname",
            canonical => canonical,
        };
        let value = match schema::lookup(name) {
            Ok((kind, _)) => value.into().tagged(kind),
            Err(_) => value.into(),
        };
        self.fields.insert(name.to_string(), value)
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with<V: Into<FieldValue>>(mut self, name: &str, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Looks a field up by name or alias
    ///
    /// In a multi-segment mapping `filename` answers with the segment names.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let canonical = schema::canonical_name(name);
        match self.fields.get(canonical) {
            Some(v) => Some(v),
            None if canonical == "filename" && self.is_multi_segment() => self.fields.get("segname"),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.shift_remove(schema::canonical_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The scalar stored under `name`, if the field is a scalar
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldValue::as_scalar)
    }

    pub fn record_name(&self) -> Option<&str> {
        self.scalar("recordname").and_then(Value::as_str)
    }

    pub fn nsig(&self) -> Option<usize> {
        self.scalar("nsig")
            .and_then(Value::as_i64)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Declared segment count, 1 when absent
    pub fn nseg(&self) -> usize {
        self.scalar("nseg")
            .and_then(Value::as_i64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(1)
    }

    pub fn is_multi_segment(&self) -> bool {
        self.nseg() > 1
    }

    pub fn comments(&self) -> &[String] {
        match self.fields.get("comments") {
            Some(FieldValue::PerComment(c)) => c,
            _ => &[],
        }
    }

    /// Inserts an auto-fill placeholder without alias or shape handling
    pub(crate) fn insert_placeholder(&mut self, name: &'static str) {
        self.fields.insert(name.to_string(), FieldValue::Scalar(Value::Empty));
    }

    /// Moves the value under `from` to `to`, keeping the shape rules of `to`
    pub(crate) fn rename(&mut self, from: &str, to: &str) {
        if let Some(value) = self.fields.shift_remove(from) {
            self.insert(to, value);
        }
    }
}

impl<'a> IntoIterator for &'a RecordFields {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = indexmap::map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
