//! Static catalog of WFDB header fields.
//!
//! Every header line kind (record, signal, segment, comment) owns an ordered
//! list of [`FieldDescriptor`]s. The order is the order fields appear on the
//! line, and every dependency points to a field declared earlier on the same
//! line, so walking a list backwards visits the most specific field first.
//!
//! The tables are built once into a [`Registry`] and never change afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{Result, WfdbError};
use crate::types::{Value, ValueKind};

/// The kinds of line a header file is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Record,
    Signal,
    Segment,
    Comment,
}

impl LineKind {
    pub const ALL: [LineKind; 4] = [
        LineKind::Record,
        LineKind::Signal,
        LineKind::Segment,
        LineKind::Comment,
    ];

    fn index(self) -> usize {
        match self {
            LineKind::Record => 0,
            LineKind::Signal => 1,
            LineKind::Segment => 2,
            LineKind::Comment => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LineKind::Record => "record",
            LineKind::Signal => "signal",
            LineKind::Segment => "segment",
            LineKind::Comment => "comment",
        }
    }
}

/// When the writer insists on a field being supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRequirement {
    Optional,
    Always,
    /// Required only when the record declares at least one signal
    WithSignals,
}

/// Compile-time form of a default value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Int(v) => Value::Int(v),
            DefaultValue::Float(v) => Value::Float(v),
            DefaultValue::Str(s) => Value::Str(s.to_string()),
        }
    }
}

/// Everything the reader and writer need to know about one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// Accepted value kinds, tried in order when coercing text
    pub allowed_types: &'static [ValueKind],
    /// Text written before the value
    pub delimiter: &'static str,
    /// Text written after the value, `)` for parenthesised fields
    pub terminator: &'static str,
    pub dependency: Option<&'static str>,
    pub is_required_for_read: bool,
    pub write_requirement: WriteRequirement,
    pub write_default: Option<DefaultValue>,
}

impl FieldDescriptor {
    const fn new(
        name: &'static str,
        allowed_types: &'static [ValueKind],
        delimiter: &'static str,
        dependency: Option<&'static str>,
        is_required_for_read: bool,
        write_requirement: WriteRequirement,
        write_default: Option<DefaultValue>,
    ) -> Self {
        FieldDescriptor {
            name,
            allowed_types,
            delimiter,
            terminator: "",
            dependency,
            is_required_for_read,
            write_requirement,
            write_default,
        }
    }

    const fn closed_by(mut self, terminator: &'static str) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn is_required_for_write(&self) -> bool {
        self.write_requirement != WriteRequirement::Optional
    }

    /// Write requirement resolved against the record's signal count
    pub fn is_required_when(&self, nsig: usize) -> bool {
        match self.write_requirement {
            WriteRequirement::Optional => false,
            WriteRequirement::Always => true,
            WriteRequirement::WithSignals => nsig > 0,
        }
    }

    pub fn accepts(&self, kind: ValueKind) -> bool {
        self.allowed_types.contains(&kind)
    }
}

use DefaultValue as D;
use ValueKind::{Float, Int, Str};
use WriteRequirement::{Always, Optional, WithSignals};

const INT: &[ValueKind] = &[Int];
const NUMBER: &[ValueKind] = &[Int, Float];
const FLOAT: &[ValueKind] = &[Float];
const TEXT: &[ValueKind] = &[Str];
const INT_OR_TEXT: &[ValueKind] = &[Int, Str];

static RECORD_FIELDS: [FieldDescriptor; 9] = [
    FieldDescriptor::new("recordname", TEXT, "", None, true, Always, None),
    FieldDescriptor::new("nseg", INT, "/", Some("recordname"), false, Optional, Some(D::Int(1))),
    FieldDescriptor::new("nsig", INT, " ", Some("recordname"), true, Always, None),
    FieldDescriptor::new("fs", NUMBER, " ", Some("nsig"), false, WithSignals, Some(D::Float(crate::DEFAULT_FS))),
    FieldDescriptor::new("counterfreq", NUMBER, "/", Some("fs"), false, Optional, None),
    FieldDescriptor::new("basecounter", NUMBER, "(", Some("counterfreq"), false, Optional, Some(D::Int(0)))
        .closed_by(")"),
    FieldDescriptor::new("siglen", INT, " ", Some("fs"), false, WithSignals, None),
    FieldDescriptor::new("basetime", TEXT, " ", Some("siglen"), false, Optional, Some(D::Str("00:00:00"))),
    FieldDescriptor::new("basedate", TEXT, " ", Some("basetime"), false, Optional, None),
];

static SIGNAL_FIELDS: [FieldDescriptor; 14] = [
    FieldDescriptor::new("filename", TEXT, "", None, true, Always, None),
    FieldDescriptor::new("fmt", INT_OR_TEXT, " ", Some("filename"), true, Always, None),
    FieldDescriptor::new("sampsperframe", INT, "x", Some("fmt"), false, Optional, Some(D::Int(1))),
    FieldDescriptor::new("skew", INT, ":", Some("fmt"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("byteoffset", INT, "+", Some("fmt"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("adcgain", FLOAT, " ", Some("fmt"), false, Optional, Some(D::Float(crate::DEFAULT_ADC_GAIN))),
    FieldDescriptor::new("baseline", INT, "(", Some("adcgain"), false, Optional, Some(D::Int(0))).closed_by(")"),
    FieldDescriptor::new("units", TEXT, "/", Some("adcgain"), false, Optional, Some(D::Str(crate::DEFAULT_UNITS))),
    FieldDescriptor::new("adcres", INT, " ", Some("adcgain"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("adczero", INT, " ", Some("adcres"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("initvalue", INT, " ", Some("adczero"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("checksum", INT, " ", Some("initvalue"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("blocksize", INT, " ", Some("checksum"), false, Optional, Some(D::Int(0))),
    FieldDescriptor::new("signame", TEXT, " ", Some("blocksize"), false, Optional, None),
];

static SEGMENT_FIELDS: [FieldDescriptor; 2] = [
    FieldDescriptor::new("segname", TEXT, "", None, true, Always, None),
    FieldDescriptor::new("seglen", INT, " ", Some("segname"), true, Always, None),
];

static COMMENT_FIELDS: [FieldDescriptor; 1] = [
    FieldDescriptor::new("comments", TEXT, "#", None, false, Optional, None),
];

/// Alternative spellings accepted for schema fields
const ALIASES: &[(&str, &str)] = &[("gain", "adcgain"), ("nsampseg", "seglen")];

/// The ordered field list of one line kind, with dependencies resolved to indices
#[derive(Debug)]
pub struct LineKindSchema {
    kind: LineKind,
    fields: &'static [FieldDescriptor],
    positions: HashMap<&'static str, usize>,
    dependency_index: Vec<Option<usize>>,
    leaves: Vec<bool>,
}

impl LineKindSchema {
    fn build(kind: LineKind, fields: &'static [FieldDescriptor]) -> Self {
        let positions: HashMap<&'static str, usize> =
            fields.iter().enumerate().map(|(i, f)| (f.name, i)).collect();

        let dependency_index: Vec<Option<usize>> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                f.dependency.map(|dep| {
                    let j = positions[dep];
                    assert!(
                        j < i,
                        "field '{}' depends on '{}' which is not declared before it",
                        f.name,
                        dep
                    );
                    j
                })
            })
            .collect();

        let leaves = (0..fields.len())
            .map(|i| !dependency_index.contains(&Some(i)))
            .collect();

        LineKindSchema {
            kind,
            fields,
            positions,
            dependency_index,
            leaves,
        }
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&'static FieldDescriptor> {
        let fields = self.fields;
        self.position(name).map(|i| &fields[i])
    }

    /// Index of the field that the field at `index` depends on
    pub fn dependency_of(&self, index: usize) -> Option<usize> {
        self.dependency_index.get(index).copied().flatten()
    }

    /// True when no other field on the line depends on the field at `index`
    pub fn is_leaf(&self, index: usize) -> bool {
        self.leaves.get(index).copied().unwrap_or(false)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }
}

/// Process-wide field catalog
#[derive(Debug)]
pub struct Registry {
    schemas: [LineKindSchema; 4],
    owners: HashMap<&'static str, LineKind>,
}

impl Registry {
    fn build() -> Self {
        let schemas = [
            LineKindSchema::build(LineKind::Record, &RECORD_FIELDS),
            LineKindSchema::build(LineKind::Signal, &SIGNAL_FIELDS),
            LineKindSchema::build(LineKind::Segment, &SEGMENT_FIELDS),
            LineKindSchema::build(LineKind::Comment, &COMMENT_FIELDS),
        ];

        let mut owners = HashMap::new();
        for schema in &schemas {
            for name in schema.field_names() {
                let previous = owners.insert(name, schema.kind());
                assert!(previous.is_none(), "field '{}' declared twice", name);
            }
        }

        Registry { schemas, owners }
    }

    pub fn schema(&self, kind: LineKind) -> &LineKindSchema {
        &self.schemas[kind.index()]
    }

    /// Finds a field by name or alias
    pub fn lookup(&self, name: &str) -> Result<(LineKind, &'static FieldDescriptor)> {
        let name = canonical_name(name);
        let kind = *self
            .owners
            .get(name)
            .ok_or_else(|| WfdbError::UnknownField(name.to_string()))?;
        let descriptor = self
            .schema(kind)
            .get(name)
            .ok_or_else(|| WfdbError::UnknownField(name.to_string()))?;
        Ok((kind, descriptor))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owners.contains_key(canonical_name(name))
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::build);

pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn schema(kind: LineKind) -> &'static LineKindSchema {
    REGISTRY.schema(kind)
}

/// Finds a field by name or alias
///
/// # Examples
///
/// ```rust
/// use wfdb_header::schema::{lookup, LineKind};
///
/// let (kind, descriptor) = lookup("units")?;
/// assert_eq!(kind, LineKind::Signal);
/// assert_eq!(descriptor.dependency, Some("adcgain"));
///
/// assert!(lookup("color").is_err());
/// # Ok::<(), wfdb_header::WfdbError>(())
/// ```
pub fn lookup(name: &str) -> Result<(LineKind, &'static FieldDescriptor)> {
    REGISTRY.lookup(name)
}

/// Resolves an alias to the schema name; other names pass through
pub fn canonical_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// The chain of fields that must be present whenever `name` is, nearest first
pub fn dependency_chain(name: &str) -> Result<Vec<&'static str>> {
    let (kind, descriptor) = lookup(name)?;
    let schema = schema(kind);
    let mut chain = Vec::new();
    let mut current = schema.position(descriptor.name);
    while let Some(index) = current.and_then(|i| schema.dependency_of(i)) {
        chain.push(schema.fields()[index].name);
        current = Some(index);
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_point_backwards() {
        for kind in LineKind::ALL {
            let schema = schema(kind);
            for (i, field) in schema.fields().iter().enumerate() {
                if let Some(dep) = field.dependency {
                    let j = schema.position(dep).expect("dependency in same line kind");
                    assert!(j < i, "{} -> {}", field.name, dep);
                }
            }
        }
    }

    #[test]
    fn test_lookup_by_alias() {
        let (kind, descriptor) = lookup("gain").unwrap();
        assert_eq!(kind, LineKind::Signal);
        assert_eq!(descriptor.name, "adcgain");

        let (kind, descriptor) = lookup("nsampseg").unwrap();
        assert_eq!(kind, LineKind::Segment);
        assert_eq!(descriptor.name, "seglen");
    }

    #[test]
    fn test_unknown_field() {
        match lookup("bogus") {
            Err(WfdbError::UnknownField(name)) => assert_eq!(name, "bogus"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dependency_chain() {
        assert_eq!(dependency_chain("units").unwrap(), vec!["adcgain", "fmt", "filename"]);
        assert_eq!(
            dependency_chain("basedate").unwrap(),
            vec!["basetime", "siglen", "fs", "nsig", "recordname"]
        );
        assert!(dependency_chain("recordname").unwrap().is_empty());
    }

    #[test]
    fn test_leaves() {
        let signal = schema(LineKind::Signal);
        assert!(signal.is_leaf(signal.position("signame").unwrap()));
        assert!(signal.is_leaf(signal.position("units").unwrap()));
        assert!(!signal.is_leaf(signal.position("adcgain").unwrap()));

        let record = schema(LineKind::Record);
        assert!(record.is_leaf(record.position("basedate").unwrap()));
        assert!(!record.is_leaf(record.position("counterfreq").unwrap()));
    }

    #[test]
    fn test_write_requirements() {
        let (_, fs) = lookup("fs").unwrap();
        assert!(fs.is_required_for_write());
        assert!(fs.is_required_when(2));
        assert!(!fs.is_required_when(0));

        let (_, nsig) = lookup("nsig").unwrap();
        assert!(nsig.is_required_when(0));
        assert!(nsig.is_required_for_read);
    }
}
