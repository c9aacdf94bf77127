use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Result, WfdbError};
use crate::grammar::{self, RawLine};
use crate::header::Header;
use crate::schema::{self, LineKind};
use crate::types::{FieldValue, RecordFields, Value};
use crate::{DEFAULT_ADC_GAIN, DEFAULT_FS, DEFAULT_UNITS, HEADER_EXTENSION};

/// Reader for `<record>.hea` files
///
/// The whole header is parsed when the reader is opened; afterwards the
/// reader only hands out the resulting field mapping.
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{HeaderReader, FieldValue, Value};
///
/// # let dir = tempfile::tempdir()?;
/// # wfdb_header::doctest_utils::create_sample_record(dir.path(), "100")?;
/// let reader = HeaderReader::open_in(dir.path(), "100")?;
/// let fields = reader.fields();
///
/// assert_eq!(fields.record_name(), Some("100"));
/// assert_eq!(fields.nsig(), Some(2));
/// assert_eq!(fields.scalar("fs"), Some(&Value::Int(360)));
///
/// if let Some(FieldValue::PerSignal(names)) = fields.get("signame") {
///     println!("signals: {:?}", names);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct HeaderReader {
    path: PathBuf,
    fields: RecordFields,
}

impl HeaderReader {
    /// Opens `<record>.hea` in the current directory
    pub fn open<S: AsRef<str>>(record: S) -> Result<Self> {
        Self::open_in(".", record)
    }

    /// Opens `<record>.hea` in `dir`
    ///
    /// A trailing `.hea` on `record` is accepted and ignored.
    ///
    /// # Errors
    ///
    /// * `WfdbError::FileNotFound` - the header file can't be opened
    /// * `WfdbError::MalformedRecordLine` - the first header line is not a record line
    /// * `WfdbError::SignalCountMismatch` - fewer signal or segment lines than declared
    /// * `WfdbError::Parse` / `WfdbError::Type` - a signal or segment line is invalid
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb_header::{HeaderReader, WfdbError};
    ///
    /// # let dir = tempfile::tempdir()?;
    /// match HeaderReader::open_in(dir.path(), "missing") {
    ///     Err(WfdbError::FileNotFound(msg)) => println!("not found: {}", msg),
    ///     other => panic!("unexpected: {:?}", other),
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_in<P: AsRef<Path>, S: AsRef<str>>(dir: P, record: S) -> Result<Self> {
        let record = record.as_ref();
        let record = record
            .strip_suffix(&format!(".{}", HEADER_EXTENSION))
            .unwrap_or(record);
        let path = dir.as_ref().join(format!("{}.{}", record, HEADER_EXTENSION));

        let mut file = File::open(&path)
            .map_err(|e| WfdbError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        let mut text = String::new();
        file.read_to_string(&mut text)?;

        let fields = parse_header(&text)?;
        if fields.record_name() != Some(record) {
            warn!(
                requested = record,
                found = fields.record_name().unwrap_or_default(),
                "record name in header differs from file name"
            );
        }

        debug!(path = %path.display(), "header loaded");
        Ok(HeaderReader { path, fields })
    }

    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }

    pub fn into_fields(self) -> RecordFields {
        self.fields
    }

    /// Path of the header file that was read
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed view of the parsed header
    pub fn header(&self) -> Result<Header> {
        Header::from_fields(&self.fields)
    }
}

/// Reads `<record>.hea` from `dir` and returns its fields
pub fn read_header<P: AsRef<Path>>(dir: P, record: &str) -> Result<RecordFields> {
    HeaderReader::open_in(dir, record).map(HeaderReader::into_fields)
}

/// Parses the text of a header file
///
/// Record fields become scalars, signal and segment fields become one value
/// per line, and every comment (inline ones included) is collected under
/// `comments` without its `#` marker.
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{parse_header, Value};
///
/// let text = "\
/// ## MIT-BIH style record
/// 100 2 360 650000
/// 100.dat 212 200 11 1024 995 -22131 0 MLII
/// 100.dat 212 200 11 1024 1011 20052 0 V5
/// ";
/// let fields = parse_header(text)?;
///
/// assert_eq!(fields.nsig(), Some(2));
/// assert_eq!(fields.get("baseline").and_then(|b| b.get(0)), Some(&Value::Int(1024)));
/// assert_eq!(fields.get("units").and_then(|u| u.get(1)), Some(&Value::from("mV")));
/// assert_eq!(fields.comments(), &["MIT-BIH style record".to_string()]);
/// # Ok::<(), wfdb_header::WfdbError>(())
/// ```
pub fn parse_header(text: &str) -> Result<RecordFields> {
    let mut header_lines: Vec<(usize, &str)> = Vec::new();
    let mut comments: Vec<String> = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        if grammar::is_comment_line(line) {
            comments.push(grammar::strip_comment_marker(line).to_string());
            continue;
        }

        let (content, comment) = grammar::split_inline_comment(line);
        if let Some(comment) = comment {
            comments.push(grammar::strip_comment_marker(comment).to_string());
        }
        let content = content.trim();
        if !content.is_empty() {
            header_lines.push((line_number, content));
        }
    }

    let mut lines = header_lines.into_iter();
    let (record_number, record_line) = lines
        .next()
        .ok_or_else(|| WfdbError::MalformedRecordLine { line: String::new() })?;

    let raw = grammar::tokenize(record_line, LineKind::Record, record_number).map_err(|e| {
        debug!(error = %e, "record line rejected");
        WfdbError::MalformedRecordLine {
            line: record_line.to_string(),
        }
    })?;

    let mut fields = read_record_fields(&raw)?;
    let nsig = fields.nsig().unwrap_or(0);
    let nseg = fields.nseg();
    debug!(
        record = fields.record_name().unwrap_or_default(),
        nsig, nseg, "parsed record line"
    );

    let (kind, expected) = if nseg > 1 {
        (LineKind::Segment, nseg)
    } else {
        (LineKind::Signal, nsig)
    };

    let body: Vec<(usize, &str)> = lines.collect();
    if body.len() < expected {
        return Err(WfdbError::SignalCountMismatch {
            expected,
            found: body.len(),
        });
    }
    if body.len() > expected {
        warn!(
            expected,
            found = body.len(),
            "ignoring surplus {} lines",
            kind.name()
        );
    }

    let raw_lines = body[..expected]
        .iter()
        .map(|(number, line)| grammar::tokenize(line, kind, *number))
        .collect::<Result<Vec<RawLine>>>()?;

    for (name, column) in read_columns(kind, &raw_lines)? {
        fields.insert(name, FieldValue::PerSignal(column));
    }

    fields.insert("comments", FieldValue::PerComment(comments));
    Ok(fields)
}

fn read_record_fields(raw: &RawLine) -> Result<RecordFields> {
    let mut fields = RecordFields::new();

    for descriptor in schema::schema(LineKind::Record).fields() {
        let value = match grammar::coerce(descriptor, raw.get(descriptor.name))? {
            Value::Empty => match descriptor.name {
                "nseg" => Value::Int(1),
                "fs" => Value::Float(DEFAULT_FS),
                _ => continue,
            },
            value => value,
        };
        fields.insert(descriptor.name, value);
    }

    Ok(fields)
}

/// Builds one column per field of `kind`, dropping columns no line filled
fn read_columns(kind: LineKind, lines: &[RawLine]) -> Result<Vec<(&'static str, Vec<Value>)>> {
    let descriptors = schema::schema(kind).fields();
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(lines.len()); descriptors.len()];

    for (index, line) in lines.iter().enumerate() {
        trace!(line_number = line.line_number(), "reading {} line", kind.name());
        for (descriptor, column) in descriptors.iter().zip(columns.iter_mut()) {
            let value = match grammar::coerce(descriptor, line.get(descriptor.name))? {
                Value::Empty if kind == LineKind::Signal => signal_default(descriptor.name, index, line)?,
                value => value,
            };
            column.push(value);
        }
    }

    Ok(descriptors
        .iter()
        .zip(columns)
        .filter(|(_, column)| column.iter().any(|v| !v.is_empty()))
        .map(|(descriptor, column)| (descriptor.name, column))
        .collect())
}

/// Value a signal field takes when its line leaves it out
fn signal_default(name: &str, index: usize, line: &RawLine) -> Result<Value> {
    let value = match name {
        "sampsperframe" => Value::Int(1),
        "skew" | "byteoffset" | "initvalue" => Value::Int(0),
        "adcgain" => Value::Float(DEFAULT_ADC_GAIN),
        "units" => Value::Str(DEFAULT_UNITS.to_string()),
        "signame" => Value::Str(format!("ch{}", index + 1)),
        // 缺省基线取ADC零点
        "baseline" => {
            let (_, adczero) = schema::lookup("adczero")?;
            match grammar::coerce(adczero, line.get("adczero"))? {
                Value::Empty => Value::Int(0),
                zero => zero,
            }
        }
        _ => Value::Empty,
    };
    Ok(value)
}
