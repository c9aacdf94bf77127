use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::error::{Result, WfdbError};
use crate::grammar;
use crate::schema::{self, FieldDescriptor, LineKind};
use crate::types::{FieldValue, RecordFields, Value, ValueKind};
use crate::validate::validate_and_complete;
use crate::{DEFAULT_FS, HEADER_EXTENSION, NULL_SEGMENT};

/// Fields whose grammar has no sign
const UNSIGNED_FIELDS: &[&str] = &[
    "nseg",
    "nsig",
    "fs",
    "counterfreq",
    "siglen",
    "fmt",
    "sampsperframe",
    "skew",
    "byteoffset",
    "adcres",
    "blocksize",
    "seglen",
];

/// Upper bound for `nsig` and `nseg`
const MAX_LINE_COUNT: usize = 1 << 16;

/// Writer for `<recordname>.hea` files
///
/// The writer checks the mapping against the field catalog, completes
/// dependencies, fills defaults and broadcasts scalars before anything is
/// serialized. Files are written through a temporary file in the target
/// directory and renamed into place, so a failed write never leaves a
/// partial header behind.
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{HeaderWriter, RecordFields};
///
/// # let dir = tempfile::tempdir()?;
/// let fields = RecordFields::new()
///     .with("recordname", "rec1")
///     .with("nsig", 2)
///     .with("fs", 500)
///     .with("siglen", 10_000)
///     .with("filename", "rec1.dat")
///     .with("fmt", 16)
///     .with("signame", vec!["I", "II"]);
///
/// let writer = HeaderWriter::new(dir.path());
/// let text = writer.render(&fields)?;
/// assert_eq!(text, "rec1 2 500 10000\nrec1.dat 16 200 0 0 0 0 0 I\nrec1.dat 16 200 0 0 0 0 0 II\n");
///
/// let path = writer.write(&fields)?;
/// assert!(path.ends_with("rec1.hea"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct HeaderWriter {
    dir: PathBuf,
    auto_fill: bool,
}

impl HeaderWriter {
    /// Creates a writer targeting `dir`, with dependency auto-fill enabled
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        HeaderWriter {
            dir: dir.as_ref().to_path_buf(),
            auto_fill: true,
        }
    }

    /// Controls whether missing dependencies are filled in or reported
    ///
    /// With auto-fill disabled a field whose dependency is absent fails with
    /// [`WfdbError::Dependency`].
    pub fn auto_fill_dependencies(mut self, enabled: bool) -> Self {
        self.auto_fill = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serializes a single-segment header
    ///
    /// # Errors
    ///
    /// * `WfdbError::UnknownKey` - a key is not a header field
    /// * `WfdbError::MissingRequired` - a required field is absent or empty
    /// * `WfdbError::Dependency` - a dependency is absent and auto-fill is off
    /// * `WfdbError::SizeMismatch` - a sequence does not have one value per signal
    /// * `WfdbError::Type` - a value can't be written as its field
    /// * `WfdbError::SegmentInconsistency` - the mapping declares several segments
    pub fn render(&self, fields: &RecordFields) -> Result<String> {
        let prepared = self.prepare(fields)?;
        if prepared.is_multi_segment() {
            return Err(WfdbError::SegmentInconsistency {
                segment: record_label(&prepared),
                reason: "a multi-segment header must be written with its segment headers".to_string(),
            });
        }
        Ok(serialize(&prepared))
    }

    /// Writes `<recordname>.hea` into the target directory
    pub fn write(&self, fields: &RecordFields) -> Result<PathBuf> {
        let text = self.render(fields)?;
        persist(&self.dir, &record_label(fields), &text)
    }

    /// Serializes a multi-segment master header
    ///
    /// Every segment named by the master (except the null segment `~`) must
    /// be supplied, and each must agree with the master on sampling
    /// frequency, signal count and length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wfdb_header::{HeaderWriter, RecordFields};
    ///
    /// let segment = |name: &str, len: i64| {
    ///     RecordFields::new()
    ///         .with("recordname", name)
    ///         .with("nsig", 1)
    ///         .with("fs", 360)
    ///         .with("siglen", len)
    ///         .with("filename", format!("{}.dat", name))
    ///         .with("fmt", 212)
    /// };
    /// let master = RecordFields::new()
    ///     .with("recordname", "multi")
    ///     .with("nseg", 3)
    ///     .with("nsig", 1)
    ///     .with("fs", 360)
    ///     .with("siglen", 1500)
    ///     .with("segname", vec!["multi_1", "~", "multi_2"])
    ///     .with("seglen", vec![1000, 200, 300]);
    ///
    /// let text = HeaderWriter::new(".")
    ///     .render_multi_segment(&master, &[segment("multi_1", 1000), segment("multi_2", 300)])?;
    /// assert_eq!(text, "multi/3 1 360 1500\nmulti_1 1000\n~ 200\nmulti_2 300\n");
    /// # Ok::<(), wfdb_header::WfdbError>(())
    /// ```
    pub fn render_multi_segment(&self, master: &RecordFields, segments: &[RecordFields]) -> Result<String> {
        let mut rendered = self.render_segmented(master, segments)?;
        let (_, text) = rendered.pop().ok_or_else(|| WfdbError::missing("recordname"))?;
        Ok(text)
    }

    /// Writes every segment header and then the master header
    ///
    /// Nothing is written unless the whole set renders. If a file fails to
    /// persist, the headers already written by this call are removed again.
    /// Returns the path of the master header.
    pub fn write_multi_segment(&self, master: &RecordFields, segments: &[RecordFields]) -> Result<PathBuf> {
        let rendered = self.render_segmented(master, segments)?;

        let mut written: Vec<PathBuf> = Vec::with_capacity(rendered.len());
        for (record, text) in &rendered {
            match persist(&self.dir, record, text) {
                Ok(path) => written.push(path),
                Err(e) => {
                    for path in &written {
                        if let Err(remove_error) = std::fs::remove_file(path) {
                            warn!(path = %path.display(), error = %remove_error, "failed to remove segment header");
                        }
                    }
                    return Err(e);
                }
            }
        }
        written.pop().ok_or_else(|| WfdbError::missing("recordname"))
    }

    /// Renders segments first and the master last
    fn render_segmented(&self, master: &RecordFields, segments: &[RecordFields]) -> Result<Vec<(String, String)>> {
        let master = self.prepare(master)?;
        if !master.is_multi_segment() {
            return Err(WfdbError::SegmentInconsistency {
                segment: record_label(&master),
                reason: "header declares a single segment".to_string(),
            });
        }

        let mut rendered = Vec::with_capacity(segments.len() + 1);
        let mut prepared = Vec::with_capacity(segments.len());
        for segment in segments {
            let segment = self.prepare(segment)?;
            if segment.is_multi_segment() {
                return Err(WfdbError::SegmentInconsistency {
                    segment: record_label(&segment),
                    reason: "segments can't be multi-segment records themselves".to_string(),
                });
            }
            rendered.push((record_label(&segment), serialize(&segment)));
            prepared.push(segment);
        }

        check_segments(&master, &prepared)?;
        rendered.push((record_label(&master), serialize(&master)));
        Ok(rendered)
    }

    /// Validates and normalizes a mapping into the exact shape that is serialized
    fn prepare(&self, fields: &RecordFields) -> Result<RecordFields> {
        for key in fields.keys() {
            if !schema::registry().contains(key) {
                return Err(WfdbError::UnknownKey(key.to_string()));
            }
        }

        let nsig = count(fields, "nsig")?.ok_or_else(|| WfdbError::missing("nsig"))?;
        if fields.scalar("recordname").map_or(true, Value::is_empty) {
            return Err(WfdbError::missing("recordname"));
        }
        let nseg = match count(fields, "nseg")? {
            Some(0) => return Err(WfdbError::type_error("nseg", "0")),
            Some(n) => n,
            None => 1,
        };
        let multi = nseg > 1;

        // 多段记录中 filename 指的是段名
        let mut normalized = fields.clone();
        if multi && !normalized.contains("segname") {
            normalized.rename("filename", "segname");
        }
        let fields = &normalized;

        debug!(
            record = %record_label(fields),
            nsig,
            nseg,
            auto_fill = self.auto_fill,
            "preparing header"
        );

        let line_kinds: &[LineKind] = if multi {
            &[LineKind::Record, LineKind::Segment, LineKind::Comment]
        } else if nsig > 0 {
            &[LineKind::Record, LineKind::Signal, LineKind::Comment]
        } else {
            &[LineKind::Record, LineKind::Comment]
        };

        for (key, value) in fields.iter() {
            let (kind, descriptor) = schema::lookup(key)?;
            match kind {
                LineKind::Signal if multi => {
                    return Err(WfdbError::SegmentInconsistency {
                        segment: record_label(fields),
                        reason: format!("signal field '{}' in a multi-segment header", key),
                    });
                }
                LineKind::Segment if !multi => {
                    return Err(WfdbError::SegmentInconsistency {
                        segment: record_label(fields),
                        reason: format!("segment field '{}' in a single-segment header", key),
                    });
                }
                // 没有信号行时只检查长度
                LineKind::Signal if nsig == 0 => {
                    broadcast(descriptor, value, 0)?;
                }
                _ => {}
            }
        }

        for kind in line_kinds {
            for descriptor in schema::schema(*kind).fields() {
                if descriptor.is_required_when(nsig) && !fields.contains(descriptor.name) {
                    return Err(WfdbError::missing(descriptor.name));
                }
            }
        }

        let mut completed = fields.clone();
        for kind in line_kinds {
            completed = validate_and_complete(completed, *kind, self.auto_fill)?;
        }

        let mut prepared = RecordFields::new();
        for kind in line_kinds {
            let schema = schema::schema(*kind);
            for (index, descriptor) in schema.fields().iter().enumerate() {
                let Some(value) = completed.get(descriptor.name) else {
                    continue;
                };
                let leaf = schema.is_leaf(index);

                match kind {
                    LineKind::Record => {
                        let FieldValue::Scalar(value) = value else {
                            return Err(WfdbError::SizeMismatch {
                                field: descriptor.name.to_string(),
                                expected: 1,
                                actual: value.len(),
                            });
                        };
                        if let Some(value) = finish(descriptor, value, nsig, leaf)? {
                            prepared.insert(descriptor.name, value);
                        }
                    }
                    LineKind::Signal | LineKind::Segment => {
                        let expected = if *kind == LineKind::Signal { nsig } else { nseg };
                        let values = broadcast(descriptor, value, expected)?;
                        let column = values
                            .iter()
                            .map(|v| finish(descriptor, v, nsig, leaf).map(|v| v.unwrap_or(Value::Empty)))
                            .collect::<Result<Vec<Value>>>()?;
                        // 全部为空的叶子字段整列省略
                        if column.iter().all(Value::is_empty) {
                            continue;
                        }
                        prepared.insert(descriptor.name, FieldValue::PerSignal(column));
                    }
                    LineKind::Comment => {
                        let comments = match value {
                            FieldValue::PerComment(c) => c.clone(),
                            FieldValue::Scalar(v) => vec![v.to_string()],
                            FieldValue::PerSignal(v) | FieldValue::PerSegment(v) => {
                                v.iter().map(Value::to_string).collect()
                            }
                        };
                        prepared.insert(descriptor.name, FieldValue::PerComment(comments));
                    }
                }
            }
        }

        Ok(prepared)
    }
}

/// Writes `fields` as `<recordname>.hea` in `dir`
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{write_header, RecordFields};
///
/// # let dir = tempfile::tempdir()?;
/// let fields = RecordFields::new().with("recordname", "rec1").with("nsig", 0);
/// let path = write_header(&fields, dir.path(), true)?;
/// assert_eq!(std::fs::read_to_string(path)?, "rec1 0\n");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn write_header<P: AsRef<Path>>(fields: &RecordFields, dir: P, auto_fill: bool) -> Result<PathBuf> {
    HeaderWriter::new(dir).auto_fill_dependencies(auto_fill).write(fields)
}

/// Serializes `fields` without touching the filesystem
pub fn render_header(fields: &RecordFields, auto_fill: bool) -> Result<String> {
    HeaderWriter::new(".").auto_fill_dependencies(auto_fill).render(fields)
}

fn record_label(fields: &RecordFields) -> String {
    fields.record_name().unwrap_or_default().to_string()
}

/// Non-negative integer stored under a record field, `None` when absent or empty
fn count(fields: &RecordFields, name: &str) -> Result<Option<usize>> {
    let value = match fields.get(name) {
        None => return Ok(None),
        Some(FieldValue::Scalar(value)) => value,
        Some(other) => {
            return Err(WfdbError::SizeMismatch {
                field: name.to_string(),
                expected: 1,
                actual: other.len(),
            })
        }
    };
    if value.is_empty() {
        return Ok(None);
    }
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n <= MAX_LINE_COUNT)
        .map(Some)
        .ok_or_else(|| WfdbError::type_error(name, &value.to_string()))
}

/// Expands a field into exactly `expected` values
fn broadcast(descriptor: &FieldDescriptor, value: &FieldValue, expected: usize) -> Result<Vec<Value>> {
    match value {
        FieldValue::Scalar(v) => Ok(vec![v.clone(); expected]),
        FieldValue::PerSignal(values) | FieldValue::PerSegment(values) if values.len() == expected => {
            Ok(values.clone())
        }
        other => Err(WfdbError::SizeMismatch {
            field: descriptor.name.to_string(),
            expected,
            actual: other.len(),
        }),
    }
}

/// Resolves one value for writing: defaults for placeholders, type checks for the rest
///
/// `Ok(None)` means the value is an empty leaf and is left off the line.
fn finish(descriptor: &FieldDescriptor, value: &Value, nsig: usize, leaf: bool) -> Result<Option<Value>> {
    if !value.is_empty() {
        return conform(descriptor, value).map(Some);
    }
    if descriptor.is_required_when(nsig) {
        return Err(WfdbError::missing(descriptor.name));
    }
    if let Some(default) = descriptor.write_default {
        trace!(field = descriptor.name, "using write default");
        return Ok(Some(default.to_value()));
    }
    if leaf {
        return Ok(None);
    }
    Err(WfdbError::missing(descriptor.name))
}

/// Converts a value into a kind the field accepts, rejecting text the grammar couldn't read back
fn conform(descriptor: &FieldDescriptor, value: &Value) -> Result<Value> {
    let invalid = || WfdbError::type_error(descriptor.name, &value.to_string());

    let conformed = match value {
        Value::Int(v) if descriptor.accepts(ValueKind::Int) => Value::Int(*v),
        Value::Int(v) if descriptor.accepts(ValueKind::Float) => Value::Float(*v as f64),
        Value::Float(v) if !v.is_finite() => return Err(invalid()),
        Value::Float(v) if descriptor.accepts(ValueKind::Float) => Value::Float(*v),
        Value::Float(_) if descriptor.accepts(ValueKind::Int) => value.as_i64().map(Value::Int).ok_or_else(invalid)?,
        Value::Str(s) if descriptor.accepts(ValueKind::Str) && grammar::is_field_text(descriptor.name, s) => {
            // 与读取时相同的转换，写出后读回的值不变
            grammar::coerce(descriptor, s).map_err(|_| invalid())?
        }
        _ => return Err(invalid()),
    };

    if UNSIGNED_FIELDS.contains(&descriptor.name) && conformed.as_f64().map_or(false, |v| v < 0.0) {
        return Err(invalid());
    }
    Ok(conformed)
}

/// Checks every segment header against the master's layout
fn check_segments(master: &RecordFields, segments: &[RecordFields]) -> Result<()> {
    let names = master.get("segname").and_then(FieldValue::values).unwrap_or(&[]);
    let lengths = master.get("seglen").and_then(FieldValue::values).unwrap_or(&[]);

    let master_fs = master.scalar("fs").and_then(Value::as_f64).unwrap_or(DEFAULT_FS);
    let master_nsig = master.nsig().unwrap_or(0);

    for segment in segments {
        let name = record_label(segment);
        if !names.iter().any(|n| n.as_str() == Some(name.as_str())) {
            return Err(WfdbError::SegmentInconsistency {
                segment: name,
                reason: "not listed in the master header".to_string(),
            });
        }
    }

    for (name, length) in names.iter().zip(lengths) {
        let name = name.as_str().unwrap_or_default();
        if name == NULL_SEGMENT {
            continue;
        }
        let inconsistent = |reason: String| WfdbError::SegmentInconsistency {
            segment: name.to_string(),
            reason,
        };

        let segment = segments
            .iter()
            .find(|s| s.record_name() == Some(name))
            .ok_or_else(|| inconsistent("segment header not supplied".to_string()))?;

        let fs = segment.scalar("fs").and_then(Value::as_f64).unwrap_or(DEFAULT_FS);
        if fs != master_fs {
            return Err(inconsistent(format!(
                "sampling frequency {} differs from master {}",
                fs, master_fs
            )));
        }

        let nsig = segment.nsig().unwrap_or(0);
        if nsig != master_nsig {
            return Err(inconsistent(format!(
                "{} signals, master declares {}",
                nsig, master_nsig
            )));
        }

        if let (Some(siglen), Some(seglen)) = (
            segment.scalar("siglen").and_then(Value::as_i64),
            length.as_i64(),
        ) {
            if siglen != seglen {
                return Err(inconsistent(format!(
                    "length {} differs from {} in master",
                    siglen, seglen
                )));
            }
        }
    }

    Ok(())
}

/// Serializes a prepared mapping
fn serialize(fields: &RecordFields) -> String {
    let mut text = render_line(fields, LineKind::Record, 0);
    text.push('\n');

    let (kind, lines) = if fields.is_multi_segment() {
        (LineKind::Segment, fields.nseg())
    } else {
        (LineKind::Signal, fields.nsig().unwrap_or(0))
    };
    for index in 0..lines {
        text.push_str(&render_line(fields, kind, index));
        text.push('\n');
    }

    for comment in fields.comments() {
        let comment = comment.replace(['\r', '\n'], " ");
        if comment.is_empty() {
            text.push_str("#\n");
        } else {
            let _ = writeln!(text, "# {}", comment);
        }
    }
    text
}

fn render_line(fields: &RecordFields, kind: LineKind, index: usize) -> String {
    let mut line = String::new();
    for descriptor in schema::schema(kind).fields() {
        let Some(value) = fields.get(descriptor.name).and_then(|v| v.get(index)) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        // 单段记录不写段数
        if descriptor.name == "nseg" && value.as_i64().map_or(true, |n| n <= 1) {
            continue;
        }
        line.push_str(descriptor.delimiter);
        let _ = write!(line, "{}", value);
        line.push_str(descriptor.terminator);
    }
    line
}

/// Writes `text` to `<dir>/<record>.hea` through a temporary file in `dir`
fn persist(dir: &Path, record: &str, text: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", record, HEADER_EXTENSION));

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(&path).map_err(|e| WfdbError::Io(e.error))?;

    debug!(path = %path.display(), bytes = text.len(), "header written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn two_signals() -> RecordFields {
        RecordFields::new()
            .with("recordname", "100")
            .with("nsig", 2)
            .with("fs", 360)
            .with("siglen", 650000)
            .with("filename", "100.dat")
            .with("fmt", 212)
    }

    #[test]
    fn test_record_only_header() {
        let fields = RecordFields::new().with("recordname", "rec1").with("nsig", 0);
        assert_eq!(render_header(&fields, true).unwrap(), "rec1 0\n");
    }

    #[test]
    fn test_minimal_signal_lines() {
        init_tracing();
        let text = render_header(&two_signals(), true).unwrap();
        assert_eq!(text, "100 2 360 650000\n100.dat 212\n100.dat 212\n");
    }

    #[test]
    fn test_auto_fill_uses_write_defaults() {
        let fields = two_signals().with("units", vec!["mV", "uV"]);
        let text = render_header(&fields, true).unwrap();
        assert_eq!(text, "100 2 360 650000\n100.dat 212 200/mV\n100.dat 212 200/uV\n");
    }

    #[test]
    fn test_dependency_error_without_auto_fill() {
        let fields = two_signals().with("units", "mV");
        match render_header(&fields, false) {
            Err(WfdbError::Dependency {
                field,
                missing_dependency,
            }) => {
                assert_eq!(field, "units");
                assert_eq!(missing_dependency, "adcgain");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_placeholder_without_default_fails() {
        // counterfreq没有默认值，且basecounter依赖它
        let fields = two_signals().with("basecounter", 5);
        match render_header(&fields, true) {
            Err(WfdbError::MissingRequired { field }) => assert_eq!(field, "counterfreq"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_leaf_is_omitted() {
        let fields = two_signals()
            .with("basetime", "10:00:00")
            .with("basedate", Value::Empty)
            .with("signame", vec![Value::from("MLII"), Value::Empty])
            .with("adcgain", 200);
        let text = render_header(&fields, true).unwrap();
        assert_eq!(
            text,
            "100 2 360 650000 10:00:00\n100.dat 212 200 0 0 0 0 0 MLII\n100.dat 212 200 0 0 0 0 0\n"
        );
    }

    #[test]
    fn test_required_fields() {
        let missing = |fields: RecordFields| match render_header(&fields, true) {
            Err(WfdbError::MissingRequired { field }) => field,
            other => panic!("unexpected: {:?}", other),
        };

        assert_eq!(missing(RecordFields::new().with("nsig", 0)), "recordname");
        assert_eq!(missing(RecordFields::new().with("recordname", "r")), "nsig");
        assert_eq!(missing(two_signals().with("fs", Value::Empty)), "fs");

        let mut no_siglen = two_signals();
        no_siglen.remove("siglen");
        assert_eq!(missing(no_siglen), "siglen");

        let mut no_fmt = two_signals();
        no_fmt.remove("fmt");
        assert_eq!(missing(no_fmt), "fmt");
    }

    #[test]
    fn test_size_mismatch() {
        let fields = two_signals().with("adcgain", vec![100.0, 200.0, 300.0]);
        match render_header(&fields, true) {
            Err(WfdbError::SizeMismatch {
                field,
                expected,
                actual,
            }) => {
                assert_eq!(field, "adcgain");
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_signal_fields_without_signals() {
        let zero = || RecordFields::new().with("recordname", "r").with("nsig", 0);

        // 空列和标量都符合零个信号
        assert_eq!(render_header(&zero().with("filename", Vec::<&str>::new()), true).unwrap(), "r 0\n");
        assert_eq!(render_header(&zero().with("units", "mV"), false).unwrap(), "r 0\n");

        match render_header(&zero().with("adcgain", vec![100.0, 200.0]), true) {
            Err(WfdbError::SizeMismatch {
                field,
                expected,
                actual,
            }) => {
                assert_eq!(field, "adcgain");
                assert_eq!(expected, 0);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_counts_are_rejected() {
        let huge = two_signals().with("nsig", 1_000_000_000_000i64);
        match render_header(&huge, true) {
            Err(WfdbError::Type { field, .. }) => assert_eq!(field, "nsig"),
            other => panic!("unexpected: {:?}", other),
        }

        let segments = RecordFields::new()
            .with("recordname", "m")
            .with("nseg", 1_000_000_000_000i64)
            .with("nsig", 1)
            .with("segname", "m_1")
            .with("seglen", 10);
        assert!(matches!(
            HeaderWriter::new(".").render_multi_segment(&segments, &[]),
            Err(WfdbError::Type { .. })
        ));
    }

    #[test]
    fn test_unknown_key() {
        let fields = two_signals().with("colour", "red");
        match render_header(&fields, true) {
            Err(WfdbError::UnknownKey(key)) => assert_eq!(key, "colour"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(
            render_header(&two_signals().with("fmt", -1), true),
            Err(WfdbError::Type { .. })
        ));
        assert!(matches!(
            render_header(&two_signals().with("units", "milli volts").with("adcgain", 200), true),
            Err(WfdbError::Type { .. })
        ));
        assert!(matches!(
            render_header(&two_signals().with("basetime", "noon"), true),
            Err(WfdbError::Type { .. })
        ));
        assert!(matches!(
            render_header(&two_signals().with("fs", f64::NAN), true),
            Err(WfdbError::Type { .. })
        ));
    }

    #[test]
    fn test_text_must_read_back_unchanged() {
        let rejected = |name: &str, text: &str| {
            let fields = two_signals().with(name, text);
            match render_header(&fields, true) {
                Err(WfdbError::Type { field, .. }) => assert_eq!(field, name, "{} = {:?}", name, text),
                other => panic!("{} = {:?}: unexpected {:?}", name, text, other),
            }
        };

        rejected("fmt", "16x2");
        rejected("fmt", "abc");
        rejected("basetime", "010:00:00");
        rejected("basetime", "1:2:3.");
        rejected("basetime", "+1:02:03");
        rejected("basedate", "01/01/12345");
        rejected("recordname", "r²");
        rejected("units", "m#V");

        // 数字形式的格式按整数写出，与读回的值一致
        let fields = two_signals().with("fmt", "16").with("basetime", "1:02:03.5");
        let text = render_header(&fields, true).unwrap();
        let read = crate::reader::parse_header(&text).unwrap();
        assert_eq!(read.get("fmt"), Some(&FieldValue::PerSignal(vec![Value::Int(16); 2])));
        assert_eq!(read.scalar("basetime"), Some(&Value::from("1:02:03.5")));
    }

    #[test]
    fn test_record_line_delimiters() {
        let fields = two_signals()
            .with("counterfreq", 720)
            .with("basecounter", -3)
            .with("basetime", "08:30:00")
            .with("basedate", "01/02/2003");
        let text = render_header(&fields, true).unwrap();
        assert!(text.starts_with("100 2 360/720(-3) 650000 08:30:00 01/02/2003\n"));
    }

    #[test]
    fn test_signal_line_delimiters() {
        let fields = two_signals()
            .with("sampsperframe", 2)
            .with("skew", 1)
            .with("byteoffset", 24)
            .with("adcgain", 200.5)
            .with("baseline", vec![-12, 0])
            .with("units", "mV")
            .with("adcres", 12)
            .with("signame", vec!["MLII lead", "V5"]);
        let text = render_header(&fields, true).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "100.dat 212x2:1+24 200.5(-12)/mV 12 0 0 0 0 MLII lead");
        assert_eq!(lines[2], "100.dat 212x2:1+24 200.5(0)/mV 12 0 0 0 0 V5");
    }

    #[test]
    fn test_comments_written_last() {
        let fields = RecordFields::new()
            .with("recordname", "r")
            .with("nsig", 0)
            .with("comments", vec!["age: 69", ""]);
        assert_eq!(render_header(&fields, true).unwrap(), "r 0\n# age: 69\n#\n");
    }

    #[test]
    fn test_multi_segment_requires_segments() {
        let master = RecordFields::new()
            .with("recordname", "m")
            .with("nseg", 2)
            .with("nsig", 1)
            .with("fs", 250)
            .with("siglen", 20)
            .with("segname", vec!["m_1", "m_2"])
            .with("seglen", vec![10, 10]);
        assert!(matches!(
            render_header(&master, true),
            Err(WfdbError::SegmentInconsistency { .. })
        ));

        let writer = HeaderWriter::new(".");
        match writer.render_multi_segment(&master, &[]) {
            Err(WfdbError::SegmentInconsistency { segment, .. }) => assert_eq!(segment, "m_1"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_segment_consistency() {
        let master = RecordFields::new()
            .with("recordname", "m")
            .with("nseg", 2)
            .with("nsig", 1)
            .with("fs", 250)
            .with("siglen", 20)
            .with("segname", vec!["m_1", "m_2"])
            .with("seglen", vec![10, 10]);
        let segment = |name: &str, fs: i64, len: i64| {
            RecordFields::new()
                .with("recordname", name)
                .with("nsig", 1)
                .with("fs", fs)
                .with("siglen", len)
                .with("filename", format!("{}.dat", name))
                .with("fmt", 16)
        };
        let writer = HeaderWriter::new(".");

        let ok = writer.render_multi_segment(&master, &[segment("m_1", 250, 10), segment("m_2", 250, 10)]);
        assert_eq!(ok.unwrap(), "m/2 1 250 20\nm_1 10\nm_2 10\n");

        match writer.render_multi_segment(&master, &[segment("m_1", 250, 10), segment("m_2", 500, 10)]) {
            Err(WfdbError::SegmentInconsistency { segment, reason }) => {
                assert_eq!(segment, "m_2");
                assert!(reason.contains("sampling frequency"));
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            writer.render_multi_segment(&master, &[segment("m_1", 250, 10), segment("m_2", 250, 11)]),
            Err(WfdbError::SegmentInconsistency { .. })
        ));
        assert!(matches!(
            writer.render_multi_segment(&master, &[segment("m_1", 250, 10), segment("m_2", 250, 10), segment("x", 250, 10)]),
            Err(WfdbError::SegmentInconsistency { .. })
        ));

        let with_signal_field = master.clone().with("units", "mV");
        assert!(matches!(
            writer.render_multi_segment(&with_signal_field, &[]),
            Err(WfdbError::SegmentInconsistency { .. })
        ));
    }

    #[test]
    fn test_multi_segment_master_with_filename_keys() {
        let master = RecordFields::new()
            .with("recordname", "m")
            .with("filename", vec!["m_1", "m_2"])
            .with("nsampseg", vec![10, 10])
            .with("nseg", 2)
            .with("nsig", 1)
            .with("fs", 250)
            .with("siglen", 20);
        let segment = |name: &str| {
            RecordFields::new()
                .with("recordname", name)
                .with("nsig", 1)
                .with("fs", 250)
                .with("siglen", 10)
                .with("filename", format!("{}.dat", name))
                .with("fmt", 16)
        };

        let text = HeaderWriter::new(".")
            .render_multi_segment(&master, &[segment("m_1"), segment("m_2")])
            .unwrap();
        assert_eq!(text, "m/2 1 250 20\nm_1 10\nm_2 10\n");

        // nseg 在前时 filename 直接存为段名
        let declared = RecordFields::new().with("nseg", 2).with("filename", vec!["m_1", "m_2"]);
        assert!(declared.keys().any(|k| k == "segname"));
        assert!(!declared.keys().any(|k| k == "filename"));
    }

    #[test]
    fn test_failed_master_write_removes_segments() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        // 主头文件路径被目录占用，重命名会失败
        std::fs::create_dir(dir.path().join("m.hea")).unwrap();

        let master = RecordFields::new()
            .with("recordname", "m")
            .with("nseg", 2)
            .with("nsig", 1)
            .with("fs", 250)
            .with("siglen", 20)
            .with("segname", vec!["m_1", "m_2"])
            .with("seglen", vec![10, 10]);
        let segment = |name: &str| {
            RecordFields::new()
                .with("recordname", name)
                .with("nsig", 1)
                .with("fs", 250)
                .with("siglen", 10)
                .with("filename", format!("{}.dat", name))
                .with("fmt", 16)
        };

        let result = HeaderWriter::new(dir.path()).write_multi_segment(&master, &[segment("m_1"), segment("m_2")]);
        assert!(matches!(result, Err(WfdbError::Io(_))));
        assert!(!dir.path().join("m_1.hea").exists());
        assert!(!dir.path().join("m_2.hea").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_is_atomic_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bad = two_signals().with("fmt", "two twelve");
        assert!(write_header(&bad, dir.path(), true).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let path = write_header(&two_signals(), dir.path(), true).unwrap();
        assert_eq!(path, dir.path().join("100.hea"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
