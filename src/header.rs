//! Typed views over a header's field mapping.
//!
//! [`RecordFields`] is the loose, string-keyed form the reader produces and
//! the writer consumes. [`Header`] is the same information with every field
//! converted to a concrete Rust type, split by record layout.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{Result, WfdbError};
use crate::schema::{self, LineKind};
use crate::types::{FieldValue, RecordFields, Value};
use crate::utils::{format_base_date, format_base_time, parse_base_date, parse_base_time};
use crate::{DEFAULT_ADC_GAIN, DEFAULT_FS, DEFAULT_UNITS, NULL_SEGMENT};

/// Fields of the record line
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
    pub name: String,
    pub nseg: usize,
    pub nsig: usize,
    /// Sampling frequency in samples per second per signal
    pub fs: f64,
    pub counter_freq: Option<f64>,
    pub base_counter: Option<f64>,
    /// Samples per signal
    pub sig_len: Option<u64>,
    pub base_time: Option<NaiveTime>,
    pub base_date: Option<NaiveDate>,
}

impl RecordSpec {
    pub fn new<S: Into<String>>(name: S, nsig: usize) -> Self {
        RecordSpec {
            name: name.into(),
            nseg: 1,
            nsig,
            fs: DEFAULT_FS,
            counter_freq: None,
            base_counter: None,
            sig_len: None,
            base_time: None,
            base_date: None,
        }
    }

    /// Record duration in seconds, when the length is known
    pub fn duration_secs(&self) -> Option<f64> {
        self.sig_len.map(|n| n as f64 / self.fs)
    }
}

/// Fields of one signal line
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub file_name: String,
    /// Storage format code, passed through to the sample I/O layer untouched
    pub fmt: String,
    pub samps_per_frame: u32,
    pub skew: u32,
    pub byte_offset: u64,
    /// ADC units per physical unit
    pub adc_gain: f64,
    pub baseline: i64,
    pub units: String,
    pub adc_res: Option<u32>,
    pub adc_zero: Option<i64>,
    pub init_value: i64,
    pub checksum: Option<i64>,
    pub block_size: Option<u32>,
    pub sig_name: Option<String>,
}

impl SignalSpec {
    pub fn new<F: Into<String>, T: Into<String>>(file_name: F, fmt: T) -> Self {
        SignalSpec {
            file_name: file_name.into(),
            fmt: fmt.into(),
            samps_per_frame: 1,
            skew: 0,
            byte_offset: 0,
            adc_gain: DEFAULT_ADC_GAIN,
            baseline: 0,
            units: DEFAULT_UNITS.to_string(),
            adc_res: None,
            adc_zero: None,
            init_value: 0,
            checksum: None,
            block_size: None,
            sig_name: None,
        }
    }
}

/// One line of a multi-segment master header
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub name: String,
    pub len: u64,
}

impl SegmentSpec {
    /// Null segments stand for gaps and have no header of their own
    pub fn is_null(&self) -> bool {
        self.name == NULL_SEGMENT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleSegmentHeader {
    pub record: RecordSpec,
    pub signals: Vec<SignalSpec>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiSegmentHeader {
    pub record: RecordSpec,
    pub segments: Vec<SegmentSpec>,
    pub comments: Vec<String>,
}

/// A header with typed fields
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{parse_header, Header};
///
/// let fields = parse_header("100 1 360 650000 10:30:00\n100.dat 212 200 11 1024 995 -22131 0 MLII\n")?;
///
/// match Header::from_fields(&fields)? {
///     Header::SingleSegment(header) => {
///         assert_eq!(header.record.duration_secs(), Some(650000.0 / 360.0));
///         assert_eq!(header.signals[0].sig_name.as_deref(), Some("MLII"));
///         assert_eq!(header.signals[0].baseline, 1024);
///     }
///     Header::MultiSegment(_) => unreachable!(),
/// }
/// # Ok::<(), wfdb_header::WfdbError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    SingleSegment(SingleSegmentHeader),
    MultiSegment(MultiSegmentHeader),
}

impl Header {
    /// Builds the typed view, applying the same defaults the reader applies
    pub fn from_fields(fields: &RecordFields) -> Result<Self> {
        let record = record_from_fields(fields)?;
        let comments = fields.comments().to_vec();

        if record.nseg > 1 {
            check_lengths(fields, LineKind::Segment, record.nseg)?;
            let segments = (0..record.nseg)
                .map(|i| segment_from_fields(fields, i))
                .collect::<Result<Vec<_>>>()?;
            Ok(Header::MultiSegment(MultiSegmentHeader {
                record,
                segments,
                comments,
            }))
        } else {
            check_lengths(fields, LineKind::Signal, record.nsig)?;
            let signals = (0..record.nsig)
                .map(|i| signal_from_fields(fields, i))
                .collect::<Result<Vec<_>>>()?;
            Ok(Header::SingleSegment(SingleSegmentHeader {
                record,
                signals,
                comments,
            }))
        }
    }

    /// Converts back into a field mapping the writer accepts
    pub fn to_fields(&self) -> RecordFields {
        let mut fields = record_to_fields(self.record());

        match self {
            Header::SingleSegment(header) => {
                let signals = &header.signals;
                let column = |f: &dyn Fn(&SignalSpec) -> Value| signals.iter().map(f).collect::<Vec<Value>>();
                let sparse = |f: &dyn Fn(&SignalSpec) -> Option<Value>| {
                    let values: Vec<Value> = signals.iter().map(|s| f(s).unwrap_or(Value::Empty)).collect();
                    values.iter().any(|v| !v.is_empty()).then_some(values)
                };

                if !signals.is_empty() {
                    fields.insert("filename", column(&|s| Value::from(s.file_name.as_str())));
                    fields.insert("fmt", column(&|s| fmt_value(&s.fmt)));
                    fields.insert("sampsperframe", column(&|s| Value::from(s.samps_per_frame)));
                    fields.insert("skew", column(&|s| Value::from(s.skew)));
                    fields.insert("byteoffset", column(&|s| Value::from(s.byte_offset)));
                    fields.insert("adcgain", column(&|s| Value::from(s.adc_gain)));
                    fields.insert("baseline", column(&|s| Value::from(s.baseline)));
                    fields.insert("units", column(&|s| Value::from(s.units.as_str())));
                    if let Some(values) = sparse(&|s| s.adc_res.map(Value::from)) {
                        fields.insert("adcres", values);
                    }
                    if let Some(values) = sparse(&|s| s.adc_zero.map(Value::from)) {
                        fields.insert("adczero", values);
                    }
                    fields.insert("initvalue", column(&|s| Value::from(s.init_value)));
                    if let Some(values) = sparse(&|s| s.checksum.map(Value::from)) {
                        fields.insert("checksum", values);
                    }
                    if let Some(values) = sparse(&|s| s.block_size.map(Value::from)) {
                        fields.insert("blocksize", values);
                    }
                    if let Some(values) = sparse(&|s| s.sig_name.as_deref().map(Value::from)) {
                        fields.insert("signame", values);
                    }
                }
            }
            Header::MultiSegment(header) => {
                let names: Vec<Value> = header.segments.iter().map(|s| Value::from(s.name.as_str())).collect();
                let lens: Vec<Value> = header.segments.iter().map(|s| Value::from(s.len)).collect();
                fields.insert("segname", names);
                fields.insert("seglen", lens);
            }
        }

        fields.insert("comments", FieldValue::PerComment(self.comments().to_vec()));
        fields
    }

    pub fn record(&self) -> &RecordSpec {
        match self {
            Header::SingleSegment(h) => &h.record,
            Header::MultiSegment(h) => &h.record,
        }
    }

    pub fn comments(&self) -> &[String] {
        match self {
            Header::SingleSegment(h) => &h.comments,
            Header::MultiSegment(h) => &h.comments,
        }
    }

    pub fn is_multi_segment(&self) -> bool {
        matches!(self, Header::MultiSegment(_))
    }
}

/// 非空的字段值
fn present<'a>(fields: &'a RecordFields, name: &str, index: usize) -> Option<&'a Value> {
    fields
        .get(name)
        .and_then(|v| v.get(index))
        .filter(|v| !v.is_empty())
}

fn convert<T>(name: &str, value: &Value, f: impl FnOnce(&Value) -> Option<T>) -> Result<T> {
    f(value).ok_or_else(|| WfdbError::type_error(name, &value.to_string()))
}

fn required<T>(fields: &RecordFields, name: &str, index: usize, f: impl FnOnce(&Value) -> Option<T>) -> Result<T> {
    let value = present(fields, name, index).ok_or_else(|| WfdbError::missing(name))?;
    convert(name, value, f)
}

fn optional<T>(
    fields: &RecordFields,
    name: &str,
    index: usize,
    f: impl FnOnce(&Value) -> Option<T>,
) -> Result<Option<T>> {
    present(fields, name, index).map(|v| convert(name, v, f)).transpose()
}

fn unsigned<T: TryFrom<i64>>(value: &Value) -> Option<T> {
    value.as_i64().and_then(|n| T::try_from(n).ok())
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn fmt_value(fmt: &str) -> Value {
    fmt.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::from(fmt))
}

fn check_lengths(fields: &RecordFields, kind: LineKind, expected: usize) -> Result<()> {
    for name in schema::schema(kind).field_names() {
        if let Some(values) = fields.get(name).and_then(FieldValue::values) {
            if values.len() != expected {
                return Err(WfdbError::SizeMismatch {
                    field: name.to_string(),
                    expected,
                    actual: values.len(),
                });
            }
        }
    }
    Ok(())
}

fn record_from_fields(fields: &RecordFields) -> Result<RecordSpec> {
    let base_time = match present(fields, "basetime", 0) {
        Some(Value::Str(s)) => Some(parse_base_time(s)?),
        Some(other) => return Err(WfdbError::type_error("basetime", &other.to_string())),
        None => None,
    };
    let base_date = match present(fields, "basedate", 0) {
        Some(Value::Str(s)) => Some(parse_base_date(s)?),
        Some(other) => return Err(WfdbError::type_error("basedate", &other.to_string())),
        None => None,
    };

    Ok(RecordSpec {
        name: required(fields, "recordname", 0, text)?,
        nseg: optional(fields, "nseg", 0, unsigned)?.unwrap_or(1),
        nsig: required(fields, "nsig", 0, unsigned)?,
        fs: optional(fields, "fs", 0, Value::as_f64)?.unwrap_or(DEFAULT_FS),
        counter_freq: optional(fields, "counterfreq", 0, Value::as_f64)?,
        base_counter: optional(fields, "basecounter", 0, Value::as_f64)?,
        sig_len: optional(fields, "siglen", 0, unsigned)?,
        base_time,
        base_date,
    })
}

fn signal_from_fields(fields: &RecordFields, i: usize) -> Result<SignalSpec> {
    let adc_zero = optional(fields, "adczero", i, Value::as_i64)?;

    Ok(SignalSpec {
        file_name: required(fields, "filename", i, text)?,
        fmt: required(fields, "fmt", i, |v| match v {
            Value::Int(_) | Value::Str(_) => Some(v.to_string()),
            _ => None,
        })?,
        samps_per_frame: optional(fields, "sampsperframe", i, unsigned)?.unwrap_or(1),
        skew: optional(fields, "skew", i, unsigned)?.unwrap_or(0),
        byte_offset: optional(fields, "byteoffset", i, unsigned)?.unwrap_or(0),
        adc_gain: optional(fields, "adcgain", i, Value::as_f64)?.unwrap_or(DEFAULT_ADC_GAIN),
        baseline: optional(fields, "baseline", i, Value::as_i64)?
            .or(adc_zero)
            .unwrap_or(0),
        units: optional(fields, "units", i, text)?.unwrap_or_else(|| DEFAULT_UNITS.to_string()),
        adc_res: optional(fields, "adcres", i, unsigned)?,
        adc_zero,
        init_value: optional(fields, "initvalue", i, Value::as_i64)?.unwrap_or(0),
        checksum: optional(fields, "checksum", i, Value::as_i64)?,
        block_size: optional(fields, "blocksize", i, unsigned)?,
        sig_name: optional(fields, "signame", i, text)?,
    })
}

fn segment_from_fields(fields: &RecordFields, i: usize) -> Result<SegmentSpec> {
    Ok(SegmentSpec {
        name: required(fields, "segname", i, text)?,
        len: required(fields, "seglen", i, unsigned)?,
    })
}

fn record_to_fields(record: &RecordSpec) -> RecordFields {
    let mut fields = RecordFields::new()
        .with("recordname", record.name.as_str())
        .with("nseg", record.nseg)
        .with("nsig", record.nsig)
        .with("fs", record.fs);

    if let Some(freq) = record.counter_freq {
        fields.insert("counterfreq", freq);
    }
    if let Some(counter) = record.base_counter {
        fields.insert("basecounter", counter);
    }
    if let Some(len) = record.sig_len {
        fields.insert("siglen", len);
    }
    if let Some(time) = &record.base_time {
        fields.insert("basetime", format_base_time(time));
    }
    if let Some(date) = &record.base_date {
        fields.insert("basedate", format_base_date(date));
    }
    fields
}
