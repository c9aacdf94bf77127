//! Line grammar for header files.
//!
//! Each line kind has one anchored pattern whose named groups are exactly the
//! schema field names, so a match maps straight onto the field list. The
//! nesting of optional groups mirrors the dependency chains: a field can only
//! be captured when everything it depends on was captured too.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, WfdbError};
use crate::schema::{self, FieldDescriptor, LineKind};
use crate::types::{Value, ValueKind};
use crate::utils::{parse_base_date, parse_base_time};

const RECORD_NAME: &str = r"[-\w]+";
const BASE_TIME: &str = r"\d{1,2}(?::\d{1,2}){1,2}(?:\.\d+)?";
const BASE_DATE: &str = r"\d{1,2}/\d{1,2}/\d{1,4}";
const FORMAT: &str = r"\d+";
// 行内注释在分词前已被切掉，所以记号中不能出现 `#`
const TOKEN: &str = r"[^\s#]+";
const SIGNAL_NAME: &str = r"[^\s#](?:[^#\r\n]*[^\s#])?";

static RECORD_LINE: Lazy<Regex> = Lazy::new(|| {
    compile(&[
        r"^(?P<recordname>",
        RECORD_NAME,
        r")(?:/(?P<nseg>\d+))?",
        r"[ \t]+(?P<nsig>\d+)",
        r"(?:[ \t]+(?P<fs>(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)",
        r"(?:/(?P<counterfreq>(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)",
        r"(?:\((?P<basecounter>-?(?:\d+(?:\.\d*)?|\.\d+))\))?",
        r")?",
        r"(?:[ \t]+(?P<siglen>\d+)",
        r"(?:[ \t]+(?P<basetime>",
        BASE_TIME,
        r")",
        r"(?:[ \t]+(?P<basedate>",
        BASE_DATE,
        r"))?",
        r")?",
        r")?",
        r")?",
        r"[ \t]*$",
    ])
});

static SIGNAL_LINE: Lazy<Regex> = Lazy::new(|| {
    compile(&[
        r"^(?P<filename>\S+)[ \t]+(?P<fmt>",
        FORMAT,
        r")",
        r"(?:x(?P<sampsperframe>\d+))?",
        r"(?::(?P<skew>\d+))?",
        r"(?:\+(?P<byteoffset>\d+))?",
        r"(?:[ \t]+(?P<adcgain>-?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)",
        r"(?:\((?P<baseline>-?\d+)\))?",
        r"(?:/(?P<units>\S+))?",
        r"(?:[ \t]+(?P<adcres>\d+)",
        r"(?:[ \t]+(?P<adczero>-?\d+)",
        r"(?:[ \t]+(?P<initvalue>-?\d+)",
        r"(?:[ \t]+(?P<checksum>-?\d+)",
        r"(?:[ \t]+(?P<blocksize>\d+)",
        r"(?:[ \t]+(?P<signame>\S.*?))?",
        r")?",
        r")?",
        r")?",
        r")?",
        r")?",
        r")?",
        r"[ \t]*$",
    ])
});

static SEGMENT_LINE: Lazy<Regex> = Lazy::new(|| compile(&[r"^(?P<segname>\S+)[ \t]+(?P<seglen>\d+)[ \t]*$"]));

/// Anchored patterns for the text-valued fields, checked before a value is written
static FIELD_TEXT: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("recordname", RECORD_NAME),
        ("basetime", BASE_TIME),
        ("basedate", BASE_DATE),
        ("filename", TOKEN),
        ("fmt", FORMAT),
        ("units", TOKEN),
        ("signame", SIGNAL_NAME),
        ("segname", TOKEN),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, compile(&["^(?:", pattern, ")$"])))
    .collect()
});

fn compile(parts: &[&str]) -> Regex {
    Regex::new(&parts.concat()).expect("header line grammar")
}

/// Whether `text` matches the grammar of field `name` on its own
///
/// Fields without a dedicated pattern must be a single token.
pub fn is_field_text(name: &str, text: &str) -> bool {
    let pattern = FIELD_TEXT
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, regex)| regex);
    match pattern {
        Some(regex) => regex.is_match(text),
        None => !text.is_empty() && !text.contains(|c: char| c.is_whitespace() || c == '#'),
    }
}

/// The raw captures of one header line, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    kind: LineKind,
    line_number: usize,
    captures: Vec<(&'static str, String)>,
}

impl RawLine {
    pub fn kind(&self) -> LineKind {
        self.kind
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Captured text for `name`, empty when the field was not on the line
    pub fn get(&self, name: &str) -> &str {
        self.captures
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, raw)| raw.as_str())
            .unwrap_or("")
    }

    pub fn is_present(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.captures.iter().map(|(f, raw)| (*f, raw.as_str()))
    }
}

fn grammar(kind: LineKind) -> Option<&'static Regex> {
    match kind {
        LineKind::Record => Some(&RECORD_LINE),
        LineKind::Signal => Some(&SIGNAL_LINE),
        LineKind::Segment => Some(&SEGMENT_LINE),
        LineKind::Comment => None,
    }
}

/// Splits one line into raw field captures
///
/// `line_number` is only used for error reporting.
///
/// # Examples
///
/// ```rust
/// use wfdb_header::grammar::tokenize;
/// use wfdb_header::LineKind;
///
/// let line = tokenize("100.dat 212 200(5)/uV 11 1024 995", LineKind::Signal, 2)?;
/// assert_eq!(line.get("fmt"), "212");
/// assert_eq!(line.get("baseline"), "5");
/// assert_eq!(line.get("units"), "uV");
/// assert_eq!(line.get("signame"), "");
/// # Ok::<(), wfdb_header::WfdbError>(())
/// ```
pub fn tokenize(line: &str, kind: LineKind, line_number: usize) -> Result<RawLine> {
    let names = schema::schema(kind).field_names();

    let Some(regex) = grammar(kind) else {
        let text = strip_comment_marker(line).to_string();
        return Ok(RawLine {
            kind,
            line_number,
            captures: names.map(|name| (name, text.clone())).collect(),
        });
    };

    let line = line.trim();
    let caps = regex.captures(line).ok_or_else(|| WfdbError::Parse {
        line_number,
        reason: format!("not a valid {} line: {:?}", kind.name(), line),
    })?;

    let captures = names
        .map(|name| {
            let raw = caps.name(name).map(|m| m.as_str()).unwrap_or("");
            (name, raw.to_string())
        })
        .collect();

    Ok(RawLine {
        kind,
        line_number,
        captures,
    })
}

/// Converts captured text into a value of the first kind the field accepts
///
/// Empty text yields [`Value::Empty`].
pub fn coerce(descriptor: &FieldDescriptor, raw: &str) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::Empty);
    }

    let value = descriptor
        .allowed_types
        .iter()
        .find_map(|kind| match kind {
            ValueKind::Int => raw.parse::<i64>().ok().map(Value::Int),
            ValueKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Float),
            ValueKind::Str => Some(Value::Str(raw.to_string())),
        })
        .ok_or_else(|| WfdbError::type_error(descriptor.name, raw))?;

    match descriptor.name {
        "basetime" => {
            parse_base_time(raw)?;
        }
        "basedate" => {
            parse_base_date(raw)?;
        }
        _ => {}
    }

    Ok(value)
}

pub fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Splits a header line at its first `#` into the header part and a trailing comment
pub fn split_inline_comment(line: &str) -> (&str, Option<&str>) {
    match line.find('#') {
        Some(index) => (&line[..index], Some(&line[index..])),
        None => (line, None),
    }
}

/// Comment text with the `#` marker and surrounding whitespace removed
pub fn strip_comment_marker(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix('#').unwrap_or(line).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> &'static FieldDescriptor {
        schema::lookup(name).unwrap().1
    }

    #[test]
    fn test_record_line_minimal() {
        let line = tokenize("100 2", LineKind::Record, 1).unwrap();
        assert_eq!(line.get("recordname"), "100");
        assert_eq!(line.get("nsig"), "2");
        assert_eq!(line.get("nseg"), "");
        assert_eq!(line.get("fs"), "");
    }

    #[test]
    fn test_record_line_full() {
        let line = tokenize("rec/3 12 500/1000(-2) 650000 13:05:00.25 25/12/2019", LineKind::Record, 1).unwrap();
        assert_eq!(line.get("nseg"), "3");
        assert_eq!(line.get("nsig"), "12");
        assert_eq!(line.get("fs"), "500");
        assert_eq!(line.get("counterfreq"), "1000");
        assert_eq!(line.get("basecounter"), "-2");
        assert_eq!(line.get("siglen"), "650000");
        assert_eq!(line.get("basetime"), "13:05:00.25");
        assert_eq!(line.get("basedate"), "25/12/2019");
    }

    #[test]
    fn test_record_line_rejects_garbage() {
        assert!(matches!(
            tokenize("100 two", LineKind::Record, 1),
            Err(WfdbError::Parse { line_number: 1, .. })
        ));
        assert!(tokenize("100", LineKind::Record, 1).is_err());
    }

    #[test]
    fn test_signal_line_full() {
        let line = tokenize(
            "100.dat 212x2:1+512 200(-3)/mV 11 1024 995 -22131 0 MLII lead",
            LineKind::Signal,
            2,
        )
        .unwrap();
        assert_eq!(line.get("filename"), "100.dat");
        assert_eq!(line.get("fmt"), "212");
        assert_eq!(line.get("sampsperframe"), "2");
        assert_eq!(line.get("skew"), "1");
        assert_eq!(line.get("byteoffset"), "512");
        assert_eq!(line.get("adcgain"), "200");
        assert_eq!(line.get("baseline"), "-3");
        assert_eq!(line.get("units"), "mV");
        assert_eq!(line.get("adcres"), "11");
        assert_eq!(line.get("adczero"), "1024");
        assert_eq!(line.get("initvalue"), "995");
        assert_eq!(line.get("checksum"), "-22131");
        assert_eq!(line.get("blocksize"), "0");
        assert_eq!(line.get("signame"), "MLII lead");
    }

    #[test]
    fn test_signal_line_partial() {
        let line = tokenize("100.dat 212 200 11 1024 995", LineKind::Signal, 2).unwrap();
        assert_eq!(line.get("adcgain"), "200");
        assert_eq!(line.get("initvalue"), "995");
        assert_eq!(line.get("checksum"), "");
        assert_eq!(line.get("signame"), "");
        assert!(!line.is_present("baseline"));
    }

    #[test]
    fn test_signal_line_requires_format() {
        match tokenize("100.dat", LineKind::Signal, 4) {
            Err(WfdbError::Parse { line_number, .. }) => assert_eq!(line_number, 4),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_segment_line() {
        let line = tokenize("3000003_0001 724", LineKind::Segment, 2).unwrap();
        assert_eq!(line.get("segname"), "3000003_0001");
        assert_eq!(line.get("seglen"), "724");
        assert!(tokenize("~ 1000", LineKind::Segment, 3).is_ok());
        assert!(tokenize("3000003_0001", LineKind::Segment, 2).is_err());
    }

    #[test]
    fn test_comment_line() {
        let line = tokenize("#  Age: 69 Sex: M", LineKind::Comment, 5).unwrap();
        assert_eq!(line.get("comments"), "Age: 69 Sex: M");
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(descriptor("fs"), "360").unwrap(), Value::Int(360));
        assert_eq!(coerce(descriptor("fs"), "128.5").unwrap(), Value::Float(128.5));
        assert_eq!(coerce(descriptor("adcgain"), "200").unwrap(), Value::Float(200.0));
        assert_eq!(coerce(descriptor("units"), "mV").unwrap(), Value::Str("mV".into()));
        assert_eq!(coerce(descriptor("skew"), "").unwrap(), Value::Empty);
    }

    #[test]
    fn test_coerce_failures() {
        match coerce(descriptor("siglen"), "99999999999999999999999") {
            Err(WfdbError::Type { field, raw_value }) => {
                assert_eq!(field, "siglen");
                assert_eq!(raw_value, "99999999999999999999999");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(coerce(descriptor("basetime"), "24:61:00").is_err());
        assert!(coerce(descriptor("basedate"), "30/02/2001").is_err());
    }

    #[test]
    fn test_inline_comment_split() {
        assert_eq!(
            split_inline_comment("100 2 360 # note"),
            ("100 2 360 ", Some("# note"))
        );
        assert_eq!(split_inline_comment("100 2"), ("100 2", None));
        assert!(is_comment_line("   # header"));
        assert_eq!(strip_comment_marker("# header "), "header");
    }

    #[test]
    fn test_field_text_matches_line_grammar() {
        assert!(is_field_text("recordname", "s0010_re"));
        assert!(is_field_text("recordname", "a-1"));
        assert!(!is_field_text("recordname", "data/100"));
        assert!(!is_field_text("recordname", "r²"));

        assert!(is_field_text("fmt", "212"));
        assert!(!is_field_text("fmt", "16x2"));
        assert!(!is_field_text("fmt", "abc"));

        assert!(is_field_text("basetime", "1:02:03.5"));
        assert!(!is_field_text("basetime", "010:00:00"));
        assert!(!is_field_text("basetime", "1:2:3."));
        assert!(!is_field_text("basetime", "+1:02:03"));
        assert!(is_field_text("basedate", "01/01/2012"));
        assert!(!is_field_text("basedate", "01/01/12345"));

        assert!(is_field_text("signame", "V lead"));
        assert!(!is_field_text("signame", " V"));
        assert!(!is_field_text("units", "m#V"));
        assert!(!is_field_text("filename", "two words"));
    }
}
