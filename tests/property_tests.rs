//! Property-based tests for the reader/writer pair.

use proptest::prelude::*;
use wfdb_header::schema::dependency_chain;
use wfdb_header::{
    parse_header, render_header, validate_and_complete, FieldValue, LineKind, RecordFields, Value, WfdbError,
};

#[derive(Debug, Clone)]
struct SignalRow {
    fmt: i64,
    gain: f64,
    baseline: i64,
    units: &'static str,
    adcres: i64,
    adczero: i64,
    initvalue: i64,
    checksum: i64,
    signame: String,
}

fn signal_strategy() -> impl Strategy<Value = SignalRow> {
    (
        prop::sample::select(vec![8i64, 16, 80, 212, 310]),
        (1u32..100_000).prop_map(|g| g as f64 / 10.0),
        -2000i64..2000,
        prop::sample::select(vec!["mV", "uV", "mmHg", "NU"]),
        0i64..24,
        -100i64..100,
        -1000i64..1000,
        -32768i64..32767,
        "[A-Za-z][A-Za-z0-9 ]{0,10}[A-Za-z0-9]",
    )
        .prop_map(
            |(fmt, gain, baseline, units, adcres, adczero, initvalue, checksum, signame)| SignalRow {
                fmt,
                gain,
                baseline,
                units,
                adcres,
                adczero,
                initvalue,
                checksum,
                signame,
            },
        )
}

/// Strategy for comment text that survives whitespace trimming
fn comment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9:,]([a-zA-Z0-9:, ]{0,18}[a-zA-Z0-9:,])?").unwrap()
}

fn record_strategy() -> impl Strategy<Value = RecordFields> {
    (
        "[a-z][a-z0-9_]{0,8}",
        1i64..2000,
        0i64..1_000_000,
        prop::collection::vec(signal_strategy(), 1..5),
        prop::collection::vec(comment_strategy(), 0..3),
    )
        .prop_map(|(name, fs, siglen, rows, comments)| {
            let column = |f: fn(&SignalRow) -> Value| rows.iter().map(f).collect::<Vec<Value>>();
            RecordFields::new()
                .with("recordname", name.as_str())
                .with("nsig", rows.len())
                .with("fs", fs)
                .with("siglen", siglen)
                .with("filename", format!("{}.dat", name))
                .with("fmt", column(|r| Value::Int(r.fmt)))
                .with("adcgain", column(|r| Value::Float(r.gain)))
                .with("baseline", column(|r| Value::Int(r.baseline)))
                .with("units", column(|r| Value::from(r.units)))
                .with("adcres", column(|r| Value::Int(r.adcres)))
                .with("adczero", column(|r| Value::Int(r.adczero)))
                .with("initvalue", column(|r| Value::Int(r.initvalue)))
                .with("checksum", column(|r| Value::Int(r.checksum)))
                .with("blocksize", 0)
                .with("signame", column(|r| Value::from(r.signame.as_str())))
                .with("comments", comments)
        })
}

proptest! {
    #[test]
    fn test_read_reproduces_written_fields(fields in record_strategy()) {
        let nsig = fields.nsig().unwrap();
        let text = render_header(&fields, false).unwrap();
        let read = parse_header(&text).unwrap();

        for (name, value) in fields.iter() {
            let expected = match (value, read.get(name)) {
                (FieldValue::Scalar(v), Some(FieldValue::PerSignal(_))) => FieldValue::PerSignal(vec![v.clone(); nsig]),
                (other, _) => other.clone(),
            };
            prop_assert_eq!(read.get(name), Some(&expected), "field {}", name);
        }
    }

    #[test]
    fn test_rewrite_is_idempotent(fields in record_strategy()) {
        let once = parse_header(&render_header(&fields, true).unwrap()).unwrap();
        let twice = parse_header(&render_header(&once, true).unwrap()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_scalar_broadcasts_to_every_signal(fields in record_strategy(), units in "[a-zA-Z]{1,6}") {
        let nsig = fields.nsig().unwrap();
        let fields = fields.with("units", units.as_str());
        let read = parse_header(&render_header(&fields, true).unwrap()).unwrap();

        prop_assert_eq!(
            read.get("units"),
            Some(&FieldValue::PerSignal(vec![Value::from(units.as_str()); nsig]))
        );
    }

    #[test]
    fn test_wrong_length_is_rejected(fields in record_strategy(), extra in 1usize..3) {
        let nsig = fields.nsig().unwrap();
        let gains = vec![Value::Float(100.0); nsig + extra];
        let fields = fields.with("adcgain", gains);

        match render_header(&fields, true) {
            Err(WfdbError::SizeMismatch { field, expected, actual }) => {
                prop_assert_eq!(field, "adcgain");
                prop_assert_eq!(expected, nsig);
                prop_assert_eq!(actual, nsig + extra);
            }
            other => prop_assert!(false, "unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_dependency_closure(
        name in prop::sample::select(vec![
            "sampsperframe", "skew", "byteoffset", "adcgain", "baseline", "units",
            "adcres", "adczero", "initvalue", "checksum", "blocksize", "signame",
        ])
    ) {
        let fields = RecordFields::new().with(name, vec![Value::Int(1)]);

        let completed = validate_and_complete(fields.clone(), LineKind::Signal, true).unwrap();
        for dependency in dependency_chain(name).unwrap() {
            prop_assert!(completed.contains(dependency), "{} missing for {}", dependency, name);
        }

        let is_dependency_error = matches!(
            validate_and_complete(fields, LineKind::Signal, false),
            Err(WfdbError::Dependency { .. })
        );
        prop_assert!(is_dependency_error);
    }
}
