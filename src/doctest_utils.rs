// Internal utilities for documentation tests
// This file contains helper functions to generate header files for doctests

use std::fs;
use std::path::{Path, PathBuf};

use crate::{HeaderWriter, RecordFields, Result, HEADER_EXTENSION};

/// Writes a two-signal header modelled on MIT-BIH record 100
pub fn create_sample_record<P: AsRef<Path>>(dir: P, record: &str) -> Result<PathBuf> {
    let text = format!(
        "{record} 2 360 650000\n\
         {record}.dat 212 200 11 1024 995 -22131 0 MLII\n\
         {record}.dat 212 200 11 1024 1011 20052 0 V5\n\
         # 69 M 1085 1629 x1\n\
         # Aldomet, Inderal\n",
        record = record
    );
    let path = dir.as_ref().join(format!("{}.{}", record, HEADER_EXTENSION));
    fs::write(&path, text)?;
    Ok(path)
}

/// Writes a three-segment record (two real segments around a gap) and its segment headers
pub fn create_multi_segment_record<P: AsRef<Path>>(dir: P, record: &str) -> Result<PathBuf> {
    let first = format!("{}_1", record);
    let second = format!("{}_2", record);

    let segment = |name: &str, len: i64| {
        RecordFields::new()
            .with("recordname", name)
            .with("nsig", 1)
            .with("fs", 125)
            .with("siglen", len)
            .with("filename", format!("{}.dat", name))
            .with("fmt", 80)
            .with("adcgain", 100.0)
            .with("units", "mV")
            .with("signame", "II")
    };

    let master = RecordFields::new()
        .with("recordname", record)
        .with("nseg", 3)
        .with("nsig", 1)
        .with("fs", 125)
        .with("siglen", 1750)
        .with("segname", vec![first.as_str(), "~", second.as_str()])
        .with("seglen", vec![1000, 250, 500]);

    HeaderWriter::new(dir).write_multi_segment(&master, &[segment(&first, 1000), segment(&second, 500)])
}
