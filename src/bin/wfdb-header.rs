//! wfdb-header CLI
//!
//! Inspects, validates and re-serializes WFDB header files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use wfdb_header::{utils, FieldValue, Header, HeaderReader, HeaderWriter, RecordFields, NULL_SEGMENT};

#[derive(Parser)]
#[command(name = "wfdb-header")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read, check and rewrite WFDB header (.hea) files")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of a record's header
    Show {
        record: String,
        /// Directory holding the header
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Parse a header and report whether it is valid
    Check {
        record: String,
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Read a header and write it out again in canonical form
    Rewrite {
        record: String,
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        /// Fail on missing dependencies instead of filling them in
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Show { record, dir } => show(&record, &dir),
        Command::Check { record, dir } => check(&record, &dir),
        Command::Rewrite {
            record,
            dir,
            out,
            strict,
        } => rewrite(&record, &dir, &out, strict),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(record: &str, dir: &Path) -> Result<HeaderReader> {
    HeaderReader::open_in(dir, record).with_context(|| format!("failed to read header for record '{}'", record))
}

fn show(record: &str, dir: &Path) -> Result<()> {
    let reader = open(record, dir)?;
    let header = reader.header().context("header fields have invalid values")?;
    let spec = header.record();

    println!("Record:     {}", spec.name);
    println!("File:       {}", reader.path().display());
    println!("Signals:    {}", spec.nsig);
    println!("Frequency:  {} Hz", spec.fs);
    if let Some(len) = spec.sig_len {
        println!("Length:     {} samples", len);
    }
    if let Some(secs) = spec.duration_secs() {
        println!("Duration:   {:.3} s", secs);
    }
    if let Some(time) = &spec.base_time {
        println!("Start time: {}", utils::format_base_time(time));
    }
    if let Some(date) = &spec.base_date {
        println!("Start date: {}", utils::format_base_date(date));
    }

    match &header {
        Header::SingleSegment(single) => {
            for (i, signal) in single.signals.iter().enumerate() {
                println!(
                    "  [{}] {:<12} {} fmt {} gain {} {} baseline {}",
                    i,
                    signal.sig_name.as_deref().unwrap_or("-"),
                    signal.file_name,
                    signal.fmt,
                    signal.adc_gain,
                    signal.units,
                    signal.baseline
                );
            }
        }
        Header::MultiSegment(multi) => {
            println!("Segments:   {}", multi.segments.len());
            for segment in &multi.segments {
                let name = if segment.is_null() { "(gap)" } else { segment.name.as_str() };
                println!("  {:<16} {} samples", name, segment.len);
            }
        }
    }

    for comment in header.comments() {
        println!("# {}", comment);
    }
    Ok(())
}

fn check(record: &str, dir: &Path) -> Result<()> {
    let reader = open(record, dir)?;
    reader.header().context("header fields have invalid values")?;

    let fields = reader.fields();
    let segments = load_segments(fields, dir)?;
    let writer = HeaderWriter::new(dir);
    let rendered = if fields.is_multi_segment() {
        writer.render_multi_segment(fields, &segments)
    } else {
        writer.render(fields)
    };
    rendered.context("header would not be written back as-is")?;

    println!("{}: ok", reader.path().display());
    Ok(())
}

fn rewrite(record: &str, dir: &Path, out: &Path, strict: bool) -> Result<()> {
    let reader = open(record, dir)?;
    let fields = reader.fields();

    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    let writer = HeaderWriter::new(out).auto_fill_dependencies(!strict);

    let path = if fields.is_multi_segment() {
        let segments = load_segments(fields, dir)?;
        writer.write_multi_segment(fields, &segments)?
    } else {
        writer.write(fields)?
    };

    info!(from = %reader.path().display(), to = %path.display(), "header rewritten");
    println!("{}", path.display());
    Ok(())
}

/// Reads the header of every non-null segment a master header names
fn load_segments(fields: &RecordFields, dir: &Path) -> Result<Vec<RecordFields>> {
    if !fields.is_multi_segment() {
        return Ok(Vec::new());
    }

    let Some(FieldValue::PerSegment(names)) = fields.get("segname") else {
        bail!("multi-segment header without segment names");
    };

    let mut segments = Vec::new();
    for name in names.iter().filter_map(|n| n.as_str()) {
        if name == NULL_SEGMENT {
            continue;
        }
        debug!(segment = name, "loading segment header");
        segments.push(open(name, dir)?.into_fields());
    }
    Ok(segments)
}
