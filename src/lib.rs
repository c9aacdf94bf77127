//! # WFDB Header Library for Rust
//!
//! Reads and writes the `.hea` header files of WFDB (WaveForm DataBase)
//! records. A header describes a record: its name, signal count, sampling
//! frequency and length, then one line per signal (storage file, format,
//! gain, baseline, units, name) or, for multi-segment records, one line per
//! segment. Sample files themselves are out of scope; `filename` and `fmt`
//! are passed through for whatever layer reads the samples.
//!
//! ## Quick Start
//!
//! ### Reading a header
//!
//! ```rust
//! use wfdb_header::{HeaderReader, Header, Result};
//!
//! fn main() -> Result<()> {
//!     # let dir = tempfile::tempdir()?;
//!     # wfdb_header::doctest_utils::create_sample_record(dir.path(), "100")?;
//!     let reader = HeaderReader::open_in(dir.path(), "100")?;
//!
//!     // 原始字段映射
//!     let fields = reader.fields();
//!     println!("Signals: {:?}", fields.nsig());
//!
//!     // 类型化视图
//!     if let Header::SingleSegment(header) = reader.header()? {
//!         for signal in &header.signals {
//!             println!("{:?}: {} {}/{}", signal.sig_name, signal.fmt, signal.adc_gain, signal.units);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Writing a header
//!
//! Missing dependencies are filled in by default: asking for `units` brings
//! in `adcgain`, which then takes its default of 200.
//!
//! ```rust
//! use wfdb_header::{HeaderWriter, RecordFields, Result};
//!
//! fn main() -> Result<()> {
//!     # let dir = tempfile::tempdir()?;
//!     let fields = RecordFields::new()
//!         .with("recordname", "a01")
//!         .with("nsig", 2)
//!         .with("fs", 100)
//!         .with("siglen", 3000)
//!         .with("filename", "a01.dat")
//!         .with("fmt", 16)
//!         .with("units", vec!["mV", "mmHg"]);
//!
//!     let writer = HeaderWriter::new(dir.path());
//!     assert_eq!(
//!         writer.render(&fields)?,
//!         "a01 2 100 3000\na01.dat 16 200/mV\na01.dat 16 200/mmHg\n"
//!     );
//!
//!     // 严格模式下缺少依赖会报错
//!     let strict = HeaderWriter::new(dir.path()).auto_fill_dependencies(false);
//!     assert!(strict.render(&fields).is_err());
//!
//!     writer.write(&fields)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Field dependencies
//!
//! Header lines are positional, so a field can only be written when every
//! field before it on its chain is written too. The chains live in the
//! [`schema`] module:
//!
//! ```rust
//! use wfdb_header::schema::dependency_chain;
//!
//! assert_eq!(dependency_chain("baseline")?, vec!["adcgain", "fmt", "filename"]);
//! # Ok::<(), wfdb_header::WfdbError>(())
//! ```

pub mod error;
pub mod types;
pub mod schema;
pub mod validate;
pub mod grammar;
pub mod utils;
pub mod reader;
pub mod writer;
pub mod header;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{Result, WfdbError};
pub use types::{FieldValue, RecordFields, Value, ValueKind};
pub use schema::{FieldDescriptor, LineKind};
pub use validate::validate_and_complete;
pub use reader::{parse_header, read_header, HeaderReader};
pub use writer::{render_header, write_header, HeaderWriter};
pub use header::{Header, MultiSegmentHeader, RecordSpec, SegmentSpec, SignalSpec, SingleSegmentHeader};

// Important constants
pub const DEFAULT_FS: f64 = 250.0;
pub const DEFAULT_ADC_GAIN: f64 = 200.0;
pub const DEFAULT_UNITS: &str = "mV";
pub const HEADER_EXTENSION: &str = "hea";
/// Segment name standing for a gap in a multi-segment record
pub const NULL_SEGMENT: &str = "~";

/// Library version
///
/// Returns the current version of the wfdb-header library.
///
/// # Examples
///
/// ```rust
/// let version = wfdb_header::version();
/// assert!(!version.is_empty());
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
