#![warn(missing_docs)]

//! # libsys-marc
//!
//! MARC record transformation and batching for library data pipelines.
//!
//! Vendor-supplied ISO 2709 files are read permissively, run through
//! declarative field rules, re-encoded as UTF-8 and split into bounded batch
//! files. A paginated record store can be harvested into fixed-size gzip
//! JSON-lines archives.
//!
//! ## Quick Start
//!
//! ### Reading MARC Records
//!
//! ```no_run
//! use libsys_marc::MarcReader;
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::open("records.mrc")?;
//! for item in MarcReader::new(file) {
//!     match item? {
//!         Ok(record) => println!("{} fields", record.len()),
//!         Err(bad) => eprintln!("skipped: {bad}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Transforming Records
//!
//! ```
//! use libsys_marc::{transform, Leader, Record, TransformRules};
//!
//! let rules = TransformRules::from_json_str(
//!     r#"{"change_fields": [{"from": "001", "to": "035"}]}"#,
//! )?;
//!
//! let mut record = Record::new(Leader::default());
//! record.add_control_field_str("001", "gls_0987654321");
//! transform::process(&mut record, &rules);
//!
//! assert_eq!(
//!     record.get_field("035").and_then(|f| f.get_subfield('a')),
//!     Some("gls_0987654321")
//! );
//! # Ok::<(), libsys_marc::MarcError>(())
//! ```
//!
//! ### Running a Vendor File
//!
//! ```no_run
//! use libsys_marc::{pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_json_file(Path::new("vendor.json"))?;
//! let batches = pipeline::run_file(Path::new("/opt/downloads"), "order.mrc", &config)?;
//! # Ok::<(), libsys_marc::MarcError>(())
//! ```
//!
//! ## Modules
//!
//! - [`record`] - `Record`, `Field`, `Subfield`
//! - [`leader`] - MARC record leader (24-byte header)
//! - [`encoding`] - Character coding detection and permissive decoding
//! - [`reader`] - Reading MARC records from binary data streams
//! - [`writer`] - Writing MARC records to binary format
//! - [`rules`] - Declarative field transformation rules
//! - [`transform`] - Applying rules to records
//! - [`batch`] - Splitting files into bounded batches
//! - [`harvest`] - Paged record store export
//! - [`pipeline`] - Per-file tasks for vendor MARC files
//! - [`config`] - Pipeline configuration
//! - [`error`] - Error types
//!
//! ## Logging
//!
//! Progress and skipped records are reported through [`tracing`]. The
//! library installs no subscriber.

pub mod batch;
pub mod config;
pub mod encoding;
pub mod error;
pub mod harvest;
pub mod leader;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod rules;
pub mod transform;
pub mod writer;

pub use batch::{batch_file, batch_filename, BatchWriter};
pub use config::{BatchRounding, HarvestConfig, PipelineConfig};
pub use encoding::MarcEncoding;
pub use error::{DecodeError, MarcError, Result};
#[cfg(feature = "http")]
pub use harvest::HttpRecordStore;
pub use harvest::{BatchPlanner, Harvester, MemoryRecordStore, RecordStore, SourcePage};
pub use leader::Leader;
pub use pipeline::ProcessOutcome;
pub use reader::{Decoded, MarcReader};
pub use record::{Field, FieldBuilder, Record, RecordBuilder, Subfield};
pub use rules::{
    AddFieldRule, ChangeFieldRule, FieldMatcher, FieldRule, SubfieldSpec, TransformRules,
};
pub use writer::{write_records_atomic, MarcWriter};
