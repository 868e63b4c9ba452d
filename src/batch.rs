//! Splitting record streams into bounded batch files.
//!
//! A file `records.mrc` with `max_records = 500` becomes `records_1.mrc`,
//! `records_2.mrc`, ... each holding at most 500 records, in input order.
//! Records that fail to decode are logged and left out; they do not count
//! toward a batch.
//!
//! # Examples
//!
//! ```no_run
//! use libsys_marc::batch::batch_file;
//! use std::path::Path;
//!
//! let names = batch_file(Path::new("/opt/downloads"), "vendor.mrc", 500)?;
//! for name in &names {
//!     println!("wrote {name}");
//! }
//! # Ok::<(), libsys_marc::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::reader::MarcReader;
use crate::record::Record;
use crate::writer::write_records_atomic;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of batch `index` derived from `filename`: `{stem}_{index}{suffix}`.
#[must_use]
pub fn batch_filename(filename: &str, index: usize) -> String {
    derived_filename(filename, &format!("_{index}"))
}

/// Insert `infix` between a file name's stem and its extension.
pub(crate) fn derived_filename(filename: &str, infix: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map_or_else(|| filename.into(), |s| s.to_string_lossy());
    match path.extension() {
        Some(ext) => format!("{stem}{infix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{infix}"),
    }
}

/// Accumulates records and writes a batch file whenever `max_records` are
/// pending.
///
/// Call [`BatchWriter::finish`] once the input is exhausted to flush the
/// trailing partial batch.
#[derive(Debug)]
pub struct BatchWriter {
    dir: PathBuf,
    filename: String,
    max_records: usize,
    pending: Vec<Record>,
    next_index: usize,
    written: Vec<String>,
}

impl BatchWriter {
    /// Create a writer producing batches of `filename` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Config`] if `max_records` is zero.
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>, max_records: usize) -> Result<Self> {
        if max_records == 0 {
            return Err(MarcError::Config("max_records must be positive".to_string()));
        }
        Ok(BatchWriter {
            dir: dir.into(),
            filename: filename.into(),
            max_records,
            pending: Vec::with_capacity(max_records.min(1024)),
            next_index: 1,
            written: Vec::new(),
        })
    }

    /// Add a record, writing a batch if this fills it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the batch fails.
    pub fn push(&mut self, record: Record) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() == self.max_records {
            self.flush()?;
        }
        Ok(())
    }

    /// Write any pending records and return every batch file name, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the last batch fails.
    pub fn finish(mut self) -> Result<Vec<String>> {
        if !self.pending.is_empty() {
            self.flush()?;
        }
        Ok(self.written)
    }

    /// Records waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn flush(&mut self) -> Result<()> {
        let name = batch_filename(&self.filename, self.next_index);
        let path = self.dir.join(&name);
        info!("Writing {} records to {}", self.pending.len(), path.display());
        write_records_atomic(&path, &self.pending)?;
        self.pending.clear();
        self.next_index += 1;
        self.written.push(name);
        Ok(())
    }
}

/// Split `dir/filename` into batch files of at most `max_records` records.
///
/// Returns the batch file names (relative to `dir`) in order.
///
/// # Errors
///
/// Returns an error if `max_records` is zero, the source cannot be read, or a
/// batch cannot be written. Malformed records are not errors.
pub fn batch_file(dir: &Path, filename: &str, max_records: usize) -> Result<Vec<String>> {
    let mut batches = BatchWriter::new(dir, filename, max_records)?;
    let source = File::open(dir.join(filename))?;
    let mut skipped = 0usize;

    for item in MarcReader::new(source) {
        match item? {
            Ok(record) => batches.push(record)?,
            Err(bad) => {
                skipped += 1;
                warn!(
                    "Skipping malformed record in {filename} ({} bytes): {bad}",
                    bad.chunk.len()
                );
            },
        }
    }

    let names = batches.finish()?;
    if skipped > 0 {
        debug!("{skipped} malformed records left out of {filename} batches");
    }
    info!("Finished batching {filename} into {} files", names.len());
    Ok(names)
}
