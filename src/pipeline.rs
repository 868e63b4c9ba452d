//! Per-file units of work for vendor MARC files.
//!
//! Each function takes one file and everything it needs as arguments, so a
//! scheduler can run them independently:
//!
//! 1. [`filter_fields_task`] strips vendor-local fields in place.
//! 2. [`process_file`] applies [`TransformRules`] and writes a
//!    `-processed` copy.
//! 3. [`batch_task`] splits the result into bounded batch files.
//!
//! Files that are not MARC (see [`is_marc`]) pass through untouched.

use crate::batch::{batch_file, derived_filename};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::reader::MarcReader;
use crate::record::Record;
use crate::rules::TransformRules;
use crate::transform;
use crate::writer::write_records_atomic;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MARC_EXTENSIONS: [&str; 2] = ["mrc", "ord"];

/// Returns true if `path` names a MARC file (`.mrc` or `.ord`).
#[must_use]
pub fn is_marc(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARC_EXTENSIONS.contains(&ext))
}

/// Counts from one pass over a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// File the records were written to
    pub output: PathBuf,
    /// Records decoded from the input
    pub records_read: usize,
    /// Records written to the output
    pub records_written: usize,
    /// Malformed records skipped
    pub decode_errors: usize,
}

/// Read every decodable record from `path`, logging and skipping the rest.
fn read_records(path: &Path) -> Result<(Vec<Record>, usize)> {
    let mut reader = MarcReader::new(File::open(path)?);
    let mut records = Vec::new();
    while let Some(item) = reader.read_next()? {
        match item {
            Ok(record) => records.push(record),
            Err(bad) => warn!("{}: {bad} ({} bytes skipped)", path.display(), bad.chunk.len()),
        }
    }
    Ok((records, reader.errors_seen()))
}

fn rewrite<F>(input: &Path, output: &Path, mut edit: F) -> Result<ProcessOutcome>
where
    F: FnMut(&mut Record),
{
    let (mut records, decode_errors) = read_records(input)?;
    for record in &mut records {
        edit(record);
    }
    let records_written = write_records_atomic(output, &records)?;
    Ok(ProcessOutcome {
        output: output.to_path_buf(),
        records_read: records.len(),
        records_written,
        decode_errors,
    })
}

/// Remove every field tagged with one of `tags` and rewrite `path` in place.
///
/// Malformed records are dropped from the rewritten file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or replaced.
pub fn filter_fields<S: AsRef<str>>(path: &Path, tags: &[S]) -> Result<ProcessOutcome> {
    info!("Filtering fields from {}", path.display());
    let outcome = rewrite(path, path, |record| {
        record.remove_fields(tags);
    })?;
    info!(
        "Filtered {} records in {}",
        outcome.records_written,
        path.display()
    );
    Ok(outcome)
}

/// [`filter_fields`] on `dir/filename`, skipping non-MARC files.
///
/// Returns `None` when the file was skipped.
///
/// # Errors
///
/// Returns an error if filtering a MARC file fails.
pub fn filter_fields_task<S: AsRef<str>>(
    dir: &Path,
    filename: &str,
    tags: &[S],
) -> Result<Option<ProcessOutcome>> {
    let path = dir.join(filename);
    if !is_marc(&path) {
        info!("{filename} is not a MARC file, not filtering fields");
        return Ok(None);
    }
    filter_fields(&path, tags).map(Some)
}

/// Apply `rules` to every record of `path`, writing `{stem}-processed{suffix}`
/// beside it.
///
/// # Errors
///
/// Returns an error if the input cannot be read or the output cannot be written.
pub fn process_file(path: &Path, rules: &TransformRules) -> Result<ProcessOutcome> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = path.with_file_name(derived_filename(&name, "-processed"));

    info!("Processing {}", path.display());
    let outcome = rewrite(path, &output, |record| transform::process(record, rules))?;
    info!(
        "Wrote {} records to {} ({} skipped)",
        outcome.records_written,
        output.display(),
        outcome.decode_errors
    );
    Ok(outcome)
}

/// Split `dir/filename` into batch files; a non-MARC file comes back as
/// the single name `filename`.
///
/// # Errors
///
/// Returns an error if batching a MARC file fails.
pub fn batch_task(dir: &Path, filename: &str, max_records: usize) -> Result<Vec<String>> {
    if !is_marc(Path::new(filename)) {
        info!("{filename} is not a MARC file, not batching");
        return Ok(vec![filename.to_string()]);
    }
    batch_file(dir, filename, max_records)
}

/// Run filter, process and batch over `dir/filename` with `config`.
///
/// Returns the batch file names; a non-MARC file is returned unchanged.
///
/// # Errors
///
/// Returns the first error from any stage.
pub fn run_file(dir: &Path, filename: &str, config: &PipelineConfig) -> Result<Vec<String>> {
    let path = dir.join(filename);
    if !is_marc(&path) {
        info!("{filename} is not a MARC file, passing through");
        return Ok(vec![filename.to_string()]);
    }

    filter_fields(&path, &config.filter_tags)?;
    let processed = process_file(&path, &config.rules)?;
    let processed_name = processed
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    batch_task(dir, &processed_name, config.max_records)
}
