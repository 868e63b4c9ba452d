//! Writing MARC records to binary format.
//!
//! This module provides [`MarcWriter`] for serializing [`Record`] instances
//! to ISO 2709 binary format, and [`write_records_atomic`] for replacing a
//! file with a complete set of records.
//!
//! Output is always UTF-8: the leader's character coding position is set to
//! `a` whatever the record was read as.
//!
//! # Examples
//!
//! ```
//! use libsys_marc::{Field, Leader, MarcWriter, Record};
//!
//! let mut record = Record::new(Leader::default());
//! record.add_field(Field::builder("245", '1', '0').subfield_str('a', "Title").build());
//!
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//! writer.write_record(&record)?;
//! writer.finish()?;
//! # Ok::<(), libsys_marc::MarcError>(())
//! ```

use crate::encoding::MarcEncoding;
use crate::error::{MarcError, Result};
use crate::reader::{FIELD_TERMINATOR, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use crate::record::Record;
use std::io::{BufWriter, Write};
use std::path::Path;

const MAX_FIELD_LENGTH: usize = 9_999;
const MAX_OFFSET: usize = 99_999;
const MAX_RECORD_LENGTH: usize = 99_999;

/// Writer for ISO 2709 binary MARC format.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Write a single MARC record.
    ///
    /// The record is fully serialized before anything is written, so a
    /// record that violates ISO 2709 limits leaves the output untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The writer has been finished
    /// - A tag is not 3 bytes, or a field, offset or the record exceeds ISO 2709 limits
    /// - An I/O error occurs during writing
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::InvalidRecord(
                "Cannot write to a finished writer".to_string(),
            ));
        }

        let bytes = serialize_record(record)?;
        self.writer.write_all(&bytes)?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the writer and mark it as finished.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

/// Serialize one record to ISO 2709 bytes, UTF-8 encoded.
///
/// # Errors
///
/// Returns an error if the record cannot be represented in ISO 2709.
pub fn serialize_record(record: &Record) -> Result<Vec<u8>> {
    let mut data_area = Vec::new();
    let mut directory = Vec::new();

    for field in &record.fields {
        if field.tag.len() != 3 {
            return Err(MarcError::InvalidField(format!(
                "Tag '{}' must be exactly 3 bytes",
                field.tag
            )));
        }

        let start = data_area.len();
        if let Some(data) = &field.data {
            data_area.extend_from_slice(data.as_bytes());
        } else {
            data_area.push(ascii_byte(field.indicator1, &field.tag)?);
            data_area.push(ascii_byte(field.indicator2, &field.tag)?);
            for subfield in &field.subfields {
                data_area.push(SUBFIELD_DELIMITER);
                data_area.push(ascii_byte(subfield.code, &field.tag)?);
                data_area.extend_from_slice(subfield.value.as_bytes());
            }
        }
        data_area.push(FIELD_TERMINATOR);

        let field_length = data_area.len() - start;
        if field_length > MAX_FIELD_LENGTH {
            return Err(MarcError::InvalidField(format!(
                "Field {} is {field_length} bytes, limit is {MAX_FIELD_LENGTH}",
                field.tag
            )));
        }
        if start > MAX_OFFSET {
            return Err(MarcError::InvalidRecord(format!(
                "Field {} starts at offset {start}, limit is {MAX_OFFSET}",
                field.tag
            )));
        }

        directory.extend_from_slice(field.tag.as_bytes());
        directory.extend_from_slice(format!("{field_length:04}").as_bytes());
        directory.extend_from_slice(format!("{start:05}").as_bytes());
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = 24 + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > MAX_RECORD_LENGTH {
        return Err(MarcError::InvalidRecord(format!(
            "Record length {record_length} exceeds {MAX_RECORD_LENGTH}"
        )));
    }

    let mut leader = record.leader.clone();
    leader.character_coding = MarcEncoding::Utf8.as_leader_char();
    leader.record_length = u32::try_from(record_length)
        .map_err(|_| MarcError::InvalidRecord("Record length overflow".to_string()))?;
    leader.data_base_address = u32::try_from(base_address)
        .map_err(|_| MarcError::InvalidRecord("Base address overflow".to_string()))?;

    let mut bytes = leader.as_bytes()?;
    bytes.reserve(record_length - bytes.len());
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&data_area);
    bytes.push(RECORD_TERMINATOR);
    Ok(bytes)
}

/// Indicators and subfield codes occupy exactly one byte.
fn ascii_byte(c: char, tag: &str) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| MarcError::EncodingError(format!("Field {tag}: '{c}' is not a single ASCII byte")))
}

/// Replace `path` with the given records.
///
/// Records are serialized to a temporary file in the same directory which is
/// renamed over `path` only after every record has been written and flushed.
/// On any error the temporary file is removed and `path` is left as it was.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or any I/O step fails.
pub fn write_records_atomic<'a, I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;

    let count = {
        let mut writer = MarcWriter::new(BufWriter::new(tmp.as_file()));
        for record in records {
            writer.write_record(record)?;
        }
        writer.finish()?;
        writer.records_written()
    };

    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MarcError::IoError(e.error))?;
    Ok(count)
}
