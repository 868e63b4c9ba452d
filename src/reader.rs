//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 formatted MARC records
//! from any source that implements [`std::io::Read`].
//!
//! Each record is framed by the ISO 2709 record terminator (`0x1D`), so a
//! malformed record never desynchronises the stream: the reader reports it as
//! a [`DecodeError`] carrying the raw bytes and moves on to the next record.
//! Only I/O failures stop iteration.
//!
//! Tags, indicators and subfield codes must be ASCII. A record carrying any
//! other byte in those positions is rejected as a whole, since it could not
//! be written back out.
//!
//! # Examples
//!
//! ```no_run
//! use libsys_marc::MarcReader;
//! use std::fs::File;
//!
//! let file = File::open("records.mrc")?;
//! for item in MarcReader::new(file) {
//!     match item? {
//!         Ok(record) => println!("{} fields", record.len()),
//!         Err(bad) => eprintln!("skipping {bad}"),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::encoding::{FieldDecoder, MarcEncoding};
use crate::error::{DecodeError, MarcError, Result};
use crate::leader::{Leader, LEADER_LEN};
use crate::record::{is_control_tag, Field, Record};
use std::io::{BufRead, BufReader, Read};

pub(crate) const FIELD_TERMINATOR: u8 = 0x1E;
pub(crate) const SUBFIELD_DELIMITER: u8 = 0x1F;
pub(crate) const RECORD_TERMINATOR: u8 = 0x1D;

const DIRECTORY_ENTRY_LEN: usize = 12;

/// Outcome of decoding one record unit: the record, or why it was rejected.
pub type Decoded = std::result::Result<Record, DecodeError>;

/// Reader for ISO 2709 binary MARC format.
///
/// Iterating a `MarcReader` yields `Result<Decoded>`: the outer error is a
/// fatal I/O failure, after which iteration ends; the inner value is either a
/// record or a [`DecodeError`] for one malformed unit.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    offset: u64,
    units_read: usize,
    records_read: usize,
    errors_seen: usize,
    done: bool,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            offset: 0,
            units_read: 0,
            records_read: 0,
            errors_seen: 0,
            done: false,
        }
    }

    /// Read the next record unit.
    ///
    /// Returns `Ok(None)` at end of input. Decode failures come back as
    /// `Ok(Some(Err(_)))` and do not affect later records.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying reader fails.
    pub fn read_next(&mut self) -> Result<Option<Decoded>> {
        if self.done {
            return Ok(None);
        }

        let mut chunk = Vec::new();
        let n = self.reader.read_until(RECORD_TERMINATOR, &mut chunk)?;
        let start = self.offset;
        self.offset += n as u64;

        if n == 0 || (chunk.last() != Some(&RECORD_TERMINATOR) && is_blank(&chunk)) {
            self.done = true;
            return Ok(None);
        }

        let index = self.units_read;
        self.units_read += 1;

        match parse_record(&chunk) {
            Ok(record) => {
                self.records_read += 1;
                Ok(Some(Ok(record)))
            },
            Err(e) => {
                self.errors_seen += 1;
                Ok(Some(Err(DecodeError {
                    index,
                    offset: start,
                    chunk,
                    message: e.to_string(),
                })))
            },
        }
    }

    /// Read a single MARC record, treating decode failures as errors.
    ///
    /// Returns `Ok(None)` at end of input. After a [`MarcError::Decode`]
    /// the reader is positioned at the following record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or an I/O error occurs.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        match self.read_next()? {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(MarcError::Decode(e)),
            None => Ok(None),
        }
    }

    /// Number of records successfully decoded so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Number of malformed units seen so far.
    #[must_use]
    pub fn errors_seen(&self) -> usize {
        self.errors_seen
    }
}

impl<R: Read> Iterator for MarcReader<R> {
    type Item = Result<Decoded>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Parse one complete record unit, terminator included.
///
/// # Errors
///
/// Returns an error describing the first structural problem found.
pub fn parse_record(chunk: &[u8]) -> Result<Record> {
    if chunk.last() != Some(&RECORD_TERMINATOR) {
        return Err(MarcError::InvalidRecord(format!(
            "Unexpected end of input after {} bytes (no record terminator)",
            chunk.len()
        )));
    }

    let leader = Leader::from_bytes(chunk)?;
    leader.validate_for_reading()?;

    let record_length = leader.record_length as usize;
    if record_length != chunk.len() {
        return Err(MarcError::InvalidRecord(format!(
            "Leader declares {record_length} bytes but record terminator found after {}",
            chunk.len()
        )));
    }

    let base_address = leader.data_base_address as usize;
    let directory = &chunk[LEADER_LEN..base_address];
    let directory = match memchr::memchr(FIELD_TERMINATOR, directory) {
        Some(end) => &directory[..end],
        None => {
            return Err(MarcError::InvalidRecord(
                "Directory is not terminated".to_string(),
            ))
        },
    };
    if directory.len() % DIRECTORY_ENTRY_LEN != 0 {
        return Err(MarcError::InvalidRecord(
            "Incomplete directory entry".to_string(),
        ));
    }

    let encoding = MarcEncoding::from_leader_char(leader.character_coding);
    let data = &chunk[base_address..];
    let mut record = Record::new(leader);

    // Directory entries: tag(3) + length(4) + start position(5)
    for entry in directory.chunks_exact(DIRECTORY_ENTRY_LEN) {
        let tag = ascii_tag(&entry[0..3])?;
        let field_length = parse_number(&entry[3..7])?;
        let start_position = parse_number(&entry[7..12])?;
        let end_position = start_position + field_length;
        if field_length == 0 || end_position > data.len() {
            return Err(MarcError::InvalidRecord(format!(
                "Field {tag} exceeds data area"
            )));
        }

        let field_data = &data[start_position..end_position];
        let field_data = field_data
            .strip_suffix(&[FIELD_TERMINATOR])
            .unwrap_or(field_data);

        if is_control_tag(&tag) {
            let value = FieldDecoder::new(encoding).decode(field_data);
            record.add_field(Field::control(tag, value));
        } else {
            let field = parse_data_field(field_data, &tag, encoding)
                .map_err(|e| MarcError::InvalidField(format!("Tag {tag}: {e}")))?;
            record.add_field(field);
        }
    }

    Ok(record)
}

/// Parse a data field from raw bytes (field terminator already stripped)
fn parse_data_field(data: &[u8], tag: &str, encoding: MarcEncoding) -> Result<Field> {
    if data.len() < 2 {
        return Err(MarcError::InvalidField(
            "Data field too short (needs indicators)".to_string(),
        ));
    }

    let mut field = Field::new(
        tag,
        ascii_char(data[0], "indicator")?,
        ascii_char(data[1], "indicator")?,
    );
    let subfield_data = &data[2..];
    if subfield_data.is_empty() {
        return Ok(field);
    }
    if subfield_data[0] != SUBFIELD_DELIMITER {
        return Err(MarcError::InvalidField(
            "Expected subfield delimiter".to_string(),
        ));
    }

    let mut decoder = FieldDecoder::new(encoding);
    for raw in subfield_data[1..].split(|&b| b == SUBFIELD_DELIMITER) {
        let Some((&code, value)) = raw.split_first() else {
            continue;
        };
        field.add_subfield(ascii_char(code, "subfield code")?, decoder.decode(value));
    }

    Ok(field)
}

fn ascii_tag(bytes: &[u8]) -> Result<String> {
    if bytes.is_ascii() {
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        Err(MarcError::InvalidRecord(format!(
            "Directory tag {bytes:02X?} is not ASCII"
        )))
    }
}

fn ascii_char(byte: u8, what: &str) -> Result<char> {
    if byte.is_ascii() {
        Ok(char::from(byte))
    } else {
        Err(MarcError::InvalidField(format!(
            "Non-ASCII {what} byte 0x{byte:02X}"
        )))
    }
}

/// Parse a fixed-width ASCII number from a directory entry
fn parse_number(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )));
        }
        result = result * 10 + (byte - b'0') as usize;
    }
    Ok(result)
}
