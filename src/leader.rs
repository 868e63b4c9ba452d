//! The 24-byte ISO 2709 leader.
//!
//! Only a few positions matter to the pipeline: the record length (0-4) and
//! base address of data (12-16) frame the directory and data area, and the
//! character coding scheme (9) picks the decoder. The writer recomputes both
//! lengths and always sets position 9 to `a`. Every other position is carried
//! through unchanged.
//!
//! ```text
//! 00714cam a2200205 a 4500
//! |    ||||||| |    ||||
//! |    ||||||| |    |||+ entry map (20-23)
//! |    ||||||| |    ||+- multipart level (19)
//! |    ||||||| |    |+-- cataloging form (18)
//! |    ||||||| |    +--- encoding level (17)
//! |    ||||||| +-------- base address of data (12-16)
//! |    ||||||+---------- subfield code count (11)
//! |    |||||+----------- indicator count (10)
//! |    ||||+------------ character coding (9)
//! |    |||+------------- control type (8)
//! |    ||+-------------- bibliographic level (7)
//! |    |+--------------- record type (6)
//! |    +---------------- record status (5)
//! +--------------------- record length (0-4)
//! ```

use crate::error::{MarcError, Result};
use serde::{Deserialize, Serialize};

/// Length of the leader in bytes.
pub const LEADER_LEN: usize = 24;

/// Parsed leader of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Total record length in bytes, terminator included
    pub record_length: u32,
    /// Position 5
    pub record_status: char,
    /// Position 6
    pub record_type: char,
    /// Position 7
    pub bibliographic_level: char,
    /// Position 8
    pub control_record_type: char,
    /// `a` for UTF-8, anything else is read as MARC-8
    pub character_coding: char,
    /// Position 10
    pub indicator_count: u8,
    /// Position 11
    pub subfield_code_count: u8,
    /// Offset of the data area from the start of the record
    pub data_base_address: u32,
    /// Position 17
    pub encoding_level: char,
    /// Position 18
    pub cataloging_form: char,
    /// Position 19
    pub multipart_level: char,
    /// Entry map, `4500` in MARC 21
    pub reserved: String,
}

impl Default for Leader {
    /// A new UTF-8 language-material monograph; lengths are filled in on write.
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: ' ',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Parse a leader from 24 bytes
    ///
    /// Indicator and subfield code counts that are not digits fall back to 2,
    /// which is what every MARC 21 record uses; vendor files frequently carry
    /// blanks there.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are too short, hold a non-ASCII byte, or
    /// the numeric length fields are not digits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }
        if let Some(pos) = bytes[..LEADER_LEN].iter().position(|b| !b.is_ascii()) {
            return Err(MarcError::InvalidLeader(format!(
                "Non-ASCII byte 0x{:02X} at leader position {pos}",
                bytes[pos]
            )));
        }

        let record_length = parse_digits(&bytes[0..5])?;
        let data_base_address = parse_digits(&bytes[12..17])?;

        Ok(Leader {
            record_length,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count: count_or_default(bytes[10]),
            subfield_code_count: count_or_default(bytes[11]),
            data_base_address,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            reserved: String::from_utf8_lossy(&bytes[20..24]).to_string(),
        })
    }

    /// Validate that the leader is suitable for binary record reading.
    ///
    /// # Errors
    ///
    /// Returns an error if `record_length` or `data_base_address` is less than
    /// 24, or the base address lies beyond the end of the record.
    pub fn validate_for_reading(&self) -> Result<()> {
        if self.record_length < 24 {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be at least 24, got {}",
                self.record_length
            )));
        }
        if self.data_base_address < 24 {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be at least 24, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address > self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address {} exceeds record length {}",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }

    /// Serialize leader to 24 bytes
    ///
    /// # Errors
    ///
    /// Returns an error if a length does not fit in five digits, a position
    /// holds a non-ASCII character, or the entry map is not 4 characters.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        if self.record_length > 99_999 || self.data_base_address > 99_999 {
            return Err(MarcError::InvalidLeader(format!(
                "Lengths must fit in 5 digits (record length {}, base address {})",
                self.record_length, self.data_base_address
            )));
        }

        let mut bytes = Vec::with_capacity(LEADER_LEN);
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        for c in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
        ] {
            bytes.push(ascii_byte(c)?);
        }
        bytes.push(b'0' + self.indicator_count % 10);
        bytes.push(b'0' + self.subfield_code_count % 10);
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        for c in [
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
        ] {
            bytes.push(ascii_byte(c)?);
        }

        let reserved_bytes = self.reserved.as_bytes();
        if reserved_bytes.len() != 4 {
            return Err(MarcError::InvalidLeader(format!(
                "Reserved field must be 4 characters, got {}",
                reserved_bytes.len()
            )));
        }
        bytes.extend_from_slice(reserved_bytes);

        Ok(bytes)
    }
}

fn count_or_default(byte: u8) -> u8 {
    if byte.is_ascii_digit() {
        byte - b'0'
    } else {
        2
    }
}

fn ascii_byte(c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| MarcError::InvalidLeader(format!("Non-ASCII leader value '{c}'")))
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<u32> {
    if bytes.len() != 5 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(MarcError::InvalidLeader(format!(
            "Invalid numeric field: '{}'",
            String::from_utf8_lossy(bytes)
        )));
    }
    Ok(bytes
        .iter()
        .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0')))
}
