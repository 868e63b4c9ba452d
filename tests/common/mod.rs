//! Common test helpers and utilities shared across test suite.

#![allow(dead_code)]

use libsys_marc::{write_records_atomic, Field, Leader, Record};
use std::path::{Path, PathBuf};

/// Creates a default leader for test records.
pub fn create_test_leader() -> Leader {
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
        cataloging_form: 'a',
        multipart_level: ' ',
        reserved: "4500".to_string(),
    }
}

/// Creates a vendor-style brief record with local 9XX fields.
pub fn create_vendor_record(id: &str) -> Record {
    Record::builder(create_test_leader())
        .control_field_str("001", id)
        .control_field_str("008", "230101s2023    nyu           000 0 eng d")
        .field(
            Field::builder("245", '1', '0')
                .subfield_str('a', "The pragmatic programmer :")
                .subfield_str('b', "your journey to mastery /")
                .subfield_str('c', "David Thomas, Andrew Hunt.")
                .build(),
        )
        .field(
            Field::builder("650", ' ', '0')
                .subfield_str('a', "Computer programming.")
                .build(),
        )
        .field(Field::builder("905", ' ', ' ').subfield_str('a', "vendor note").build())
        .field(Field::builder("920", ' ', ' ').subfield_str('a', "fund code").build())
        .field(Field::builder("986", ' ', ' ').subfield_str('a', "local").build())
        .build()
}

/// Writes `count` vendor records to `dir/name`, ids `rec0`, `rec1`, ...
pub fn write_vendor_file(dir: &Path, name: &str, count: usize) -> PathBuf {
    let records: Vec<Record> = (0..count)
        .map(|i| create_vendor_record(&format!("rec{i}")))
        .collect();
    let path = dir.join(name);
    write_records_atomic(&path, &records).expect("Failed to write fixture");
    path
}

/// Serializes records to ISO 2709 bytes.
pub fn to_marc_bytes(records: &[Record]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = libsys_marc::MarcWriter::new(&mut buffer);
        for record in records {
            writer.write_record(record).expect("Failed to write record");
        }
        writer.finish().expect("Failed to finish writer");
    }
    buffer
}

/// A byte chunk that frames as one record unit but cannot be decoded.
pub fn malformed_unit() -> Vec<u8> {
    let mut bytes = b"00042nam  2200037   4500garbage".to_vec();
    bytes.push(0x1D);
    bytes
}

/// Control numbers (`001`) of every record in a MARC file, in order.
pub fn read_ids(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("Could not open test file");
    libsys_marc::MarcReader::new(file)
        .map(|item| {
            let record = item.expect("I/O error").expect("Decode error");
            record.get_control_field("001").unwrap_or_default().to_string()
        })
        .collect()
}

/// Position in `bytes` of the first data byte of the first field tagged `tag`.
fn field_start(bytes: &[u8], tag: &str) -> usize {
    let digits = |range: std::ops::Range<usize>| -> usize {
        std::str::from_utf8(&bytes[range]).unwrap().parse().unwrap()
    };
    let base_address = digits(12..17);
    let entry = bytes[24..base_address - 1]
        .chunks_exact(12)
        .position(|entry| &entry[0..3] == tag.as_bytes())
        .expect("tag not in directory");
    let entry_start = 24 + entry * 12;
    base_address + digits(entry_start + 7..entry_start + 12)
}

/// Overwrites the first indicator of `tag` in one serialized record.
pub fn set_first_indicator(bytes: &mut [u8], tag: &str, byte: u8) {
    let pos = field_start(bytes, tag);
    bytes[pos] = byte;
}

/// Flags one serialized record as MARC-8 and swaps the first `marker` byte
/// in its data for `replacement`.
pub fn into_marc8(bytes: &mut [u8], marker: u8, replacement: u8) {
    bytes[9] = b' ';
    let pos = bytes[24..]
        .iter()
        .position(|&b| b == marker)
        .expect("marker not found")
        + 24;
    bytes[pos] = replacement;
}
