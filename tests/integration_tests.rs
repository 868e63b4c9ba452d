//! Integration tests for the libsys-marc library

mod common;

use common::{
    create_test_leader, create_vendor_record, into_marc8, malformed_unit, read_ids,
    set_first_indicator, to_marc_bytes, write_vendor_file,
};
use libsys_marc::{
    batch_file, pipeline, transform, Field, MarcReader, MarcWriter, PipelineConfig, Record,
    TransformRules,
};
use std::io::Cursor;

#[test]
fn test_write_read_round_trip() {
    let original = create_vendor_record("ocm12345");
    let bytes = to_marc_bytes(std::slice::from_ref(&original));

    let mut reader = MarcReader::new(Cursor::new(bytes));
    let record = reader.read_record().expect("Failed to read record");
    let record = record.expect("No record found");

    assert_eq!(record.fields, original.fields);
    assert_eq!(record.leader.character_coding, 'a');
    assert_eq!(record.leader.record_type, 'a');
    assert!(reader.read_record().unwrap().is_none());
}

#[test]
fn test_utf8_round_trip() {
    let mut record = Record::new(create_test_leader());
    record.add_field(
        Field::builder("245", '1', '0')
            .subfield_str('a', "Cień mgły / Über Straße 東京")
            .build(),
    );
    let bytes = to_marc_bytes(std::slice::from_ref(&record));
    let read = MarcReader::new(Cursor::new(bytes))
        .read_record()
        .unwrap()
        .unwrap();
    assert_eq!(
        read.get_field("245").unwrap().get_subfield('a'),
        Some("Cień mgły / Über Straße 東京")
    );
}

#[test]
fn test_marc8_leader_rewritten_as_utf8() {
    let mut leader = create_test_leader();
    leader.character_coding = ' ';
    let mut record = Record::new(leader);
    record.add_control_field_str("001", "m8");

    let bytes = to_marc_bytes(std::slice::from_ref(&record));
    assert_eq!(bytes[9], b'a');
}

#[test]
fn test_reader_continues_past_malformed_record() {
    let mut bytes = to_marc_bytes(&[create_vendor_record("a")]);
    bytes.extend(malformed_unit());
    bytes.extend(to_marc_bytes(&[create_vendor_record("b")]));

    let mut reader = MarcReader::new(Cursor::new(bytes));
    let items: Vec<_> = reader.by_ref().map(|item| item.unwrap()).collect();

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    let bad = items[1].as_ref().unwrap_err();
    assert_eq!(bad.index, 1);
    assert_eq!(bad.chunk, malformed_unit());
    assert_eq!(
        items[2].as_ref().unwrap().get_control_field("001"),
        Some("b")
    );
    assert_eq!(reader.records_read(), 2);
    assert_eq!(reader.errors_seen(), 1);
}

#[test]
fn test_batching_sizes_and_order() {
    let dir = tempfile::tempdir().unwrap();
    write_vendor_file(dir.path(), "vendor.mrc", 7);

    let names = batch_file(dir.path(), "vendor.mrc", 3).unwrap();
    assert_eq!(names, vec!["vendor_1.mrc", "vendor_2.mrc", "vendor_3.mrc"]);

    let sizes: Vec<usize> = names
        .iter()
        .map(|n| read_ids(&dir.path().join(n)).len())
        .collect();
    assert_eq!(sizes, vec![3, 3, 1]);

    let ids: Vec<String> = names
        .iter()
        .flat_map(|n| read_ids(&dir.path().join(n)))
        .collect();
    let expected: Vec<String> = (0..7).map(|i| format!("rec{i}")).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_batching_exact_multiple() {
    let dir = tempfile::tempdir().unwrap();
    write_vendor_file(dir.path(), "order.ord", 4);
    let names = batch_file(dir.path(), "order.ord", 2).unwrap();
    assert_eq!(names, vec!["order_1.ord", "order_2.ord"]);
}

#[test]
fn test_batching_excludes_decode_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = Vec::new();
    for i in 0..3 {
        bytes.extend(to_marc_bytes(&[create_vendor_record(&format!("rec{i}"))]));
        bytes.extend(malformed_unit());
    }
    std::fs::write(dir.path().join("mixed.mrc"), &bytes).unwrap();

    let names = batch_file(dir.path(), "mixed.mrc", 2).unwrap();
    assert_eq!(names, vec!["mixed_1.mrc", "mixed_2.mrc"]);
    assert_eq!(read_ids(&dir.path().join("mixed_1.mrc")), vec!["rec0", "rec1"]);
    assert_eq!(read_ids(&dir.path().join("mixed_2.mrc")), vec!["rec2"]);
}

/// Three records, the middle one carrying a non-ASCII first indicator.
fn write_bad_indicator_file(dir: &std::path::Path, name: &str) {
    let mut bytes = to_marc_bytes(&[create_vendor_record("rec0")]);
    let mut middle = to_marc_bytes(&[create_vendor_record("rec1")]);
    set_first_indicator(&mut middle, "245", 0xA0);
    bytes.extend(middle);
    bytes.extend(to_marc_bytes(&[create_vendor_record("rec2")]));
    std::fs::write(dir.join(name), &bytes).unwrap();
}

#[test]
fn test_non_ascii_indicator_skips_only_that_record() {
    let dir = tempfile::tempdir().unwrap();
    write_bad_indicator_file(dir.path(), "vendor.mrc");

    let items: Vec<_> = MarcReader::new(std::fs::File::open(dir.path().join("vendor.mrc")).unwrap())
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1].as_ref().unwrap_err().index, 1);

    let names = batch_file(dir.path(), "vendor.mrc", 10).unwrap();
    assert_eq!(names, vec!["vendor_1.mrc"]);
    assert_eq!(read_ids(&dir.path().join("vendor_1.mrc")), vec!["rec0", "rec2"]);
}

#[test]
fn test_non_ascii_indicator_does_not_abort_pipeline_steps() {
    let dir = tempfile::tempdir().unwrap();
    write_bad_indicator_file(dir.path(), "filter.mrc");
    let outcome = pipeline::filter_fields(&dir.path().join("filter.mrc"), &["905"]).unwrap();
    assert_eq!(outcome.records_written, 2);
    assert_eq!(outcome.decode_errors, 1);
    assert_eq!(read_ids(&dir.path().join("filter.mrc")), vec!["rec0", "rec2"]);

    write_bad_indicator_file(dir.path(), "process.mrc");
    let outcome =
        pipeline::process_file(&dir.path().join("process.mrc"), &TransformRules::default()).unwrap();
    assert_eq!(outcome.records_written, 2);
    assert_eq!(outcome.decode_errors, 1);
    assert_eq!(read_ids(&outcome.output), vec!["rec0", "rec2"]);
}

#[test]
fn test_marc8_record_batched_as_utf8() {
    let dir = tempfile::tempdir().unwrap();
    let mut record = Record::new(create_test_leader());
    record.add_control_field_str("001", "m8");
    record.add_field(Field::builder("245", '1', '0').subfield_str('a', "Caf~e").build());
    let mut bytes = to_marc_bytes(&[record]);
    into_marc8(&mut bytes, b'~', 0xE2);
    std::fs::write(dir.path().join("legacy.mrc"), &bytes).unwrap();

    let names = batch_file(dir.path(), "legacy.mrc", 5).unwrap();
    let out = std::fs::read(dir.path().join(&names[0])).unwrap();
    assert_eq!(out[9], b'a');
    let record = MarcReader::new(Cursor::new(out)).read_record().unwrap().unwrap();
    assert_eq!(
        record.get_field("245").unwrap().get_subfield('a'),
        Some("Caf\u{e9}")
    );
}

#[test]
fn test_pragmatic_programmer_001_to_035() {
    let rules = TransformRules::from_json_str(
        r#"{"change_fields": [{"from": "001", "to": "035"}]}"#,
    )
    .unwrap();
    let record = transform::process_owned(create_vendor_record("gls_0987654321"), &rules);

    assert!(record.get_control_field("001").is_none());
    assert_eq!(
        record.get_field("035").unwrap().get_subfield('a'),
        Some("gls_0987654321")
    );
}

#[test]
fn test_marcit_brief_record_rule() {
    let rules = TransformRules::from_json_str(
        r#"{"add_fields": [{
            "tag": "590",
            "subfields": [{"code": "a", "value": "MARCit brief record"}],
            "unless": {"tag": "035", "subfields": [{"code": "a", "value": "OCoLC"}]}
        }]}"#,
    )
    .unwrap();

    let mut with_oclc = create_vendor_record("x");
    with_oclc.add_field(
        Field::builder("035", ' ', ' ')
            .subfield_str('a', "OCoLC-12345")
            .build(),
    );
    transform::process(&mut with_oclc, &rules);
    assert!(!with_oclc.has_field("590"));

    let mut without = create_vendor_record("y");
    transform::process(&mut without, &rules);
    assert_eq!(
        without.get_field("590").unwrap().get_subfield('a'),
        Some("MARCit brief record")
    );
}

#[test]
fn test_vendor_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_vendor_file(dir.path(), "order.mrc", 5);
    let config = PipelineConfig::from_json_str(
        r#"{
            "max_records": 2,
            "rules": {
                "delete_marc": ["650"],
                "change_marc": [{"from": "001", "to": "035"}]
            }
        }"#,
    )
    .unwrap();

    let names = pipeline::run_file(dir.path(), "order.mrc", &config).unwrap();
    assert_eq!(names.len(), 3);

    let file = std::fs::File::open(dir.path().join(&names[0])).unwrap();
    let record = MarcReader::new(file).read_record().unwrap().unwrap();
    let tags: Vec<&str> = record.fields().map(|f| f.tag.as_str()).collect();
    assert_eq!(tags, vec!["035", "008", "245"]);
    assert_eq!(
        record.get_field("035").unwrap().get_subfield('a'),
        Some("rec0")
    );
}

#[test]
fn test_writer_rejects_oversized_field() {
    let mut record = Record::new(create_test_leader());
    record.add_field(
        Field::builder("500", ' ', ' ')
            .subfield('a', "x".repeat(10_000))
            .build(),
    );
    let mut buffer = Vec::new();
    let mut writer = MarcWriter::new(&mut buffer);
    assert!(writer.write_record(&record).is_err());
    assert_eq!(writer.records_written(), 0);
}
