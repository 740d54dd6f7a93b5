//! Header codec laws: peek, size accounting, legacy v1 acceptance.

mod common;

use common::*;
use hris::{serializer, ModeFlags, SerializeError};

#[test]
fn peek_header_leaves_the_stream_position_unchanged() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Ascii", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut p = Point { x: 77, y: 88 };
    serialize_point(&mut s, "point", &mut p).unwrap();

    rewind_for_read(&mut s, ModeFlags::empty());
    let peeked = s.peek_header().unwrap();
    assert_eq!(peeked.type_tag, "Point");
    assert_eq!(peeked.name, "point");
    assert_eq!(peeked.format, "Ascii");
    assert_eq!(peeked.major, 2);

    let again = s.peek_header().unwrap();
    assert_eq!(again, peeked);

    // A full read still works from the same position.
    let mut restored = Point::default();
    serialize_point(&mut s, "point", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 77, y: 88 });
}

#[test]
fn header_plus_payload_is_total() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut pose = sample_pose();
    serialize_pose(&mut s, "pose", &mut pose).unwrap();

    let total_bytes = s.stream_mut().unwrap().contents().unwrap().len() as u64;
    assert_eq!(s.header_size() + s.payload_size(), s.total_size());
    assert_eq!(s.total_size(), total_bytes);
}

#[test]
fn payload_size_matches_the_byte_range_of_the_body() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Ascii", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut p = Point { x: 1, y: 2 };
    serialize_point(&mut s, "p", &mut p).unwrap();

    let header = s.header_size() as usize;
    let contents_len = s.stream_mut().unwrap().contents().unwrap().len();
    assert_eq!(s.payload_size() as usize, contents_len - header);
}

#[test]
fn legacy_v1_header_is_still_read() {
    // A v1.0 stream as an older writer would have produced it, with an
    // Ascii body.
    let body = "point =\n{\n  x = 31;\n  y = 64;\n}\n";
    let v1 = format!("HRIS-1.0 Point point {:>10} Ascii \n{body}", body.len());

    let mut ch = mem_channel(1024);
    ch.write_block(v1.as_bytes()).unwrap();
    ch.rewind().unwrap();

    let mut s = serializer().unwrap();
    s.set_stream(ch);
    s.set_mode(ModeFlags::READ).unwrap();
    let mut restored = Point::default();
    serialize_point(&mut s, "point", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 31, y: 64 });
    assert_eq!(s.header().major, 1);
}

#[test]
fn type_mismatch_fails_and_pends() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut p = Point { x: 0, y: 0 };
    serialize_point(&mut s, "p", &mut p).unwrap();

    rewind_for_read(&mut s, ModeFlags::empty());
    let err = s.begin_type("p", "NotAPoint").unwrap_err();
    assert!(matches!(err, SerializeError::HeaderMismatch { .. }));
    assert!(s.is_error_occurred());
    assert!(!s.error_was_eof());

    // Every further call short-circuits until the error is cleaned.
    let err = s.begin_type("p", "Point").unwrap_err();
    assert!(matches!(err, SerializeError::Pending));

    s.clean_error();
    s.stream_mut().unwrap().rewind().unwrap();
    let mut restored = Point::default();
    serialize_point(&mut s, "p", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 0, y: 0 });
}

#[test]
fn header_string_renders_the_current_header() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(512));
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut p = Point { x: 1, y: 1 };
    serialize_point(&mut s, "p", &mut p).unwrap();

    let rendered = s.header_string().unwrap();
    assert!(rendered.starts_with("HRIS-2.0 type = 'Point' name = p objSize = "));
    assert!(rendered.contains("format = Json"));
}

#[test]
fn unknown_format_in_header_falls_back_to_the_selected_one() {
    // Hand-craft a header naming a format this build does not carry,
    // with an Ascii body; the reader keeps its selected format.
    let body = "p =\n{\n  x = 4;\n  y = 5;\n}\n";
    let text = format!(
        "HRIS-2.0 type = 'Point' name = p objSize = {:>10} format = Yaml \n{body}",
        body.len()
    );
    let mut ch = mem_channel(1024);
    ch.write_block(text.as_bytes()).unwrap();
    ch.rewind().unwrap();

    let mut s = serializer().unwrap();
    s.set_stream(ch);
    s.set_format("Ascii", None).unwrap();
    s.set_mode(ModeFlags::READ).unwrap();
    let mut restored = Point::default();
    serialize_point(&mut s, "p", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 4, y: 5 });
}
