//! End-to-end behaviours pinned down to the byte level.

mod common;

use common::*;
use hris::{serializer, Channel, ChannelMode, ModeFlags, ScanArg, SerializeError, ValueRef};

/// Binary round trip of a small struct: exact little-endian body bytes.
#[test]
fn binary_point_little_endian_wire_bytes() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(256));
    s.set_format("Binary", Some("LITTLE_ENDIAN")).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();

    let mut p = Point { x: 123, y: 456 };
    serialize_point(&mut s, "point", &mut p).unwrap();

    let header_len = s.header_size() as usize;
    {
        let ch = s.stream_mut().unwrap();
        let bytes = ch.contents().unwrap();
        let header = std::str::from_utf8(&bytes[..header_len]).unwrap();
        assert!(header.starts_with("HRIS-2.0 type = 'Point' name = point objSize = "));
        assert!(header.contains("format = Binary opts = 'LITTLE_ENDIAN'"));
        assert!(header.ends_with('\n'));
        assert_eq!(
            &bytes[header_len..],
            &[0x7B, 0x00, 0x00, 0x00, 0xC8, 0x01, 0x00, 0x00],
            "little-endian body of x=123, y=456"
        );
    }

    rewind_for_read(&mut s, ModeFlags::empty());
    let mut restored = Point::default();
    serialize_point(&mut s, "point", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 123, y: 456 });
}

/// Json with the header disabled produces exactly the bare document.
#[test]
fn json_without_header_is_plain_json() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(256));
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE | ModeFlags::NOHEADER).unwrap();

    let mut p = Point { x: 123, y: 456 };
    serialize_point(&mut s, "Point", &mut p).unwrap();

    let text = stream_text(&mut s);
    assert_eq!(
        text,
        "{\n  \"Point\": {\n    \"x\": 123,\n    \"y\": 456\n  }\n}\n"
    );
    // A JSON parser agrees.
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["Point"]["x"], 123);
    assert_eq!(parsed["Point"]["y"], 456);

    rewind_for_read(&mut s, ModeFlags::NOHEADER);
    let mut restored = Point::default();
    serialize_point(&mut s, "Point", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 123, y: 456 });
}

/// With the header enabled, Json emits valid framing the reader skips.
#[test]
fn json_with_header_round_trips() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(512));
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();

    let mut p = Point { x: 5, y: -6 };
    serialize_point(&mut s, "p", &mut p).unwrap();

    let text = stream_text(&mut s);
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("HRIS-2.0 "));
    assert_eq!(lines.next().unwrap(), ",");

    rewind_for_read(&mut s, ModeFlags::empty());
    let mut restored = Point::default();
    serialize_point(&mut s, "p", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 5, y: -6 });
}

/// Auto-calc patches the 10-column size field inside the already
/// emitted header, through the write buffer.
#[test]
fn auto_calc_patches_size_in_buffered_header() {
    let mut s = serializer().unwrap();
    let mut ch = mem_channel(4096);
    ch.set_write_buffering(true, true);
    s.set_stream(ch);
    s.set_format("Ascii", None).unwrap();
    s.set_mode(ModeFlags::WRITE | ModeFlags::AUTOCALC).unwrap();

    let mut p = Point { x: 123, y: 456 };
    serialize_point(&mut s, "point", &mut p).unwrap();

    let body_len = s.payload_size();
    assert!(body_len > 0);
    let text = stream_text(&mut s);
    let expected = format!("objSize = {:>10} ", body_len);
    assert!(
        text.contains(&expected),
        "header not patched: {text:?} (wanted {expected:?})"
    );

    rewind_for_read(&mut s, ModeFlags::empty());
    let mut restored = Point::default();
    serialize_point(&mut s, "point", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 123, y: 456 });
    assert_eq!(s.payload_size(), body_len);
}

/// Without auto-calc the emitted size field stays zero.
#[test]
fn size_field_stays_zero_without_auto_calc() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Ascii", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut p = Point { x: 1, y: 2 };
    serialize_point(&mut s, "point", &mut p).unwrap();
    let text = stream_text(&mut s);
    assert!(text.contains(&format!("objSize = {:>10} ", 0)), "{text:?}");
}

/// Loop stream mode: every object lands in the same byte range; a loop
/// reader sees the last one again and again.
#[test]
fn loop_mode_reuses_one_object_slot() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(4096));
    s.set_format("Matlab", None).unwrap();
    s.set_mode(ModeFlags::WRITE | ModeFlags::LOOP).unwrap();

    for (x, y) in [(7, 8), (9, 10), (11, 12)] {
        let mut p = Point { x, y };
        serialize_point(&mut s, "p", &mut p).unwrap();
    }

    let text = stream_text(&mut s);
    assert!(text.contains("p.x = 11 ;"), "{text:?}");
    assert!(!text.contains("p.x = 7 ;"), "first object must be overwritten: {text:?}");

    rewind_for_read(&mut s, ModeFlags::LOOP);
    for _ in 0..3 {
        let mut restored = Point::default();
        serialize_point(&mut s, "p", &mut restored).unwrap();
        assert_eq!(restored, Point { x: 11, y: 12 });
    }
}

/// Unget across whitespace-skipping scanf: after `%d ` on `"42 x"` the
/// next byte is `x`.
#[test]
fn scanf_whitespace_skip_pushes_back_next_byte() {
    let mut ch = mem_channel(64);
    ch.write_block(b"42 x").unwrap();
    ch.rewind().unwrap();

    let mut n = 0i32;
    ch.scanf("%d ", &mut [ScanArg::I32(&mut n)]).unwrap();
    assert_eq!(n, 42);
    assert_eq!(ch.getc().unwrap(), Some(b'x'));
}

/// Endian mismatch: big-endian wire bytes restore correctly on a
/// little-endian host because the header names the byte order.
#[test]
fn big_endian_wire_round_trips_via_header_opts() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(256));
    s.set_format("Binary", Some("BIG_ENDIAN")).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();

    let mut v: u32 = 0x0102_0304;
    s.begin_type("word", "Word").unwrap();
    s.serialize("v", &mut ValueRef::U32(&mut v)).unwrap();
    s.end_type().unwrap();

    let header_len = s.header_size() as usize;
    {
        let ch = s.stream_mut().unwrap();
        let bytes = ch.contents().unwrap();
        assert_eq!(&bytes[header_len..], &[0x01, 0x02, 0x03, 0x04]);
    }

    rewind_for_read(&mut s, ModeFlags::empty());
    let mut restored: u32 = 0;
    s.begin_type("word", "Word").unwrap();
    s.serialize("v", &mut ValueRef::U32(&mut restored)).unwrap();
    s.end_type().unwrap();
    assert_eq!(restored, 0x0102_0304);
}

/// Flush stream mode drains the write buffer after each object.
#[test]
fn flush_mode_empties_the_write_buffer() {
    let mut s = serializer().unwrap();
    let mut ch = mem_channel(4096);
    ch.set_write_buffering(true, true);
    s.set_stream(ch);
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE | ModeFlags::FLUSH).unwrap();

    let mut p = Point { x: 3, y: 4 };
    serialize_point(&mut s, "p", &mut p).unwrap();
    assert_eq!(s.stream_mut().unwrap().write_buffered_bytes(), 0);
}

/// The reader follows the format named in the header, not the one the
/// caller selected.
#[test]
fn reader_switches_to_the_header_format() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Xml", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut p = Point { x: 10, y: 20 };
    serialize_point(&mut s, "p", &mut p).unwrap();

    rewind_for_read(&mut s, ModeFlags::empty());
    s.set_format("Json", None).unwrap(); // wrong on purpose
    let mut restored = Point::default();
    serialize_point(&mut s, "p", &mut restored).unwrap();
    assert_eq!(restored, Point { x: 10, y: 20 });
    assert_eq!(s.format_name(), Some("Xml"));
}

/// A channel closed mid-air surfaces as a channel error, not a panic.
#[test]
fn writing_into_a_closed_channel_fails_cleanly() {
    let mut s = serializer().unwrap();
    let mut ch = mem_channel(64);
    ch.close().unwrap();
    s.set_stream(ch);
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();

    let mut p = Point::default();
    let err = serialize_point(&mut s, "p", &mut p).unwrap_err();
    assert!(matches!(err, SerializeError::Channel(_)));
    assert!(s.is_error_occurred());
}

/// Reading an empty stream reports eof, distinguishable from bad input.
#[test]
fn reading_empty_stream_is_an_eof_unwind() {
    let mut s = serializer().unwrap();
    let mut ch = Channel::open("Mem://0", ChannelMode::RW, 0).unwrap();
    ch.rewind().unwrap();
    s.set_stream(ch);
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::READ).unwrap();

    let mut p = Point::default();
    let err = serialize_point(&mut s, "p", &mut p).unwrap_err();
    assert!(matches!(err, SerializeError::Eof));
    assert!(s.error_was_eof());
}
