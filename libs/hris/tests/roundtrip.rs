//! Write/read round trips through every built-in format.

mod common;

use common::*;
use hris::{serializer, ModeFlags, ValueRef};

fn round_trip_pose(format: &str, opts: Option<&str>) -> Pose {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(4096));
    s.set_format(format, opts).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();

    let mut original = sample_pose();
    serialize_pose(&mut s, "pose", &mut original).unwrap();

    rewind_for_read(&mut s, ModeFlags::empty());
    let mut restored = Pose::default();
    serialize_pose(&mut s, "pose", &mut restored).unwrap();
    assert!(!s.is_error_occurred(), "{format}: error flag set after read");
    restored
}

#[test]
fn binary_round_trips_pose() {
    assert_eq!(round_trip_pose("Binary", Some("LITTLE_ENDIAN")), sample_pose());
    assert_eq!(round_trip_pose("Binary", Some("BIG_ENDIAN")), sample_pose());
}

#[test]
fn ascii_round_trips_pose() {
    assert_eq!(round_trip_pose("Ascii", None), sample_pose());
}

#[test]
fn ascii_with_type_round_trips_pose() {
    assert_eq!(round_trip_pose("Ascii", Some("WITH_TYPE=TRUE")), sample_pose());
}

#[test]
fn xml_round_trips_pose() {
    assert_eq!(round_trip_pose("Xml", None), sample_pose());
}

#[test]
fn matlab_round_trips_pose() {
    assert_eq!(round_trip_pose("Matlab", None), sample_pose());
}

#[test]
fn python_round_trips_pose() {
    assert_eq!(round_trip_pose("Python", None), sample_pose());
}

#[test]
fn python_dict_style_round_trips_pose() {
    assert_eq!(
        round_trip_pose(
            "Python",
            Some("type=AS_DICT arrayType=ARRAY_AS_DICT structArrayType=STRUCTARRAY_AS_DICT"),
        ),
        sample_pose()
    );
}

#[test]
fn python_tuple_no_key_round_trips_pose() {
    assert_eq!(
        round_trip_pose(
            "Python",
            Some("type=AS_TUPLE_NO_KEY arrayType=ARRAY_AS_LIST_NO_INDEX"),
        ),
        sample_pose()
    );
}

#[test]
fn json_round_trips_pose() {
    assert_eq!(round_trip_pose("Json", None), sample_pose());
}

fn round_trip_path(format: &str, opts: Option<&str>) -> Path {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(4096));
    s.set_format(format, opts).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();

    let mut original = sample_path();
    serialize_path(&mut s, "path", &mut original).unwrap();

    rewind_for_read(&mut s, ModeFlags::empty());
    let mut restored = Path {
        id: 0,
        points: vec![Point::default(); original.points.len()],
    };
    serialize_path(&mut s, "path", &mut restored).unwrap();
    assert!(!s.is_error_occurred(), "{format}: error flag set after read");
    restored
}

#[test]
fn struct_arrays_round_trip_in_every_text_format() {
    for format in ["Binary", "Ascii", "Xml", "Matlab", "Python", "Json"] {
        assert_eq!(round_trip_path(format, None), sample_path(), "{format}");
    }
}

#[test]
fn empty_string_round_trips() {
    for format in ["Binary", "Ascii", "Xml", "Python", "Json"] {
        let mut s = serializer().unwrap();
        s.set_stream(mem_channel(512));
        s.set_format(format, None).unwrap();
        s.set_mode(ModeFlags::WRITE).unwrap();

        let mut text = String::new();
        s.begin_type("holder", "Holder").unwrap();
        s.serialize("text", &mut ValueRef::Str(&mut text)).unwrap();
        s.end_type().unwrap();

        rewind_for_read(&mut s, ModeFlags::empty());
        let mut restored = "sentinel".to_string();
        s.begin_type("holder", "Holder").unwrap();
        s.serialize("text", &mut ValueRef::Str(&mut restored)).unwrap();
        s.end_type().unwrap();
        assert_eq!(restored, "", "{format}");
    }
}

#[test]
fn string_escapes_round_trip() {
    for format in ["Binary", "Ascii", "Xml", "Json"] {
        let mut s = serializer().unwrap();
        s.set_stream(mem_channel(512));
        s.set_format(format, None).unwrap();
        s.set_mode(ModeFlags::WRITE).unwrap();

        let mut text = "a \"quoted\" <tag> & back\\slash".to_string();
        let expected = text.clone();
        s.begin_type("holder", "Holder").unwrap();
        s.serialize("text", &mut ValueRef::Str(&mut text)).unwrap();
        s.end_type().unwrap();

        rewind_for_read(&mut s, ModeFlags::empty());
        let mut restored = String::new();
        s.begin_type("holder", "Holder").unwrap();
        s.serialize("text", &mut ValueRef::Str(&mut restored)).unwrap();
        s.end_type().unwrap();
        assert_eq!(restored, expected, "{format}");
    }
}

#[test]
fn char_kinds_round_trip_as_integer_codes() {
    for format in ["Ascii", "Xml", "Matlab", "Python", "Json"] {
        let mut s = serializer().unwrap();
        s.set_stream(mem_channel(512));
        s.set_format(format, None).unwrap();
        s.set_mode(ModeFlags::WRITE).unwrap();

        let mut c: u8 = b'A';
        let mut signed: i8 = -17;
        let mut raw = [b'x', 0, 255];
        s.begin_type("chars", "Chars").unwrap();
        s.serialize("c", &mut ValueRef::Char(&mut c)).unwrap();
        s.serialize("signed", &mut ValueRef::I8(&mut signed)).unwrap();
        s.serialize("raw", &mut ValueRef::U8Array(&mut raw)).unwrap();
        s.end_type().unwrap();

        if format == "Ascii" {
            let text = stream_text(&mut s);
            assert!(text.contains("c = 65;"), "{text}");
        }

        rewind_for_read(&mut s, ModeFlags::empty());
        let (mut c2, mut signed2, mut raw2) = (0u8, 0i8, [0u8; 3]);
        s.begin_type("chars", "Chars").unwrap();
        s.serialize("c", &mut ValueRef::Char(&mut c2)).unwrap();
        s.serialize("signed", &mut ValueRef::I8(&mut signed2)).unwrap();
        s.serialize("raw", &mut ValueRef::U8Array(&mut raw2)).unwrap();
        s.end_type().unwrap();
        assert_eq!((c2, signed2, raw2), (c, signed, raw), "{format}");
    }
}

#[test]
fn calc_mode_predicts_write_size() {
    for format in ["Binary", "Ascii", "Xml", "Matlab", "Python", "Json"] {
        let mut calc = serializer().unwrap();
        calc.set_format(format, None).unwrap();
        calc.set_mode(ModeFlags::CALC).unwrap();
        let mut pose = sample_pose();
        serialize_pose(&mut calc, "pose", &mut pose).unwrap();
        let predicted = calc.payload_size();

        let mut writer = serializer().unwrap();
        writer.set_stream(mem_channel(4096));
        writer.set_format(format, None).unwrap();
        writer.set_mode(ModeFlags::WRITE).unwrap();
        serialize_pose(&mut writer, "pose", &mut pose).unwrap();
        let actual = writer.payload_size();

        assert_eq!(predicted, actual, "{format}: calc disagrees with write");
    }
}

#[test]
fn two_objects_back_to_back_round_trip() {
    for format in ["Binary", "Ascii", "Xml", "Matlab", "Python", "Json"] {
        let mut s = serializer().unwrap();
        s.set_stream(mem_channel(4096));
        s.set_format(format, None).unwrap();
        s.set_mode(ModeFlags::WRITE).unwrap();

        let mut a = Point { x: 1, y: 2 };
        let mut b = Point { x: 30, y: 40 };
        serialize_point(&mut s, "a", &mut a).unwrap();
        serialize_point(&mut s, "b", &mut b).unwrap();

        rewind_for_read(&mut s, ModeFlags::empty());
        let (mut a2, mut b2) = (Point::default(), Point::default());
        serialize_point(&mut s, "a", &mut a2).unwrap();
        serialize_point(&mut s, "b", &mut b2).unwrap();
        assert_eq!((a2, b2), (a, b), "{format}");
    }
}

#[test]
fn empty_arrays_round_trip_in_every_format() {
    for format in ["Binary", "Ascii", "Xml", "Matlab", "Python", "Json"] {
        let mut s = serializer().unwrap();
        s.set_stream(mem_channel(512));
        s.set_format(format, None).unwrap();
        s.set_mode(ModeFlags::WRITE).unwrap();

        let mut none: [i32; 0] = [];
        let mut after = 5i32;
        s.begin_type("holder", "Holder").unwrap();
        s.serialize("none", &mut ValueRef::I32Array(&mut none)).unwrap();
        s.serialize("after", &mut ValueRef::I32(&mut after)).unwrap();
        s.end_type().unwrap();

        rewind_for_read(&mut s, ModeFlags::empty());
        let mut none2: [i32; 0] = [];
        let mut after2 = 0i32;
        s.begin_type("holder", "Holder").unwrap();
        s.serialize("none", &mut ValueRef::I32Array(&mut none2)).unwrap();
        s.serialize("after", &mut ValueRef::I32(&mut after2)).unwrap();
        s.end_type().unwrap();
        assert_eq!(after2, 5, "{format}");
        assert!(!s.is_error_occurred(), "{format}");
    }
}

#[test]
fn nesting_balances_to_zero_after_round_trip() {
    let mut s = serializer().unwrap();
    s.set_stream(mem_channel(1024));
    s.set_format("Json", None).unwrap();
    s.set_mode(ModeFlags::WRITE).unwrap();
    let mut pose = sample_pose();
    serialize_pose(&mut s, "pose", &mut pose).unwrap();
    // A second object is accepted, so the nesting closed at zero.
    serialize_pose(&mut s, "pose2", &mut pose).unwrap();
    assert!(!s.is_error_occurred());
}
