//! Shared fixtures: sample types with hand-written serializer functions,
//! the way user code drives the engine.
#![allow(dead_code)] // each test binary uses its own subset

use hris::{Channel, ChannelMode, ModeFlags, Result, Serialize, ValueRef};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

pub fn serialize_point(s: &mut Serialize, name: &str, p: &mut Point) -> Result<()> {
    s.begin_type(name, "Point")?;
    s.serialize("x", &mut ValueRef::I32(&mut p.x))?;
    s.serialize("y", &mut ValueRef::I32(&mut p.y))?;
    s.end_type()
}

/// A struct exercising every leaf family: nested struct, scalar array,
/// string, floats and a char-kind field.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub origin: Point,
    pub weights: [f64; 4],
    pub label: String,
    pub gain: f32,
    pub status: u8,
    pub ticks: u64,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            origin: Point::default(),
            weights: [0.0; 4],
            label: String::new(),
            gain: 0.0,
            status: 0,
            ticks: 0,
        }
    }
}

pub fn sample_pose() -> Pose {
    Pose {
        origin: Point { x: -7, y: 2048 },
        weights: [0.5, 1.25, -3.75, 42.0],
        label: "sensor head".to_string(),
        gain: 2.5,
        status: 200,
        ticks: 9_876_543_210,
    }
}

pub fn serialize_pose(s: &mut Serialize, name: &str, p: &mut Pose) -> Result<()> {
    s.begin_type(name, "Pose")?;
    serialize_point(s, "origin", &mut p.origin)?;
    s.serialize("weights", &mut ValueRef::F64Array(&mut p.weights))?;
    s.serialize("label", &mut ValueRef::Str(&mut p.label))?;
    s.serialize("gain", &mut ValueRef::F32(&mut p.gain))?;
    s.serialize("status", &mut ValueRef::U8(&mut p.status))?;
    s.serialize("ticks", &mut ValueRef::U64(&mut p.ticks))?;
    s.end_type()
}

/// A struct array carrier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub id: i32,
    pub points: Vec<Point>,
}

pub fn sample_path() -> Path {
    Path {
        id: 9,
        points: vec![
            Point { x: 1, y: 2 },
            Point { x: 3, y: 4 },
            Point { x: 5, y: 6 },
        ],
    }
}

pub fn serialize_path(s: &mut Serialize, name: &str, p: &mut Path) -> Result<()> {
    let len = p.points.len();
    s.begin_type(name, "Path")?;
    s.serialize("id", &mut ValueRef::I32(&mut p.id))?;
    s.begin_struct_array("points", "Point", len)?;
    for (idx, point) in p.points.iter_mut().enumerate() {
        s.begin_struct_array_separator("points", idx, len)?;
        serialize_point(s, "points", point)?;
        s.end_struct_array_separator("points", idx, len)?;
    }
    s.end_struct_array()?;
    s.end_type()
}

pub fn mem_channel(size: usize) -> Channel {
    Channel::open(&format!("Mem://{size}"), ChannelMode::RW, 0).unwrap()
}

/// Flip an engine that just wrote into its memory channel around for
/// reading from the start.
pub fn rewind_for_read(s: &mut Serialize, extra_flags: ModeFlags) {
    let mut ch = s.take_stream().unwrap();
    ch.rewind().unwrap();
    s.set_stream(ch);
    s.set_mode(ModeFlags::READ | extra_flags).unwrap();
}

/// Written bytes of the engine's memory channel.
pub fn stream_text(s: &mut Serialize) -> String {
    let ch = s.stream_mut().unwrap();
    String::from_utf8_lossy(ch.contents().unwrap()).into_owned()
}
