//! Persisted form records.
//!
//! A record carries the form header and one typed point blob. Blobs are
//! little-endian `f32`/`i32` fields laid out per shape kind; uuids take 16
//! raw bytes.

use crate::forms::{
    Brush, BrushPoint, Circle, Ellipse, EllipseFeather, Form, FormId, Gradient,
    GradientProfile, Group, GroupMember, Path, PathPoint, PointState, Shape, ShapeKind,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Record type flags.
pub struct KindBits;

impl KindBits {
    pub const CIRCLE: u32 = 1;
    pub const PATH: u32 = 2;
    pub const GROUP: u32 = 4;
    pub const CLONE: u32 = 8;
    pub const GRADIENT: u32 = 16;
    pub const ELLIPSE: u32 = 32;
    pub const BRUSH: u32 = 64;
}

const CIRCLE_SIZE: usize = 16;
const ELLIPSE_SIZE: usize = 28;
const PATH_SIZE: usize = 36;
const BRUSH_SIZE: usize = 44;
const GRADIENT_SIZE: usize = 28;
const GROUP_SIZE: usize = 40;

/// Stored control coordinate meaning "derive from the neighbours".
const AUTO_CTRL: f32 = -1.0;

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("Point blob truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Unknown form kind bits: {0:#x}")]
    UnknownKind(u32),
    #[error("Point count {count} does not match a {kind} record")]
    CountMismatch { kind: &'static str, count: usize },
}

/// One persisted form, as exchanged with a mask store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub image_id: i64,
    pub form_id: FormId,
    pub kind: u32,
    pub name: String,
    pub version: u32,
    pub source: [f32; 2],
    pub blob: Vec<u8>,
    pub point_count: usize,
}

fn kind_bits(kind: ShapeKind) -> u32 {
    match kind {
        ShapeKind::Circle => KindBits::CIRCLE,
        ShapeKind::Path => KindBits::PATH,
        ShapeKind::Group => KindBits::GROUP,
        ShapeKind::Gradient => KindBits::GRADIENT,
        ShapeKind::Ellipse => KindBits::ELLIPSE,
        ShapeKind::Brush => KindBits::BRUSH,
    }
}

fn shape_kind(bits: u32) -> Result<ShapeKind, RecordError> {
    let bits = bits & !KindBits::CLONE;
    Ok(match bits {
        KindBits::CIRCLE => ShapeKind::Circle,
        KindBits::PATH => ShapeKind::Path,
        KindBits::GROUP => ShapeKind::Group,
        KindBits::GRADIENT => ShapeKind::Gradient,
        KindBits::ELLIPSE => ShapeKind::Ellipse,
        KindBits::BRUSH => ShapeKind::Brush,
        other => return Err(RecordError::UnknownKind(other)),
    })
}

fn point_size(kind: ShapeKind) -> usize {
    match kind {
        ShapeKind::Circle => CIRCLE_SIZE,
        ShapeKind::Ellipse => ELLIPSE_SIZE,
        ShapeKind::Path => PATH_SIZE,
        ShapeKind::Brush => BRUSH_SIZE,
        ShapeKind::Gradient => GRADIENT_SIZE,
        ShapeKind::Group => GROUP_SIZE,
    }
}

#[derive(Default)]
struct BlobWriter {
    bytes: Vec<u8>,
}

impl BlobWriter {
    fn f32(&mut self, v: f64) {
        self.bytes.extend_from_slice(&(v as f32).to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn point(&mut self, p: Point) {
        self.f32(p.x);
        self.f32(p.y);
    }

    fn ctrl(&mut self, p: Option<Point>) {
        match p {
            Some(p) => self.point(p),
            None => {
                self.bytes.extend_from_slice(&AUTO_CTRL.to_le_bytes());
                self.bytes.extend_from_slice(&AUTO_CTRL.to_le_bytes());
            }
        }
    }

    fn uuid(&mut self, id: Uuid) {
        self.bytes.extend_from_slice(id.as_bytes());
    }
}

/// Cursor over a blob whose length was checked up front.
struct BlobReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], RecordError> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or(RecordError::Truncated {
            expected: end,
            actual: self.bytes.len(),
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn f32(&mut self) -> Result<f64, RecordError> {
        Ok(f32::from_le_bytes(self.take()?) as f64)
    }

    fn i32(&mut self) -> Result<i32, RecordError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn point(&mut self) -> Result<Point, RecordError> {
        Ok(Point::new(self.f32()?, self.f32()?))
    }

    fn ctrl(&mut self) -> Result<Option<Point>, RecordError> {
        let p = self.point()?;
        let auto = AUTO_CTRL as f64;
        Ok(if p.x == auto && p.y == auto { None } else { Some(p) })
    }

    fn uuid(&mut self) -> Result<Uuid, RecordError> {
        Ok(Uuid::from_bytes(self.take()?))
    }
}

impl FormRecord {
    /// Encode a form for storage under `image_id`.
    pub fn encode(form: &Form, image_id: i64) -> Self {
        let mut w = BlobWriter::default();
        match &form.shape {
            Shape::Circle(c) => {
                w.point(c.center);
                w.f32(c.radius);
                w.f32(c.border);
            }
            Shape::Ellipse(e) => {
                w.point(e.center);
                w.f32(e.radius_a);
                w.f32(e.radius_b);
                w.f32(e.rotation);
                w.f32(e.border);
                w.i32(match e.feather {
                    EllipseFeather::Equidistant => 0,
                    EllipseFeather::Proportional => 1,
                });
            }
            Shape::Path(path) => {
                for p in &path.points {
                    w.point(p.corner);
                    w.ctrl(p.ctrl1);
                    w.ctrl(p.ctrl2);
                    w.f32(p.border[0]);
                    w.f32(p.border[1]);
                    w.i32(p.state.to_bits());
                }
            }
            Shape::Brush(brush) => {
                for p in &brush.points {
                    w.point(p.corner);
                    w.ctrl(p.ctrl1);
                    w.ctrl(p.ctrl2);
                    w.f32(p.border[0]);
                    w.f32(p.border[1]);
                    w.f32(p.density);
                    w.f32(p.hardness);
                    w.i32(p.state.to_bits());
                }
            }
            Shape::Gradient(g) => {
                w.point(g.anchor);
                w.f32(g.rotation);
                w.f32(g.compression);
                w.f32(g.steepness);
                w.f32(g.curvature);
                w.i32(g.profile.to_bits());
            }
            Shape::Group(group) => {
                for m in &group.members {
                    w.uuid(m.form_id);
                    w.uuid(m.parent_id);
                    w.i32(m.state_bits());
                    w.f32(m.opacity);
                }
            }
        }

        let mut kind = kind_bits(form.kind());
        if form.clone {
            kind |= KindBits::CLONE;
        }
        Self {
            image_id,
            form_id: form.id(),
            kind,
            name: form.name.clone(),
            version: form.version,
            source: [form.source.x as f32, form.source.y as f32],
            blob: w.bytes,
            point_count: form.shape.point_count(),
        }
    }

    /// Rebuild the form this record describes.
    pub fn decode(&self) -> Result<Form, RecordError> {
        let kind = shape_kind(self.kind)?;
        let single = matches!(kind, ShapeKind::Circle | ShapeKind::Ellipse | ShapeKind::Gradient);
        if single && self.point_count != 1 {
            return Err(RecordError::CountMismatch {
                kind: kind.name(),
                count: self.point_count,
            });
        }
        let expected = point_size(kind)
            .checked_mul(self.point_count)
            .ok_or(RecordError::CountMismatch {
                kind: kind.name(),
                count: self.point_count,
            })?;
        if self.blob.len() < expected {
            return Err(RecordError::Truncated {
                expected,
                actual: self.blob.len(),
            });
        }
        if self.blob.len() != expected {
            return Err(RecordError::CountMismatch {
                kind: kind.name(),
                count: self.point_count,
            });
        }

        let mut r = BlobReader::new(&self.blob);
        let shape = match kind {
            ShapeKind::Circle => {
                let center = r.point()?;
                let radius = r.f32()?;
                let border = r.f32()?;
                Shape::Circle(Circle::new(center, radius, border))
            }
            ShapeKind::Ellipse => Shape::Ellipse(Ellipse {
                center: r.point()?,
                radius_a: r.f32()?,
                radius_b: r.f32()?,
                rotation: r.f32()?,
                border: r.f32()?,
                feather: if r.i32()? == 0 {
                    EllipseFeather::Equidistant
                } else {
                    EllipseFeather::Proportional
                },
            }),
            ShapeKind::Path => {
                let mut points = Vec::with_capacity(self.point_count);
                for _ in 0..self.point_count {
                    points.push(PathPoint {
                        corner: r.point()?,
                        ctrl1: r.ctrl()?,
                        ctrl2: r.ctrl()?,
                        border: [r.f32()?, r.f32()?],
                        state: PointState::from_bits(r.i32()?),
                    });
                }
                Shape::Path(Path::new(points))
            }
            ShapeKind::Brush => {
                let mut points = Vec::with_capacity(self.point_count);
                for _ in 0..self.point_count {
                    let corner = r.point()?;
                    let ctrl1 = r.ctrl()?;
                    let ctrl2 = r.ctrl()?;
                    let border = [r.f32()?, r.f32()?];
                    let density = r.f32()?;
                    let hardness = r.f32()?;
                    points.push(BrushPoint {
                        corner,
                        ctrl1,
                        ctrl2,
                        border,
                        hardness,
                        density,
                        state: PointState::from_bits(r.i32()?),
                    });
                }
                Shape::Brush(Brush::new(points))
            }
            ShapeKind::Gradient => Shape::Gradient(Gradient {
                anchor: r.point()?,
                rotation: r.f32()?,
                compression: r.f32()?,
                steepness: r.f32()?,
                curvature: r.f32()?,
                profile: GradientProfile::from_bits(r.i32()?),
            }),
            ShapeKind::Group => {
                let mut members = Vec::with_capacity(self.point_count);
                for _ in 0..self.point_count {
                    let form_id = r.uuid()?;
                    let parent_id = r.uuid()?;
                    let bits = r.i32()?;
                    let opacity = r.f32()?;
                    let mut member = GroupMember::new(form_id, parent_id, opacity);
                    member.set_state_bits(bits);
                    members.push(member);
                }
                Shape::Group(Group::new(members))
            }
        };

        Ok(Form::reconstruct(
            self.form_id,
            self.name.clone(),
            self.version,
            Point::new(self.source[0] as f64, self.source[1] as f64),
            self.kind & KindBits::CLONE != 0,
            shape,
        ))
    }
}
