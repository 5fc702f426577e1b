//! MaskInk Core Library
//!
//! Vector mask forms, their sampling into pixel-space geometry, and the mask
//! document with its record and store layers.

pub mod context;
pub mod document;
pub mod error;
pub mod flatten;
pub mod forms;
pub mod geometry;
pub mod intersect;
pub mod record;
pub mod sampler;
pub mod simplify;
pub mod store;

pub use context::{AffineDistortion, DistortionPort, IdentityDistortion, MaskContext, MaskDefaults};
pub use document::{DocumentError, DocumentResult, MaskDocument};
pub use error::{MaskError, MaskResult};
pub use forms::{CombineOp, Form, FormId, GroupMember, Shape, ShapeKind, ShapeVisitor};
pub use geometry::{Coord, Payload, ShapeGeometry, point_in_border, point_in_form};
pub use record::{FormRecord, RecordError};
pub use sampler::{ShapeSampler, sample_form, sample_shape};
pub use simplify::{StrokeSample, simplify_brush};
pub use store::{FileMaskStore, MaskStore, MemoryMaskStore, StoreError, StoreResult};
