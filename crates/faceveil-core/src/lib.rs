//! faceveil-core — Face overlay compositing engine.
//!
//! Composites a selectable target face onto an elliptical region of a
//! video frame: synthetic landmark geometry, masked scaled overlay,
//! edge feathering and naive skin-tone matching. No real detection —
//! the geometry generator always reports the same centered face.

pub mod compositor;
pub mod geometry;
pub mod surface;
pub mod target;

pub use compositor::{CompositorError, CompositorOptions, CompositorOptionsUpdate, FaceCompositor};
pub use geometry::{BoundingBox, FaceGeometry, Landmark};
pub use surface::{FrameSource, Surface};
pub use target::TargetFace;
