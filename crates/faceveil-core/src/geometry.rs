//! Synthetic face geometry.
//!
//! Produces a fixed-convention 468-point landmark set without looking
//! at any pixel data: the face is assumed centered at (0.5, 0.45) and
//! occupying a fixed fraction of the frame. Repeated calls return
//! bit-identical output.
//!
//! Landmark indices follow the MediaPipe FaceMesh convention so the
//! subsets below address the same points a real mesh would:
//!
//! - face oval: 36 indices around the jaw and forehead
//! - left / right eye: 6 indices each
//! - lips: 11 outer-lip indices
//! - nose tip: index 1

/// Total number of landmark slots.
pub const LANDMARK_COUNT: usize = 468;

/// Face outline (oval) indices, clockwise from the forehead.
pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Left eye ring indices.
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Right eye ring indices.
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Outer lip indices.
pub const LIPS: [usize; 11] = [61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291];

/// Nose tip index.
pub const NOSE_TIP: usize = 1;

/// Assumed face center in normalized frame coordinates.
const FACE_CENTER: (f32, f32) = (0.5, 0.45);
/// Assumed face width as a fraction of frame width.
const FACE_WIDTH: f32 = 0.35;
/// Assumed face height as a fraction of frame height.
const FACE_HEIGHT: f32 = 0.45;

/// Outline ellipse radii: 40% of face width, 45% of face height.
const OUTLINE_RX: f32 = 0.4 * FACE_WIDTH;
const OUTLINE_RY: f32 = 0.45 * FACE_HEIGHT;

/// Eye ring offsets from each eye anchor (small fixed hexagon).
const EYE_OFFSETS: [(f32, f32); 6] = [
    (-0.030, 0.000),
    (-0.015, -0.010),
    (0.015, -0.010),
    (0.030, 0.000),
    (0.015, 0.010),
    (-0.015, 0.010),
];

/// Outer lip offsets from the mouth anchor, left corner to right corner
/// along the lower lip.
const LIP_OFFSETS: [(f32, f32); 11] = [
    (-0.060, 0.000),
    (-0.048, 0.010),
    (-0.032, 0.016),
    (-0.016, 0.020),
    (0.000, 0.022),
    (0.016, 0.020),
    (0.032, 0.016),
    (0.048, 0.010),
    (0.060, 0.000),
    (0.030, -0.012),
    (-0.030, -0.012),
];

const LEFT_EYE_ANCHOR: (f32, f32) = (0.423, 0.396);
const RIGHT_EYE_ANCHOR: (f32, f32) = (0.577, 0.396);
const MOUTH_ANCHOR: (f32, f32) = (0.5, 0.531);
const NOSE_TIP_POINT: (f32, f32) = (0.5, 0.47);

/// One normalized landmark point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Axis-aligned face bounding box in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One synthetic detected face: 468 landmarks plus a bounding box,
/// all in [0, 1] coordinates relative to frame width/height.
/// Immutable once returned; regenerated fresh every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceGeometry {
    landmarks: Vec<Landmark>,
    bounding_box: BoundingBox,
}

impl FaceGeometry {
    /// Generate the synthetic geometry. Deterministic — a pure function
    /// of the fixed placement constants, so repeated calls are
    /// bit-identical. Cannot fail.
    pub fn synthesize() -> Self {
        let (cx, cy) = FACE_CENTER;

        // Smooth sinusoidal filler so every unused index is still a
        // well-defined point near the face center.
        let mut landmarks = Vec::with_capacity(LANDMARK_COUNT);
        for i in 0..LANDMARK_COUNT {
            let t = i as f32;
            landmarks.push(Landmark {
                x: cx + 0.05 * (t * 0.13).sin(),
                y: cy + 0.05 * (t * 0.17).cos(),
                z: 0.02 * (t * 0.11).sin(),
            });
        }

        for (slot, &(dx, dy)) in LEFT_EYE.iter().zip(EYE_OFFSETS.iter()) {
            landmarks[*slot] = Landmark {
                x: LEFT_EYE_ANCHOR.0 + dx,
                y: LEFT_EYE_ANCHOR.1 + dy,
                z: 0.0,
            };
        }
        for (slot, &(dx, dy)) in RIGHT_EYE.iter().zip(EYE_OFFSETS.iter()) {
            landmarks[*slot] = Landmark {
                x: RIGHT_EYE_ANCHOR.0 + dx,
                y: RIGHT_EYE_ANCHOR.1 + dy,
                z: 0.0,
            };
        }
        for (slot, &(dx, dy)) in LIPS.iter().zip(LIP_OFFSETS.iter()) {
            landmarks[*slot] = Landmark {
                x: MOUTH_ANCHOR.0 + dx,
                y: MOUTH_ANCHOR.1 + dy,
                z: 0.0,
            };
        }
        landmarks[NOSE_TIP] = Landmark {
            x: NOSE_TIP_POINT.0,
            y: NOSE_TIP_POINT.1,
            z: -0.02,
        };

        // Face outline: 36 ellipse samples at 10° steps.
        for (i, slot) in FACE_OVAL.iter().enumerate() {
            let angle = i as f32 / FACE_OVAL.len() as f32 * std::f32::consts::TAU;
            landmarks[*slot] = Landmark {
                x: cx + angle.cos() * OUTLINE_RX,
                y: cy + angle.sin() * OUTLINE_RY,
                z: 0.0,
            };
        }

        // Bounding box comes from the fixed constants, not from the
        // landmark extents.
        let bounding_box = BoundingBox {
            x: cx - FACE_WIDTH / 2.0,
            y: cy - FACE_HEIGHT / 2.0,
            width: FACE_WIDTH,
            height: FACE_HEIGHT,
        };

        Self {
            landmarks,
            bounding_box,
        }
    }

    /// All 468 landmarks, index-addressable.
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// 36-point face outline.
    pub fn face_oval(&self) -> [Landmark; 36] {
        FACE_OVAL.map(|i| self.landmarks[i])
    }

    pub fn left_eye(&self) -> [Landmark; 6] {
        LEFT_EYE.map(|i| self.landmarks[i])
    }

    pub fn right_eye(&self) -> [Landmark; 6] {
        RIGHT_EYE.map(|i| self.landmarks[i])
    }

    pub fn lips(&self) -> [Landmark; 11] {
        LIPS.map(|i| self.landmarks[i])
    }

    pub fn nose_tip(&self) -> Landmark {
        self.landmarks[NOSE_TIP]
    }
}
