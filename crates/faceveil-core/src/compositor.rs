//! Face overlay compositor.
//!
//! Draws a source frame, then overlays the current target face onto an
//! elliptical region aligned to the supplied geometry's bounding box:
//! contain-fit scaling, optional skin-tone matching against a sampled
//! frame block, and radial alpha feathering from the face-outline
//! centroid. A pure per-call transform — the only state is the loaded
//! target and the options.

use std::cell::{Cell, RefCell};

use image::RgbaImage;
use thiserror::Error;

use crate::geometry::FaceGeometry;
use crate::surface::{FrameSource, Surface};
use crate::target::{self, TargetFace};

/// Symmetric expansion of the face bounding box, per dimension, to
/// include hair/neck context.
const FACE_PADDING: f32 = 0.15;
/// Additional overhang of the drawn overlay beyond the padded
/// rectangle (5% per side).
const OVERLAY_OVERHANG: f32 = 0.10;
/// Elliptical clip radii as fractions of the padded rectangle. Tuning
/// constants, deliberately not an inscribed ellipse.
const CLIP_RX_RATIO: f32 = 0.42;
const CLIP_RY_RATIO: f32 = 0.48;
/// Side length of the frame-centered block sampled for color matching.
const COLOR_SAMPLE_SIZE: u32 = 50;
/// Per-channel color-match ratio bounds.
const RATIO_MIN: f32 = 0.5;
const RATIO_MAX: f32 = 1.5;

#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("unsupported target image source: {0}")]
    UnsupportedSource(String),
    #[error("malformed data URI (expected a base64 payload)")]
    MalformedDataUri,
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to read target image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("target image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("target decode task failed")]
    DecodeTask,
}

/// Compositing configuration.
///
/// `blend_amount` and `feather_amount` are deliberately not clamped:
/// the documented contract is `blend_amount` in [0, 1] and
/// `feather_amount` >= 0, and out-of-range values flow through the
/// compositing formulas untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorOptions {
    /// Overlay opacity before feathering. 0 = invisible, 1 = opaque.
    pub blend_amount: f32,
    /// Width of the alpha falloff band at the overlay's outer edge, in
    /// output pixels. 0 disables feathering.
    pub feather_amount: f32,
    /// Shift overlay channels toward the frame's sampled average.
    pub color_correction: bool,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            blend_amount: 0.95,
            feather_amount: 20.0,
            color_correction: false,
        }
    }
}

/// Partial options update; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositorOptionsUpdate {
    pub blend_amount: Option<f32>,
    pub feather_amount: Option<f32>,
    pub color_correction: Option<bool>,
}

struct LoadedTarget {
    id: String,
    image: RgbaImage,
}

/// The face overlay compositing engine.
///
/// Single-thread owned: one render loop per instance, at most one
/// `composite` in flight. Mutation goes through interior mutability so
/// an in-flight `load_target` can be superseded by `clear_target` or a
/// newer load without locks (last load wins).
pub struct FaceCompositor {
    target: RefCell<Option<LoadedTarget>>,
    options: Cell<CompositorOptions>,
    load_generation: Cell<u64>,
}

impl Default for FaceCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceCompositor {
    pub fn new() -> Self {
        Self {
            target: RefCell::new(None),
            options: Cell::new(CompositorOptions::default()),
            load_generation: Cell::new(0),
        }
    }

    /// Decode `target.image_url` and install it as the current target.
    ///
    /// On decode failure the previous target is left unchanged and the
    /// error is returned. If a newer `load_target` or a `clear_target`
    /// happened while the decode was in flight, the stale result is
    /// discarded and `Ok(false)` is returned; `Ok(true)` means this
    /// load's image is now current.
    pub async fn load_target(&self, target: &TargetFace) -> Result<bool, CompositorError> {
        let token = self.load_generation.get() + 1;
        self.load_generation.set(token);

        let bytes = target::fetch_image_bytes(&target.image_url).await?;
        let image = target::decode_image(bytes).await?;

        if self.load_generation.get() != token {
            tracing::debug!(id = %target.id, "target load superseded — discarding");
            return Ok(false);
        }

        tracing::info!(
            id = %target.id,
            width = image.width(),
            height = image.height(),
            "target loaded"
        );
        *self.target.borrow_mut() = Some(LoadedTarget {
            id: target.id.clone(),
            image,
        });
        Ok(true)
    }

    /// Remove the current target; subsequent composites pass through.
    /// Also voids any load still in flight.
    pub fn clear_target(&self) {
        self.load_generation.set(self.load_generation.get() + 1);
        if self.target.borrow_mut().take().is_some() {
            tracing::debug!("target cleared");
        }
    }

    pub fn has_target(&self) -> bool {
        self.target.borrow().is_some()
    }

    /// Id of the currently loaded target, if any.
    pub fn target_id(&self) -> Option<String> {
        self.target.borrow().as_ref().map(|t| t.id.clone())
    }

    pub fn options(&self) -> CompositorOptions {
        self.options.get()
    }

    /// Merge the given fields into the current options.
    pub fn set_options(&self, update: CompositorOptionsUpdate) {
        let mut opts = self.options.get();
        if let Some(v) = update.blend_amount {
            opts.blend_amount = v;
        }
        if let Some(v) = update.feather_amount {
            opts.feather_amount = v;
        }
        if let Some(v) = update.color_correction {
            opts.color_correction = v;
        }
        self.options.set(opts);
    }

    /// Render one frame into `output`.
    ///
    /// Copies the source frame at the output's native dimensions, then
    /// overlays the current target clipped to the face ellipse. Without
    /// a target or geometry the result is the pass-through copy.
    /// Idempotent per call: no frame-to-frame state beyond the loaded
    /// target and the options.
    pub fn composite(
        &self,
        source: &dyn FrameSource,
        geometry: Option<&FaceGeometry>,
        output: &mut Surface,
    ) {
        source.draw_into(output);

        let target = self.target.borrow();
        let (Some(target), Some(geom)) = (target.as_ref(), geometry) else {
            return;
        };
        if output.width() == 0 || output.height() == 0 {
            return;
        }
        let (tw, th) = target.image.dimensions();
        if tw == 0 || th == 0 {
            return;
        }

        let opts = self.options.get();
        let ow = output.width() as f32;
        let oh = output.height() as f32;

        // Face rectangle in output pixels, padded symmetrically.
        let bb = geom.bounding_box();
        let cx = (bb.x + bb.width / 2.0) * ow;
        let cy = (bb.y + bb.height / 2.0) * oh;
        let rect_w = bb.width * ow * (1.0 + FACE_PADDING);
        let rect_h = bb.height * oh * (1.0 + FACE_PADDING);

        let rx = rect_w * CLIP_RX_RATIO;
        let ry = rect_h * CLIP_RY_RATIO;

        // Contain-fit the target into a rectangle 10% larger than the
        // padded face rectangle, centered on it.
        let draw_w = rect_w * (1.0 + OVERLAY_OVERHANG);
        let draw_h = rect_h * (1.0 + OVERLAY_OVERHANG);
        let scale = (draw_w / tw as f32).min(draw_h / th as f32);
        let fit_w = tw as f32 * scale;
        let fit_h = th as f32 * scale;
        let fit_x0 = cx - fit_w / 2.0;
        let fit_y0 = cy - fit_h / 2.0;

        let mut scratch = Surface::new(output.width(), output.height());

        // Rasterize the clipped overlay over the ellipse's bounding box.
        let x0 = (cx - rx).floor().max(0.0) as u32;
        let x1 = ((cx + rx).ceil().min(ow)).max(0.0) as u32;
        let y0 = (cy - ry).floor().max(0.0) as u32;
        let y1 = ((cy + ry).ceil().min(oh)).max(0.0) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let nx = (px - cx) / rx;
                let ny = (py - cy) / ry;
                if nx * nx + ny * ny > 1.0 {
                    continue;
                }
                // Outside the contain-fit rectangle the overlay is
                // transparent (letterbox band).
                if px < fit_x0 || px >= fit_x0 + fit_w || py < fit_y0 || py >= fit_y0 + fit_h {
                    continue;
                }

                let u = (px - fit_x0) / scale - 0.5;
                let v = (py - fit_y0) / scale - 0.5;
                let [r, g, b, a] = sample_bilinear(&target.image, u, v);
                let alpha = (a * opts.blend_amount).round().clamp(0.0, 255.0) as u8;
                if alpha == 0 {
                    continue;
                }
                scratch.set_pixel(
                    x,
                    y,
                    [
                        r.round().clamp(0.0, 255.0) as u8,
                        g.round().clamp(0.0, 255.0) as u8,
                        b.round().clamp(0.0, 255.0) as u8,
                        alpha,
                    ],
                );
            }
        }

        if opts.color_correction {
            match_color(output, &mut scratch);
        }

        if opts.feather_amount > 0.0 {
            feather(geom, &mut scratch, opts.feather_amount);
        }

        output.blend_over(&scratch);
    }
}

/// Bilinear RGBA sample at continuous coordinates, clamped to the
/// image bounds.
fn sample_bilinear(img: &RgbaImage, u: f32, v: f32) -> [f32; 4] {
    let (w, h) = img.dimensions();
    let u = u.clamp(0.0, (w - 1) as f32);
    let v = v.clamp(0.0, (h - 1) as f32);

    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        out[c] = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
    }
    out
}

/// Shift the overlay's channels toward the frame's sampled average.
///
/// Samples a fixed frame-centered block from both the source copy and
/// the overlay, then scales every non-transparent overlay pixel by the
/// clamped per-channel mean ratio. Single pass, non-iterative. Skipped
/// silently when either block cannot be sampled.
fn match_color(source_copy: &Surface, scratch: &mut Surface) {
    let cx = source_copy.width() as f32 / 2.0;
    let cy = source_copy.height() as f32 / 2.0;

    let Some(src_mean) = source_copy.mean_rgb_block(cx, cy, COLOR_SAMPLE_SIZE) else {
        tracing::debug!("frame sample unavailable — skipping color correction");
        return;
    };
    let Some(ovl_mean) = scratch.mean_rgb_block(cx, cy, COLOR_SAMPLE_SIZE) else {
        tracing::debug!("overlay sample unavailable — skipping color correction");
        return;
    };

    let ratio = |s: f32, o: f32| -> f32 {
        let denom = if o == 0.0 { 1.0 } else { o };
        (s / denom).clamp(RATIO_MIN, RATIO_MAX)
    };
    let ratios = [
        ratio(src_mean[0], ovl_mean[0]),
        ratio(src_mean[1], ovl_mean[1]),
        ratio(src_mean[2], ovl_mean[2]),
    ];

    for y in 0..scratch.height() {
        for x in 0..scratch.width() {
            let mut px = scratch.pixel(x, y);
            if px[3] == 0 {
                continue;
            }
            for c in 0..3 {
                px[c] = (px[c] as f32 * ratios[c]).min(255.0) as u8;
            }
            scratch.set_pixel(x, y, px);
        }
    }
}

/// Linear alpha falloff from the face-outline centroid.
///
/// Pixels farther than `max_dist - amount` from the centroid fade
/// linearly to zero alpha at `max_dist`; pixels at or inside the
/// threshold are untouched.
fn feather(geom: &FaceGeometry, scratch: &mut Surface, amount: f32) {
    let ow = scratch.width() as f32;
    let oh = scratch.height() as f32;

    let oval = geom.face_oval();
    let points: Vec<(f32, f32)> = oval.iter().map(|lm| (lm.x * ow, lm.y * oh)).collect();
    let n = points.len() as f32;
    let cx = points.iter().map(|p| p.0).sum::<f32>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f32>() / n;
    let max_dist = points
        .iter()
        .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .fold(0.0f32, f32::max);
    let threshold = max_dist - amount;

    for y in 0..scratch.height() {
        for x in 0..scratch.width() {
            let mut px = scratch.pixel(x, y);
            if px[3] == 0 {
                continue;
            }
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist <= threshold {
                continue;
            }
            let factor = ((max_dist - dist) / amount).clamp(0.0, 1.0);
            px[3] = (px[3] as f32 * factor).round().clamp(0.0, 255.0) as u8;
            scratch.set_pixel(x, y, px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    fn solid_target(id: &str, rgba: [u8; 4]) -> TargetFace {
        let img = image::RgbaImage::from_pixel(64, 64, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let uri = format!("data:image/png;base64,{}", BASE64.encode(buf));
        TargetFace {
            id: id.to_string(),
            name: id.to_string(),
            image_url: uri.clone(),
            thumbnail_url: uri,
        }
    }

    fn corrupt_target(id: &str) -> TargetFace {
        let uri = format!("data:image/png;base64,{}", BASE64.encode([0u8; 32]));
        TargetFace {
            id: id.to_string(),
            name: id.to_string(),
            image_url: uri.clone(),
            thumbnail_url: uri,
        }
    }

    #[test]
    fn test_default_options() {
        let opts = CompositorOptions::default();
        assert_eq!(opts.blend_amount, 0.95);
        assert_eq!(opts.feather_amount, 20.0);
        assert!(!opts.color_correction);
    }

    #[test]
    fn test_set_options_merges_partially() {
        let comp = FaceCompositor::new();
        comp.set_options(CompositorOptionsUpdate {
            blend_amount: Some(0.5),
            ..Default::default()
        });
        let opts = comp.options();
        assert_eq!(opts.blend_amount, 0.5);
        assert_eq!(opts.feather_amount, 20.0);
        assert!(!opts.color_correction);

        comp.set_options(CompositorOptionsUpdate {
            color_correction: Some(true),
            ..Default::default()
        });
        let opts = comp.options();
        assert_eq!(opts.blend_amount, 0.5);
        assert!(opts.color_correction);
    }

    #[test]
    fn test_passthrough_without_target_or_geometry() {
        let comp = FaceCompositor::new();
        let source = Surface::filled(64, 48, [40, 80, 120, 255]);
        let mut output = Surface::new(64, 48);
        comp.composite(&source, None, &mut output);
        assert_eq!(output, source);

        let geom = FaceGeometry::synthesize();
        comp.composite(&source, Some(&geom), &mut output);
        assert_eq!(output, source);
    }

    #[tokio::test]
    async fn test_geometry_required_even_with_target() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();
        assert!(comp.has_target());

        let source = Surface::filled(64, 48, [40, 80, 120, 255]);
        let mut output = Surface::new(64, 48);
        comp.composite(&source, None, &mut output);
        assert_eq!(output, source);
    }

    #[tokio::test]
    async fn test_zero_blend_equals_passthrough() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();
        comp.set_options(CompositorOptionsUpdate {
            blend_amount: Some(0.0),
            ..Default::default()
        });

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(160, 120, [40, 80, 120, 255]);
        let mut output = Surface::new(160, 120);
        comp.composite(&source, Some(&geom), &mut output);
        assert_eq!(output, source);
    }

    #[tokio::test]
    async fn test_zero_feather_hard_edge() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();
        comp.set_options(CompositorOptionsUpdate {
            blend_amount: Some(1.0),
            feather_amount: Some(0.0),
            ..Default::default()
        });

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(640, 480, [0, 0, 0, 255]);
        let mut output = Surface::new(640, 480);
        comp.composite(&source, Some(&geom), &mut output);

        // Ellipse center: (320, 216); clip radii (~108.2, ~119.2).
        assert_eq!(output.pixel(320, 216), [255, 0, 0, 255]);
        // Just inside the clip ellipse: fully red, no partial alpha.
        assert_eq!(output.pixel(320 + 105, 216), [255, 0, 0, 255]);
        // Just outside: untouched source, no alpha bleed.
        assert_eq!(output.pixel(320 + 110, 216), [0, 0, 0, 255]);
        assert_eq!(output.pixel(320, 216 + 121), [0, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_composite_is_idempotent_per_call() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(160, 120, [10, 20, 30, 255]);
        let mut first = Surface::new(160, 120);
        let mut second = Surface::new(160, 120);
        comp.composite(&source, Some(&geom), &mut first);
        comp.composite(&source, Some(&geom), &mut second);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_target() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();

        let err = comp.load_target(&corrupt_target("bad")).await.unwrap_err();
        assert!(matches!(err, CompositorError::Decode(_)));
        assert!(comp.has_target());
        assert_eq!(comp.target_id().as_deref(), Some("red"));
    }

    #[tokio::test]
    async fn test_clear_wins_over_pending_load() {
        let comp = FaceCompositor::new();
        let face = solid_target("red", [255, 0, 0, 255]);

        // The decode suspends on a blocking task; the clear runs while
        // it is in flight, so the resolved load must install nothing.
        let (loaded, _) = tokio::join!(comp.load_target(&face), async {
            comp.clear_target();
        });
        assert!(!loaded.unwrap());
        assert!(!comp.has_target());
    }

    #[tokio::test]
    async fn test_last_load_wins() {
        let comp = FaceCompositor::new();
        let red = solid_target("red", [255, 0, 0, 255]);
        let blue = solid_target("blue", [0, 0, 255, 255]);

        let (first, second) = tokio::join!(comp.load_target(&red), comp.load_target(&blue));
        assert!(!first.unwrap());
        assert!(second.unwrap());
        assert_eq!(comp.target_id().as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn test_clear_target_then_passthrough() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();
        comp.clear_target();
        assert!(!comp.has_target());

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(64, 48, [1, 2, 3, 255]);
        let mut output = Surface::new(64, 48);
        comp.composite(&source, Some(&geom), &mut output);
        assert_eq!(output, source);
    }

    #[tokio::test]
    async fn test_color_correction_shifts_toward_frame() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();
        comp.set_options(CompositorOptionsUpdate {
            blend_amount: Some(1.0),
            feather_amount: Some(0.0),
            color_correction: Some(true),
        });

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(640, 480, [128, 128, 128, 255]);
        let mut output = Surface::new(640, 480);
        comp.composite(&source, Some(&geom), &mut output);

        // The center block of the overlay is solid red, so the red
        // ratio is 128/255 ≈ 0.502 and the red channel lands near 128.
        // Green/blue overlay means are 0, so their ratios clamp at 1.5
        // and 0 * 1.5 stays 0.
        let px = output.pixel(320, 216);
        assert!((px[0] as i32 - 128).abs() <= 2, "r = {}", px[0]);
        assert_eq!(px[1], 0);
        assert_eq!(px[2], 0);
    }

    #[tokio::test]
    async fn test_feather_fades_outline_edge() {
        let comp = FaceCompositor::new();
        comp.load_target(&solid_target("red", [255, 0, 0, 255]))
            .await
            .unwrap();
        comp.set_options(CompositorOptionsUpdate {
            blend_amount: Some(1.0),
            feather_amount: Some(20.0),
            ..Default::default()
        });

        let geom = FaceGeometry::synthesize();
        let source = Surface::filled(640, 480, [0, 0, 0, 255]);
        let mut output = Surface::new(640, 480);
        comp.composite(&source, Some(&geom), &mut output);

        // Outline max distance from the centroid is ~97.2 px
        // (0.2025 * 480); the feather band spans (77.2, 97.2].
        // Inside the band the red contribution is partial.
        assert_eq!(output.pixel(320, 216), [255, 0, 0, 255]);
        let mid_band = output.pixel(320 + 87, 216);
        assert!(mid_band[0] > 0 && mid_band[0] < 255, "r = {}", mid_band[0]);
        // Beyond max distance the overlay is fully faded out.
        assert_eq!(output.pixel(320 + 99, 216), [0, 0, 0, 255]);
    }
}
