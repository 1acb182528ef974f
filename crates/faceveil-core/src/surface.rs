//! Owned RGBA bitmap surfaces and the frame-source seam.
//!
//! All per-pixel compositing in this crate runs over raw RGBA8 byte
//! buffers; the `image` crate is only used at the edges (decode,
//! encode, resize).

use image::RgbaImage;

/// Mutable RGBA8 bitmap, 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Create a surface filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut s = Self::new(width, height);
        for px in s.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        s
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Resize the surface, discarding contents (cleared to transparent).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * 4, 0);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Read one pixel. `x`/`y` must be in bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Write one pixel. `x`/`y` must be in bounds.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Mean R/G/B over a `size`×`size` block centered at (`cx`, `cy`),
    /// clipped to the surface. Returns `None` when the clipped block is
    /// empty — callers treat that as "pixel read-back unavailable".
    pub fn mean_rgb_block(&self, cx: f32, cy: f32, size: u32) -> Option<[f32; 3]> {
        let half = size as f32 / 2.0;
        let x0 = (cx - half).floor().max(0.0) as u32;
        let y0 = (cy - half).floor().max(0.0) as u32;
        let x1 = ((cx + half).ceil() as i64).clamp(0, self.width as i64) as u32;
        let y1 = ((cy + half).ceil() as i64).clamp(0, self.height as i64) as u32;
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let mut sums = [0.0f64; 3];
        for y in y0..y1 {
            for x in x0..x1 {
                let px = self.pixel(x, y);
                sums[0] += px[0] as f64;
                sums[1] += px[1] as f64;
                sums[2] += px[2] as f64;
            }
        }
        let count = ((x1 - x0) as f64) * ((y1 - y0) as f64);
        Some([
            (sums[0] / count) as f32,
            (sums[1] / count) as f32,
            (sums[2] / count) as f32,
        ])
    }

    /// Blend `src` over `self` using straight (non-premultiplied) alpha.
    ///
    /// Both surfaces must share dimensions; the overlapping region is
    /// blended if they do not.
    pub fn blend_over(&mut self, src: &Surface) {
        let w = self.width.min(src.width);
        let h = self.height.min(src.height);
        for y in 0..h {
            for x in 0..w {
                let s = src.pixel(x, y);
                if s[3] == 0 {
                    continue;
                }
                let a = s[3] as f32 / 255.0;
                let inv = 1.0 - a;
                let d = self.pixel(x, y);
                let out = [
                    (s[0] as f32 * a + d[0] as f32 * inv).round() as u8,
                    (s[1] as f32 * a + d[1] as f32 * inv).round() as u8,
                    (s[2] as f32 * a + d[2] as f32 * inv).round() as u8,
                    (s[3] as f32 + d[3] as f32 * inv).round().min(255.0) as u8,
                ];
                self.set_pixel(x, y, out);
            }
        }
    }

    /// Infallible: the buffer is `width * height * 4` bytes by
    /// construction, so `from_raw` always accepts it.
    pub fn to_rgba_image(&self) -> RgbaImage {
        debug_assert_eq!(
            self.data.len(),
            self.width as usize * self.height as usize * 4
        );
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
        }
    }
}

/// Anything that can paint its current frame into a [`Surface`].
///
/// The draw scales nearest-neighbor to the destination's native
/// dimensions; a same-size draw is a plain copy.
pub trait FrameSource {
    fn dimensions(&self) -> (u32, u32);
    fn draw_into(&self, surface: &mut Surface);
}

fn draw_scaled(
    surface: &mut Surface,
    src_w: u32,
    src_h: u32,
    sample: impl Fn(u32, u32) -> [u8; 4],
) {
    if src_w == 0 || src_h == 0 {
        return;
    }
    let (dw, dh) = (surface.width(), surface.height());
    for dy in 0..dh {
        let sy = (dy as u64 * src_h as u64 / dh.max(1) as u64) as u32;
        for dx in 0..dw {
            let sx = (dx as u64 * src_w as u64 / dw.max(1) as u64) as u32;
            surface.set_pixel(dx, dy, sample(sx.min(src_w - 1), sy.min(src_h - 1)));
        }
    }
}

impl FrameSource for Surface {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_into(&self, surface: &mut Surface) {
        if self.width == surface.width && self.height == surface.height {
            surface.data.copy_from_slice(&self.data);
            return;
        }
        draw_scaled(surface, self.width, self.height, |x, y| self.pixel(x, y));
    }
}

impl FrameSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn draw_into(&self, surface: &mut Surface) {
        draw_scaled(surface, self.width(), self.height(), |x, y| {
            self.get_pixel(x, y).0
        });
    }
}
